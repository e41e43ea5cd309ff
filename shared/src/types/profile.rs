//! Profile data structures
//!
//! These types represent a sampled profile: a list of stack samples, each
//! carrying one value per declared sample type. The render pipeline only
//! ever reads a profile; see [`ProfileSnapshot`] for how it is shared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("sample has {got} values, profile declares {expected} sample types")]
    ValueCount { expected: usize, got: usize },
    #[error("incompatible sample types: {0} vs {1}")]
    IncompatibleSampleTypes(String, String),
}

/// Kind and unit of one sample value, e.g. `cpu/nanoseconds` or
/// `alloc_space/bytes`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    #[serde(rename = "type")]
    pub kind: String,
    pub unit: String,
}

impl ValueType {
    pub fn new(kind: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            unit: unit.into(),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.unit)
    }
}

/// A single frame in a stack trace
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Instruction address
    pub address: u64,

    /// Function name (if resolved)
    pub function: Option<String>,

    /// File name (if available)
    pub file: Option<String>,

    /// Line number (if available)
    pub line: Option<u32>,

    /// Module/library name
    pub module: Option<String>,

    /// Whether this frame was inlined into its caller
    #[serde(default)]
    pub inlined: bool,
}

impl Frame {
    /// Create a new unresolved frame
    pub fn new_unresolved(address: u64) -> Self {
        Self {
            address,
            function: None,
            file: None,
            line: None,
            module: None,
            inlined: false,
        }
    }

    /// Create a symbolized frame with only a function name
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            function: Some(name.into()),
            ..Self::new_unresolved(0)
        }
    }

    /// Check if the frame has been symbolized
    pub fn is_symbolized(&self) -> bool {
        self.function.is_some()
    }
}

/// A complete stack trace with symbol information
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Stack {
    /// Frames from innermost (leaf) to outermost (root)
    pub frames: Vec<Frame>,
}

impl Stack {
    /// Create a new stack from instruction addresses, leaf first
    pub fn from_addresses(addresses: &[u64]) -> Self {
        Self {
            frames: addresses.iter().map(|&a| Frame::new_unresolved(a)).collect(),
        }
    }

    /// Create a stack from function names listed caller first, the way a
    /// call path reads (`["main", "run", "work"]`).
    pub fn from_call_path(functions: &[&str]) -> Self {
        Self {
            frames: functions.iter().rev().map(|f| Frame::function(*f)).collect(),
        }
    }

    /// Leaf frame, if any
    pub fn leaf(&self) -> Option<&Frame> {
        self.frames.first()
    }
}

/// One stack sample with a value per sample type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub stack: Stack,
    pub values: Vec<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, Vec<String>>,
}

/// A sampled profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Declared sample value types, one per entry in `Sample::values`
    pub sample_types: Vec<ValueType>,

    /// Name of the preferred sample type, if the profile declares one
    #[serde(default)]
    pub default_sample_type: Option<String>,

    pub samples: Vec<Sample>,

    /// Collection time, nanoseconds since the UNIX epoch
    #[serde(default)]
    pub time_nanos: i64,

    /// Profile duration in nanoseconds
    #[serde(default)]
    pub duration_ns: i64,

    #[serde(default)]
    pub period_type: Option<ValueType>,

    #[serde(default)]
    pub period: i64,

    #[serde(default)]
    pub comments: Vec<String>,

    /// Main binary the profile was collected from
    #[serde(default)]
    pub main_binary: Option<String>,
}

impl Profile {
    /// Create a new empty profile
    pub fn new(sample_types: Vec<ValueType>) -> Self {
        Self {
            sample_types,
            ..Default::default()
        }
    }

    /// Add a sample to the profile
    pub fn add_sample(&mut self, stack: Stack, values: Vec<i64>) -> Result<(), ProfileError> {
        if values.len() != self.sample_types.len() {
            return Err(ProfileError::ValueCount {
                expected: self.sample_types.len(),
                got: values.len(),
            });
        }
        self.samples.push(Sample {
            stack,
            values,
            labels: BTreeMap::new(),
        });
        Ok(())
    }

    /// Index of the sample type called `name`
    pub fn sample_type_index(&self, name: &str) -> Option<usize> {
        self.sample_types.iter().position(|t| t.kind == name)
    }

    /// Index used when the request does not select one: the declared
    /// default type, or the last type otherwise.
    pub fn default_sample_index(&self) -> usize {
        self.default_sample_type
            .as_deref()
            .and_then(|name| self.sample_type_index(name))
            .unwrap_or_else(|| self.sample_types.len().saturating_sub(1))
    }

    /// Names of all sample types, in declaration order
    pub fn sample_type_names(&self) -> Vec<String> {
        self.sample_types.iter().map(|t| t.kind.clone()).collect()
    }

    /// Sum of each sample type over all samples
    pub fn totals(&self) -> Vec<i64> {
        let mut totals = vec![0i64; self.sample_types.len()];
        for sample in &self.samples {
            for (total, v) in totals.iter_mut().zip(&sample.values) {
                *total = total.saturating_add(*v);
            }
        }
        totals
    }

    /// Multiply sample values per type by `ratios[i]`, rounding to the
    /// nearest integer. Samples left all-zero are removed.
    pub fn scale_n(&mut self, ratios: &[f64]) {
        for sample in &mut self.samples {
            for (v, r) in sample.values.iter_mut().zip(ratios) {
                *v = (*v as f64 * r).round() as i64;
            }
        }
        self.samples.retain(|s| s.values.iter().any(|&v| v != 0));
    }

    /// Multiply every sample value by `ratio`
    pub fn scale(&mut self, ratio: f64) {
        let ratios = vec![ratio; self.sample_types.len()];
        self.scale_n(&ratios);
    }

    /// Attach `key=value` to every sample
    pub fn set_label(&mut self, key: &str, value: &str) {
        for sample in &mut self.samples {
            sample
                .labels
                .insert(key.to_string(), vec![value.to_string()]);
        }
    }

    /// Whether `other` declares the same sample types in the same order
    pub fn check_compatible(&self, other: &Profile) -> Result<(), ProfileError> {
        if self.sample_types != other.sample_types {
            return Err(ProfileError::IncompatibleSampleTypes(
                describe_types(&self.sample_types),
                describe_types(&other.sample_types),
            ));
        }
        Ok(())
    }

    /// Append all samples of `other`. Durations add up.
    pub fn merge(&mut self, other: Profile) -> Result<(), ProfileError> {
        self.check_compatible(&other)?;
        self.samples.extend(other.samples);
        self.duration_ns = self.duration_ns.saturating_add(other.duration_ns);
        if self.time_nanos == 0 || (other.time_nanos != 0 && other.time_nanos < self.time_nanos) {
            self.time_nanos = other.time_nanos;
        }
        Ok(())
    }
}

fn describe_types(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Read-only handle to a profile shared by concurrent renders.
///
/// Each render takes its own snapshot; the underlying profile is never
/// mutated once wrapped.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    inner: Arc<Profile>,
}

impl ProfileSnapshot {
    pub fn new(profile: Profile) -> Self {
        Self {
            inner: Arc::new(profile),
        }
    }

    /// Independent read-only view for one render call
    pub fn snapshot(&self) -> Arc<Profile> {
        Arc::clone(&self.inner)
    }
}

impl From<Profile> for ProfileSnapshot {
    fn from(profile: Profile) -> Self {
        Self::new(profile)
    }
}
