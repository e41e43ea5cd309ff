//! pprof protobuf messages and their conversion into [`Profile`]
//!
//! Message layout follows `profile.proto` from the pprof project; only the
//! conversion below is specific to this crate.

use sightline_shared::{Frame, Profile, Sample, Stack, ValueType};
use std::collections::{BTreeMap, HashMap};

use crate::error::SourceError;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PprofProfile {
    #[prost(message, repeated, tag = "1")]
    pub sample_type: Vec<PprofValueType>,
    #[prost(message, repeated, tag = "2")]
    pub sample: Vec<PprofSample>,
    #[prost(message, repeated, tag = "3")]
    pub mapping: Vec<Mapping>,
    #[prost(message, repeated, tag = "4")]
    pub location: Vec<Location>,
    #[prost(message, repeated, tag = "5")]
    pub function: Vec<Function>,
    #[prost(string, repeated, tag = "6")]
    pub string_table: Vec<String>,
    #[prost(int64, tag = "7")]
    pub drop_frames: i64,
    #[prost(int64, tag = "8")]
    pub keep_frames: i64,
    #[prost(int64, tag = "9")]
    pub time_nanos: i64,
    #[prost(int64, tag = "10")]
    pub duration_nanos: i64,
    #[prost(message, optional, tag = "11")]
    pub period_type: Option<PprofValueType>,
    #[prost(int64, tag = "12")]
    pub period: i64,
    #[prost(int64, repeated, tag = "13")]
    pub comment: Vec<i64>,
    #[prost(int64, tag = "14")]
    pub default_sample_type: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PprofValueType {
    #[prost(int64, tag = "1")]
    pub r#type: i64,
    #[prost(int64, tag = "2")]
    pub unit: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PprofSample {
    /// Leaf first
    #[prost(uint64, repeated, tag = "1")]
    pub location_id: Vec<u64>,
    #[prost(int64, repeated, tag = "2")]
    pub value: Vec<i64>,
    #[prost(message, repeated, tag = "3")]
    pub label: Vec<Label>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Label {
    #[prost(int64, tag = "1")]
    pub key: i64,
    #[prost(int64, tag = "2")]
    pub str: i64,
    #[prost(int64, tag = "3")]
    pub num: i64,
    #[prost(int64, tag = "4")]
    pub num_unit: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Mapping {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub memory_start: u64,
    #[prost(uint64, tag = "3")]
    pub memory_limit: u64,
    #[prost(uint64, tag = "4")]
    pub file_offset: u64,
    #[prost(int64, tag = "5")]
    pub filename: i64,
    #[prost(int64, tag = "6")]
    pub build_id: i64,
    #[prost(bool, tag = "7")]
    pub has_functions: bool,
    #[prost(bool, tag = "8")]
    pub has_filenames: bool,
    #[prost(bool, tag = "9")]
    pub has_line_numbers: bool,
    #[prost(bool, tag = "10")]
    pub has_inline_frames: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Location {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub mapping_id: u64,
    #[prost(uint64, tag = "3")]
    pub address: u64,
    /// Innermost inlined call first, the location's own function last
    #[prost(message, repeated, tag = "4")]
    pub line: Vec<Line>,
    #[prost(bool, tag = "5")]
    pub is_folded: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Line {
    #[prost(uint64, tag = "1")]
    pub function_id: u64,
    #[prost(int64, tag = "2")]
    pub line: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Function {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(int64, tag = "2")]
    pub name: i64,
    #[prost(int64, tag = "3")]
    pub system_name: i64,
    #[prost(int64, tag = "4")]
    pub filename: i64,
    #[prost(int64, tag = "5")]
    pub start_line: i64,
}

// ── Conversion ───────────────────────────────────────────────────────────────

struct Strings<'a>(&'a [String]);

impl Strings<'_> {
    fn get(&self, index: i64) -> Result<&str, SourceError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.0.get(i))
            .map(String::as_str)
            .ok_or_else(|| SourceError::Decode(format!("string index {} out of range", index)))
    }

    /// Non-empty string at `index`
    fn opt(&self, index: i64) -> Result<Option<String>, SourceError> {
        let s = self.get(index)?;
        Ok((!s.is_empty()).then(|| s.to_string()))
    }
}

impl PprofProfile {
    /// Resolve string-table references and location ids into a [`Profile`].
    pub fn into_profile(self) -> Result<Profile, SourceError> {
        let strings = Strings(&self.string_table);
        let value_type = |vt: &PprofValueType| -> Result<ValueType, SourceError> {
            Ok(ValueType::new(strings.get(vt.r#type)?, strings.get(vt.unit)?))
        };

        let sample_types = self
            .sample_type
            .iter()
            .map(value_type)
            .collect::<Result<Vec<_>, _>>()?;
        let mut profile = Profile::new(sample_types);
        profile.default_sample_type = strings.opt(self.default_sample_type)?;
        profile.time_nanos = self.time_nanos;
        profile.duration_ns = self.duration_nanos;
        profile.period = self.period;
        profile.period_type = self.period_type.as_ref().map(value_type).transpose()?;
        profile.comments = self
            .comment
            .iter()
            .map(|&c| strings.get(c).map(str::to_string))
            .collect::<Result<_, _>>()?;

        let mappings: HashMap<u64, Option<String>> = self
            .mapping
            .iter()
            .map(|m| Ok((m.id, strings.opt(m.filename)?)))
            .collect::<Result<_, SourceError>>()?;
        profile.main_binary = self
            .mapping
            .first()
            .and_then(|m| mappings.get(&m.id).cloned().flatten());

        let functions: HashMap<u64, (Option<String>, Option<String>)> = self
            .function
            .iter()
            .map(|f| Ok((f.id, (strings.opt(f.name)?, strings.opt(f.filename)?))))
            .collect::<Result<_, SourceError>>()?;

        let mut locations: HashMap<u64, Vec<Frame>> = HashMap::with_capacity(self.location.len());
        for loc in &self.location {
            let module = mappings.get(&loc.mapping_id).cloned().flatten();
            let frames = if loc.line.is_empty() {
                vec![Frame {
                    module,
                    ..Frame::new_unresolved(loc.address)
                }]
            } else {
                let last = loc.line.len() - 1;
                loc.line
                    .iter()
                    .enumerate()
                    .map(|(i, line)| {
                        let (function, file) =
                            functions.get(&line.function_id).cloned().unwrap_or_default();
                        Frame {
                            address: loc.address,
                            function,
                            file,
                            line: u32::try_from(line.line).ok().filter(|&l| l != 0),
                            module: module.clone(),
                            inlined: i < last,
                        }
                    })
                    .collect()
            };
            locations.insert(loc.id, frames);
        }

        for sample in self.sample {
            let mut frames = Vec::new();
            for id in &sample.location_id {
                let loc = locations
                    .get(id)
                    .ok_or_else(|| SourceError::Decode(format!("unknown location id {}", id)))?;
                frames.extend(loc.iter().cloned());
            }
            let mut labels: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for label in &sample.label {
                if label.str == 0 {
                    continue;
                }
                labels
                    .entry(strings.get(label.key)?.to_string())
                    .or_default()
                    .push(strings.get(label.str)?.to_string());
            }
            if sample.value.len() != profile.sample_types.len() {
                return Err(SourceError::Decode(format!(
                    "sample has {} values, expected {}",
                    sample.value.len(),
                    profile.sample_types.len()
                )));
            }
            profile.samples.push(Sample {
                stack: Stack { frames },
                values: sample.value,
                labels,
            });
        }
        Ok(profile)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use prost::Message;

    /// `main -> work` with `work` inlined into `main` at one location, plus a
    /// sample on an unsymbolized address.
    pub(crate) fn sample_pprof() -> PprofProfile {
        let strings = [
            "", "samples", "count", "cpu", "nanoseconds", "main", "work", "main.rs", "/bin/app",
            "thread", "worker-1",
        ];
        PprofProfile {
            sample_type: vec![
                PprofValueType { r#type: 1, unit: 2 },
                PprofValueType { r#type: 3, unit: 4 },
            ],
            sample: vec![
                PprofSample {
                    location_id: vec![1],
                    value: vec![1, 10],
                    label: vec![Label {
                        key: 9,
                        str: 10,
                        num: 0,
                        num_unit: 0,
                    }],
                },
                PprofSample {
                    location_id: vec![2, 1],
                    value: vec![1, 5],
                    label: vec![],
                },
            ],
            mapping: vec![Mapping {
                id: 1,
                filename: 8,
                ..Default::default()
            }],
            location: vec![
                Location {
                    id: 1,
                    mapping_id: 1,
                    address: 0x1000,
                    line: vec![
                        Line {
                            function_id: 2,
                            line: 7,
                        },
                        Line {
                            function_id: 1,
                            line: 3,
                        },
                    ],
                    is_folded: false,
                },
                Location {
                    id: 2,
                    mapping_id: 1,
                    address: 0x2000,
                    line: vec![],
                    is_folded: false,
                },
            ],
            function: vec![
                Function {
                    id: 1,
                    name: 5,
                    filename: 7,
                    ..Default::default()
                },
                Function {
                    id: 2,
                    name: 6,
                    filename: 7,
                    ..Default::default()
                },
            ],
            string_table: strings.iter().map(|s| s.to_string()).collect(),
            duration_nanos: 1_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_into_profile() {
        let bytes = sample_pprof().encode_to_vec();
        let decoded = PprofProfile::decode(bytes.as_slice()).unwrap();
        let profile = decoded.into_profile().unwrap();

        assert_eq!(profile.sample_type_names(), vec!["samples", "cpu"]);
        assert_eq!(profile.main_binary.as_deref(), Some("/bin/app"));
        assert_eq!(profile.duration_ns, 1_000_000);
        assert_eq!(profile.samples.len(), 2);

        let first = &profile.samples[0];
        let names: Vec<_> = first
            .stack
            .frames
            .iter()
            .map(|f| f.function.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["work", "main"]);
        assert!(first.stack.frames[0].inlined);
        assert!(!first.stack.frames[1].inlined);
        assert_eq!(first.stack.frames[0].line, Some(7));
        assert_eq!(first.labels["thread"], vec!["worker-1"]);

        let second = &profile.samples[1];
        assert_eq!(second.stack.frames.len(), 3);
        assert!(!second.stack.frames[0].is_symbolized());
        assert_eq!(second.stack.frames[0].module.as_deref(), Some("/bin/app"));
    }

    #[test]
    fn test_bad_string_index() {
        let mut p = sample_pprof();
        p.function[0].name = 99;
        assert!(matches!(p.into_profile(), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_unknown_location() {
        let mut p = sample_pprof();
        p.sample[0].location_id = vec![42];
        assert!(p.into_profile().is_err());
    }
}
