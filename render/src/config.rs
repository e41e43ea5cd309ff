//! Configuration resolution
//!
//! A render request starts from a base [`EffectiveConfig`] (server defaults
//! or a saved configuration) and applies the overrides carried in the URL
//! query. [`ServerSettings`] covers the process-level settings loaded once
//! at startup.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::error::ConfigError;

// ── Query parameters ─────────────────────────────────────────────────────────

/// Decoded URL query, in the order the pairs appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decode a raw query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value among several spellings of the same key
    fn get_any(&self, keys: &[&'static str]) -> Option<(&'static str, &str)> {
        keys.iter().find_map(|&k| self.get(k).map(|v| (k, v)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}

// ── Effective configuration ──────────────────────────────────────────────────

/// Node granularity used when aggregating frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Functions,
    FileFunctions,
    Files,
    Lines,
    Addresses,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Functions => "functions",
            Granularity::FileFunctions => "filefunctions",
            Granularity::Files => "files",
            Granularity::Lines => "lines",
            Granularity::Addresses => "addresses",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "functions" => Ok(Granularity::Functions),
            "filefunctions" => Ok(Granularity::FileFunctions),
            "files" => Ok(Granularity::Files),
            "lines" => Ok(Granularity::Lines),
            "addresses" => Ok(Granularity::Addresses),
            other => Err(format!("unrecognized granularity {:?}", other)),
        }
    }
}

/// Every option that affects how a report is built for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveConfig {
    /// Sample type by name or numeric index; profile default when unset
    pub sample_index: Option<String>,
    pub mean: bool,
    pub granularity: Granularity,
    pub call_tree: bool,
    pub trim: bool,
    pub normalize: bool,
    pub drop_negative: bool,
    pub node_count: Option<usize>,
    pub node_fraction: f64,
    pub edge_fraction: f64,
    pub focus: Option<String>,
    pub ignore: Option<String>,
    pub hide: Option<String>,
    pub show: Option<String>,
    pub show_from: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            sample_index: None,
            mean: false,
            granularity: Granularity::default(),
            call_tree: false,
            trim: true,
            normalize: false,
            drop_negative: false,
            node_count: None,
            node_fraction: 0.005,
            edge_fraction: 0.001,
            focus: None,
            ignore: None,
            hide: None,
            show: None,
            show_from: None,
        }
    }
}

/// Legacy sample-index shortcuts, in the order they are applied.
pub const LEGACY_SAMPLE_FLAGS: &[&str] = &[
    "total_delay",
    "mean_delay",
    "contentions",
    "inuse_space",
    "inuse_objects",
    "alloc_space",
    "alloc_objects",
];

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" | "t" | "1" | "yes" => Ok(true),
        "false" | "f" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{:?} is not a boolean", value),
        }),
    }
}

fn parse_fraction(key: &str, value: &str) -> Result<f64, ConfigError> {
    let v: f64 = value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("{:?} is not a number", value),
    })?;
    if !(0.0..=1.0).contains(&v) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{} is outside [0, 1]", v),
        });
    }
    Ok(v)
}

fn parse_regex(key: &str, value: &str) -> Result<Option<String>, ConfigError> {
    if value.is_empty() {
        return Ok(None);
    }
    Regex::new(value).map_err(|source| ConfigError::InvalidRegex {
        key: key.to_string(),
        source,
    })?;
    Ok(Some(value.to_string()))
}

/// Merge `query` onto `base` and return the configuration for one render.
///
/// `edit` runs after the query has been applied and may force fields for a
/// particular view. `has_base_profile` tells whether normalization is
/// possible.
pub fn resolve(
    base: &EffectiveConfig,
    query: &QueryParams,
    edit: Option<&dyn Fn(&mut EffectiveConfig)>,
    has_base_profile: bool,
) -> Result<EffectiveConfig, ConfigError> {
    let mut cfg = base.clone();

    if let Some((_, v)) = query.get_any(&["si", "sample_index"]) {
        cfg.sample_index = (!v.is_empty()).then(|| v.to_string());
    }
    if let Some((k, v)) = query.get_any(&["mean"]) {
        cfg.mean = parse_bool(k, v)?;
    }
    if let Some((k, v)) = query.get_any(&["g", "granularity"]) {
        cfg.granularity = v.parse().map_err(|reason| ConfigError::InvalidValue {
            key: k.to_string(),
            reason,
        })?;
    }
    if let Some((k, v)) = query.get_any(&["calltree", "call_tree"]) {
        cfg.call_tree = parse_bool(k, v)?;
    }
    if let Some((k, v)) = query.get_any(&["trim"]) {
        cfg.trim = parse_bool(k, v)?;
    }
    if let Some((k, v)) = query.get_any(&["normalize"]) {
        cfg.normalize = parse_bool(k, v)?;
    }
    if let Some((k, v)) = query.get_any(&["drop_negative"]) {
        cfg.drop_negative = parse_bool(k, v)?;
    }
    if let Some((k, v)) = query.get_any(&["nodecount", "node_count"]) {
        cfg.node_count = if v.is_empty() {
            None
        } else {
            Some(v.parse().map_err(|_| ConfigError::InvalidValue {
                key: k.to_string(),
                reason: format!("{:?} is not a non-negative integer", v),
            })?)
        };
    }
    if let Some((k, v)) = query.get_any(&["nodefraction", "node_fraction"]) {
        cfg.node_fraction = parse_fraction(k, v)?;
    }
    if let Some((k, v)) = query.get_any(&["edgefraction", "edge_fraction"]) {
        cfg.edge_fraction = parse_fraction(k, v)?;
    }

    let filters: [(&[&'static str], &mut Option<String>); 5] = [
        (&["f", "focus"], &mut cfg.focus),
        (&["i", "ignore"], &mut cfg.ignore),
        (&["h", "hide"], &mut cfg.hide),
        (&["s", "show"], &mut cfg.show),
        (&["sf", "show_from"], &mut cfg.show_from),
    ];
    for (keys, slot) in filters {
        if let Some((k, v)) = query.get_any(keys) {
            *slot = parse_regex(k, v)?;
        }
    }

    for &flag in LEGACY_SAMPLE_FLAGS {
        let Some(v) = query.get(flag) else { continue };
        if !parse_bool(flag, v)? {
            continue;
        }
        let index = match flag {
            "total_delay" | "mean_delay" => "delay",
            other => other,
        };
        if let Some(previous) = cfg.sample_index.as_deref() {
            if previous != index {
                warn!("Sample index {} overridden by -{}", previous, flag);
            }
        }
        cfg.sample_index = Some(index.to_string());
        if flag == "mean_delay" {
            cfg.mean = true;
        }
    }

    if let Some(edit) = edit {
        edit(&mut cfg);
    }

    if cfg.normalize && !has_base_profile {
        return Err(ConfigError::NormalizeWithoutBase);
    }
    Ok(cfg)
}

impl EffectiveConfig {
    /// Non-default fields as query pairs, using the short parameter names.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let d = EffectiveConfig::default();
        let mut out = Vec::new();
        if let Some(si) = &self.sample_index {
            out.push(("si", si.clone()));
        }
        if self.mean != d.mean {
            out.push(("mean", self.mean.to_string()));
        }
        if self.granularity != d.granularity {
            out.push(("g", self.granularity.to_string()));
        }
        if self.call_tree != d.call_tree {
            out.push(("calltree", self.call_tree.to_string()));
        }
        if self.trim != d.trim {
            out.push(("trim", self.trim.to_string()));
        }
        if self.normalize != d.normalize {
            out.push(("normalize", self.normalize.to_string()));
        }
        if self.drop_negative != d.drop_negative {
            out.push(("drop_negative", self.drop_negative.to_string()));
        }
        if let Some(n) = self.node_count {
            out.push(("nodecount", n.to_string()));
        }
        if self.node_fraction != d.node_fraction {
            out.push(("nodefraction", self.node_fraction.to_string()));
        }
        if self.edge_fraction != d.edge_fraction {
            out.push(("edgefraction", self.edge_fraction.to_string()));
        }
        for (key, value) in [
            ("f", &self.focus),
            ("i", &self.ignore),
            ("h", &self.hide),
            ("s", &self.show),
            ("sf", &self.show_from),
        ] {
            if let Some(v) = value {
                out.push((key, v.clone()));
            }
        }
        out
    }

    /// [`to_query`](Self::to_query) encoded as a URL query string.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query())
            .finish()
    }
}

// ── Server settings ──────────────────────────────────────────────────────────

/// Process-level settings for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address for the HTTP server
    pub listen_addr: String,

    /// JSON file holding saved configurations
    #[serde(default)]
    pub settings_file: Option<PathBuf>,

    /// Sample index applied when a request does not choose one
    #[serde(default)]
    pub sample_index: Option<String>,

    /// Graphviz `dot` executable
    pub dot_path: String,

    /// Node count applied to graph requests that do not set one
    #[serde(default)]
    pub node_count: Option<usize>,

    /// Directory used to resolve relative source paths in source listings
    #[serde(default)]
    pub source_root: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            settings_file: None,
            sample_index: None,
            dot_path: "dot".to_string(),
            node_count: None,
            source_root: None,
        }
    }
}

impl ServerSettings {
    /// Load settings from defaults, an optional TOML file, then `SIGHTLINE_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = ServerSettings::default();
        let file = path.unwrap_or_else(|| Path::new("sightline.toml"));
        let settings = config::Config::builder()
            .set_default("listen_addr", defaults.listen_addr)?
            .set_default("dot_path", defaults.dot_path)?
            .add_source(config::File::from(file).required(false))
            .add_source(config::Environment::with_prefix("SIGHTLINE"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Base configuration every request starts from.
    pub fn base_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            sample_index: self.sample_index.clone(),
            node_count: self.node_count,
            ..Default::default()
        }
    }
}
