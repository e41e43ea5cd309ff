//! Report generation
//!
//! A [`Report`] is what the aggregation engine produced for one command:
//! the ranked graph or the annotated listing, plus the legend and the
//! value formatter the views use.

use serde::Serialize;
use sightline_shared::utils::measurement::{percentage, scaled_label};
use sightline_shared::{Graph, Profile};
use tracing::debug;

use crate::config::EffectiveConfig;
use crate::engine::Engine;
use crate::error::ReportError;

/// Command understood by the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Call graph, rendered through the diagram engine
    Svg,
    /// Call graph as DOT text
    Dot,
    Top,
    Peek(String),
    Disasm(String),
    WebList(String),
}

impl Command {
    /// Parse a command and its arguments, e.g. `["peek", "^main$"]`.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ReportError> {
        let mut it = args.iter().map(|s| s.as_ref());
        let name = it.next().unwrap_or_default();
        let mut regex = |command: &'static str| -> Result<String, ReportError> {
            let pattern = it
                .next()
                .filter(|p| !p.is_empty())
                .ok_or(ReportError::MissingArgument(command))?;
            regex::Regex::new(pattern).map_err(|source| ReportError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
            Ok(pattern.to_string())
        };
        match name {
            "svg" => Ok(Command::Svg),
            "dot" => Ok(Command::Dot),
            "top" => Ok(Command::Top),
            "peek" => Ok(Command::Peek(regex("peek")?)),
            "disasm" => Ok(Command::Disasm(regex("disasm")?)),
            "weblist" => Ok(Command::WebList(regex("weblist")?)),
            other => Err(ReportError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Svg => "svg",
            Command::Dot => "dot",
            Command::Top => "top",
            Command::Peek(_) => "peek",
            Command::Disasm(_) => "disasm",
            Command::WebList(_) => "weblist",
        }
    }

    /// Listing commands produce text instead of a graph.
    pub fn is_listing(&self) -> bool {
        matches!(
            self,
            Command::Peek(_) | Command::Disasm(_) | Command::WebList(_)
        )
    }

    /// Graph commands are trimmed to a default node count.
    pub fn is_graph(&self) -> bool {
        matches!(self, Command::Svg | Command::Dot)
    }
}

/// Formats sample values in the unit of the selected sample type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueFormat {
    pub unit: String,
    pub mean: bool,
}

impl ValueFormat {
    pub fn format(&self, value: i64) -> String {
        scaled_label(value, &self.unit)
    }
}

/// Result of running a command against a profile.
#[derive(Debug, Clone)]
pub struct Report {
    pub command: Command,
    /// Index of the sample type being reported
    pub sample_index: usize,
    pub total: i64,
    /// Ranked graph for graph, top and flame-graph views
    pub graph: Option<Graph>,
    /// Legend lines, e.g. `File: server`, `Type: cpu`
    pub labels: Vec<String>,
    pub format: ValueFormat,
    /// Annotated entries for listing commands
    pub listing: Option<Vec<String>>,
}

impl Report {
    pub fn format_value(&self, value: i64) -> String {
        self.format.format(value)
    }

    /// `value` as a percentage of the report total
    pub fn percentage(&self, value: i64) -> String {
        percentage(value, self.total)
    }

    pub fn graph(&self) -> Result<&Graph, ReportError> {
        self.graph.as_ref().ok_or(ReportError::MissingOutput {
            command: self.command.name(),
            missing: "graph",
        })
    }

    pub fn listing(&self) -> Result<&[String], ReportError> {
        self.listing.as_deref().ok_or(ReportError::MissingOutput {
            command: self.command.name(),
            missing: "listing",
        })
    }

    /// Value of the legend line starting with `prefix`, e.g. `File:`
    pub fn label_value(&self, prefix: &str) -> Option<&str> {
        self.labels
            .iter()
            .find_map(|l| l.strip_prefix(prefix))
            .map(str::trim)
    }
}

/// A report plus the soft warnings raised while building it.
#[derive(Debug, Clone)]
pub struct Generated {
    pub report: Report,
    pub warnings: Vec<String>,
}

/// Run `command` against `profile` with the given configuration.
pub fn generate<S: AsRef<str>>(
    profile: &Profile,
    command: &[S],
    cfg: &EffectiveConfig,
    engine: &dyn Engine,
) -> Result<Generated, ReportError> {
    let command = Command::parse(command)?;
    let span = tracing::debug_span!(
        "report",
        command = command.name(),
        sample_index = cfg.sample_index.as_deref().unwrap_or("default")
    );
    let _guard = span.enter();

    let (report, warnings) = engine.build_report(profile, &command, cfg)?;
    debug!(
        "Built {} report: total {}, {} warnings",
        command.name(),
        report.total,
        warnings.len()
    );
    Ok(Generated { report, warnings })
}

/// Resolve a sample index given by name or number against `profile`.
pub fn resolve_sample_index(
    profile: &Profile,
    sample_index: Option<&str>,
) -> Result<usize, ReportError> {
    let Some(si) = sample_index else {
        return Ok(profile.default_sample_index());
    };
    if let Ok(n) = si.parse::<usize>() {
        return if n < profile.sample_types.len() {
            Ok(n)
        } else {
            Err(ReportError::SampleIndex(si.to_string()))
        };
    }
    // Legacy heap profiles name their types "objects" and "space".
    profile
        .sample_type_index(si)
        .or_else(|| {
            let kind = si
                .strip_prefix("inuse_")
                .or_else(|| si.strip_prefix("alloc_"))?;
            profile.sample_type_index(kind)
        })
        .ok_or_else(|| ReportError::SampleIndex(si.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_shared::ValueType;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&["svg"]).unwrap(), Command::Svg);
        assert_eq!(Command::parse(&["top"]).unwrap(), Command::Top);
        assert_eq!(
            Command::parse(&["peek", "^main$"]).unwrap(),
            Command::Peek("^main$".into())
        );
        assert!(Command::parse(&["weblist", "a"]).unwrap().is_listing());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Command::parse(&["list"]),
            Err(ReportError::UnknownCommand(c)) if c == "list"
        ));
        assert!(matches!(
            Command::parse(&["disasm"]),
            Err(ReportError::MissingArgument("disasm"))
        ));
        assert!(matches!(
            Command::parse(&["peek", ""]),
            Err(ReportError::MissingArgument("peek"))
        ));
        assert!(matches!(
            Command::parse(&["peek", "("]),
            Err(ReportError::InvalidRegex { .. })
        ));
        let empty: [&str; 0] = [];
        assert!(Command::parse(&empty).is_err());
    }

    fn heap() -> Profile {
        Profile::new(vec![
            ValueType::new("alloc_objects", "count"),
            ValueType::new("alloc_space", "bytes"),
            ValueType::new("inuse_space", "bytes"),
        ])
    }

    #[test]
    fn test_sample_index_resolution() {
        let p = heap();
        assert_eq!(resolve_sample_index(&p, None).unwrap(), 2);
        assert_eq!(resolve_sample_index(&p, Some("1")).unwrap(), 1);
        assert_eq!(resolve_sample_index(&p, Some("alloc_space")).unwrap(), 1);
        assert!(matches!(
            resolve_sample_index(&p, Some("3")),
            Err(ReportError::SampleIndex(_))
        ));
        assert!(matches!(
            resolve_sample_index(&p, Some("cpu")),
            Err(ReportError::SampleIndex(_))
        ));
    }

    #[test]
    fn test_legacy_heap_names() {
        let p = Profile::new(vec![
            ValueType::new("objects", "count"),
            ValueType::new("space", "bytes"),
        ]);
        assert_eq!(resolve_sample_index(&p, Some("inuse_space")).unwrap(), 1);
        assert_eq!(resolve_sample_index(&p, Some("alloc_objects")).unwrap(), 0);
    }
}
