//! Engine that aggregates stack samples directly

use regex::Regex;
use sightline_shared::types::diff::BASE_LABEL;
use sightline_shared::utils::measurement::{percentage, scaled_label};
use sightline_shared::utils::time::format_profile_time;
use sightline_shared::{Profile, ValueType};
use std::path::{Path, PathBuf};

use super::filter::{CompiledFilters, FilterHits, Filtered};
use super::graph::{build_graph, trim_graph, Selected};
use super::listing;
use super::Engine;
use crate::config::EffectiveConfig;
use crate::error::ReportError;
use crate::report::{resolve_sample_index, Command, Report, ValueFormat};

/// Builds reports by walking every sample of the profile.
#[derive(Debug, Clone, Default)]
pub struct StackEngine {
    /// Directory used to resolve relative source paths for `weblist`
    source_root: Option<PathBuf>,
}

impl StackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }
}

/// Samples that survived filtering, with the report total.
struct Selection<'a> {
    samples: Vec<Selected<'a>>,
    total: i64,
    unsymbolized: usize,
}

fn select_samples<'a>(
    profile: &'a Profile,
    sample_index: usize,
    mean: bool,
    filters: &CompiledFilters,
    hits: &mut FilterHits,
) -> Selection<'a> {
    let mut samples = Vec::new();
    let (mut total, mut div, mut diff_total, mut diff_div) = (0i64, 0i64, 0i64, 0i64);
    let mut unsymbolized = 0;

    for sample in &profile.samples {
        let frames = match filters.apply(&sample.stack.frames, hits) {
            Filtered::Dropped => continue,
            Filtered::Kept(frames) => frames,
        };
        let value = sample.values.get(sample_index).copied().unwrap_or(0);
        let d = if mean {
            sample.values.first().copied().unwrap_or(0)
        } else {
            0
        };

        total = total.saturating_add(value.saturating_abs());
        div = div.saturating_add(d);
        if sample.labels.contains_key(BASE_LABEL) {
            diff_total = diff_total.saturating_add(value.saturating_abs());
            diff_div = diff_div.saturating_add(d);
        }
        if frames.iter().any(|f| !f.is_symbolized()) {
            unsymbolized += 1;
        }
        if !frames.is_empty() {
            samples.push(Selected {
                frames,
                value,
                div: d,
            });
        }
    }

    // A diff profile is reported relative to its base side.
    if diff_total > 0 {
        total = diff_total;
        div = diff_div;
    }
    if div != 0 {
        total = total.saturating_div(div);
    }
    Selection {
        samples,
        total,
        unsymbolized,
    }
}

fn as_nanos(value: i64, unit: &str) -> Option<i64> {
    let factor = match unit.to_lowercase().as_str() {
        "nanoseconds" | "nanosecond" | "ns" => 1,
        "microseconds" | "microsecond" | "us" => 1_000,
        "milliseconds" | "millisecond" | "ms" => 1_000_000,
        "seconds" | "second" | "s" => 1_000_000_000,
        _ => return None,
    };
    Some(value.saturating_mul(factor))
}

/// Legend lines describing the profile itself.
fn profile_labels(
    profile: &Profile,
    sample_type: &ValueType,
    total: i64,
    format: &ValueFormat,
) -> Vec<String> {
    let mut labels = Vec::new();
    if let Some(binary) = &profile.main_binary {
        let base = binary.rsplit('/').next().unwrap_or(binary);
        labels.push(format!("File: {}", base));
    }
    labels.push(format!("Type: {}", sample_type.kind));
    if let Some(time) = format_profile_time(profile.time_nanos) {
        labels.push(format!("Time: {}", time));
    }
    if profile.duration_ns != 0 {
        let ratio = as_nanos(total, &sample_type.unit)
            .filter(|&n| n != 0)
            .map(|n| format!(" ({})", percentage(n, profile.duration_ns).trim()))
            .unwrap_or_default();
        labels.push(format!(
            "Duration: {}, Total samples = {}{}",
            scaled_label(profile.duration_ns, "nanoseconds"),
            format.format(total),
            ratio
        ));
    }
    labels.extend(profile.comments.iter().cloned());
    labels
}

fn compile(pattern: &str) -> Result<Regex, ReportError> {
    Regex::new(pattern).map_err(|source| ReportError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

impl Engine for StackEngine {
    fn build_report(
        &self,
        profile: &Profile,
        command: &Command,
        cfg: &EffectiveConfig,
    ) -> Result<(Report, Vec<String>), ReportError> {
        let sample_index = resolve_sample_index(profile, cfg.sample_index.as_deref())?;
        let sample_type = profile
            .sample_types
            .get(sample_index)
            .ok_or_else(|| ReportError::SampleIndex(sample_index.to_string()))?;
        let filters = CompiledFilters::compile(cfg)?;

        let mut hits = FilterHits::default();
        let selection = select_samples(profile, sample_index, cfg.mean, &filters, &mut hits);
        let total = selection.total;

        let mut warnings = filters.unmatched(&hits);
        if selection.unsymbolized > 0 {
            warnings.push(format!(
                "{} samples had unsymbolized frames",
                selection.unsymbolized
            ));
        }

        let format = ValueFormat {
            unit: sample_type.unit.clone(),
            mean: cfg.mean,
        };
        let mut labels = profile_labels(profile, sample_type, total, &format);
        let active = filters.describe();
        if !active.is_empty() {
            labels.push("Active filters:".to_string());
            labels.extend(active.into_iter().map(|f| format!("   {}", f)));
        }

        let mut graph = None;
        let mut entries = None;
        match command {
            Command::Svg | Command::Dot | Command::Top => {
                let built = build_graph(
                    &selection.samples,
                    cfg.granularity,
                    cfg.call_tree,
                    cfg.mean,
                );
                let (trimmed, legend) = trim_graph(built, cfg, command, total, &format);
                labels.extend(legend);
                graph = Some(trimmed);
            }
            Command::Peek(pattern) => {
                entries = Some(listing::peek(
                    &selection.samples,
                    &compile(pattern)?,
                    cfg,
                    total,
                    &format,
                )?);
            }
            Command::Disasm(pattern) => {
                entries = Some(listing::disasm(
                    &selection.samples,
                    &compile(pattern)?,
                    total,
                    &format,
                )?);
            }
            Command::WebList(pattern) => {
                entries = Some(listing::weblist(
                    &selection.samples,
                    &compile(pattern)?,
                    total,
                    &format,
                    self.source_root.as_deref().unwrap_or(Path::new("")),
                )?);
            }
        }

        let report = Report {
            command: command.clone(),
            sample_index,
            total,
            graph,
            labels,
            format,
            listing: entries,
        };
        Ok((report, warnings))
    }
}
