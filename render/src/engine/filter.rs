//! Sample filtering by frame regexps

use regex::Regex;
use sightline_shared::Frame;

use crate::config::EffectiveConfig;
use crate::error::ReportError;

fn compile(pattern: &Option<String>) -> Result<Option<Regex>, ReportError> {
    pattern
        .as_deref()
        .map(|p| {
            Regex::new(p).map_err(|source| ReportError::InvalidRegex {
                pattern: p.to_string(),
                source,
            })
        })
        .transpose()
}

/// Whether `re` matches the frame's function, file, module or address.
pub(crate) fn frame_matches(re: &Regex, frame: &Frame) -> bool {
    frame.function.as_deref().is_some_and(|f| re.is_match(f))
        || frame.file.as_deref().is_some_and(|f| re.is_match(f))
        || (!frame.is_symbolized()
            && (frame.module.as_deref().is_some_and(|m| re.is_match(m))
                || re.is_match(&format!("{:#x}", frame.address))))
}

/// Filter regexps of one configuration, compiled once per report.
#[derive(Debug, Default)]
pub struct CompiledFilters {
    focus: Option<Regex>,
    ignore: Option<Regex>,
    hide: Option<Regex>,
    show: Option<Regex>,
    show_from: Option<Regex>,
}

/// Which filters matched at least one frame.
#[derive(Debug, Default)]
pub(crate) struct FilterHits {
    focus: bool,
    ignore: bool,
    hide: bool,
    show: bool,
    show_from: bool,
}

/// Outcome of filtering one sample.
pub(crate) enum Filtered<'a> {
    /// Removed by `focus` or `ignore`; does not count toward the total
    Dropped,
    /// Counts toward the total; frames left after hide/show, leaf first
    Kept(Vec<&'a Frame>),
}

impl CompiledFilters {
    pub fn compile(cfg: &EffectiveConfig) -> Result<Self, ReportError> {
        Ok(Self {
            focus: compile(&cfg.focus)?,
            ignore: compile(&cfg.ignore)?,
            hide: compile(&cfg.hide)?,
            show: compile(&cfg.show)?,
            show_from: compile(&cfg.show_from)?,
        })
    }

    /// Active filters as `key=regexp` lines for the legend.
    pub fn describe(&self) -> Vec<String> {
        [
            ("focus", &self.focus),
            ("ignore", &self.ignore),
            ("hide", &self.hide),
            ("show", &self.show),
            ("show_from", &self.show_from),
        ]
        .into_iter()
        .filter_map(|(k, re)| re.as_ref().map(|re| format!("{}={}", k, re.as_str())))
        .collect()
    }

    /// Filter one leaf-first stack.
    pub(crate) fn apply<'a>(&self, frames: &'a [Frame], hits: &mut FilterHits) -> Filtered<'a> {
        if let Some(re) = &self.focus {
            if !frames.iter().any(|f| frame_matches(re, f)) {
                return Filtered::Dropped;
            }
            hits.focus = true;
        }
        if let Some(re) = &self.ignore {
            if frames.iter().any(|f| frame_matches(re, f)) {
                hits.ignore = true;
                return Filtered::Dropped;
            }
        }

        let mut kept: Vec<&Frame> = frames.iter().collect();
        if let Some(re) = &self.hide {
            let before = kept.len();
            kept.retain(|f| !frame_matches(re, f));
            hits.hide |= kept.len() != before;
        }
        if let Some(re) = &self.show {
            kept.retain(|f| frame_matches(re, f));
            hits.show |= !kept.is_empty();
        }
        if let Some(re) = &self.show_from {
            // Keep the leaf up to the matching frame closest to the root.
            match kept.iter().rposition(|f| frame_matches(re, f)) {
                Some(i) => {
                    hits.show_from = true;
                    kept.truncate(i + 1);
                }
                None => kept.clear(),
            }
        }
        Filtered::Kept(kept)
    }

    /// Warnings for filters that never matched.
    pub(crate) fn unmatched(&self, hits: &FilterHits) -> Vec<String> {
        [
            (&self.focus, hits.focus),
            (&self.ignore, hits.ignore),
            (&self.hide, hits.hide),
            (&self.show, hits.show),
            (&self.show_from, hits.show_from),
        ]
        .into_iter()
        .filter_map(|(re, hit)| match re {
            Some(re) if !hit => Some(format!("no matches found for regexp: {}", re.as_str())),
            _ => None,
        })
        .collect()
    }
}
