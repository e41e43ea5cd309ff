//! Aggregation engines
//!
//! An [`Engine`] turns a profile, a command and an effective configuration
//! into a [`Report`]. [`StackEngine`] aggregates the profile's stack
//! samples directly.

mod filter;
mod graph;
mod listing;
mod stack;

pub use filter::CompiledFilters;
pub use stack::StackEngine;

use sightline_shared::Profile;

use crate::config::EffectiveConfig;
use crate::error::ReportError;
use crate::report::{Command, Report};

/// Builds reports from profiles.
///
/// Implementations must not mutate the profile; one engine serves many
/// concurrent renders.
pub trait Engine: Send + Sync {
    /// Build the report for `command`, returning it together with soft
    /// warnings to show next to the view.
    fn build_report(
        &self,
        profile: &Profile,
        command: &Command,
        cfg: &EffectiveConfig,
    ) -> Result<(Report, Vec<String>), ReportError>;
}
