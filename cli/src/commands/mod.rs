//! Subcommands

pub mod render;
pub mod serve;

use anyhow::{Context, Result};
use clap::Args;
use sightline_render::source::ProfileDescriptor;
use sightline_render::{AppContext, DiffOptions, ServerSettings};
use sightline_shared::types::diff::DiffMode;
use std::path::PathBuf;

/// Options shared by every subcommand that loads a profile.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Profile file or http(s):// URL
    pub profile: String,

    /// Subtract this profile
    #[arg(long, conflicts_with = "diff_base")]
    pub base: Option<String>,

    /// Subtract this profile and tag its samples for comparison
    #[arg(long)]
    pub diff_base: Option<String>,

    /// Settings file (TOML)
    #[arg(short, long, env = "SIGHTLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Saved-configuration file (JSON)
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn descriptor(&self) -> ProfileDescriptor {
        ProfileDescriptor::parse(&self.profile)
    }

    pub fn diff(&self) -> DiffOptions {
        match (&self.base, &self.diff_base) {
            (Some(base), _) => DiffOptions {
                base: Some(ProfileDescriptor::parse(base)),
                mode: DiffMode::Base,
            },
            (None, Some(base)) => DiffOptions {
                base: Some(ProfileDescriptor::parse(base)),
                mode: DiffMode::DiffBase,
            },
            (None, None) => DiffOptions::default(),
        }
    }

    pub fn context(&self) -> Result<AppContext> {
        let mut settings =
            ServerSettings::load(self.config.as_deref()).context("Failed to load settings")?;
        if self.settings_file.is_some() {
            settings.settings_file = self.settings_file.clone();
        }
        Ok(AppContext::new(settings))
    }
}
