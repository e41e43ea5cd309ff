//! Shared types and utilities for Sightline
//!
//! This crate contains the profile model, the weighted call graph consumed by
//! the view transformers, and the formatting helpers used across the render
//! pipeline and the CLI.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{graph::*, profile::*};
