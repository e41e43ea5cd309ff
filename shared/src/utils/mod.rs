//! Utility functions and helpers

pub mod measurement;
pub mod names;
pub mod time;
