//! Profile, graph and base-profile types

pub mod diff;
pub mod graph;
pub mod profile;
