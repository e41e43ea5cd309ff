//! Base-profile combination
//!
//! A profile can be rendered relative to a base profile: the base is
//! subtracted sample-by-sample (`Base`), or subtracted and tagged so
//! the views can tell the two sides apart (`DiffBase`).

use serde::{Deserialize, Serialize};

use super::profile::{Profile, ProfileError};

/// Label attached to every sample that came from a diff base.
pub const BASE_LABEL: &str = "pprof::base";

/// How a base profile is combined with the main profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffMode {
    /// Subtract the base from the profile
    Base,
    /// Subtract the base and tag its samples with [`BASE_LABEL`]
    DiffBase,
}

impl std::str::FromStr for DiffMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(DiffMode::Base),
            "diff-base" | "diff_base" => Ok(DiffMode::DiffBase),
            other => Err(format!("invalid diff mode: {}", other)),
        }
    }
}

/// Scale `profile` so its per-type totals match those of `base`.
///
/// Types whose total is zero in `profile` are scaled to zero.
pub fn normalize(profile: &mut Profile, base: &Profile) -> Result<(), ProfileError> {
    profile.check_compatible(base)?;

    let base_totals = base.totals();
    let totals = profile.totals();
    let ratios: Vec<f64> = base_totals
        .iter()
        .zip(&totals)
        .map(|(&b, &t)| if t == 0 { 0.0 } else { b as f64 / t as f64 })
        .collect();
    profile.scale_n(&ratios);
    Ok(())
}

/// Combine `profile` with `base` according to `mode`.
///
/// With `normalize`, the profile is first scaled to the base's totals so the
/// result shows relative change rather than absolute change.
pub fn combine_with_base(
    mut profile: Profile,
    mut base: Profile,
    mode: DiffMode,
    normalize_first: bool,
) -> Result<Profile, ProfileError> {
    profile.check_compatible(&base)?;

    if mode == DiffMode::DiffBase {
        base.set_label(BASE_LABEL, "true");
    }
    if normalize_first {
        normalize(&mut profile, &base)?;
    }
    base.scale(-1.0);
    // Keep the main profile's own duration.
    base.duration_ns = 0;
    profile.merge(base)?;
    Ok(profile)
}
