//! Render-function factory
//!
//! The host application asks for one render function per view; the profile
//! (and optional base) is loaded once through the context's source and then
//! shared by every call of the returned function.

use sightline_shared::types::diff::{combine_with_base, DiffMode};
use std::sync::Arc;
use tracing::info;

use crate::context::AppContext;
use crate::dispatch::{RenderLinks, View, WebUi};
use crate::error::{ConfigError, Error};
use crate::source::ProfileDescriptor;

pub use crate::dispatch::RenderFn;

/// How the loaded profile relates to a base profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    pub base: Option<ProfileDescriptor>,
    pub mode: DiffMode,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            base: None,
            mode: DiffMode::Base,
        }
    }
}

/// Load `descriptor` (and its base, if any) into a [`WebUi`].
pub async fn load_web_ui(
    ctx: &AppContext,
    descriptor: &ProfileDescriptor,
    links: RenderLinks,
    diff: &DiffOptions,
) -> Result<WebUi, Error> {
    let profile = ctx.source.fetch(descriptor).await?;
    let Some(base_descriptor) = &diff.base else {
        return Ok(WebUi::new(profile, ctx).with_links(links));
    };

    let base = ctx.source.fetch(base_descriptor).await?;
    let combined = combine_with_base(profile.clone(), base.clone(), diff.mode, false)
        .map_err(ConfigError::IncompatibleBase)?;
    let normalized =
        combine_with_base(profile, base, diff.mode, true).map_err(ConfigError::IncompatibleBase)?;
    info!(
        "Combined {} with base {} ({:?})",
        descriptor, base_descriptor, diff.mode
    );
    Ok(WebUi::new(combined, ctx)
        .with_base(normalized)
        .with_links(links))
}

/// Build the render function for `view_name`. Unknown names render the
/// graph view.
pub async fn get_render_func(
    ctx: &AppContext,
    descriptor: &ProfileDescriptor,
    view_name: &str,
    links: RenderLinks,
    diff: &DiffOptions,
) -> Result<RenderFn, Error> {
    let ui = Arc::new(load_web_ui(ctx, descriptor, links, diff).await?);
    Ok(ui.render_func(View::from_name(view_name)))
}
