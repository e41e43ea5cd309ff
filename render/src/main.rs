//! Sightline web server
//!
//! Usage: `sightline-web <profile> [base-profile]`. Settings come from
//! `sightline.toml` (or the file named by `SIGHTLINE_CONFIG`) and
//! `SIGHTLINE_*` environment variables.

use anyhow::{Context, Result};
use sightline_render::server::{handler, http};
use sightline_render::source::ProfileDescriptor;
use sightline_render::{AppContext, DiffOptions, RenderLinks, ServerSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let profile = args
        .next()
        .context("usage: sightline-web <profile> [base-profile]")?;
    let diff = DiffOptions {
        base: args.next().map(|b| ProfileDescriptor::parse(&b)),
        ..Default::default()
    };

    let config_path = std::env::var_os("SIGHTLINE_CONFIG").map(PathBuf::from);
    let settings =
        ServerSettings::load(config_path.as_deref()).context("Failed to load settings")?;
    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .context("Invalid listen address")?;

    let ctx = AppContext::new(settings);
    let descriptor = ProfileDescriptor::parse(&profile);
    let ui = handler::load_web_ui(&ctx, &descriptor, RenderLinks::local(), &diff)
        .await
        .with_context(|| format!("Failed to load profile {}", descriptor))?;
    info!("Serving {} on http://{}", descriptor, addr);

    http::serve(addr, Arc::new(ui))
        .await
        .context("HTTP server error")?;
    Ok(())
}
