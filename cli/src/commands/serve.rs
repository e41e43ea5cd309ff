//! Serve command implementation

use anyhow::{Context, Result};
use clap::Args;
use sightline_render::server::{handler, http};
use sightline_render::RenderLinks;
use std::net::SocketAddr;
use std::sync::Arc;

use super::CommonArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Listen address, overriding the settings file
    #[arg(long)]
    pub http: Option<String>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let ctx = args.common.context()?;
    let listen = args
        .http
        .clone()
        .unwrap_or_else(|| ctx.settings.listen_addr.clone());
    let addr: SocketAddr = listen.parse().context("Invalid listen address")?;

    let descriptor = args.common.descriptor();
    let ui = handler::load_web_ui(&ctx, &descriptor, RenderLinks::local(), &args.common.diff())
        .await
        .with_context(|| format!("Failed to load profile {}", descriptor))?;
    output::success(&format!("Serving {} at http://{}", descriptor, addr));

    http::serve(addr, Arc::new(ui))
        .await
        .context("HTTP server error")
}
