//! Render command implementation

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use sightline_render::{get_render_func, RenderLinks, RenderedView};
use std::path::PathBuf;

use super::CommonArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// View: graph, top, flamegraph, peek, source or disasm
    #[arg(long, default_value = "top")]
    pub view: String,

    /// Query string with configuration overrides, e.g. "si=alloc_space&f=main"
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Write the view body here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit the serialized payload unchanged
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: RenderArgs) -> Result<()> {
    let ctx = args.common.context()?;
    let render = get_render_func(
        &ctx,
        &args.common.descriptor(),
        &args.view,
        RenderLinks::default(),
        &args.common.diff(),
    )
    .await
    .context("Failed to load profile")?;

    let query = args.query.clone();
    let view = tokio::task::spawn_blocking(move || render(&query))
        .await
        .context("Render task failed")??;
    tracing::debug!("Rendered {} view ({} bytes)", view.template, view.body.len());

    if args.json {
        return emit(&args, &view.body);
    }

    let data = view.json().context("parse view payload")?;
    for warning in data["errors"].as_array().into_iter().flatten() {
        output::warning(warning.as_str().unwrap_or_default());
    }
    match view.template {
        "top" => print_top(&data),
        _ => emit(&args, body_of(&view, &data).as_bytes()),
    }
}

/// The part of the payload a user wants to see for each template.
fn body_of(view: &RenderedView, data: &Value) -> String {
    let key = match view.template {
        "graph" => "svg",
        "flamegraph" => "flame_graph",
        _ => "text_body",
    };
    data[key].as_str().unwrap_or_default().to_string()
}

fn emit(args: &RenderArgs, body: &[u8]) -> Result<()> {
    match &args.output {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::success(&format!("Wrote {}", path.display()));
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(body)?;
        }
    }
    Ok(())
}

fn print_top(data: &Value) -> Result<()> {
    output::header(data["title"].as_str().unwrap_or_default());
    for line in data["legend"].as_array().into_iter().flatten() {
        println!("{}", line.as_str().unwrap_or_default());
    }

    let rows = data["top"].as_array().cloned().unwrap_or_default();
    println!(
        "\n{:>10} {:>7} {:>7} {:>10} {:>7}  NAME",
        "FLAT", "FLAT%", "SUM%", "CUM", "CUM%"
    );
    for row in &rows {
        let field = |k: &str| row[k].as_str().unwrap_or_default().to_string();
        println!(
            "{:>10} {:>7} {:>7} {:>10} {:>7}  {} {}",
            field("flat_format"),
            field("flat_percent"),
            field("sum_percent"),
            field("cum_format"),
            field("cum_percent"),
            output::name(&field("name")),
            field("inline_label")
        );
    }
    if rows.is_empty() {
        output::info("No entries to show");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(template: &'static str) -> RenderedView {
        RenderedView {
            template,
            content_type: "application/json",
            body: Vec::new(),
        }
    }

    #[test]
    fn test_body_of_picks_template_field() {
        let data = json!({
            "svg": "<svg/>",
            "flame_graph": "{\"n\":\"root\"}",
            "text_body": "ROUTINE ======",
        });
        assert_eq!(body_of(&view("graph"), &data), "<svg/>");
        assert_eq!(body_of(&view("flamegraph"), &data), "{\"n\":\"root\"}");
        assert_eq!(body_of(&view("plaintext"), &data), "ROUTINE ======");
        assert_eq!(body_of(&view("sourcelisting"), &json!({})), "");
    }
}
