//! CLI for Sightline
//!
//! Commands:
//! - serve: load a profile and serve its views over HTTP
//! - render: render one view to stdout or a file

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Sightline - report views for sampled profiles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve every view of a profile over HTTP
    Serve(commands::serve::ServeArgs),

    /// Render one view of a profile
    Render(commands::render::RenderArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            init_tracing(args.common.verbose);
            commands::serve::run(args).await
        }
        Commands::Render(args) => {
            init_tracing(args.common.verbose);
            commands::render::run(args).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_render::source::ProfileDescriptor;
    use sightline_render::DiffOptions;
    use sightline_shared::types::diff::DiffMode;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("sightline").chain(args.iter().copied()))
    }

    #[test]
    fn test_serve_args() {
        let cli = parse(&["serve", "cpu.pb.gz", "--http", "127.0.0.1:9090"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.http.as_deref(), Some("127.0.0.1:9090"));
        assert_eq!(
            args.common.descriptor(),
            ProfileDescriptor::Path("cpu.pb.gz".into())
        );
        assert_eq!(args.common.diff(), DiffOptions::default());
        assert!(!args.common.verbose);
    }

    #[test]
    fn test_render_defaults() {
        let cli = parse(&["render", "http://host:6060/debug/pprof/heap"]).unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.view, "top");
        assert_eq!(args.query, "");
        assert!(args.output.is_none());
        assert!(!args.json);
        assert_eq!(
            args.common.descriptor(),
            ProfileDescriptor::Url("http://host:6060/debug/pprof/heap".into())
        );
    }

    #[test]
    fn test_render_options() {
        let cli = parse(&[
            "render",
            "cpu.pb.gz",
            "--view",
            "flamegraph",
            "-q",
            "si=cpu&f=main",
            "-o",
            "out.json",
            "--json",
            "-v",
        ])
        .unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.view, "flamegraph");
        assert_eq!(args.query, "si=cpu&f=main");
        assert_eq!(args.output.as_deref(), Some(std::path::Path::new("out.json")));
        assert!(args.json);
        assert!(args.common.verbose);
    }

    #[test]
    fn test_base_flags_map_to_diff_modes() {
        let cli = parse(&["render", "new.pb.gz", "--base", "old.pb.gz"]).unwrap();
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        let diff = args.common.diff();
        assert_eq!(diff.mode, DiffMode::Base);
        assert_eq!(diff.base, Some(ProfileDescriptor::Path("old.pb.gz".into())));

        let cli = parse(&["serve", "new.pb.gz", "--diff-base", "old.pb.gz"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.common.diff().mode, DiffMode::DiffBase);
    }

    #[test]
    fn test_base_conflicts_with_diff_base() {
        let err = parse(&["render", "a.pb", "--base", "b.pb", "--diff-base", "c.pb"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_profile_is_required() {
        let err = parse(&["serve"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
