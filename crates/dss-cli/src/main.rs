//! # dss CLI entry point
//!
//! Parses command-line arguments, locates the project, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dss_cli::build::{run_build, BuildArgs};
use dss_cli::config::{find_project_root, Project};
use dss_cli::logic::{run_logic, LogicArgs};
use dss_cli::validate::{run_validate, ValidateArgs};

/// DataStream schema build toolchain.
///
/// Regenerates conditional-requirement fragments from the controlled
/// vocabulary, compiles the primary, frontend, backend, and
/// quality-control profiles, and validates records against them.
#[derive(Parser, Debug)]
#[command(name = "dss", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Project root (the directory holding dss.yaml). Found by walking up
    /// from the current directory when omitted.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to the build configuration. Defaults to <root>/dss.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regenerate logic and quality-control fragments.
    Logic(LogicArgs),

    /// Compile profile artifacts from the source tree.
    Build(BuildArgs),

    /// Run `logic`, then `build`.
    All,

    /// Validate records against a built profile.
    Validate(ValidateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "dss starting");

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let root = match cli.root {
        Some(root) => root,
        None => {
            let cwd = std::env::current_dir()?;
            find_project_root(&cwd).unwrap_or_else(|| {
                tracing::warn!("Could not locate dss.yaml; using current directory");
                cwd
            })
        }
    };
    tracing::debug!(root = %root.display(), "resolved project root");

    let project = Project::load(&root, cli.config.as_deref())?;

    match cli.command {
        Commands::Logic(args) => run_logic(&args, &project),
        Commands::Build(args) => run_build(&args, &project),
        Commands::All => {
            let logic = run_logic(&LogicArgs::default(), &project)?;
            let build = run_build(&BuildArgs::default(), &project)?;
            Ok(logic.max(build))
        }
        Commands::Validate(args) => run_validate(&args, &project),
    }
}
