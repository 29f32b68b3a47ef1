use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "bake")]
#[command(version, about = "Sequential font project build orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Root directory that project and build paths are relative to (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where a build lives under the root.
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Project directory, relative to the root
    pub project: PathBuf,

    /// Directory holding builds, relative to the root (defaults to the root itself)
    #[arg(long)]
    pub builds_dir: Option<PathBuf>,

    /// Build directory, relative to the builds directory
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every bake stage for a project
    Run {
        #[command(flatten)]
        layout: LayoutArgs,

        /// Configuration file (defaults to <project>/bakery.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Ask before applying automatic fixes
        #[arg(short, long)]
        interactive: bool,
    },
    /// Print the configuration saved by the last build
    State {
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Write the bundled default configuration into a project
    Init {
        /// Project directory, relative to the root
        project: PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "bakery=debug,info" } else { "warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(cli: &Cli) -> Result<ExitCode> {
    let root = match cli.root.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run {
            layout,
            config,
            interactive,
        } => cmd::cmd_run(&root, layout, config.as_deref(), *interactive),
        Commands::State { layout } => {
            cmd::cmd_state(&root, layout)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { project, force } => {
            cmd::cmd_init(&root, project, *force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").for_stderr().red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
