//! grog — render and check blog templates from the command line.
//!
//! # Usage
//!
//! ```text
//! grog render <name> [--data post.yaml] [--query 'posts-page=2'] [--cookie theme=dark] [--output out.html]
//! grog check [<name>...] [--json]
//!
//! global: --config <file> --assets <dir> --no-cache -v
//! ```

mod commands;
mod config;
mod formatters;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{check::CheckArgs, render::RenderArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "grog",
    version,
    about = "Render and check grog blog templates",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file (default: ~/.grog/config.yaml if it exists).
    #[arg(long, global = true, env = "GROG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Template directory; overrides `assets` in the config file.
    #[arg(long, global = true, env = "GROG_ASSET_DIR")]
    pub assets: Option<PathBuf>,

    /// Recompile templates on every render.
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Log engine activity to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one template to stdout or a file.
    Render(RenderArgs),

    /// Compile templates and report any errors.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    match cli.command {
        Commands::Render(args) => args.run(&cli.global),
        Commands::Check(args) => args.run(&cli.global),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
