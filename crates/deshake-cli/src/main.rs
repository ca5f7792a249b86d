mod commands;
mod video;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deshake", about = "Two-pass video stabilization over Y4M streams")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show Y4M stream or transforms file metadata
    Info(commands::info::InfoArgs),
    /// Detect camera shake and write a transforms file
    Detect(commands::detect::DetectArgs),
    /// Apply smoothed transforms to a video
    Transform(commands::transform::TransformArgs),
    /// Run both passes from a TOML pipeline config
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Detect(args) => commands::detect::run(args),
        Commands::Transform(args) => commands::transform::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
