use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use syncforge_core::RunId;

#[derive(Parser)]
#[command(name = "syncforge")]
#[command(author, version, about = "Two-camera video sync and finishing pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a single pair of recordings through the pipeline
    Run(RunArgs),

    /// Process every item of a JSON batch file
    Batch {
        /// Batch file with `items`, `params` and `outputOptions`
        #[arg(required = true)]
        file: PathBuf,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve one request over stdin/stdout (spawned by the controller)
    #[command(hide = true)]
    Worker {
        /// Scratch subdirectory key for this run
        #[arg(long)]
        run_id: RunId,

        /// Scratch root, overriding the config
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Args)]
pub struct RunArgs {
    /// JSON request file (`inputs`, `params`, `outputOptions`); replaces the
    /// flags below
    #[arg(long, conflicts_with_all = ["source_a", "source_b", "output"])]
    pub request: Option<PathBuf>,

    /// First recording
    #[arg(long, required_unless_present = "request")]
    pub source_a: Option<PathBuf>,

    /// Second recording
    #[arg(long, required_unless_present = "request")]
    pub source_b: Option<PathBuf>,

    /// Output file
    #[arg(short, long, required_unless_present = "request")]
    pub output: Option<PathBuf>,

    /// Colour reference image
    #[arg(long)]
    pub reference_image: Option<PathBuf>,

    #[arg(long, default_value = "")]
    pub artist: String,

    #[arg(long, default_value = "")]
    pub title: String,

    /// Caption text replacing "{artist}'s {title}"
    #[arg(long)]
    pub text: Option<String>,

    /// Crop region as X:Y:WIDTH:HEIGHT in source pixels
    #[arg(long)]
    pub crop: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}
