use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "brc-processor")]
#[command(about = "High-performance min/mean/max aggregation of station measurement files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide the progress bar")]
    pub quiet: bool,
}

/// Input and engine tuning shared by every command
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(help = "Input measurements file (`name;value` per line)")]
    pub input: PathBuf,

    #[arg(long, help = "Bytes per read [default: 64MiB]")]
    pub chunk_size: Option<usize>,

    #[arg(short, long, help = "Worker threads [default: CPUs - 1]")]
    pub workers: Option<usize>,

    #[arg(long, help = "Longest accepted row in bytes [default: 65536]")]
    pub max_line_length: Option<usize>,

    #[arg(long, help = "Chunks buffered ahead of the workers [default: 2 x workers]")]
    pub queue_depth: Option<usize>,

    #[arg(long, help = "Memory-map the input instead of streaming it")]
    pub mmap: bool,

    #[arg(short, long, help = "TOML settings file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate a measurements file and print the per-station summary
    Process {
        #[command(flatten)]
        engine: EngineArgs,

        #[arg(short, long, default_value = "text", help = "Output format: text or json")]
        format: String,

        #[arg(long, help = "Print processing statistics to stderr")]
        stats: bool,
    },

    /// Parse the whole file and report counts without printing the summary
    Validate {
        #[command(flatten)]
        engine: EngineArgs,
    },
}
