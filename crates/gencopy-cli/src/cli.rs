use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gencopy")]
#[command(about = "Periodically copy files into timestamped backup generations")]
#[command(
    after_help = "Values not given on the command line are read from gencopy.toml in the configuration directory."
)]
pub struct Cli {
    /// Files or directories to back up (directories: immediate files only)
    #[arg(value_name = "INPUTS")]
    pub inputs: Vec<PathBuf>,
    /// Generations to keep per file, -1 keeps everything [default: -1]
    #[arg(short = 'g', long, value_name = "N", allow_negative_numbers = true)]
    pub generations: Option<i64>,
    /// Backup directory, absolute or relative to each file's directory [default: _old]
    #[arg(short = 'b', long, value_name = "PATH")]
    pub backup_dir: Option<PathBuf>,
    /// Seconds between passes [default: 300]
    #[arg(short = 's', long = "interval", value_name = "SECS")]
    pub interval: Option<u64>,
    /// Job list CSV (path,generation,destination)
    #[arg(short = 'j', long = "jobs", value_name = "CSV")]
    pub job_list: Option<PathBuf>,
    /// Maximum number of files copied at once [default: available parallelism]
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,
    /// Skip directory children whose name matches this glob (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,
    /// Override the configuration directory for this invocation
    #[arg(long, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
