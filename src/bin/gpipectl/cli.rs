use clap::{Args, Parser};
use clap_verbosity_flag::Verbosity;
use gpupipe::core::JobId;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "gpipectl",
    author,
    version = gpupipe::core::version(),
    about = "Submit and manage jobs on a gpiped daemon"
)]
#[command(styles = gpupipe::utils::STYLES)]
pub struct GpipeCtl {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Daemon host (overrides the config file)
    #[arg(long, global = true, value_name = "HOST")]
    pub host: Option<String>,

    /// Daemon port (overrides the config file)
    #[arg(short, long, global = true, value_name = "PORT")]
    pub port: Option<u16>,

    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Debug, Parser)]
pub enum Commands {
    /// Submit a job
    Publish(PublishArgs),

    /// Show every job the daemon holds
    List {
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Remove a job, stopping its process if it is running
    Delete {
        /// Job ID as printed by `publish` or `list`
        id: JobId,
    },

    /// Print the command of a job definition file as one shell line
    Generate {
        /// Job definition file (JSON)
        #[arg(short, long, value_name = "FILE")]
        target: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Job definition file (JSON). Cannot be combined with inline options.
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with_all = ["dir", "gpus", "watermark", "log", "err_log", "command"]
    )]
    pub target: Option<PathBuf>,

    /// Working directory of the job (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// GPUs the job needs (e.g., "0", "0,2" or "0-1,3")
    #[arg(short, long, value_name = "INDICES")]
    pub gpus: Option<String>,

    /// Memory watermark in percent for this job
    #[arg(short, long, value_name = "PERCENT")]
    pub watermark: Option<u8>,

    /// File receiving the job's stdout
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// File receiving the job's stderr
    #[arg(long, value_name = "FILE")]
    pub err_log: Option<PathBuf>,

    /// Program and arguments, after `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
