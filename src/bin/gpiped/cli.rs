use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use gpupipe::config::Config;
use gpupipe::core::executor::ExitPolicy;
use gpupipe::core::policy::PolicyKind;

#[derive(Debug, Parser)]
#[command(name = "gpiped", author, version = gpupipe::core::version(), about = "GPU job admission daemon")]
#[command(styles=gpupipe::utils::STYLES)]
pub struct Gpiped {
    /// The configuration file to use
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on (default: 8000)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Maximum number of jobs held by the scheduler (default: 10)
    #[arg(long, value_name = "N")]
    pub queue_size: Option<usize>,

    /// Default GPU memory watermark in percent (default: 10)
    #[arg(short = 'w', long, value_name = "PERCENT", allow_negative_numbers = true)]
    pub watermark: Option<i64>,

    /// Seconds between GPU samples (default: 5)
    #[arg(short = 'i', long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// How to choose among jobs that fit
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<PolicyKind>,

    /// Which process exits count as success
    #[arg(long, value_name = "POLICY")]
    pub exit_policy: Option<ExitPolicy>,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

impl Gpiped {
    /// CLI flags override the config file
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.daemon.host = host.clone();
        }
        if let Some(port) = self.port {
            config.daemon.port = port;
        }
        if let Some(queue_size) = self.queue_size {
            config.scheduler.max_queue_size = queue_size;
        }
        if let Some(watermark) = self.watermark {
            config.scheduler.memory_watermark = watermark;
        }
        if let Some(interval) = self.interval {
            config.scheduler.poll_interval_secs = interval;
        }
        if let Some(policy) = self.policy {
            config.scheduler.policy = policy;
        }
        if let Some(exit_policy) = self.exit_policy {
            config.scheduler.exit_policy = exit_policy;
        }
    }
}
