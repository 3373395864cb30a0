use crate::core::executor::ExitPolicy;
use crate::core::get_config_dir;
use crate::core::policy::PolicyKind;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DaemonConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long running requests get to drain on shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerConfig {
    /// Registry capacity, counting jobs in every state
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Default device memory watermark in percent. Clamped to `[0, 100]`.
    #[serde(default = "default_memory_watermark")]
    pub memory_watermark: i64,
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default)]
    pub exit_policy: ExitPolicy,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_max_queue_size() -> usize {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_memory_watermark() -> i64 {
    10
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            poll_interval_secs: default_poll_interval_secs(),
            memory_watermark: default_memory_watermark(),
            policy: PolicyKind::default(),
            exit_policy: ExitPolicy::default(),
        }
    }
}

impl DaemonConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would make the tick loop spin.
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

pub fn load_config(config_path: Option<&PathBuf>) -> Result<Config, config::ConfigError> {
    let mut config_vec = vec![];

    // Default config file
    if let Ok(default_config_path) = get_config_dir().map(|d| d.join("gpupipe.toml")) {
        if default_config_path.exists() {
            config_vec.push(default_config_path);
        }
    }

    // User-provided config file, layered over the default one
    if let Some(config_path) = config_path {
        if config_path.exists() {
            config_vec.push(config_path.clone());
        } else {
            eprintln!("Warning: Config file {config_path:?} not found.");
        }
    }

    build_config(&config_vec)
}

fn build_config(files: &[PathBuf]) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder();
    let settings = files.iter().fold(settings, |s, path| {
        s.add_source(config::File::from(path.as_path()))
    });

    settings
        .add_source(
            config::Environment::with_prefix("GPUPIPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.daemon.host, "localhost");
        assert_eq!(config.daemon.port, 8000);
        assert_eq!(config.daemon.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(config.scheduler.max_queue_size, 10);
        assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.scheduler.memory_watermark, 10);
        assert_eq!(config.scheduler.policy, PolicyKind::Greedy);
        assert_eq!(config.scheduler.exit_policy, ExitPolicy::AnyExit);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_toml(
            r#"
[daemon]
port = 9100

[scheduler]
max_queue_size = 32
memory_watermark = 45
policy = "most-gpus"
exit_policy = "zero-exit"
"#,
        );
        let config = build_config(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(config.daemon.host, "localhost");
        assert_eq!(config.daemon.port, 9100);
        assert_eq!(config.scheduler.max_queue_size, 32);
        assert_eq!(config.scheduler.poll_interval_secs, 5);
        assert_eq!(config.scheduler.memory_watermark, 45);
        assert_eq!(config.scheduler.policy, PolicyKind::MostGpus);
        assert_eq!(config.scheduler.exit_policy, ExitPolicy::ZeroExit);
    }

    #[test]
    fn test_later_files_win() {
        let base = write_toml("[daemon]\nhost = \"0.0.0.0\"\nport = 9000\n");
        let local = write_toml("[daemon]\nport = 9001\n");
        let config =
            build_config(&[base.path().to_path_buf(), local.path().to_path_buf()]).unwrap();
        assert_eq!(config.daemon.host, "0.0.0.0");
        assert_eq!(config.daemon.port, 9001);
        assert_eq!(config.daemon.base_url(), "http://0.0.0.0:9001");
    }

    #[test]
    fn test_zero_poll_interval_is_raised() {
        let file = write_toml("[scheduler]\npoll_interval_secs = 0\n");
        let config = build_config(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let file = write_toml("[scheduler]\npolicy = \"round-robin\"\n");
        assert!(build_config(&[file.path().to_path_buf()]).is_err());
    }
}
