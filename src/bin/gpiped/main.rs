use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod executor;
mod scheduler_runtime;
mod server;
mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let gpiped = cli::Gpiped::parse();

    // Initialize tracing: console (stderr) + daily rolling file appender
    let log_dir = gpupipe::core::get_daemon_log_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("daemon")
        .filename_suffix("log")
        .max_log_files(7)
        .build(&log_dir)?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(gpiped.verbosity.tracing_level_filter())
        .with(console_layer)
        .with(file_layer)
        .init();

    let mut config = gpupipe::config::load_config(gpiped.config.as_ref())?;
    gpiped.apply_overrides(&mut config);
    tracing::debug!("Loaded config: {config:?}");

    server::run(config).await
}
