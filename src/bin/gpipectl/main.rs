mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use gpupipe::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::GpipeCtl::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.verbosity.tracing_level_filter())
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(host) = args.host {
        config.daemon.host = host;
    }
    if let Some(port) = args.port {
        config.daemon.port = port;
    }

    commands::handle_commands(&config, args.command).await
}
