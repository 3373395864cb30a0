use crate::cli::Commands;
use anyhow::{Context, Result};
use gpupipe::client::Client;
use gpupipe::config::Config;
use gpupipe::core::job::JobSpec;
use std::path::Path;

pub mod delete;
pub mod generate;
pub mod list;
pub mod publish;

pub async fn handle_commands(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Publish(args) => {
            let client = Client::build(config)?;
            publish::handle_publish(&client, args).await?;
        }
        Commands::List { json } => {
            let client = Client::build(config)?;
            list::handle_list(&client, json).await?;
        }
        Commands::Delete { id } => {
            let client = Client::build(config)?;
            delete::handle_delete(&client, id).await?;
        }
        Commands::Generate { target } => {
            generate::handle_generate(&target)?;
        }
    }

    Ok(())
}

/// Reads a job definition file.
pub fn load_spec(path: &Path) -> Result<JobSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job definition {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid job definition {}", path.display()))
}
