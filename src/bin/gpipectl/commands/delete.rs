use anyhow::{bail, Result};
use gpupipe::client::Client;
use gpupipe::core::JobId;

pub async fn handle_delete(client: &Client, id: JobId) -> Result<()> {
    if !client.delete_job(id).await? {
        bail!("Job {id} not found");
    }
    println!("Job {id} deleted.");
    Ok(())
}
