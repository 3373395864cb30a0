use anyhow::Result;
use gpupipe::client::Client;
use gpupipe::core::job::Job;
use gpupipe::utils::format_system_time;
use tabled::{builder::Builder, settings::Style};

pub async fn handle_list(client: &Client, json: bool) -> Result<()> {
    let jobs = client.list_jobs().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
    } else if jobs.is_empty() {
        println!("No jobs.");
    } else {
        println!("{}", render_table(&jobs));
    }
    Ok(())
}

fn render_table(jobs: &[Job]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["ID", "STATE", "PID", "GPUS", "SUBMITTED", "COMMAND"]);
    for job in jobs {
        let gpus = if job.gpu_ids.is_empty() {
            "-".to_string()
        } else {
            job.gpu_ids
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        builder.push_record([
            job.id.to_string(),
            job.state.to_string(),
            job.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string()),
            gpus,
            format_system_time(job.submitted_at),
            job.command_line(),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}
