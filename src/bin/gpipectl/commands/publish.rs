use crate::cli::PublishArgs;
use crate::commands::load_spec;
use anyhow::{bail, Context, Result};
use gpupipe::client::Client;
use gpupipe::core::job::{Job, JobSpec};
use gpupipe::utils::parse_gpu_ids;
use std::path::{Path, PathBuf};

pub async fn handle_publish(client: &Client, args: PublishArgs) -> Result<()> {
    let spec = match &args.target {
        Some(target) => load_spec(target)?,
        None => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            spec_from_args(args, &cwd)?
        }
    };

    let id = client.publish(&spec).await?;
    println!("Submitted job {id}");
    Ok(())
}

fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Builds a spec from inline options. Relative paths are resolved against `cwd`
/// since the daemon runs elsewhere.
fn spec_from_args(args: PublishArgs, cwd: &Path) -> Result<JobSpec> {
    if args.command.is_empty() {
        bail!("No command given. Pass it after `--` or use --target");
    }
    let gpu_ids = match args.gpus.as_deref() {
        Some(gpus) => parse_gpu_ids(gpus)?,
        None => Vec::new(),
    };

    let spec = Job::builder()
        .run_dir(absolute(cwd, args.dir.unwrap_or_else(|| PathBuf::from("."))))
        .command(args.command)
        .gpu_ids(gpu_ids)
        .memory_watermark(args.watermark)
        .log_path(args.log.map(|p| absolute(cwd, p)))
        .err_log_path(args.err_log.map(|p| absolute(cwd, p)))
        .build();
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Commands, GpipeCtl};
    use clap::Parser;

    fn publish_args(argv: &[&str]) -> PublishArgs {
        let mut full = vec!["gpipectl", "publish"];
        full.extend_from_slice(argv);
        match GpipeCtl::parse_from(full).command {
            Commands::Publish(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_inline_spec() {
        let args = publish_args(&[
            "--dir", "runs", "--gpus", "1,0", "-w", "30", "--log", "out.log", "--", "python",
            "train.py", "--lr", "0.1",
        ]);
        let spec = spec_from_args(args, Path::new("/home/me")).unwrap();

        assert_eq!(spec.run_dir, PathBuf::from("/home/me/runs"));
        assert_eq!(spec.command, vec!["python", "train.py", "--lr", "0.1"]);
        assert_eq!(spec.gpu_ids, vec![0, 1]);
        assert_eq!(spec.memory_watermark, Some(30));
        assert_eq!(spec.log_path, Some(PathBuf::from("/home/me/out.log")));
        assert_eq!(spec.err_log_path, None);
    }

    #[test]
    fn test_inline_spec_requires_command() {
        let args = publish_args(&["--gpus", "0"]);
        assert!(spec_from_args(args, Path::new("/")).is_err());
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let args = publish_args(&["--dir", "/data", "--err-log", "/var/log/e.log", "--", "true"]);
        let spec = spec_from_args(args, Path::new("/home/me")).unwrap();
        assert_eq!(spec.run_dir, PathBuf::from("/data"));
        assert_eq!(spec.err_log_path, Some(PathBuf::from("/var/log/e.log")));
    }

    #[test]
    fn test_target_conflicts_with_inline_options() {
        let result = GpipeCtl::try_parse_from([
            "gpipectl", "publish", "--target", "job.json", "--gpus", "0",
        ]);
        assert!(result.is_err());
    }
}
