use crate::commands::load_spec;
use anyhow::Result;
use std::path::Path;

pub fn handle_generate(target: &Path) -> Result<()> {
    let spec = load_spec(target)?;
    println!("{}", gpupipe::utils::join_command(&spec.command));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_generate_reads_definition() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"run_dir": "/tmp", "command": ["python", "train.py", "--name", "run 1"], "gpu_ids": [0]}}"#
        )
        .unwrap();

        let spec = load_spec(file.path()).unwrap();
        assert_eq!(spec.gpu_ids, vec![0]);
        assert_eq!(
            gpupipe::utils::join_command(&spec.command),
            "python train.py --name 'run 1'"
        );
        assert!(handle_generate(file.path()).is_ok());
    }

    #[test]
    fn test_generate_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(handle_generate(file.path()).is_err());
        assert!(handle_generate(Path::new("/nonexistent/job.json")).is_err());
    }
}
