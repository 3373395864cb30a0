use anyhow::{Context, Result};
use clap::builder::{
    styling::{AnsiColor, Effects},
    Styles,
};
use range_parser::parse;
use std::borrow::Cow;
use std::time::SystemTime;

/// Parse a GPU selection such as `"0"`, `"0,2"` or `"0-1,3"`.
///
/// A blank string selects no device. The result is sorted and free of duplicates.
///
/// # Examples
///
/// ```
/// use gpupipe::utils::parse_gpu_ids;
///
/// assert_eq!(parse_gpu_ids("0-1,3").unwrap(), vec![0, 1, 3]);
/// assert_eq!(parse_gpu_ids("2,0,2").unwrap(), vec![0, 2]);
/// assert!(parse_gpu_ids("").unwrap().is_empty());
/// ```
pub fn parse_gpu_ids(gpu_string: &str) -> Result<Vec<u32>> {
    let trimmed = gpu_string.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut parsed: Vec<u32> =
        parse::<u32>(trimmed).with_context(|| format!("Invalid GPU index or range: {gpu_string}"))?;
    parsed.sort_unstable();
    parsed.dedup();
    Ok(parsed)
}

/// Join a program and its arguments into a single line a POSIX shell would
/// split back into the same words.
pub fn join_command<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| shell_escape::unix::escape(Cow::Borrowed(arg.as_ref())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Local wall-clock rendering used in tables.
pub fn format_system_time(time: SystemTime) -> String {
    let local: chrono::DateTime<chrono::Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gpu_ids_single_and_list() {
        assert_eq!(parse_gpu_ids("0").unwrap(), vec![0]);
        assert_eq!(parse_gpu_ids("1,3,5").unwrap(), vec![1, 3, 5]);
        assert_eq!(parse_gpu_ids("3,1,2").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_gpu_ids_ranges() {
        assert_eq!(parse_gpu_ids("0-2").unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_gpu_ids("0-1,3,5-6").unwrap(), vec![0, 1, 3, 5, 6]);
        assert_eq!(parse_gpu_ids("0-2,1-3").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_parse_gpu_ids_blank_means_none() {
        assert!(parse_gpu_ids("").unwrap().is_empty());
        assert!(parse_gpu_ids("   ").unwrap().is_empty());
        assert_eq!(parse_gpu_ids("  0  ").unwrap(), vec![0]);
    }

    #[test]
    fn test_parse_gpu_ids_invalid() {
        assert!(parse_gpu_ids("abc").is_err());
        assert!(parse_gpu_ids("gpu0").is_err());
        assert!(parse_gpu_ids("-1").is_err());
    }

    #[test]
    fn test_join_command_quotes_when_needed() {
        assert_eq!(join_command(&["python", "train.py"]), "python train.py");
        assert_eq!(join_command(&["echo", "hello world"]), "echo 'hello world'");
        assert_eq!(join_command::<&str>(&[]), "");
    }

    #[test]
    fn test_format_system_time_shape() {
        let formatted = format_system_time(SystemTime::now());
        assert_eq!(formatted.len(), "2024-01-01 00:00:00".len());
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[10..11], " ");
    }
}
