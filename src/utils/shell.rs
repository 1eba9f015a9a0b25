//! Building and running the user's "open" command.

use std::path::Path;

use crate::common::ReceiveError;

const PLACEHOLDER: &str = "%s";

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-' | '_')
}

/// Quote `s` for a POSIX shell. Safe strings pass through unchanged,
/// everything else is wrapped in single quotes.
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(is_shell_safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Substitute every `%s` with the quoted path, or append it after a space.
pub fn build_open_command(template: &str, path: &Path) -> String {
    let quoted = quote(&path.to_string_lossy());
    if template.contains(PLACEHOLDER) {
        template.replace(PLACEHOLDER, &quoted)
    } else {
        format!("{template} {quoted}")
    }
}

/// Run `<shell> -c <command>` and wait for it.
pub async fn run_open_command(shell: &str, command: &str) -> Result<(), ReceiveError> {
    tracing::info!(shell, command, "running open command");

    let status = tokio::process::Command::new(shell)
        .arg("-c")
        .arg(command)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map_err(|e| ReceiveError::OpenCommandFailed {
            command: command.to_string(),
            detail: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ReceiveError::OpenCommandFailed {
            command: command.to_string(),
            detail: status.to_string(),
        })
    }
}
