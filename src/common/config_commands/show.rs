use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

pub(super) fn path_config_with_writer(path: &Path, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "{}", path.display())?;
    Ok(())
}

/// Stream the config file as-is; when there is none, say so on stderr and
/// print the built-in defaults on stdout so they can be redirected into place.
pub(super) fn show_config_with_io(
    path: &Path,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    if !path.exists() {
        writeln!(stderr, "No config file at {}; built-in defaults:", path.display())?;
        stdout.write_all(super::defaults_toml()?.as_bytes())?;
        return Ok(());
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    stdout.write_all(text.as_bytes())?;
    Ok(())
}
