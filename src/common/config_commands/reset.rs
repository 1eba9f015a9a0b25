use super::defaults_toml;
use super::io::atomic_write;
use anyhow::{bail, Result};
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

pub(super) fn reset_config(path: &Path, yes: bool) -> Result<bool> {
    let interactive = std::io::stdin().is_terminal();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    reset_config_with_io(path, yes, interactive, &mut stdin.lock(), &mut stdout.lock())
}

fn confirmed(input: &mut dyn BufRead, output: &mut dyn Write, path: &Path) -> Result<bool> {
    write!(output, "Overwrite {} with defaults? [y/N]: ", path.display())?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES" | "Yes"))
}

fn reset_config_with_io(
    path: &Path,
    yes: bool,
    interactive: bool,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<bool> {
    match (yes, interactive) {
        (true, _) => {}
        (false, false) => bail!("Refusing to reset config without a terminal; pass --yes"),
        (false, true) => {
            if !confirmed(input, output, path)? {
                writeln!(output, "Left {} unchanged.", path.display())?;
                return Ok(false);
            }
        }
    }

    atomic_write(path, &defaults_toml()?)?;
    writeln!(output, "Wrote defaults to {}", path.display())?;
    Ok(true)
}
