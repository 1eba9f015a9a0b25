//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI
use anyhow::{ensure, Context, Result};
use directories::{BaseDirs, ProjectDirs, UserDirs};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "WORMSAVE_";

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "wormsave")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("wormsave.toml"))
}

/// Where TUI-mode logs go, since stderr belongs to the alternate screen.
pub fn log_path() -> PathBuf {
    ProjectDirs::from("", "", "wormsave")
        .map(|p| p.cache_dir().join("wormsave.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("wormsave.log"))
}

fn default_spool_dir() -> PathBuf {
    ProjectDirs::from("", "", "wormsave")
        .map(|p| p.data_dir().join("spool"))
        .unwrap_or_else(|| PathBuf::from("spool"))
}

fn default_open_command() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("open".to_string())
    } else if cfg!(any(
        target_os = "linux",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    )) {
        Some("xdg-open".to_string())
    } else {
        None
    }
}

/// Launching a viewer for the saved file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSettings {
    /// Template; `%s` is replaced by the quoted path, otherwise it is appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Disable the OS default opener when no command is configured.
    pub no_default: bool,
    /// Open without asking first.
    pub no_ask: bool,
    /// Shell used as `<shell> -c <command>`; empty means $SHELL.
    pub shell: String,
}

impl OpenSettings {
    /// Configured command, falling back to the OS opener unless disabled.
    pub fn resolved_command(&self) -> Option<String> {
        match self.command.as_deref().map(str::trim) {
            Some(cmd) if !cmd.is_empty() => Some(cmd.to_string()),
            _ if self.no_default => None,
            _ => default_open_command(),
        }
    }

    pub fn resolved_shell(&self) -> String {
        if !self.shell.trim().is_empty() {
            return self.shell.clone();
        }
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

/// Pipeline timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub sample_interval_ms: u64,
    pub settle_ms: u64,
    pub text_delay_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 250,
            settle_ms: 1000,
            text_delay_ms: 1000,
        }
    }
}

impl TransferSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn text_delay(&self) -> Duration {
        Duration::from_millis(self.text_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolSettings {
    pub dir: PathBuf,
}

impl Default for SpoolSettings {
    fn default() -> Self {
        Self {
            dir: default_spool_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TuiSettings {
    pub enabled: bool,
}

impl Default for TuiSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    pub overwrite: bool,
    pub open: OpenSettings,
    pub transfer: TransferSettings,
    pub spool: SpoolSettings,
    pub tui: TuiSettings,
}

impl AppConfig {
    /// Save directory with `~` expanded; falls back to the user's download
    /// directory, then the current directory.
    pub fn resolved_save_dir(&self) -> PathBuf {
        match &self.save_dir {
            Some(dir) if !dir.as_os_str().is_empty() => expand_home(dir),
            _ => UserDirs::new()
                .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Validates timing bounds and rejects unusable values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.transfer.sample_interval_ms > 0,
            "Invalid config: transfer.sample_interval_ms must be > 0"
        );
        ensure!(
            self.open.shell.is_empty() || !self.open.shell.trim().is_empty(),
            "Invalid config: open.shell must not be blank"
        );
        Ok(())
    }
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_ask_open: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_tui: Option<bool>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

/// Same as [`load_config`] with an explicit file location.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(dir) = &overrides.save_dir {
        config.save_dir = Some(dir.clone());
    }
    if let Some(overwrite) = overrides.overwrite {
        config.overwrite = overwrite;
    }
    if let Some(cmd) = &overrides.open_command {
        config.open.command = Some(cmd.clone());
    }
    if let Some(no_ask) = overrides.no_ask_open {
        config.open.no_ask = no_ask;
    }
    if overrides.no_tui == Some(true) {
        config.tui.enabled = false;
    }

    config
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_open_command_wins_over_default() {
        let open = OpenSettings {
            command: Some("less".into()),
            no_default: true,
            ..Default::default()
        };
        assert_eq!(open.resolved_command().as_deref(), Some("less"));
    }

    #[test]
    fn no_default_disables_fallback_opener() {
        let open = OpenSettings {
            command: Some("   ".into()),
            no_default: true,
            ..Default::default()
        };
        assert_eq!(open.resolved_command(), None);
    }

    #[test]
    fn explicit_shell_is_kept() {
        let open = OpenSettings {
            shell: "/bin/zsh".into(),
            ..Default::default()
        };
        assert_eq!(open.resolved_shell(), "/bin/zsh");
    }

    #[test]
    fn home_prefix_is_expanded() {
        let expanded = expand_home(Path::new("~/Downloads"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("Downloads"));

        let untouched = expand_home(Path::new("/srv/inbox"));
        assert_eq!(untouched, PathBuf::from("/srv/inbox"));
    }

    #[test]
    fn zero_sample_interval_is_rejected() {
        let mut config = AppConfig::default();
        config.transfer.sample_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_replace_loaded_values() {
        let config = AppConfig::default();
        let overrides = ConfigOverrides {
            save_dir: Some("/tmp/out".into()),
            overwrite: Some(true),
            open_command: Some("cat %s".into()),
            no_ask_open: Some(true),
            no_tui: Some(true),
        };

        let config = apply_overrides(config, &overrides);
        assert_eq!(config.resolved_save_dir(), PathBuf::from("/tmp/out"));
        assert!(config.overwrite);
        assert_eq!(config.open.command.as_deref(), Some("cat %s"));
        assert!(config.open.no_ask);
        assert!(!config.tui.enabled);
    }
}
