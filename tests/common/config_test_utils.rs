use std::ffi::OsString;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

const CLEARED_VARS: &[&str] = &[
    "WORMSAVE_SAVE_DIR",
    "WORMSAVE_OVERWRITE",
    "WORMSAVE_OPEN__COMMAND",
    "WORMSAVE_OPEN__NO_ASK",
    "WORMSAVE_TRANSFER__SAMPLE_INTERVAL_MS",
    "WORMSAVE_TUI__ENABLED",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Puts every touched variable back the way it was, even if the test panics.
struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn capture(names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            saved: names
                .into_iter()
                .map(|name| (name, std::env::var_os(name)))
                .collect(),
        }
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (name, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

fn write_config(temp_dir: &TempDir, contents: &str) {
    let app_config_dir = temp_dir.path().join("wormsave");
    std::fs::create_dir_all(&app_config_dir).expect("create config dir");
    std::fs::write(app_config_dir.join("config.toml"), contents).expect("write config");
}

/// Run `f` with XDG_CONFIG_HOME pointing at a fresh directory holding
/// `config_toml`, and with no WORMSAVE_ variables set.
pub fn with_config_env<T>(config_toml: &str, f: impl FnOnce() -> T) -> T {
    let _guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().expect("temp dir");

    write_config(&temp_dir, config_toml);

    let _restore = EnvRestore::capture(
        std::iter::once("XDG_CONFIG_HOME").chain(CLEARED_VARS.iter().copied()),
    );
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    for name in CLEARED_VARS {
        std::env::remove_var(name);
    }

    f()
}
