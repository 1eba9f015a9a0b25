pub mod controller;
pub mod state;

use crate::common::config::OpenSettings;
use crate::common::AppConfig;
use crate::receive::ReceiveOptions;

pub use controller::SessionController;
pub use state::{transition, AfterNotice, Effect, SessionEvent, SessionState, Transition, UserAction};

/// What to do with a saved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPolicy {
    /// Command template; `None` skips the open step entirely.
    pub command: Option<String>,
    pub no_ask: bool,
    pub shell: String,
}

impl OpenPolicy {
    pub fn from_settings(settings: &OpenSettings) -> Self {
        Self {
            command: settings.resolved_command(),
            no_ask: settings.no_ask,
            shell: settings.resolved_shell(),
        }
    }

    pub fn never() -> Self {
        Self {
            command: None,
            no_ask: false,
            shell: "/bin/sh".to_string(),
        }
    }
}

/// Everything one session needs, owned by its controller.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub code: String,
    pub open: OpenPolicy,
    pub options: ReceiveOptions,
}

impl SessionContext {
    pub fn from_config(code: impl Into<String>, config: &AppConfig) -> Self {
        Self {
            code: code.into(),
            open: OpenPolicy::from_settings(&config.open),
            options: ReceiveOptions::from_config(config),
        }
    }
}
