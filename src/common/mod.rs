pub mod config;
pub mod config_commands;
pub mod errors;
pub mod progress;

pub use config::{AppConfig, ConfigOverrides, TransferSettings};
pub use errors::{CreateTarget, ReceiveError};
pub use progress::{ProgressObserver, ProgressSnapshot};
