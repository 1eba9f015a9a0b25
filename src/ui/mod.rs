pub mod headless;
pub mod tui;

pub use headless::run_headless;
pub use tui::SessionUI;
