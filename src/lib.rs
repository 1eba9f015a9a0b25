pub mod common;
pub mod receive;
pub mod session;
pub mod transfer;
pub mod ui;
pub mod utils;
