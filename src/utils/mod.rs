pub mod security;
pub mod shell;
