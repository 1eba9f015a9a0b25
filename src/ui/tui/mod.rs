mod dialog;
mod render;
mod styles;

pub use render::SessionUI;
