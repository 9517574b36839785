pub mod colors;
mod renderer;

pub use renderer::{rgba_to_argb, IconRenderer};
