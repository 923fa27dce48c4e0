//! Classification engine: natural-breaks breakpoints and the colour scale
//! built on them.

pub mod color;
pub mod jenks;

pub use color::{class_index, color_for, default_palette, palette_index, Color, ColorScale};
pub use jenks::classify;
