pub mod filters;
pub mod render;
pub mod transform;

pub use render::{RenderError, render, render_view};
