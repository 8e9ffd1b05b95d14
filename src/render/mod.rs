//! Differential rendering
//!
//! - [`scheduler`] decides which elements changed enough to redraw
//! - [`renderer`] is the display collaborator receiving draw intents
//! - [`render_loop`] drives both on a fixed tick in its own task

pub mod render_loop;
pub mod renderer;
pub mod scheduler;

pub use render_loop::{RenderCommand, RenderHandle, RenderLoop, RenderStats};
pub use renderer::{ColorHint, Renderer};
pub use scheduler::{
    ClassRates, DrawIntent, DrawValue, ElementClass, ElementId, RenderScheduler, RenderState,
};
