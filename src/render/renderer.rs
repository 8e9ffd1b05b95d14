//! External renderer collaborator

use crate::RenderError;
use crate::config::RenderSettings;

use super::DrawIntent;

/// Semantic color for a drawn value; the renderer maps it to a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorHint {
    Normal,
    Good,
    Warning,
    Critical,
    Accent,
    /// Lit indicator
    Active,
    /// Unlit indicator
    Inactive,
}

/// Draws intents on the physical display.
///
/// The render loop calls [`draw`](Renderer::draw) only for elements whose
/// value, binding or presentation changed. A failed draw is logged and not
/// retried; force a redraw of the element's class to repaint it.
pub trait Renderer: Send + 'static {
    /// Called once before the first draw with the active render settings.
    fn configure(&mut self, _settings: &RenderSettings) {}

    fn draw(&mut self, intent: &DrawIntent) -> Result<(), RenderError>;
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn configure(&mut self, settings: &RenderSettings) {
        (**self).configure(settings)
    }

    fn draw(&mut self, intent: &DrawIntent) -> Result<(), RenderError> {
        (**self).draw(intent)
    }
}
