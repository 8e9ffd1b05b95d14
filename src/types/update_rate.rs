//! Redraw rate ceilings for visual elements

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum redraw rate for one class of visual element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedrawRate {
    /// Redraw on every render tick that sees a change
    Unlimited,

    /// Redraw at most this many times per second
    MaxHz(u32),
}

impl RedrawRate {
    /// Normalize against the render tick rate.
    ///
    /// A ceiling at or above the tick rate can never bind, and a zero
    /// ceiling is treated as one redraw per second.
    pub fn normalize(self, tick_hz: f64) -> Self {
        match self {
            RedrawRate::Unlimited => RedrawRate::Unlimited,
            RedrawRate::MaxHz(0) => RedrawRate::MaxHz(1),
            RedrawRate::MaxHz(hz) if hz as f64 >= tick_hz => RedrawRate::Unlimited,
            RedrawRate::MaxHz(hz) => RedrawRate::MaxHz(hz),
        }
    }

    /// Minimum time between two redraws of the same element.
    pub fn min_interval(self) -> Duration {
        match self {
            RedrawRate::Unlimited => Duration::ZERO,
            RedrawRate::MaxHz(hz) => Duration::from_secs_f64(1.0 / hz.max(1) as f64),
        }
    }

    /// Check if the ceiling is tighter than the render tick.
    pub fn needs_limit(self, tick_hz: f64) -> bool {
        match self.normalize(tick_hz) {
            RedrawRate::Unlimited => false,
            RedrawRate::MaxHz(_) => true,
        }
    }
}
