//! Stream combinators for snapshot subscriptions

pub mod throttle;

pub use throttle::{Throttle, ThrottleExt, Versioned};
