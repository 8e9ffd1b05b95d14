//! Wire decoders
//!
//! Each decoder interprets one transport's [`schema`](crate::schema) table and
//! writes the resulting values into a [`TelemetrySnapshot`] as a single batch.
//!
//! [`TelemetrySnapshot`]: crate::types::TelemetrySnapshot

pub mod bus;
pub mod stream;

pub use bus::BusFrameDecoder;
pub use stream::StreamPollDecoder;
