//! Core types for telemetry data representation.
//!
//! This module provides the foundational data structures shared by every
//! producer and consumer:
//! - [`SignalId`] enumerates the closed set of decodable engine signals
//! - [`TelemetrySnapshot`] holds the current value of every signal plus a version
//! - [`TransportFrame`] is one addressed bus frame (at most eight payload bytes)
//! - [`BitField`] reads individual flags out of status bytes
//! - [`RedrawRate`] caps how often a visual element may be redrawn
//!
//! ## Usage Example
//!
//! ```rust
//! use ecudash::types::{SignalId, SignalValue, TelemetrySnapshot};
//! use tokio::time::Instant;
//!
//! let mut snapshot = TelemetrySnapshot::new();
//! snapshot.apply([(SignalId::Rpm, SignalValue::Number(4500.0))], Instant::now());
//!
//! assert_eq!(snapshot.number(SignalId::Rpm), 4500.0);
//! assert_eq!(snapshot.version(), 1);
//! ```

mod bitfield;
mod frame;
mod signal;
mod snapshot;
mod update_rate;

pub use bitfield::BitField;
pub use frame::{MAX_FRAME_PAYLOAD, STANDARD_ID_MASK, TransportFrame};
pub use signal::{SIGNAL_COUNT, SignalId, SignalKind, SignalValue};
pub use snapshot::{Signal, TelemetrySnapshot};
pub use update_rate::RedrawRate;
