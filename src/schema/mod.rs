//! Signal table: what every signal means and how each transport encodes it.
//!
//! - [`signals`] carries presentation metadata (label, unit, default
//!   precision, color thresholds)
//! - [`bus`] maps frame identifiers to big-endian word fields
//! - [`stream`] maps the polled reply buffer to byte, word and bit fields
//!
//! Both wire tables are data: lists of [`FieldLayout`] rules interpreted by
//! one generic extraction routine.

pub mod bus;
pub mod layout;
pub mod signals;
pub mod stream;

pub use bus::{BusLayout, BusMessage};
pub use layout::{Collision, FieldEncoding, FieldLayout, Transform};
pub use signals::{SignalInfo, all_signals, color_hint, signal_info};
pub use stream::{
    Cadence, REPLY_MARKER, REQUEST_BYTE, STREAM_BUFFER_CAPACITY, StreamField, StreamLayout,
};
