//! Error types for telemetry decoding and dashboard rendering.
//!
//! All errors implement `std::error::Error` and carry structured context for
//! diagnostics. None of the decode-path errors are fatal: the driver logs and
//! counts them, and the snapshot keeps reflecting the last successful decode.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: poll timeouts, oversized replies, framing and I/O failures
//! - **Binding Errors**: invalid panel configuration requests
//! - **Memory Errors**: decode rules that point outside a payload
//! - **Configuration Errors**: unreadable or invalid configuration files
//! - **Render Errors**: failures reported by the external renderer
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use ecudash::{PollError, TelemetryError};
//! use std::time::Duration;
//!
//! let error: TelemetryError = PollError::Timeout { waited: Duration::from_millis(30) }.into();
//! assert!(error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{SignalId, SignalKind};

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Failure of one request/response exchange on the stream transport.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PollError {
    /// Fewer reply bytes than expected arrived before the deadline.
    #[error("No complete reply within {waited:?}")]
    Timeout { waited: Duration },

    /// Reply advertised more payload than the receive buffer can hold.
    #[error("Reply length {length} exceeds buffer capacity {capacity}")]
    Overflow { length: usize, capacity: usize },

    /// Reply did not start with the expected echo and marker bytes.
    #[error("Unexpected reply header: echo {echo:#04x}, marker {marker:#04x}")]
    UnexpectedHeader { echo: u8, marker: u8 },

    /// The transport itself failed.
    #[error("Stream transport read failed")]
    Read {
        #[source]
        source: std::io::Error,
    },
}

/// Rejected panel binding request. Bindings are never partially mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Position {position} is out of range (max {max})")]
    InvalidPosition { position: usize, max: usize },

    #[error("Signal code {code} is not in the signal table")]
    UnknownSignal { code: u8 },

    #[error("{signal:?} is a {actual:?} signal, this table holds {expected:?} signals")]
    KindMismatch { signal: SignalId, expected: SignalKind, actual: SignalKind },
}

/// Failure reported by the external renderer for one draw intent.
#[derive(Error, Debug)]
#[error("Renderer failed to draw {element}: {reason}")]
pub struct RenderError {
    pub element: String,
    pub reason: String,
}

impl RenderError {
    pub fn new(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { element: element.into(), reason: reason.into() }
    }
}

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Transport timed out after {duration:?}")]
    TransportTimeout { duration: Duration },

    #[error("Transport reply of {length} bytes exceeds capacity {capacity}")]
    TransportOverflow { length: usize, capacity: usize },

    #[error("Transport read failed: {context}")]
    TransportRead {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {details}")]
    Protocol { details: String },

    #[error("Invalid panel binding")]
    Bind(#[from] BindError),

    #[error("Field access out of range at offset {offset}")]
    Memory { offset: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render failed")]
    Render(#[from] RenderError),
}

impl TelemetryError {
    /// Returns whether the next cycle is expected to succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::TransportTimeout { .. } => true,
            TelemetryError::TransportOverflow { .. } => true,
            TelemetryError::TransportRead { .. } => true,
            TelemetryError::Protocol { .. } => true,
            TelemetryError::Render(_) => true,
            TelemetryError::Bind(_) => false,
            TelemetryError::Memory { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::Configuration { .. } => false,
            TelemetryError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::TransportTimeout { .. } => vec![
                "Check the ECU is powered and the serial link is connected",
                "Increase the poll timeout",
                "Verify the baud rate matches the ECU",
            ],
            TelemetryError::TransportOverflow { .. } => vec![
                "Check the ECU firmware sends the expected log layout",
                "Look for line noise corrupting the length byte",
            ],
            TelemetryError::TransportRead { .. } => vec![
                "Check bus wiring and termination",
                "Verify the bus bitrate matches the ECU",
                "Restart the transport",
            ],
            TelemetryError::Protocol { .. } => vec![
                "Verify the ECU speaks the expected request protocol",
                "Check for another device sharing the serial line",
            ],
            TelemetryError::Bind(_) => vec![
                "Use a position between 0 and 7",
                "Bind numeric signals to panels and flags to indicators",
            ],
            TelemetryError::Memory { .. } => vec![
                "Check the decode table offsets against the payload size",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check configuration syntax",
                "Compare against a freshly saved default configuration",
            ],
            TelemetryError::Configuration { .. } => vec![
                "Check the selected telemetry source has a transport",
                "Reset the configuration to defaults",
            ],
            TelemetryError::File { .. } => vec![
                "Check the configuration file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::Render(_) => vec![
                "Check the display connection",
                "Force a full redraw after the display recovers",
            ],
        }
    }

    /// Helper constructor for transport read failures.
    pub fn transport_read(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::TransportRead { context: context.into(), source }
    }

    /// Helper constructor for configuration file errors.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn configuration(reason: impl Into<String>) -> Self {
        TelemetryError::Configuration { reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<PollError> for TelemetryError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Timeout { waited } => TelemetryError::TransportTimeout { duration: waited },
            PollError::Overflow { length, capacity } => {
                TelemetryError::TransportOverflow { length, capacity }
            }
            PollError::UnexpectedHeader { echo, marker } => TelemetryError::Protocol {
                details: format!("unexpected reply header {:#04x} {:#04x}", echo, marker),
            },
            PollError::Read { source } => TelemetryError::transport_read("stream poll", source),
        }
    }
}

impl From<serde_yaml_ng::Error> for TelemetryError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TelemetryError::parse("configuration YAML", err.to_string())
    }
}
