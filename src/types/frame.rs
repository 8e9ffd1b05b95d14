//! Bus transport frame

use crate::{Result, TelemetryError};

/// Largest payload a bus frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = 8;

/// Standard (11-bit) identifier mask.
pub const STANDARD_ID_MASK: u32 = 0x7FF;

/// One addressed message received from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportFrame {
    /// Frame identifier as received
    pub identifier: u32,
    data: [u8; MAX_FRAME_PAYLOAD],
    len: u8,
}

impl TransportFrame {
    /// Create a frame, rejecting payloads longer than eight bytes.
    pub fn new(identifier: u32, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(TelemetryError::Protocol {
                details: format!(
                    "frame {:#05x} carries {} bytes (max {})",
                    identifier,
                    payload.len(),
                    MAX_FRAME_PAYLOAD
                ),
            });
        }

        let mut data = [0u8; MAX_FRAME_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self { identifier, data, len: payload.len() as u8 })
    }

    /// Received payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Identifier with extended bits stripped, as used for table lookup.
    pub fn standard_id(&self) -> u16 {
        (self.identifier & STANDARD_ID_MASK) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_payload() {
        assert!(TransportFrame::new(0x360, &[0; 9]).is_err());
        let frame = TransportFrame::new(0x360, &[1, 2, 3]).unwrap();
        assert_eq!(frame.payload(), &[1, 2, 3]);
    }

    #[test]
    fn standard_id_masks_extended_bits() {
        let frame = TransportFrame::new(0x1000_0360, &[]).unwrap();
        assert_eq!(frame.standard_id(), 0x360);
    }
}
