//! Bus producer

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, trace};

use crate::Result;
use crate::config::{BusSettings, SourceKind};
use crate::decoder::BusFrameDecoder;
use crate::provider::{Producer, Production};
use crate::transport::BusTransport;
use crate::types::TelemetrySnapshot;

/// How long to wait between availability checks on an idle bus.
const IDLE_POLL_STEP: Duration = Duration::from_millis(1);

/// Longest a cycle waits for a frame before reporting an idle bus.
pub const BUS_IDLE_CYCLE: Duration = Duration::from_millis(100);

/// Producer that decodes frames as they arrive on the bus.
///
/// One cycle handles exactly one frame. A frame with an identifier outside
/// the decode table, or no frame within [`BUS_IDLE_CYCLE`], completes the
/// cycle as [`Production::Unchanged`].
pub struct BusProducer<T> {
    transport: T,
    decoder: BusFrameDecoder,
}

impl<T: BusTransport> BusProducer<T> {
    pub fn new(transport: T, settings: &BusSettings) -> Self {
        Self::with_decoder(transport, BusFrameDecoder::new(), settings)
    }

    pub fn with_decoder(transport: T, decoder: BusFrameDecoder, settings: &BusSettings) -> Self {
        info!(
            bitrate = settings.effective_bitrate(),
            messages = decoder.layout().messages().len(),
            "Bus producer ready"
        );
        Self { transport, decoder }
    }

    pub fn decoder(&self) -> &BusFrameDecoder {
        &self.decoder
    }
}

#[async_trait::async_trait]
impl<T: BusTransport> Producer for BusProducer<T> {
    async fn produce(&mut self, snapshot: &mut TelemetrySnapshot) -> Result<Production> {
        let deadline = Instant::now() + BUS_IDLE_CYCLE;
        while !self.transport.available() {
            if Instant::now() >= deadline {
                trace!("Bus idle");
                return Ok(Production::Unchanged);
            }
            tokio::time::sleep(IDLE_POLL_STEP).await;
        }

        if self.decoder.receive(&mut self.transport, snapshot)? {
            trace!(version = snapshot.version(), "Bus frame decoded");
            Ok(Production::Updated)
        } else {
            Ok(Production::Unchanged)
        }
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Bus
    }

    fn decode_rate(&self) -> f64 {
        self.decoder.decode_rate()
    }

    fn tick_rate(&self) -> f64 {
        f64::INFINITY
    }
}
