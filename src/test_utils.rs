//! Scripted transports and a recording renderer for tests and benchmarks
//!
//! Every double is cheaply cloneable and clones share state, so a test can
//! keep one handle while the session owns the other.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::RenderError;
use crate::render::{DrawIntent, ElementId, Renderer};
use crate::schema::{REPLY_MARKER, REQUEST_BYTE};
use crate::transport::{BusTransport, StreamTransport};
use crate::types::TransportFrame;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Payload of `len` zero bytes with the given `(offset, byte)` pairs set.
///
/// Offsets past `len` are ignored.
pub fn stream_payload(len: usize, bytes: &[(usize, u8)]) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    for &(offset, byte) in bytes {
        if let Some(slot) = payload.get_mut(offset) {
            *slot = byte;
        }
    }
    payload
}

/// Bus transport replaying a queue of frames and failures.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBus {
    queue: Arc<Mutex<VecDeque<io::Result<TransportFrame>>>>,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame. Payloads longer than eight bytes are truncated.
    pub fn push_frame(&self, identifier: u32, payload: &[u8]) {
        let payload = &payload[..payload.len().min(crate::types::MAX_FRAME_PAYLOAD)];
        if let Ok(frame) = TransportFrame::new(identifier, payload) {
            lock(&self.queue).push_back(Ok(frame));
        }
    }

    /// Queue a receive failure.
    pub fn push_error(&self, message: &str) {
        lock(&self.queue).push_back(Err(io::Error::other(message.to_string())));
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl BusTransport for ScriptedBus {
    fn available(&mut self) -> bool {
        !lock(&self.queue).is_empty()
    }

    fn receive(&mut self) -> io::Result<TransportFrame> {
        lock(&self.queue)
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::WouldBlock, "no frame waiting")))
    }
}

#[derive(Debug, Default)]
struct StreamScript {
    line: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    writes: Vec<u8>,
    read_failures: VecDeque<String>,
    timeout: Option<Duration>,
}

/// Serial link that answers each request byte with the next queued reply.
///
/// Requests with no queued reply get silence, which the decoder sees as a
/// timeout.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStream {
    script: Arc<Mutex<StreamScript>>,
}

impl ScriptedStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw reply bytes for the next request.
    pub fn queue_reply(&self, reply: Vec<u8>) {
        lock(&self.script).replies.push_back(reply);
    }

    /// Queue a well-formed reply carrying `payload`.
    pub fn queue_payload(&self, payload: &[u8]) {
        let mut reply = Vec::with_capacity(payload.len() + 3);
        reply.extend([REQUEST_BYTE, REPLY_MARKER, payload.len().min(u8::MAX as usize) as u8]);
        reply.extend_from_slice(payload);
        self.queue_reply(reply);
    }

    /// Put bytes on the line immediately, ahead of any request.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.script).line.extend(bytes);
    }

    /// Fail the next read call with `message`.
    pub fn fail_next_read(&self, message: &str) {
        lock(&self.script).read_failures.push_back(message.to_string());
    }

    /// Every byte written so far.
    pub fn writes(&self) -> Vec<u8> {
        lock(&self.script).writes.clone()
    }

    /// Bytes on the line not yet read.
    pub fn pending_bytes(&self) -> usize {
        lock(&self.script).line.len()
    }

    pub fn configured_timeout(&self) -> Option<Duration> {
        lock(&self.script).timeout
    }
}

impl StreamTransport for ScriptedStream {
    fn write(&mut self, byte: u8) -> io::Result<()> {
        let mut script = lock(&self.script);
        script.writes.push(byte);
        if byte == REQUEST_BYTE {
            if let Some(reply) = script.replies.pop_front() {
                script.line.extend(reply);
            }
        }
        Ok(())
    }

    fn available_count(&mut self) -> io::Result<usize> {
        Ok(lock(&self.script).line.len())
    }

    fn read(&mut self, buf: &mut [u8], max: usize) -> io::Result<usize> {
        let mut script = lock(&self.script);
        if let Some(message) = script.read_failures.pop_front() {
            return Err(io::Error::other(message));
        }
        let count = max.min(buf.len()).min(script.line.len());
        for (slot, byte) in buf.iter_mut().zip(script.line.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        lock(&self.script).timeout = Some(timeout);
    }
}

/// Renderer that records every intent it is asked to draw.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    drawn: Arc<Mutex<Vec<DrawIntent>>>,
    failing: Option<ElementId>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every draw of `element`.
    pub fn failing_on(mut self, element: ElementId) -> Self {
        self.failing = Some(element);
        self
    }

    pub fn drawn(&self) -> Vec<DrawIntent> {
        lock(&self.drawn).clone()
    }

    pub fn elements(&self) -> Vec<ElementId> {
        lock(&self.drawn).iter().map(|intent| intent.element).collect()
    }

    pub fn clear(&self) {
        lock(&self.drawn).clear();
    }
}

impl Renderer for RecordingRenderer {
    fn draw(&mut self, intent: &DrawIntent) -> Result<(), RenderError> {
        if self.failing == Some(intent.element) {
            return Err(RenderError::new(intent.element.to_string(), "display not responding"));
        }
        lock(&self.drawn).push(intent.clone());
        Ok(())
    }
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber_init();
}

#[cfg(test)]
fn tracing_subscriber_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
}

#[cfg(not(test))]
fn tracing_subscriber_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Ok(())
}
