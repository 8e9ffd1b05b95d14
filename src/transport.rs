//! Transport collaborators
//!
//! The decoders only consume these interfaces. Bringing the hardware up
//! (bus bitrate, acceptance filters, UART pins) is session setup and happens
//! before a transport is handed over.

use std::io;
use std::time::Duration;

use crate::types::TransportFrame;

/// Frame-addressed bus receiver.
pub trait BusTransport: Send + 'static {
    /// Whether a frame is waiting to be received.
    fn available(&mut self) -> bool;

    /// Receive the next waiting frame.
    ///
    /// An error is a transport failure, not "nothing available"; callers
    /// check [`available`](BusTransport::available) first.
    fn receive(&mut self) -> io::Result<TransportFrame>;
}

/// Byte-oriented serial link.
pub trait StreamTransport: Send + 'static {
    fn write(&mut self, byte: u8) -> io::Result<()>;

    /// Bytes ready to read without waiting.
    fn available_count(&mut self) -> io::Result<usize>;

    /// Read up to `max` bytes into `buf`, returning how many were read.
    fn read(&mut self, buf: &mut [u8], max: usize) -> io::Result<usize>;

    /// Upper bound for blocking reads on the underlying device.
    fn set_timeout(&mut self, timeout: Duration);
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn available(&mut self) -> bool {
        (**self).available()
    }

    fn receive(&mut self) -> io::Result<TransportFrame> {
        (**self).receive()
    }
}

impl<T: StreamTransport + ?Sized> StreamTransport for Box<T> {
    fn write(&mut self, byte: u8) -> io::Result<()> {
        (**self).write(byte)
    }

    fn available_count(&mut self) -> io::Result<usize> {
        (**self).available_count()
    }

    fn read(&mut self, buf: &mut [u8], max: usize) -> io::Result<usize> {
        (**self).read(buf, max)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }
}
