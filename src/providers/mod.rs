//! Producer implementations, one per telemetry source

pub mod bus;
pub mod simulator;
pub mod stream;

pub use bus::BusProducer;
pub use simulator::SimulatorProducer;
pub use stream::StreamProducer;
