//! Transport adapters.
//!
//! Every endpoint the gateway bridges speaks the same duplex contract:
//! a stream of received bytes and a sink for complete outbound frames.
//! The two halves are separate traits so a bridge can run its reader
//! and writer pipelines as independent tasks.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod driver;
pub mod indi;
pub mod mqtt;

pub use driver::DriverProcess;
pub use indi::IndiConnection;
pub use mqtt::{MqttReceiver, MqttSender};

/// Per-send and connect timeout shared by all transports
pub const IO_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Delay before a broken transport is reopened
pub const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

/// Receiving half of a transport. `recv` yields raw bytes: an arbitrary
/// chunk for socket-like transports, a complete frame group for MQTT.
/// Either way the bytes are fed through the framer.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next chunk of received bytes
    async fn recv(&mut self) -> Result<Bytes>;
}

/// Sending half of a transport. Frames arrive pre-serialized.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one complete frame
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Close the transport
    async fn close(&mut self) -> Result<()>;
}
