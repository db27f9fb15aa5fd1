#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! INDI protocol gateway
//!
//! This crate bridges the INDI (Instrument Neutral Distributed
//! Interface) instrument-control protocol across four transports: a raw
//! TCP INDI server, locally spawned driver subprocesses, an MQTT broker
//! and a Redis key/value + pub/sub store. Clients written against any
//! one transport can reach instruments on any other.
//!
//! # Features
//! - Streaming frame reassembly over arbitrarily chunked byte streams
//! - Typed message model for all five property vector kinds
//! - Property store with change detection and bounded logs
//! - Six concurrent bridging topologies
//! - Per-source BLOB policy and filesystem BLOB persistence
//! - Client helpers that issue commands through the store

/// BLOB policy gating and payload persistence
pub mod blob;
/// Bridge orchestration between transports
pub mod bridge;
/// Client command issuing and the to-INDI relay
pub mod command;
/// Server configuration records
pub mod config;
/// Error types and handling
pub mod error;
/// Number element formatting
pub mod format;
/// Streaming frame reassembly
pub mod framer;
/// Typed message model
pub mod message;
/// Mixed alphanumeric label ordering
pub mod sort;
/// Property store trait and Redis implementation
pub mod store;
/// INDI timestamp handling
pub mod timestamp;
/// Transport adapters
pub mod transport;

/// Common types and traits
pub mod prelude {
    pub use crate::blob::{BlobGate, BlobSink};
    pub use crate::bridge::{
        drivers_to_mqtt, drivers_to_redis, indi_to_mqtt, indi_to_redis, mqtt_to_port,
        mqtt_to_redis,
    };
    pub use crate::config::{
        IndiServerConfig, LogLengths, MqttServerConfig, RedisServerConfig,
    };
    pub use crate::error::Error;
    pub use crate::message::{
        BlobEnable, MessageType, PropertyPerm, PropertyState, SwitchRule, SwitchState,
    };
    pub use crate::store::{RedisStore, Store};
    pub use crate::timestamp::Timestamp;
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, error::Error>;

/// Version of the INDI protocol implemented by this crate
pub const PROTOCOL_VERSION: &str = "1.7";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_version() {
        assert_eq!(PROTOCOL_VERSION, "1.7");
    }
}
