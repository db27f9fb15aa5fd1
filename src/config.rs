//! Server configuration records
//!
//! All connection parameters are explicit values passed to the bridge
//! constructors; the gateway holds no global state.

use crate::error::{Error, Result};

/// Default INDI server port
pub const DEFAULT_INDI_PORT: u16 = 7624;

/// Default Redis server port
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default MQTT broker port
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Location of an INDI server
#[derive(Debug, Clone)]
pub struct IndiServerConfig {
    /// Host name of the INDI server
    pub host: String,
    /// Port of the INDI server
    pub port: u16,
}

impl IndiServerConfig {
    /// Create a config for the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for IndiServerConfig {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_INDI_PORT)
    }
}

/// Location and keyspace parameters of the Redis store
#[derive(Debug, Clone)]
pub struct RedisServerConfig {
    /// Host name of the Redis server
    pub host: String,
    /// Port of the Redis server
    pub port: u16,
    /// Redis database number
    pub db: i64,
    /// Password, empty for none
    pub password: String,
    /// Prefix applied to every key owned by the gateway
    pub key_prefix: String,
    /// Channel on which local clients publish commands toward INDI
    pub to_indi_channel: String,
    /// Channel on which ingest alerts are published to local clients
    pub from_indi_channel: String,
}

impl RedisServerConfig {
    /// Validate the record. The two pub/sub channels must both be set
    /// and must differ, otherwise commands would loop straight back.
    pub fn validate(&self) -> Result<()> {
        if self.to_indi_channel.is_empty() || self.from_indi_channel.is_empty() {
            return Err(Error::Config(
                "redis channels must both be non-empty".to_string(),
            ));
        }
        if self.to_indi_channel == self.from_indi_channel {
            return Err(Error::Config(
                "redis channels must be different from each other".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

impl Default for RedisServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_REDIS_PORT,
            db: 0,
            password: String::new(),
            key_prefix: "indi_".to_string(),
            to_indi_channel: "to_indi".to_string(),
            from_indi_channel: "from_indi".to_string(),
        }
    }
}

/// Location and topic parameters of the MQTT broker
#[derive(Debug, Clone)]
pub struct MqttServerConfig {
    /// Host name of the MQTT broker
    pub host: String,
    /// Port of the MQTT broker
    pub port: u16,
    /// Client identifier, must be unique per connection
    pub client_id: String,
    /// Username, empty for none
    pub username: String,
    /// Password, empty for none
    pub password: String,
    /// Topic carrying commands toward the instruments
    pub to_indi_topic: String,
    /// Topic carrying data from the instruments
    pub from_indi_topic: String,
    /// Topic carrying snoop control requests between drivers
    pub snoop_control_topic: String,
    /// Topic carrying snooped data between drivers
    pub snoop_data_topic: String,
}

impl MqttServerConfig {
    /// Validate the record: all four topics set and pairwise distinct.
    pub fn validate(&self) -> Result<()> {
        let topics = [
            &self.to_indi_topic,
            &self.from_indi_topic,
            &self.snoop_control_topic,
            &self.snoop_data_topic,
        ];
        if topics.iter().any(|t| t.is_empty()) {
            return Err(Error::Config(
                "MQTT topics must all be non-empty".to_string(),
            ));
        }
        for (i, a) in topics.iter().enumerate() {
            for b in topics.iter().skip(i + 1) {
                if a == b {
                    return Err(Error::Config(format!(
                        "MQTT topics must be distinct, {} appears twice",
                        a
                    )));
                }
            }
        }
        if self.client_id.is_empty() {
            return Err(Error::Config(
                "an MQTT client id must be given".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MqttServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MQTT_PORT,
            client_id: "indi-gateway".to_string(),
            username: String::new(),
            password: String::new(),
            to_indi_topic: "to_indi".to_string(),
            from_indi_topic: "from_indi".to_string(),
            snoop_control_topic: "snoop_control".to_string(),
            snoop_data_topic: "snoop_data".to_string(),
        }
    }
}

/// Number of entries kept in each bounded change log.
///
/// Number vectors get a deeper buffer than the rest because their values
/// stream continuously while an instrument is slewing or exposing.
#[derive(Debug, Clone, Copy)]
pub struct LogLengths {
    /// Device-set snapshots
    pub devices: usize,
    /// Property-set snapshots
    pub properties: usize,
    /// Property attribute snapshots
    pub attributes: usize,
    /// Element-set snapshots
    pub elements: usize,
    /// Message lists
    pub messages: usize,
    /// Text vector snapshots
    pub textvector: usize,
    /// Number vector snapshots
    pub numbervector: usize,
    /// Switch vector snapshots
    pub switchvector: usize,
    /// Light vector snapshots
    pub lightvector: usize,
    /// BLOB vector snapshots
    pub blobvector: usize,
}

impl Default for LogLengths {
    fn default() -> Self {
        Self {
            devices: 50,
            properties: 5,
            attributes: 5,
            elements: 5,
            messages: 5,
            textvector: 5,
            numbervector: 50,
            switchvector: 5,
            lightvector: 5,
            blobvector: 5,
        }
    }
}
