//! Error types for the gateway

use quick_xml::de::DeError as XmlDeError;
use quick_xml::errors::serialize::SeError as XmlSeError;
use quick_xml::Error as XmlError;
use std::io;
use thiserror::Error;

/// Result type for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gateway operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Frame parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Property error
    #[error("Property error: {0}")]
    Property(String),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// XML deserialization error
    #[error("XML deserialization error: {0}")]
    XmlDe(#[from] XmlDeError),

    /// XML serialization error
    #[error("XML serialization error: {0}")]
    XmlSe(#[from] XmlSeError),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Number format error
    #[error("Format error: {0}")]
    Format(String),

    /// Redis store error
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// MQTT client error
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// MQTT connection error
    #[error("MQTT connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    /// Transport closed by the peer or by shutdown
    #[error("Transport closed: {0}")]
    Closed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::Format(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Parse(format!("invalid base64 payload: {}", err))
    }
}
