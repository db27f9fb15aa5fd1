//! Types shared by every vector kind: states, permissions, switch
//! literals, device messages and property deletion.

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Property state
///
/// The wire is not trusted on case: some drivers send `OK` or `idle`.
/// Deserialization folds case and maps anything unrecognised to `Alert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum PropertyState {
    /// No current activity on the property
    Idle,
    /// Property holds a good value
    Ok,
    /// A change is in flight
    Busy,
    /// The property is in an error condition
    Alert,
}

impl PropertyState {
    /// Canonicalise a wire literal, folding case. Unknown text maps to
    /// `Alert` rather than failing the frame.
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => PropertyState::Idle,
            "ok" => PropertyState::Ok,
            "busy" => PropertyState::Busy,
            _ => PropertyState::Alert,
        }
    }
}

impl FromStr for PropertyState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Idle" => Ok(PropertyState::Idle),
            "Ok" => Ok(PropertyState::Ok),
            "Busy" => Ok(PropertyState::Busy),
            "Alert" => Ok(PropertyState::Alert),
            _ => Err(Error::Property(format!("invalid property state: {}", s))),
        }
    }
}

impl fmt::Display for PropertyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyState::Idle => write!(f, "Idle"),
            PropertyState::Ok => write!(f, "Ok"),
            PropertyState::Busy => write!(f, "Busy"),
            PropertyState::Alert => write!(f, "Alert"),
        }
    }
}

impl<'de> Deserialize<'de> for PropertyState {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PropertyState::from_wire(&s))
    }
}

/// Property permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyPerm {
    /// Read-only property
    Ro,
    /// Write-only property
    Wo,
    /// Read-write property
    Rw,
}

impl PropertyPerm {
    /// True if a client may read the property
    pub fn is_readable(self) -> bool {
        matches!(self, PropertyPerm::Ro | PropertyPerm::Rw)
    }

    /// True if a client may write the property
    pub fn is_writable(self) -> bool {
        matches!(self, PropertyPerm::Wo | PropertyPerm::Rw)
    }
}

impl FromStr for PropertyPerm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ro" => Ok(PropertyPerm::Ro),
            "wo" => Ok(PropertyPerm::Wo),
            "rw" => Ok(PropertyPerm::Rw),
            _ => Err(Error::Property(format!("invalid permission: {}", s))),
        }
    }
}

impl fmt::Display for PropertyPerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPerm::Ro => write!(f, "ro"),
            PropertyPerm::Wo => write!(f, "wo"),
            PropertyPerm::Rw => write!(f, "rw"),
        }
    }
}

/// Switch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SwitchState {
    /// Switch is on
    On,
    /// Switch is off
    Off,
}

impl FromStr for SwitchState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "On" => Ok(SwitchState::On),
            "Off" => Ok(SwitchState::Off),
            _ => Err(Error::Parse(format!("invalid switch state: {}", s))),
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::On => write!(f, "On"),
            SwitchState::Off => write!(f, "Off"),
        }
    }
}

/// Switch rule constraining how many elements may be on at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SwitchRule {
    /// Exactly one switch is on
    OneOfMany,
    /// At most one switch is on
    AtMostOne,
    /// Any number of switches may be on
    AnyOfMany,
}

impl fmt::Display for SwitchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchRule::OneOfMany => write!(f, "OneOfMany"),
            SwitchRule::AtMostOne => write!(f, "AtMostOne"),
            SwitchRule::AnyOfMany => write!(f, "AnyOfMany"),
        }
    }
}

/// A message associated with a device, or site-wide when no device is
/// named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "message")]
pub struct DeviceMessage {
    /// Device name; absent means the message applies to the whole site
    #[serde(rename = "@device", skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Moment the message was generated
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Message text
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Withdraw a property, or a whole device when no property is named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "delProperty")]
pub struct DelProperty {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name; absent drops the whole device
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Moment the deletion was generated
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Commentary
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Ask a device (or every device) to re-declare its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "getProperties")]
pub struct GetProperties {
    /// Protocol version spoken by the sender
    #[serde(rename = "@version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Device name, absent for all devices
    #[serde(rename = "@device", skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Property name, absent for all properties
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_state_wire_folding() {
        assert_eq!(PropertyState::from_wire("Ok"), PropertyState::Ok);
        assert_eq!(PropertyState::from_wire("OK"), PropertyState::Ok);
        assert_eq!(PropertyState::from_wire("idle"), PropertyState::Idle);
        assert_eq!(PropertyState::from_wire("BUSY"), PropertyState::Busy);
        assert_eq!(PropertyState::from_wire("garbage"), PropertyState::Alert);
    }

    #[test]
    fn test_property_state_literals() {
        assert_eq!("Idle".parse::<PropertyState>().unwrap(), PropertyState::Idle);
        assert_eq!("Alert".parse::<PropertyState>().unwrap(), PropertyState::Alert);
        assert!("invalid".parse::<PropertyState>().is_err());
        assert_eq!(PropertyState::Busy.to_string(), "Busy");
    }

    #[test]
    fn test_property_permissions() {
        assert_eq!(PropertyPerm::from_str("ro").unwrap(), PropertyPerm::Ro);
        assert_eq!(PropertyPerm::from_str("wo").unwrap(), PropertyPerm::Wo);
        assert_eq!(PropertyPerm::from_str("rw").unwrap(), PropertyPerm::Rw);
        assert!(PropertyPerm::from_str("invalid").is_err());

        assert!(PropertyPerm::Ro.is_readable());
        assert!(!PropertyPerm::Ro.is_writable());
        assert!(PropertyPerm::Wo.is_writable());
        assert!(PropertyPerm::Rw.is_readable());
    }

    #[test]
    fn test_switch_state() {
        assert_eq!(SwitchState::from_str("On").unwrap(), SwitchState::On);
        assert_eq!(SwitchState::from_str("Off").unwrap(), SwitchState::Off);
        assert!(SwitchState::from_str("Maybe").is_err());
        assert_eq!(SwitchState::On.to_string(), "On");
    }
}
