use super::common::PropertyState;
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Define one member of a light vector. The value is one of the property
/// state literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defLight")]
pub struct DefLight {
    /// Name of this light element
    #[serde(rename = "@name")]
    pub name: String,
    /// GUI label, name is used when absent
    #[serde(rename = "@label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Light state
    #[serde(rename = "$text")]
    pub value: PropertyState,
}

/// Define a property holding one or more light elements.
///
/// Lights carry no perm or timeout on the wire; they are read-only by
/// definition and the store forces `ro`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defLightVector")]
pub struct DefLightVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// GUI label, name is used when absent
    #[serde(rename = "@label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Property group membership, blank by default
    #[serde(rename = "@group", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Current state of the property
    #[serde(rename = "@state")]
    pub state: PropertyState,
    /// Moment when these data were valid
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Commentary
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Light elements
    #[serde(rename = "defLight", default)]
    pub lights: Vec<DefLight>,
}

/// One light element carried by set operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "oneLight")]
pub struct OneLight {
    /// Name of this light element
    #[serde(rename = "@name")]
    pub name: String,
    /// Light state
    #[serde(rename = "$text")]
    pub value: PropertyState,
}

/// Server-originated update to a light vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setLightVector")]
pub struct SetLightVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// Property state, no change if absent
    #[serde(rename = "@state", skip_serializing_if = "Option::is_none")]
    pub state: Option<PropertyState>,
    /// Moment when these data were valid
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Commentary
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Light elements
    #[serde(rename = "oneLight", default)]
    pub lights: Vec<OneLight>,
}
