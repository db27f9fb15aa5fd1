use super::common::{PropertyPerm, PropertyState};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Define one member of a text vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defText")]
pub struct DefText {
    /// Name of this text element
    #[serde(rename = "@name")]
    pub name: String,
    /// GUI label, name is used when absent
    #[serde(rename = "@label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Text value
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Define a property holding one or more text elements.
///
/// Attribute order and optionality follow the protocol DTD: device, name
/// and perm are required, everything else is implied with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defTextVector")]
pub struct DefTextVector {
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
    /// Ostensible client controlability
    #[serde(rename = "@perm")]
    pub perm: PropertyPerm,
    /// Worst-case time to affect, ignored for read-only properties
    #[serde(rename = "@timeout", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Moment when these data were valid
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Commentary
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Text elements
    #[serde(rename = "defText", default)]
    pub texts: Vec<DefText>,
}

/// One text element carried by new and set operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "oneText")]
pub struct OneText {
    /// Name of this text element
    #[serde(rename = "@name")]
    pub name: String,
    /// Text value
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Server-originated update to a text vector. Attributes that are absent
/// leave the stored value unchanged; only the named elements mutate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setTextVector")]
pub struct SetTextVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// Property state, no change if absent
    #[serde(rename = "@state", skip_serializing_if = "Option::is_none")]
    pub state: Option<PropertyState>,
    /// Worst-case time to affect a change
    #[serde(rename = "@timeout", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Moment when these data were valid
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Commentary
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Text elements
    #[serde(rename = "oneText", default)]
    pub texts: Vec<OneText>,
}

/// Client command carrying new target values for a text vector.
///
/// After sending this the client must consider the property Busy until
/// the device confirms with a set or def.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "newTextVector")]
pub struct NewTextVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// Moment when this command was generated
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Text elements
    #[serde(rename = "oneText", default)]
    pub texts: Vec<OneText>,
}
