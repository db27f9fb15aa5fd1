use super::common::{PropertyPerm, PropertyState};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Define one member of a number vector.
///
/// The value is kept as the raw wire string: numbers may arrive in
/// sexagesimal form (`12:30:00`) which only the formatter interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defNumber")]
pub struct DefNumber {
    /// Name of this number element
    #[serde(rename = "@name")]
    pub name: String,
    /// GUI label, name is used when absent
    #[serde(rename = "@label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// printf-style format for GUI display
    #[serde(rename = "@format")]
    pub format: String,
    /// Minimal value
    #[serde(rename = "@min")]
    pub min: f64,
    /// Maximum value, ignored if min == max
    #[serde(rename = "@max")]
    pub max: f64,
    /// Allowed increments, ignored if 0
    #[serde(rename = "@step")]
    pub step: f64,
    /// Raw value string
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Define a property holding one or more number elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defNumberVector")]
pub struct DefNumberVector {
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
    /// Number elements
    #[serde(rename = "defNumber", default)]
    pub numbers: Vec<DefNumber>,
}

/// One number element carried by new and set operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "oneNumber")]
pub struct OneNumber {
    /// Name of this number element
    #[serde(rename = "@name")]
    pub name: String,
    /// Raw value string
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Server-originated update to a number vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setNumberVector")]
pub struct SetNumberVector {
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
    /// Number elements
    #[serde(rename = "oneNumber", default)]
    pub numbers: Vec<OneNumber>,
}

/// Client command carrying new target values for a number vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "newNumberVector")]
pub struct NewNumberVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// Moment when this command was generated
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Number elements
    #[serde(rename = "oneNumber", default)]
    pub numbers: Vec<OneNumber>,
}
