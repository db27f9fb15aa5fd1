use super::common::{PropertyPerm, PropertyState, SwitchRule, SwitchState};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Define one member of a switch vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defSwitch")]
pub struct DefSwitch {
    /// Name of this switch element
    #[serde(rename = "@name")]
    pub name: String,
    /// GUI label, name is used when absent
    #[serde(rename = "@label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Switch state
    #[serde(rename = "$text")]
    pub value: SwitchState,
}

/// Define a property holding one or more switch elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defSwitchVector")]
pub struct DefSwitchVector {
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
    /// Hint for GUI presentation
    #[serde(rename = "@rule")]
    pub rule: SwitchRule,
    /// Worst-case time to affect, ignored for read-only properties
    #[serde(rename = "@timeout", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    /// Moment when these data were valid
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Commentary
    #[serde(rename = "@message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Switch elements
    #[serde(rename = "defSwitch", default)]
    pub switches: Vec<DefSwitch>,
}

/// One switch element carried by new and set operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "oneSwitch")]
pub struct OneSwitch {
    /// Name of this switch element
    #[serde(rename = "@name")]
    pub name: String,
    /// Switch state
    #[serde(rename = "$text")]
    pub value: SwitchState,
}

/// Server-originated update to a switch vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setSwitchVector")]
pub struct SetSwitchVector {
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
    /// Switch elements
    #[serde(rename = "oneSwitch", default)]
    pub switches: Vec<OneSwitch>,
}

/// Client command carrying new target values for a switch vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "newSwitchVector")]
pub struct NewSwitchVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// Moment when this command was generated
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Switch elements
    #[serde(rename = "oneSwitch", default)]
    pub switches: Vec<OneSwitch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_def_switch_vector_rule() {
        let vector = DefSwitchVector {
            device: "Scope".to_string(),
            name: "CONNECTION".to_string(),
            label: None,
            group: None,
            state: PropertyState::Idle,
            perm: PropertyPerm::Rw,
            rule: SwitchRule::OneOfMany,
            timeout: None,
            timestamp: None,
            message: None,
            switches: vec![
                DefSwitch {
                    name: "CONNECT".to_string(),
                    label: None,
                    value: SwitchState::Off,
                },
                DefSwitch {
                    name: "DISCONNECT".to_string(),
                    label: None,
                    value: SwitchState::On,
                },
            ],
        };

        assert_eq!(vector.rule, SwitchRule::OneOfMany);
        let on = vector
            .switches
            .iter()
            .filter(|s| s.value == SwitchState::On)
            .count();
        assert_eq!(on, 1);
    }
}
