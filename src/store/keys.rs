//! Key layout of the gateway keyspace.
//!
//! Every key is the caller-supplied prefix followed by colon-delimited
//! parts. Property- and element-scoped keys put the narrower name first
//! and the device last, so a device suffix scan finds them.

/// Set of device names
pub fn devices(prefix: &str) -> String {
    format!("{}devices", prefix)
}

/// Set of property names for a device
pub fn properties(prefix: &str, device: &str) -> String {
    format!("{}properties:{}", prefix, device)
}

/// Hash of property attributes, including the vector kind tag
pub fn attributes(prefix: &str, name: &str, device: &str) -> String {
    format!("{}attributes:{}:{}", prefix, name, device)
}

/// Set of element names for a property
pub fn elements(prefix: &str, name: &str, device: &str) -> String {
    format!("{}elements:{}:{}", prefix, name, device)
}

/// Hash of element attributes, including the value
pub fn element_attributes(prefix: &str, element: &str, name: &str, device: &str) -> String {
    format!("{}elementattributes:{}:{}:{}", prefix, element, name, device)
}

/// List of site-wide messages
pub fn messages(prefix: &str) -> String {
    format!("{}messages", prefix)
}

/// List of messages for one device
pub fn device_messages(prefix: &str, device: &str) -> String {
    format!("{}devicemessages:{}", prefix, device)
}

/// Bounded change-log list; parts narrow the scope
pub fn logdata(prefix: &str, parts: &[&str]) -> String {
    let mut key = format!("{}logdata", prefix);
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(devices("indi_"), "indi_devices");
        assert_eq!(properties("indi_", "Scope"), "indi_properties:Scope");
        assert_eq!(
            attributes("indi_", "PORT", "Scope"),
            "indi_attributes:PORT:Scope"
        );
        assert_eq!(
            elements("indi_", "PORT", "Scope"),
            "indi_elements:PORT:Scope"
        );
        assert_eq!(
            element_attributes("indi_", "v", "PORT", "Scope"),
            "indi_elementattributes:v:PORT:Scope"
        );
        assert_eq!(messages("indi_"), "indi_messages");
        assert_eq!(
            device_messages("indi_", "Scope"),
            "indi_devicemessages:Scope"
        );
        assert_eq!(logdata("indi_", &[]), "indi_logdata");
        assert_eq!(logdata("indi_", &["devices"]), "indi_logdata:devices");
        assert_eq!(
            logdata("indi_", &["PORT", "Scope"]),
            "indi_logdata:PORT:Scope"
        );
    }

    #[test]
    fn test_empty_prefix() {
        assert_eq!(devices(""), "devices");
        assert_eq!(properties("", "Scope"), "properties:Scope");
    }
}
