use super::common::{PropertyPerm, PropertyState};
use crate::error::Result;
use crate::timestamp::Timestamp;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BLOB transfer policy literal carried by `enableBLOB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BlobEnable {
    /// Never send BLOB data
    Never,
    /// Send BLOB data along with other traffic
    Also,
    /// Send only BLOB data
    Only,
}

impl FromStr for BlobEnable {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Never" => Ok(BlobEnable::Never),
            "Also" => Ok(BlobEnable::Also),
            "Only" => Ok(BlobEnable::Only),
            _ => Err(crate::error::Error::Parse(format!(
                "invalid enableBLOB value: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for BlobEnable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobEnable::Never => write!(f, "Never"),
            BlobEnable::Also => write!(f, "Also"),
            BlobEnable::Only => write!(f, "Only"),
        }
    }
}

/// Client command controlling whether a device (or one property of it)
/// may send BLOB traffic on this channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "enableBLOB")]
pub struct EnableBlob {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name, absent for all properties of the device
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Policy literal
    #[serde(rename = "$text")]
    pub value: BlobEnable,
}

/// Define one member of a BLOB vector. Definitions carry no payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defBLOB")]
pub struct DefBlob {
    /// Name of this BLOB element
    #[serde(rename = "@name")]
    pub name: String,
    /// GUI label, name is used when absent
    #[serde(rename = "@label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Define a property holding one or more BLOB elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "defBLOBVector")]
pub struct DefBlobVector {
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
    /// BLOB elements
    #[serde(rename = "defBLOB", default)]
    pub blobs: Vec<DefBlob>,
}

/// One BLOB element carried by new and set operations.
///
/// `data` is the base64 wire text; the decoded bytes exist only in the
/// store and on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "oneBLOB")]
pub struct OneBlob {
    /// Name of this BLOB element
    #[serde(rename = "@name")]
    pub name: String,
    /// Number of bytes in the decoded and uncompressed payload
    #[serde(rename = "@size")]
    pub size: usize,
    /// Format as a file suffix, e.g. `.fits`, `.fits.z`
    #[serde(rename = "@format")]
    pub format: String,
    /// Payload encoded in base64
    #[serde(rename = "$text", default)]
    pub data: String,
}

impl OneBlob {
    /// Decode the base64 wire text to the raw payload
    pub fn decode(&self) -> Result<Vec<u8>> {
        // drivers wrap base64 bodies in whitespace
        let compact: String = self.data.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(BASE64.decode(compact.as_bytes())?)
    }

    /// Build an element from raw bytes, encoding the payload
    pub fn encode(name: impl Into<String>, format: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            name: name.into(),
            size: payload.len(),
            format: format.into(),
            data: BASE64.encode(payload),
        }
    }
}

/// Server-originated update carrying BLOB payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setBLOBVector")]
pub struct SetBlobVector {
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
    /// BLOB elements
    #[serde(rename = "oneBLOB", default)]
    pub blobs: Vec<OneBlob>,
}

/// Client command sending BLOB payloads toward a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "newBLOBVector")]
pub struct NewBlobVector {
    /// Device name
    #[serde(rename = "@device")]
    pub device: String,
    /// Property name
    #[serde(rename = "@name")]
    pub name: String,
    /// Moment when this command was generated
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// BLOB elements
    #[serde(rename = "oneBLOB", default)]
    pub blobs: Vec<OneBlob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_blob_roundtrip() {
        let payload = b"simulated fits data";
        let blob = OneBlob::encode("image", ".fits", payload);
        assert_eq!(blob.size, payload.len());
        assert_eq!(blob.decode().unwrap(), payload);
    }

    #[test]
    fn test_one_blob_decode_ignores_whitespace() {
        let mut blob = OneBlob::encode("image", ".fits", b"0123456789");
        blob.data = format!("\n  {}\n", blob.data);
        assert_eq!(blob.decode().unwrap(), b"0123456789");
    }

    #[test]
    fn test_blob_enable_literals() {
        assert_eq!("Never".parse::<BlobEnable>().unwrap(), BlobEnable::Never);
        assert_eq!("Also".parse::<BlobEnable>().unwrap(), BlobEnable::Also);
        assert_eq!("Only".parse::<BlobEnable>().unwrap(), BlobEnable::Only);
        assert!("Sometimes".parse::<BlobEnable>().is_err());
    }
}
