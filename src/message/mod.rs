//! Typed INDI message model.
//!
//! Every frame travelling through the gateway is one of the variants of
//! [`MessageType`]. The wire form is XML without a document root; each
//! variant (de)serializes through quick-xml with the root tag selecting
//! the variant. Five vector kinds exist, each with its `defXxx`
//! (declare), `setXxx` (server update) and, where writable, `newXxx`
//! (client command) form, plus device messages, deletions,
//! `getProperties` and `enableBLOB`.

use crate::error::{Error, Result};
use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod blob;
pub mod common;
pub mod light;
pub mod number;
pub mod switch;
pub mod text;


pub use blob::{BlobEnable, DefBlob, DefBlobVector, EnableBlob, NewBlobVector, OneBlob, SetBlobVector};
pub use common::{
    DelProperty, DeviceMessage, GetProperties, PropertyPerm, PropertyState, SwitchRule, SwitchState,
};
pub use light::{DefLight, DefLightVector, OneLight, SetLightVector};
pub use number::{DefNumber, DefNumberVector, NewNumberVector, OneNumber, SetNumberVector};
pub use switch::{DefSwitch, DefSwitchVector, NewSwitchVector, OneSwitch, SetSwitchVector};
pub use text::{DefText, DefTextVector, NewTextVector, OneText, SetTextVector};

/// A complete INDI frame of any direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// Ask devices to re-declare their properties
    GetProperties(GetProperties),
    /// Control BLOB traffic on this channel
    #[serde(rename = "enableBLOB")]
    EnableBlob(EnableBlob),
    /// Device or site-wide commentary
    Message(DeviceMessage),
    /// Withdraw a property or device
    DelProperty(DelProperty),
    /// Declare a text vector
    DefTextVector(DefTextVector),
    /// Declare a number vector
    DefNumberVector(DefNumberVector),
    /// Declare a switch vector
    DefSwitchVector(DefSwitchVector),
    /// Declare a light vector
    DefLightVector(DefLightVector),
    /// Declare a BLOB vector
    #[serde(rename = "defBLOBVector")]
    DefBlobVector(DefBlobVector),
    /// Update a text vector
    SetTextVector(SetTextVector),
    /// Update a number vector
    SetNumberVector(SetNumberVector),
    /// Update a switch vector
    SetSwitchVector(SetSwitchVector),
    /// Update a light vector
    SetLightVector(SetLightVector),
    /// Update a BLOB vector
    #[serde(rename = "setBLOBVector")]
    SetBlobVector(SetBlobVector),
    /// Client command with new text values
    NewTextVector(NewTextVector),
    /// Client command with new number values
    NewNumberVector(NewNumberVector),
    /// Client command with new switch values
    NewSwitchVector(NewSwitchVector),
    /// Client command with new BLOB payloads
    #[serde(rename = "newBLOBVector")]
    NewBlobVector(NewBlobVector),
}

impl MessageType {
    /// Serialize to the XML wire form
    pub fn to_xml(&self) -> Result<String> {
        Ok(to_string(self)?)
    }

    /// Parse a frame from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes)?;
        Self::from_str(s)
    }

    /// The wire tag of this frame, used verbatim in ingest alerts
    pub fn tag(&self) -> &'static str {
        match self {
            MessageType::GetProperties(_) => "getProperties",
            MessageType::EnableBlob(_) => "enableBLOB",
            MessageType::Message(_) => "message",
            MessageType::DelProperty(_) => "delProperty",
            MessageType::DefTextVector(_) => "defTextVector",
            MessageType::DefNumberVector(_) => "defNumberVector",
            MessageType::DefSwitchVector(_) => "defSwitchVector",
            MessageType::DefLightVector(_) => "defLightVector",
            MessageType::DefBlobVector(_) => "defBLOBVector",
            MessageType::SetTextVector(_) => "setTextVector",
            MessageType::SetNumberVector(_) => "setNumberVector",
            MessageType::SetSwitchVector(_) => "setSwitchVector",
            MessageType::SetLightVector(_) => "setLightVector",
            MessageType::SetBlobVector(_) => "setBLOBVector",
            MessageType::NewTextVector(_) => "newTextVector",
            MessageType::NewNumberVector(_) => "newNumberVector",
            MessageType::NewSwitchVector(_) => "newSwitchVector",
            MessageType::NewBlobVector(_) => "newBLOBVector",
        }
    }

    /// Device the frame addresses, if it names one
    pub fn device(&self) -> Option<&str> {
        match self {
            MessageType::GetProperties(m) => m.device.as_deref(),
            MessageType::EnableBlob(m) => Some(&m.device),
            MessageType::Message(m) => m.device.as_deref(),
            MessageType::DelProperty(m) => Some(&m.device),
            MessageType::DefTextVector(m) => Some(&m.device),
            MessageType::DefNumberVector(m) => Some(&m.device),
            MessageType::DefSwitchVector(m) => Some(&m.device),
            MessageType::DefLightVector(m) => Some(&m.device),
            MessageType::DefBlobVector(m) => Some(&m.device),
            MessageType::SetTextVector(m) => Some(&m.device),
            MessageType::SetNumberVector(m) => Some(&m.device),
            MessageType::SetSwitchVector(m) => Some(&m.device),
            MessageType::SetLightVector(m) => Some(&m.device),
            MessageType::SetBlobVector(m) => Some(&m.device),
            MessageType::NewTextVector(m) => Some(&m.device),
            MessageType::NewNumberVector(m) => Some(&m.device),
            MessageType::NewSwitchVector(m) => Some(&m.device),
            MessageType::NewBlobVector(m) => Some(&m.device),
        }
    }

    /// Property the frame addresses, if it names one
    pub fn property(&self) -> Option<&str> {
        match self {
            MessageType::GetProperties(m) => m.name.as_deref(),
            MessageType::EnableBlob(m) => m.name.as_deref(),
            MessageType::Message(_) => None,
            MessageType::DelProperty(m) => m.name.as_deref(),
            MessageType::DefTextVector(m) => Some(&m.name),
            MessageType::DefNumberVector(m) => Some(&m.name),
            MessageType::DefSwitchVector(m) => Some(&m.name),
            MessageType::DefLightVector(m) => Some(&m.name),
            MessageType::DefBlobVector(m) => Some(&m.name),
            MessageType::SetTextVector(m) => Some(&m.name),
            MessageType::SetNumberVector(m) => Some(&m.name),
            MessageType::SetSwitchVector(m) => Some(&m.name),
            MessageType::SetLightVector(m) => Some(&m.name),
            MessageType::SetBlobVector(m) => Some(&m.name),
            MessageType::NewTextVector(m) => Some(&m.name),
            MessageType::NewNumberVector(m) => Some(&m.name),
            MessageType::NewSwitchVector(m) => Some(&m.name),
            MessageType::NewBlobVector(m) => Some(&m.name),
        }
    }

    /// True for frames carrying BLOB payloads or declarations
    pub fn is_blob_traffic(&self) -> bool {
        matches!(
            self,
            MessageType::SetBlobVector(_)
                | MessageType::DefBlobVector(_)
                | MessageType::NewBlobVector(_)
        )
    }

    /// True for the client command frames that must set Busy
    pub fn is_new_command(&self) -> bool {
        matches!(
            self,
            MessageType::NewTextVector(_)
                | MessageType::NewNumberVector(_)
                | MessageType::NewSwitchVector(_)
                | MessageType::NewBlobVector(_)
        )
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        from_str(s).map_err(|e| Error::Parse(e.to_string()))
    }
}
