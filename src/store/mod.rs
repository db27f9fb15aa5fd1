//! The property store.
//!
//! The store maps (device, property, element) to attribute hashes, keeps
//! the membership sets, appends to bounded message and change logs and
//! carries the two pub/sub channels. The [`Store`] trait captures the
//! semantics; [`RedisStore`] is the concrete implementation, and any
//! backend with hash, set, list and pub/sub primitives could stand in.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

pub mod ingest;
pub mod keys;
#[cfg(test)]
pub mod memory;
mod redis;

pub use self::redis::RedisStore;
pub use ingest::Ingest;

/// Abstract store operations used by the ingest and command paths.
///
/// Hash, set and list operations are assumed atomic individually;
/// multi-key property updates are compounded best-effort by the
/// implementation, and a partial failure is repaired by the next ingest
/// from the same source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Add a device to the device set
    async fn add_device(&self, device: &str) -> Result<()>;

    /// All known device names
    async fn devices(&self) -> Result<HashSet<String>>;

    /// Whether the device is known
    async fn has_device(&self, device: &str) -> Result<bool>;

    /// Remove a device from the device set and drop its messages and
    /// device-scoped logs
    async fn remove_device(&self, device: &str) -> Result<()>;

    /// Add a property to a device's property set
    async fn add_property(&self, device: &str, name: &str) -> Result<()>;

    /// Property names of a device
    async fn properties(&self, device: &str) -> Result<HashSet<String>>;

    /// Whether the property is known
    async fn has_property(&self, device: &str, name: &str) -> Result<bool>;

    /// Drop a property's attributes, element set and membership
    async fn remove_property(&self, device: &str, name: &str) -> Result<()>;

    /// Write property attributes (merging into the hash)
    async fn set_attributes(
        &self,
        device: &str,
        name: &str,
        attrs: &[(String, String)],
    ) -> Result<()>;

    /// Read all property attributes
    async fn attributes(&self, device: &str, name: &str) -> Result<HashMap<String, String>>;

    /// Write one property attribute
    async fn set_attribute(&self, device: &str, name: &str, field: &str, value: &str)
        -> Result<()>;

    /// Add an element to a property's element set
    async fn add_element(&self, device: &str, name: &str, element: &str) -> Result<()>;

    /// Element names of a property
    async fn elements(&self, device: &str, name: &str) -> Result<HashSet<String>>;

    /// Write element fields (values are binary-safe)
    async fn set_element(
        &self,
        device: &str,
        name: &str,
        element: &str,
        fields: &[(String, Vec<u8>)],
    ) -> Result<()>;

    /// Read all element fields
    async fn element(
        &self,
        device: &str,
        name: &str,
        element: &str,
    ) -> Result<HashMap<String, Vec<u8>>>;

    /// Drop an element's fields and membership
    async fn remove_element(&self, device: &str, name: &str, element: &str) -> Result<()>;

    /// Prepend `"<timestamp> <text>"` to the site-wide or device message
    /// list, bounded
    async fn append_message<'a>(
        &self,
        device: Option<&'a str>,
        timestamp: &'a str,
        text: &'a str,
    ) -> Result<()>;

    /// Change-detected bounded log: when `json_value` differs from the
    /// head entry's value, prepend `"<timestamp> <json_value>"` and trim
    /// to `max_len`; otherwise do nothing
    async fn log_snapshot(
        &self,
        key: &str,
        timestamp: &str,
        json_value: &str,
        max_len: usize,
    ) -> Result<()>;

    /// Read a whole client-written list and delete it. Used by the
    /// legacy indirect command encoding, where argument lists live
    /// under client-chosen keys.
    async fn take_list(&self, key: &str) -> Result<Vec<String>>;

    /// Read a whole client-written hash and delete it
    async fn take_hash(&self, key: &str) -> Result<HashMap<String, Vec<u8>>>;

    /// Publish a payload on a pub/sub channel
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()>;

    /// Delete every key owned by the gateway keyspace prefix
    async fn clear(&self) -> Result<()>;
}
