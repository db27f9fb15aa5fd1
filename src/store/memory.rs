//! In-memory [`Store`] used by tests.
//!
//! Implements the full trait contract, including bounded lists and the
//! change detection of `log_snapshot`, so ingest and command tests can
//! assert end state without a live Redis.

use super::Store;
use crate::config::LogLengths;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    devices: HashSet<String>,
    properties: HashMap<String, HashSet<String>>,
    attributes: HashMap<(String, String), HashMap<String, String>>,
    elements: HashMap<(String, String), HashSet<String>>,
    element_fields: HashMap<(String, String, String), HashMap<String, Vec<u8>>>,
    messages: HashMap<Option<String>, Vec<String>>,
    logs: HashMap<String, Vec<String>>,
    published: Vec<(String, Vec<u8>)>,
    lists: HashMap<String, Vec<String>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
}

/// Trait-complete in-memory store
#[derive(Default)]
pub struct MemoryStore {
    lengths: LogLengths,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Fresh empty store with default log lengths
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads published so far on a channel, as strings
    pub fn published(&self, channel: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, p)| String::from_utf8_lossy(p).to_string())
            .collect()
    }

    /// Entries of a bounded log list, newest first
    pub fn log(&self, key: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .logs
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Message list entries, newest first
    pub fn messages(&self, device: Option<&str>) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .get(&device.map(|d| d.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// One property attribute, if set
    pub fn attribute(&self, device: &str, name: &str, field: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .attributes
            .get(&(device.to_string(), name.to_string()))
            .and_then(|attrs| attrs.get(field).cloned())
    }

    /// One element field, if set
    pub fn element_field(
        &self,
        device: &str,
        name: &str,
        element: &str,
        field: &str,
    ) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .unwrap()
            .element_fields
            .get(&(device.to_string(), name.to_string(), element.to_string()))
            .and_then(|fields| fields.get(field).cloned())
    }

    /// Seed a client-written argument list (indirect command tests)
    pub fn put_list(&self, key: &str, items: &[&str]) {
        self.inner.lock().unwrap().lists.insert(
            key.to_string(),
            items.iter().map(|i| i.to_string()).collect(),
        );
    }

    /// Seed a client-written element hash (indirect command tests)
    pub fn put_hash(&self, key: &str, fields: &[(&str, &[u8])]) {
        self.inner.lock().unwrap().hashes.insert(
            key.to_string(),
            fields
                .iter()
                .map(|(f, v)| (f.to_string(), v.to_vec()))
                .collect(),
        );
    }

    /// True when a client-written key is still present
    pub fn has_scratch_key(&self, key: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.lists.contains_key(key) || inner.hashes.contains_key(key)
    }

    /// True when no device-scoped key of any kind remains
    pub fn device_keys_empty(&self, device: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        !inner.devices.contains(device)
            && !inner.properties.contains_key(device)
            && !inner.attributes.keys().any(|(d, _)| d == device)
            && !inner.elements.keys().any(|(d, _)| d == device)
            && !inner.element_fields.keys().any(|(d, _, _)| d == device)
            && !inner.messages.contains_key(&Some(device.to_string()))
            && !inner
                .logs
                .keys()
                .any(|k| k.ends_with(&format!(":{}", device)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add_device(&self, device: &str) -> Result<()> {
        self.inner.lock().unwrap().devices.insert(device.to_string());
        Ok(())
    }

    async fn devices(&self) -> Result<HashSet<String>> {
        Ok(self.inner.lock().unwrap().devices.clone())
    }

    async fn has_device(&self, device: &str) -> Result<bool> {
        Ok(self.inner.lock().unwrap().devices.contains(device))
    }

    async fn remove_device(&self, device: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.devices.remove(device);
        inner.properties.remove(device);
        inner.messages.remove(&Some(device.to_string()));
        let device_suffix = format!(":{}", device);
        inner.logs.retain(|key, _| !key.ends_with(&device_suffix));
        Ok(())
    }

    async fn add_property(&self, device: &str, name: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .properties
            .entry(device.to_string())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    async fn properties(&self, device: &str) -> Result<HashSet<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .properties
            .get(device)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_property(&self, device: &str, name: &str) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .properties
            .get(device)
            .is_some_and(|props| props.contains(name)))
    }

    async fn remove_property(&self, device: &str, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let key = (device.to_string(), name.to_string());
        inner.attributes.remove(&key);
        inner.elements.remove(&key);
        let now_empty = match inner.properties.get_mut(device) {
            Some(props) => {
                props.remove(name);
                props.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.properties.remove(device);
        }
        inner
            .logs
            .remove(&format!("logdata:{}:{}", name, device));
        Ok(())
    }

    async fn set_attributes(
        &self,
        device: &str,
        name: &str,
        attrs: &[(String, String)],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .attributes
            .entry((device.to_string(), name.to_string()))
            .or_default();
        for (field, value) in attrs {
            entry.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn attributes(&self, device: &str, name: &str) -> Result<HashMap<String, String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .attributes
            .get(&(device.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_attribute(
        &self,
        device: &str,
        name: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        self.set_attributes(device, name, &[(field.to_string(), value.to_string())])
            .await
    }

    async fn add_element(&self, device: &str, name: &str, element: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .elements
            .entry((device.to_string(), name.to_string()))
            .or_default()
            .insert(element.to_string());
        Ok(())
    }

    async fn elements(&self, device: &str, name: &str) -> Result<HashSet<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .elements
            .get(&(device.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_element(
        &self,
        device: &str,
        name: &str,
        element: &str,
        fields: &[(String, Vec<u8>)],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .element_fields
            .entry((device.to_string(), name.to_string(), element.to_string()))
            .or_default();
        for (field, value) in fields {
            entry.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn element(
        &self,
        device: &str,
        name: &str,
        element: &str,
    ) -> Result<HashMap<String, Vec<u8>>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .element_fields
            .get(&(device.to_string(), name.to_string(), element.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_element(&self, device: &str, name: &str, element: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.element_fields.remove(&(
            device.to_string(),
            name.to_string(),
            element.to_string(),
        ));
        if let Some(set) = inner
            .elements
            .get_mut(&(device.to_string(), name.to_string()))
        {
            set.remove(element);
        }
        Ok(())
    }

    async fn append_message<'a>(
        &self,
        device: Option<&'a str>,
        timestamp: &'a str,
        text: &'a str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let list = inner
            .messages
            .entry(device.map(|d| d.to_string()))
            .or_default();
        list.insert(0, format!("{} {}", timestamp, text));
        list.truncate(self.lengths.messages);
        Ok(())
    }

    async fn log_snapshot(
        &self,
        key: &str,
        timestamp: &str,
        json_value: &str,
        max_len: usize,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let list = inner.logs.entry(key.to_string()).or_default();
        if let Some(head) = list.first() {
            if head.split_once(' ').map(|(_, value)| value) == Some(json_value) {
                return Ok(());
            }
        }
        list.insert(0, format!("{} {}", timestamp, json_value));
        list.truncate(max_len);
        Ok(())
    }

    async fn take_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lists
            .remove(key)
            .unwrap_or_default())
    }

    async fn take_hash(&self, key: &str) -> Result<HashMap<String, Vec<u8>>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .hashes
            .remove(key)
            .unwrap_or_default())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .published
            .push((channel.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock().unwrap() = Inner::default();
        Ok(())
    }
}
