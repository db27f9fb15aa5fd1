//! Application of parsed frames to the store.
//!
//! One [`Ingest`] sits on the receiving side of every bridge pipeline.
//! It installs `defXxxVector` frames, merges `setXxxVector` frames into
//! existing properties, appends messages, cascades deletions, feeds the
//! bounded change logs and publishes one alert per accepted frame on
//! the `from-indi` channel. The alert is published only after the store
//! mutation that caused it.

use crate::blob::BlobSink;
use crate::config::LogLengths;
use crate::error::Result;
use crate::format;
use crate::message::{
    DefBlobVector, DefLightVector, DefNumberVector, DefSwitchVector, DefTextVector, DelProperty,
    DeviceMessage, MessageType, PropertyState, SetBlobVector, SetLightVector, SetNumberVector,
    SetSwitchVector, SetTextVector,
};
use crate::sort;
use crate::store::{keys, Store};
use crate::timestamp::Timestamp;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Wire value of the `vector` attribute per kind, read back by clients
/// to know how to interpret the element hashes.
mod kind {
    pub const TEXT: &str = "TextVector";
    pub const NUMBER: &str = "NumberVector";
    pub const SWITCH: &str = "SwitchVector";
    pub const LIGHT: &str = "LightVector";
    pub const BLOB: &str = "BLOBVector";
}

/// One element write: membership name, display label and field values
struct ElementWrite {
    name: String,
    label: String,
    fields: Vec<(String, Vec<u8>)>,
}

/// Frame-to-store application engine for one pipeline
pub struct Ingest<S> {
    store: S,
    prefix: String,
    alert_channel: String,
    lengths: LogLengths,
    sink: Option<BlobSink>,
}

impl<S: Store> Ingest<S> {
    /// Build an ingest engine over a store. `prefix` must match the
    /// store's keyspace prefix; alerts go out on `alert_channel`.
    pub fn new(
        store: S,
        prefix: impl Into<String>,
        alert_channel: impl Into<String>,
        lengths: LogLengths,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            alert_channel: alert_channel.into(),
            lengths,
            sink: None,
        }
    }

    /// Attach a BLOB sink; accepted payloads are persisted through it
    pub fn with_blob_sink(mut self, sink: BlobSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back
    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply one frame. Returns the device name for `def` frames so a
    /// driver supervisor can learn which devices sit behind its pipe;
    /// all other frames return `None`. Client-direction frames are not
    /// store traffic and are ignored here.
    pub async fn apply(&self, frame: &MessageType) -> Result<Option<String>> {
        match frame {
            MessageType::DefTextVector(v) => self.def_text(v).await,
            MessageType::DefNumberVector(v) => self.def_number(v).await,
            MessageType::DefSwitchVector(v) => self.def_switch(v).await,
            MessageType::DefLightVector(v) => self.def_light(v).await,
            MessageType::DefBlobVector(v) => self.def_blob(v).await,
            MessageType::SetTextVector(v) => self.set_text(v).await,
            MessageType::SetNumberVector(v) => self.set_number(v).await,
            MessageType::SetSwitchVector(v) => self.set_switch(v).await,
            MessageType::SetLightVector(v) => self.set_light(v).await,
            MessageType::SetBlobVector(v) => self.set_blob(v).await,
            MessageType::Message(m) => self.message(m).await,
            MessageType::DelProperty(d) => self.del_property(d).await,
            MessageType::GetProperties(_)
            | MessageType::EnableBlob(_)
            | MessageType::NewTextVector(_)
            | MessageType::NewNumberVector(_)
            | MessageType::NewSwitchVector(_)
            | MessageType::NewBlobVector(_) => Ok(None),
        }
    }

    async fn def_text(&self, v: &DefTextVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        let attrs = def_attrs(
            &v.device,
            &v.name,
            v.label.as_deref(),
            v.group.as_deref(),
            v.state,
            &v.perm.to_string(),
            v.timeout,
            &ts,
            v.message.as_deref(),
            kind::TEXT,
        );
        let mut snapshot = BTreeMap::new();
        let elements = v
            .texts
            .iter()
            .map(|e| {
                snapshot.insert(e.name.clone(), e.value.trim().to_string());
                ElementWrite {
                    name: e.name.clone(),
                    label: e.label.clone().unwrap_or_else(|| e.name.clone()),
                    fields: vec![
                        text_field("name", &e.name),
                        text_field("label", e.label.as_deref().unwrap_or(&e.name)),
                        text_field("value", e.value.trim()),
                    ],
                }
            })
            .collect();
        let log = vector_snapshot(Some(v.state), v.timeout, v.message.as_deref(), &snapshot);
        self.install(v, "defTextVector", &attrs, elements, log, self.lengths.textvector, &ts)
            .await
    }

    async fn def_number(&self, v: &DefNumberVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        let attrs = def_attrs(
            &v.device,
            &v.name,
            v.label.as_deref(),
            v.group.as_deref(),
            v.state,
            &v.perm.to_string(),
            v.timeout,
            &ts,
            v.message.as_deref(),
            kind::NUMBER,
        );
        let mut snapshot = BTreeMap::new();
        let elements = v
            .numbers
            .iter()
            .map(|e| {
                let raw = e.value.trim();
                let formatted = formatted_or_raw(&e.format, raw);
                snapshot.insert(e.name.clone(), formatted.clone());
                ElementWrite {
                    name: e.name.clone(),
                    label: e.label.clone().unwrap_or_else(|| e.name.clone()),
                    fields: vec![
                        text_field("name", &e.name),
                        text_field("label", e.label.as_deref().unwrap_or(&e.name)),
                        text_field("format", &e.format),
                        text_field("min", &e.min.to_string()),
                        text_field("max", &e.max.to_string()),
                        text_field("step", &e.step.to_string()),
                        text_field("value", raw),
                        text_field("formatted_number", &formatted),
                    ],
                }
            })
            .collect();
        let log = vector_snapshot(Some(v.state), v.timeout, v.message.as_deref(), &snapshot);
        self.install(v, "defNumberVector", &attrs, elements, log, self.lengths.numbervector, &ts)
            .await
    }

    async fn def_switch(&self, v: &DefSwitchVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        let mut attrs = def_attrs(
            &v.device,
            &v.name,
            v.label.as_deref(),
            v.group.as_deref(),
            v.state,
            &v.perm.to_string(),
            v.timeout,
            &ts,
            v.message.as_deref(),
            kind::SWITCH,
        );
        attrs.push(("rule".to_string(), v.rule.to_string()));
        let mut snapshot = BTreeMap::new();
        let elements = v
            .switches
            .iter()
            .map(|e| {
                snapshot.insert(e.name.clone(), e.value.to_string());
                ElementWrite {
                    name: e.name.clone(),
                    label: e.label.clone().unwrap_or_else(|| e.name.clone()),
                    fields: vec![
                        text_field("name", &e.name),
                        text_field("label", e.label.as_deref().unwrap_or(&e.name)),
                        text_field("value", &e.value.to_string()),
                    ],
                }
            })
            .collect();
        let log = vector_snapshot(Some(v.state), v.timeout, v.message.as_deref(), &snapshot);
        self.install(v, "defSwitchVector", &attrs, elements, log, self.lengths.switchvector, &ts)
            .await
    }

    async fn def_light(&self, v: &DefLightVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        // lights are read-only by definition and carry no timeout
        let attrs = def_attrs(
            &v.device,
            &v.name,
            v.label.as_deref(),
            v.group.as_deref(),
            v.state,
            "ro",
            None,
            &ts,
            v.message.as_deref(),
            kind::LIGHT,
        );
        let mut snapshot = BTreeMap::new();
        let elements = v
            .lights
            .iter()
            .map(|e| {
                snapshot.insert(e.name.clone(), e.value.to_string());
                ElementWrite {
                    name: e.name.clone(),
                    label: e.label.clone().unwrap_or_else(|| e.name.clone()),
                    fields: vec![
                        text_field("name", &e.name),
                        text_field("label", e.label.as_deref().unwrap_or(&e.name)),
                        text_field("value", &e.value.to_string()),
                    ],
                }
            })
            .collect();
        let log = vector_snapshot(Some(v.state), None, v.message.as_deref(), &snapshot);
        self.install(v, "defLightVector", &attrs, elements, log, self.lengths.lightvector, &ts)
            .await
    }

    async fn def_blob(&self, v: &DefBlobVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        let attrs = def_attrs(
            &v.device,
            &v.name,
            v.label.as_deref(),
            v.group.as_deref(),
            v.state,
            &v.perm.to_string(),
            v.timeout,
            &ts,
            v.message.as_deref(),
            kind::BLOB,
        );
        let mut snapshot = BTreeMap::new();
        let elements = v
            .blobs
            .iter()
            .map(|e| {
                snapshot.insert(e.name.clone(), String::new());
                ElementWrite {
                    name: e.name.clone(),
                    label: e.label.clone().unwrap_or_else(|| e.name.clone()),
                    fields: vec![
                        text_field("name", &e.name),
                        text_field("label", e.label.as_deref().unwrap_or(&e.name)),
                        text_field("value", ""),
                        text_field("size", ""),
                        text_field("format", ""),
                    ],
                }
            })
            .collect();
        let log = vector_snapshot(Some(v.state), v.timeout, v.message.as_deref(), &snapshot);
        self.install(v, "defBLOBVector", &attrs, elements, log, self.lengths.blobvector, &ts)
            .await
    }

    /// Shared install path for every `def` kind: membership, attribute
    /// hash, element replacement, change logs, alert.
    #[allow(clippy::too_many_arguments)]
    async fn install(
        &self,
        frame: &impl HasAddress,
        tag: &str,
        attrs: &[(String, String)],
        elements: Vec<ElementWrite>,
        vector_log: String,
        vector_log_len: usize,
        ts: &str,
    ) -> Result<Option<String>> {
        let (device, name) = (frame.device(), frame.name());

        self.store.add_device(device).await?;
        self.store.add_property(device, name).await?;
        self.store.set_attributes(device, name, attrs).await?;

        // a redefinition replaces the element set; orphans are deleted
        let old = self.store.elements(device, name).await?;
        let new_names: HashSet<String> = elements.iter().map(|e| e.name.clone()).collect();
        for orphan in old.difference(&new_names) {
            self.store.remove_element(device, name, orphan).await?;
        }

        // write elements in display order, label-sorted
        let pairs = elements
            .iter()
            .map(|e| (e.name.clone(), e.label.clone()))
            .collect();
        let ordered = sort::names_by_label(pairs);
        for element_name in &ordered {
            if let Some(write) = elements.iter().find(|e| &e.name == element_name) {
                self.store.add_element(device, name, &write.name).await?;
                self.store
                    .set_element(device, name, &write.name, &write.fields)
                    .await?;
            }
        }

        self.snapshot_devices(ts).await?;
        self.snapshot_properties(device, ts).await?;
        self.snapshot_elements(device, name, ts).await?;
        self.snapshot_attributes(device, name, attrs, ts).await?;
        self.store
            .log_snapshot(
                &keys::logdata(&self.prefix, &[name, device]),
                ts,
                &vector_log,
                vector_log_len,
            )
            .await?;

        self.publish_alert(&format!("{}:{}:{}", tag, name, device))
            .await?;
        Ok(Some(device.to_string()))
    }

    async fn set_text(&self, v: &SetTextVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        if !self.known(&v.device, &v.name).await? {
            return Ok(None);
        }
        let existing = self.store.elements(&v.device, &v.name).await?;
        let mut snapshot = BTreeMap::new();
        for one in &v.texts {
            if !existing.contains(&one.name) {
                debug!(device = %v.device, property = %v.name, element = %one.name, "set names unknown element, skipped");
                continue;
            }
            let value = one.value.trim();
            self.store
                .set_element(&v.device, &v.name, &one.name, &[text_field("value", value)])
                .await?;
            snapshot.insert(one.name.clone(), value.to_string());
        }
        let log = vector_snapshot(v.state, v.timeout, v.message.as_deref(), &snapshot);
        self.finish_update(
            &v.device,
            &v.name,
            "setTextVector",
            v.state,
            v.timeout,
            &ts,
            v.message.as_deref(),
            log,
            self.lengths.textvector,
        )
        .await
    }

    async fn set_number(&self, v: &SetNumberVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        if !self.known(&v.device, &v.name).await? {
            return Ok(None);
        }
        let existing = self.store.elements(&v.device, &v.name).await?;
        let mut snapshot = BTreeMap::new();
        for one in &v.numbers {
            if !existing.contains(&one.name) {
                debug!(device = %v.device, property = %v.name, element = %one.name, "set names unknown element, skipped");
                continue;
            }
            let raw = one.value.trim();
            // the element's format attribute drives the rendered copy
            let fields = self.store.element(&v.device, &v.name, &one.name).await?;
            let element_format = fields
                .get("format")
                .map(|f| String::from_utf8_lossy(f).to_string())
                .unwrap_or_default();
            let formatted = formatted_or_raw(&element_format, raw);
            self.store
                .set_element(
                    &v.device,
                    &v.name,
                    &one.name,
                    &[
                        text_field("value", raw),
                        text_field("formatted_number", &formatted),
                    ],
                )
                .await?;
            snapshot.insert(one.name.clone(), formatted);
        }
        let log = vector_snapshot(v.state, v.timeout, v.message.as_deref(), &snapshot);
        self.finish_update(
            &v.device,
            &v.name,
            "setNumberVector",
            v.state,
            v.timeout,
            &ts,
            v.message.as_deref(),
            log,
            self.lengths.numbervector,
        )
        .await
    }

    async fn set_switch(&self, v: &SetSwitchVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        if !self.known(&v.device, &v.name).await? {
            return Ok(None);
        }
        let existing = self.store.elements(&v.device, &v.name).await?;
        let mut snapshot = BTreeMap::new();
        for one in &v.switches {
            if !existing.contains(&one.name) {
                debug!(device = %v.device, property = %v.name, element = %one.name, "set names unknown element, skipped");
                continue;
            }
            let value = one.value.to_string();
            self.store
                .set_element(&v.device, &v.name, &one.name, &[text_field("value", &value)])
                .await?;
            snapshot.insert(one.name.clone(), value);
        }
        let log = vector_snapshot(v.state, v.timeout, v.message.as_deref(), &snapshot);
        self.finish_update(
            &v.device,
            &v.name,
            "setSwitchVector",
            v.state,
            v.timeout,
            &ts,
            v.message.as_deref(),
            log,
            self.lengths.switchvector,
        )
        .await
    }

    async fn set_light(&self, v: &SetLightVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        if !self.known(&v.device, &v.name).await? {
            return Ok(None);
        }
        let existing = self.store.elements(&v.device, &v.name).await?;
        let mut snapshot = BTreeMap::new();
        for one in &v.lights {
            if !existing.contains(&one.name) {
                debug!(device = %v.device, property = %v.name, element = %one.name, "set names unknown element, skipped");
                continue;
            }
            let value = one.value.to_string();
            self.store
                .set_element(&v.device, &v.name, &one.name, &[text_field("value", &value)])
                .await?;
            snapshot.insert(one.name.clone(), value);
        }
        let log = vector_snapshot(v.state, None, v.message.as_deref(), &snapshot);
        self.finish_update(
            &v.device,
            &v.name,
            "setLightVector",
            v.state,
            None,
            &ts,
            v.message.as_deref(),
            log,
            self.lengths.lightvector,
        )
        .await
    }

    async fn set_blob(&self, v: &SetBlobVector) -> Result<Option<String>> {
        let ts = ts_or_now(&v.timestamp);
        if !self.known(&v.device, &v.name).await? {
            return Ok(None);
        }
        let existing = self.store.elements(&v.device, &v.name).await?;
        let mut snapshot = BTreeMap::new();
        for one in &v.blobs {
            if !existing.contains(&one.name) {
                debug!(device = %v.device, property = %v.name, element = %one.name, "set names unknown element, skipped");
                continue;
            }
            let payload = match one.decode() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(device = %v.device, property = %v.name, element = %one.name, error = %e, "undecodable BLOB payload, skipped");
                    continue;
                }
            };
            let mut file_name = String::new();
            if let Some(sink) = &self.sink {
                if let Some(written) = sink
                    .write(&v.device, &v.name, &one.name, &ts, &one.format, &payload)
                    .await
                {
                    file_name = written;
                }
            }
            self.store
                .set_element(
                    &v.device,
                    &v.name,
                    &one.name,
                    &[
                        ("value".to_string(), payload),
                        text_field("size", &one.size.to_string()),
                        text_field("format", &one.format),
                        text_field("filepath", &file_name),
                    ],
                )
                .await?;
            let logged = if file_name.is_empty() {
                format!("{} bytes", one.size)
            } else {
                file_name
            };
            snapshot.insert(one.name.clone(), logged);
        }
        let log = vector_snapshot(v.state, v.timeout, v.message.as_deref(), &snapshot);
        self.finish_update(
            &v.device,
            &v.name,
            "setBLOBVector",
            v.state,
            v.timeout,
            &ts,
            v.message.as_deref(),
            log,
            self.lengths.blobvector,
        )
        .await
    }

    /// Shared tail of every `set` kind: attribute merge, logs, alert
    #[allow(clippy::too_many_arguments)]
    async fn finish_update(
        &self,
        device: &str,
        name: &str,
        tag: &str,
        state: Option<PropertyState>,
        timeout: Option<f64>,
        ts: &str,
        message: Option<&str>,
        vector_log: String,
        vector_log_len: usize,
    ) -> Result<Option<String>> {
        // only the attributes present in the frame mutate
        let mut attrs = vec![text_pair("timestamp", ts)];
        if let Some(state) = state {
            attrs.push(text_pair("state", &state.to_string()));
        }
        if let Some(timeout) = timeout {
            attrs.push(text_pair("timeout", &timeout.to_string()));
        }
        if let Some(message) = message {
            attrs.push(text_pair("message", message));
        }
        self.store.set_attributes(device, name, &attrs).await?;

        self.snapshot_attributes(device, name, &attrs, ts).await?;
        self.store
            .log_snapshot(
                &keys::logdata(&self.prefix, &[name, device]),
                ts,
                &vector_log,
                vector_log_len,
            )
            .await?;

        self.publish_alert(&format!("{}:{}:{}", tag, name, device))
            .await?;
        Ok(None)
    }

    async fn message(&self, m: &DeviceMessage) -> Result<Option<String>> {
        let ts = ts_or_now(&m.timestamp);
        if let Some(text) = m.message.as_deref().filter(|t| !t.is_empty()) {
            self.store
                .append_message(m.device.as_deref(), &ts, text)
                .await?;
        }
        let alert = match &m.device {
            Some(device) => format!("message:{}", device),
            None => "message".to_string(),
        };
        self.publish_alert(&alert).await?;
        Ok(None)
    }

    async fn del_property(&self, d: &DelProperty) -> Result<Option<String>> {
        let ts = ts_or_now(&d.timestamp);
        match &d.name {
            Some(name) => {
                for element in self.store.elements(&d.device, name).await? {
                    self.store.remove_element(&d.device, name, &element).await?;
                }
                self.store.remove_property(&d.device, name).await?;
                let text = d.message.clone().unwrap_or_else(|| {
                    format!("Property {} deleted from device {}", name, d.device)
                });
                self.store
                    .append_message(Some(&d.device), &ts, &text)
                    .await?;
                self.snapshot_properties(&d.device, &ts).await?;
                self.publish_alert(&format!("delProperty:{}:{}", name, d.device))
                    .await?;
            }
            None => {
                for property in self.store.properties(&d.device).await? {
                    for element in self.store.elements(&d.device, &property).await? {
                        self.store
                            .remove_element(&d.device, &property, &element)
                            .await?;
                    }
                    self.store.remove_property(&d.device, &property).await?;
                }
                self.store.remove_device(&d.device).await?;
                let text = d
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} deleted", d.device));
                self.store.append_message(None, &ts, &text).await?;
                self.snapshot_devices(&ts).await?;
                self.publish_alert(&format!("delDevice:{}", d.device)).await?;
            }
        }
        Ok(None)
    }

    /// A `set` naming an unknown device or property is legal during the
    /// handshake and is dropped without an alert.
    async fn known(&self, device: &str, name: &str) -> Result<bool> {
        if !self.store.has_device(device).await? || !self.store.has_property(device, name).await? {
            debug!(device, property = name, "set for unknown property dropped");
            return Ok(false);
        }
        Ok(true)
    }

    async fn publish_alert(&self, alert: &str) -> Result<()> {
        self.store
            .publish(&self.alert_channel, alert.as_bytes())
            .await
    }

    async fn snapshot_devices(&self, ts: &str) -> Result<()> {
        let mut devices: Vec<String> = self.store.devices().await?.into_iter().collect();
        devices.sort();
        self.store
            .log_snapshot(
                &keys::logdata(&self.prefix, &["devices"]),
                ts,
                &json!(devices).to_string(),
                self.lengths.devices,
            )
            .await
    }

    async fn snapshot_properties(&self, device: &str, ts: &str) -> Result<()> {
        let mut properties: Vec<String> = self.store.properties(device).await?.into_iter().collect();
        properties.sort();
        self.store
            .log_snapshot(
                &keys::logdata(&self.prefix, &["properties", device]),
                ts,
                &json!(properties).to_string(),
                self.lengths.properties,
            )
            .await
    }

    async fn snapshot_elements(&self, device: &str, name: &str, ts: &str) -> Result<()> {
        let mut elements: Vec<String> = self
            .store
            .elements(device, name)
            .await?
            .into_iter()
            .collect();
        elements.sort();
        self.store
            .log_snapshot(
                &keys::logdata(&self.prefix, &["elements", name, device]),
                ts,
                &json!(elements).to_string(),
                self.lengths.elements,
            )
            .await
    }

    async fn snapshot_attributes(
        &self,
        device: &str,
        name: &str,
        attrs: &[(String, String)],
        ts: &str,
    ) -> Result<()> {
        // the timestamp is the log entry's own prefix; keeping it inside
        // the compared value would defeat change detection
        let map: BTreeMap<&str, &str> = attrs
            .iter()
            .filter(|(field, _)| field != "timestamp")
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect();
        self.store
            .log_snapshot(
                &keys::logdata(&self.prefix, &["attributes", name, device]),
                ts,
                &json!(map).to_string(),
                self.lengths.attributes,
            )
            .await
    }
}

/// The def/set structs all expose device and property name; this keeps
/// `install` generic without a full vector trait.
trait HasAddress {
    fn device(&self) -> &str;
    fn name(&self) -> &str;
}

macro_rules! has_address {
    ($($ty:ty),*) => {
        $(impl HasAddress for $ty {
            fn device(&self) -> &str {
                &self.device
            }
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

has_address!(DefTextVector, DefNumberVector, DefSwitchVector, DefLightVector, DefBlobVector);

fn ts_or_now(ts: &Option<Timestamp>) -> String {
    ts.as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| Timestamp::now().to_string())
}

fn text_field(field: &str, value: &str) -> (String, Vec<u8>) {
    (field.to_string(), value.as_bytes().to_vec())
}

fn text_pair(field: &str, value: &str) -> (String, String) {
    (field.to_string(), value.to_string())
}

fn formatted_or_raw(format: &str, raw: &str) -> String {
    format::format_number(format, raw).unwrap_or_else(|_| raw.to_string())
}

#[allow(clippy::too_many_arguments)]
fn def_attrs(
    device: &str,
    name: &str,
    label: Option<&str>,
    group: Option<&str>,
    state: PropertyState,
    perm: &str,
    timeout: Option<f64>,
    ts: &str,
    message: Option<&str>,
    kind: &str,
) -> Vec<(String, String)> {
    vec![
        text_pair("device", device),
        text_pair("name", name),
        text_pair("label", label.unwrap_or(name)),
        text_pair("group", group.unwrap_or("")),
        text_pair("state", &state.to_string()),
        text_pair("perm", perm),
        text_pair("timeout", &timeout.map(|t| t.to_string()).unwrap_or_else(|| "0".to_string())),
        text_pair("timestamp", ts),
        text_pair("message", message.unwrap_or("")),
        text_pair("vector", kind),
    ]
}

/// Snapshot of a vector for the change log. The frame timestamp is
/// deliberately not part of the compared value, it prefixes the log
/// entry instead.
fn vector_snapshot(
    state: Option<PropertyState>,
    timeout: Option<f64>,
    message: Option<&str>,
    elements: &BTreeMap<String, String>,
) -> String {
    json!({
        "state": state.map(|s| s.to_string()).unwrap_or_default(),
        "timeout": timeout.map(|t| t.to_string()).unwrap_or_default(),
        "message": message.unwrap_or(""),
        "elements": elements,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::str::FromStr;

    const CHANNEL: &str = "from_indi";

    fn ingest(store: MemoryStore) -> Ingest<MemoryStore> {
        Ingest::new(store, "", CHANNEL, LogLengths::default())
    }

    fn frame(xml: &str) -> MessageType {
        MessageType::from_str(xml).unwrap()
    }

    const DEF_PORT: &str = r#"<defTextVector device="Scope" name="PORT" state="Ok" perm="rw" timestamp="2025-01-01T00:00:00"><defText name="v" label="Port">/dev/ttyUSB0</defText></defTextVector>"#;

    #[tokio::test]
    async fn test_def_text_vector_installs_property() {
        let ingest = ingest(MemoryStore::new());
        let defined = ingest.apply(&frame(DEF_PORT)).await.unwrap();
        assert_eq!(defined.as_deref(), Some("Scope"));

        let store = ingest.store();
        assert!(store.has_device("Scope").await.unwrap());
        assert!(store.has_property("Scope", "PORT").await.unwrap());
        assert_eq!(
            store.element_field("Scope", "PORT", "v", "value").unwrap(),
            b"/dev/ttyUSB0"
        );
        assert_eq!(store.attribute("Scope", "PORT", "state").unwrap(), "Ok");
        assert_eq!(store.attribute("Scope", "PORT", "perm").unwrap(), "rw");
        assert_eq!(
            store.attribute("Scope", "PORT", "vector").unwrap(),
            "TextVector"
        );
        assert_eq!(
            store.published(CHANNEL),
            vec!["defTextVector:PORT:Scope".to_string()]
        );
    }

    #[tokio::test]
    async fn test_set_text_vector_updates_value_and_state() {
        let ingest = ingest(MemoryStore::new());
        ingest.apply(&frame(DEF_PORT)).await.unwrap();

        let set = r#"<setTextVector device="Scope" name="PORT" state="Busy" timestamp="2025-01-01T00:00:01"><oneText name="v">/dev/ttyUSB1</oneText></setTextVector>"#;
        ingest.apply(&frame(set)).await.unwrap();

        let store = ingest.store();
        assert_eq!(
            store.element_field("Scope", "PORT", "v", "value").unwrap(),
            b"/dev/ttyUSB1"
        );
        assert_eq!(store.attribute("Scope", "PORT", "state").unwrap(), "Busy");
        // perm was not in the set frame and is untouched
        assert_eq!(store.attribute("Scope", "PORT", "perm").unwrap(), "rw");
        assert_eq!(
            store.published(CHANNEL).last().unwrap(),
            "setTextVector:PORT:Scope"
        );
    }

    #[tokio::test]
    async fn test_set_for_unknown_property_is_silently_dropped() {
        let ingest = ingest(MemoryStore::new());
        let set = r#"<setTextVector device="Ghost" name="PORT"><oneText name="v">x</oneText></setTextVector>"#;
        assert!(ingest.apply(&frame(set)).await.unwrap().is_none());
        // no store change, no alert
        assert!(!ingest.store().has_device("Ghost").await.unwrap());
        assert!(ingest.store().published(CHANNEL).is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_def_produces_no_spurious_log_entries() {
        let ingest = ingest(MemoryStore::new());
        ingest.apply(&frame(DEF_PORT)).await.unwrap();
        let devices_log = ingest.store().log("logdata:devices");
        let vector_log = ingest.store().log("logdata:PORT:Scope");

        ingest.apply(&frame(DEF_PORT)).await.unwrap();
        assert_eq!(ingest.store().log("logdata:devices"), devices_log);
        assert_eq!(ingest.store().log("logdata:PORT:Scope"), vector_log);
        assert_eq!(vector_log.len(), 1);
    }

    #[tokio::test]
    async fn test_redefinition_replaces_element_set() {
        let ingest = ingest(MemoryStore::new());
        ingest.apply(&frame(DEF_PORT)).await.unwrap();

        let redef = r#"<defTextVector device="Scope" name="PORT" state="Ok" perm="rw"><defText name="w" label="Other">x</defText></defTextVector>"#;
        ingest.apply(&frame(redef)).await.unwrap();

        let store = ingest.store();
        let elements = store.elements("Scope", "PORT").await.unwrap();
        assert!(elements.contains("w"));
        assert!(!elements.contains("v"));
        assert!(store.element_field("Scope", "PORT", "v", "value").is_none());
    }

    #[tokio::test]
    async fn test_set_names_unknown_element_skipped() {
        let ingest = ingest(MemoryStore::new());
        ingest.apply(&frame(DEF_PORT)).await.unwrap();
        let set = r#"<setTextVector device="Scope" name="PORT"><oneText name="nope">x</oneText></setTextVector>"#;
        ingest.apply(&frame(set)).await.unwrap();
        assert!(ingest
            .store()
            .element_field("Scope", "PORT", "nope", "value")
            .is_none());
        // the update itself still lands (timestamp merge + alert)
        assert_eq!(
            ingest.store().published(CHANNEL).last().unwrap(),
            "setTextVector:PORT:Scope"
        );
    }

    #[tokio::test]
    async fn test_number_formatting_is_stored() {
        let ingest = ingest(MemoryStore::new());
        let def = r#"<defNumberVector device="Scope" name="COORD" state="Idle" perm="rw"><defNumber name="RA" format="%9.6m" min="0" max="24" step="0">10:70:75</defNumber></defNumberVector>"#;
        ingest.apply(&frame(def)).await.unwrap();
        assert_eq!(
            ingest
                .store()
                .element_field("Scope", "COORD", "RA", "formatted_number")
                .unwrap(),
            b" 11:11:15"
        );

        let set = r#"<setNumberVector device="Scope" name="COORD"><oneNumber name="RA">12:30:00</oneNumber></setNumberVector>"#;
        ingest.apply(&frame(set)).await.unwrap();
        assert_eq!(
            ingest
                .store()
                .element_field("Scope", "COORD", "RA", "formatted_number")
                .unwrap(),
            b" 12:30:00"
        );
    }

    #[tokio::test]
    async fn test_numbervector_log_is_bounded() {
        let ingest = ingest(MemoryStore::new());
        let def = r#"<defNumberVector device="Scope" name="COORD" state="Idle" perm="rw"><defNumber name="RA" format="%f" min="0" max="24" step="0">0</defNumber></defNumberVector>"#;
        ingest.apply(&frame(def)).await.unwrap();

        for i in 0..60 {
            let set = format!(
                r#"<setNumberVector device="Scope" name="COORD" timestamp="2025-01-01T00:00:{:02}"><oneNumber name="RA">{}.5</oneNumber></setNumberVector>"#,
                i % 60,
                i
            );
            ingest.apply(&frame(&set)).await.unwrap();
        }
        let log = ingest.store().log("logdata:COORD:Scope");
        assert_eq!(log.len(), LogLengths::default().numbervector);
    }

    #[tokio::test]
    async fn test_repeated_number_value_is_not_relogged() {
        let ingest = ingest(MemoryStore::new());
        let def = r#"<defNumberVector device="Scope" name="COORD" state="Idle" perm="rw"><defNumber name="RA" format="%f" min="0" max="24" step="0">5</defNumber></defNumberVector>"#;
        ingest.apply(&frame(def)).await.unwrap();
        let set = r#"<setNumberVector device="Scope" name="COORD"><oneNumber name="RA">5</oneNumber></setNumberVector>"#;
        ingest.apply(&frame(set)).await.unwrap();
        ingest.apply(&frame(set)).await.unwrap();
        assert_eq!(ingest.store().log("logdata:COORD:Scope").len(), 1);
    }

    #[tokio::test]
    async fn test_messages() {
        let ingest = ingest(MemoryStore::new());
        let site = r#"<message timestamp="2025-01-01T00:00:00" message="server started"/>"#;
        ingest.apply(&frame(site)).await.unwrap();
        let device = r#"<message device="Scope" timestamp="2025-01-01T00:00:01" message="slewing"/>"#;
        ingest.apply(&frame(device)).await.unwrap();

        let store = ingest.store();
        assert_eq!(
            store.messages(None),
            vec!["2025-01-01T00:00:00 server started".to_string()]
        );
        assert_eq!(
            store.messages(Some("Scope")),
            vec!["2025-01-01T00:00:01 slewing".to_string()]
        );
        assert_eq!(
            store.published(CHANNEL),
            vec!["message".to_string(), "message:Scope".to_string()]
        );
    }

    #[tokio::test]
    async fn test_del_property_named() {
        let ingest = ingest(MemoryStore::new());
        ingest.apply(&frame(DEF_PORT)).await.unwrap();
        let del = r#"<delProperty device="Scope" name="PORT" timestamp="2025-01-01T00:01:00"/>"#;
        ingest.apply(&frame(del)).await.unwrap();

        let store = ingest.store();
        assert!(store.has_device("Scope").await.unwrap());
        assert!(!store.has_property("Scope", "PORT").await.unwrap());
        assert!(store.element_field("Scope", "PORT", "v", "value").is_none());
        assert_eq!(
            store.published(CHANNEL).last().unwrap(),
            "delProperty:PORT:Scope"
        );
        // deletion is recorded on the device message list
        assert!(store.messages(Some("Scope"))[0].contains("PORT"));
    }

    #[tokio::test]
    async fn test_del_device_cascades_and_spares_site_messages() {
        let ingest = ingest(MemoryStore::new());
        ingest.apply(&frame(DEF_PORT)).await.unwrap();
        let def2 = r#"<defSwitchVector device="Scope" name="CONNECTION" state="Idle" perm="rw" rule="OneOfMany"><defSwitch name="CONNECT">On</defSwitch></defSwitchVector>"#;
        ingest.apply(&frame(def2)).await.unwrap();
        let site = r#"<message timestamp="2025-01-01T00:00:00" message="keep me"/>"#;
        ingest.apply(&frame(site)).await.unwrap();
        let dev_msg = r#"<message device="Scope" timestamp="2025-01-01T00:00:01" message="drop me"/>"#;
        ingest.apply(&frame(dev_msg)).await.unwrap();

        let del = r#"<delProperty device="Scope" timestamp="2025-01-01T00:02:00"/>"#;
        ingest.apply(&frame(del)).await.unwrap();

        let store = ingest.store();
        assert!(!store.has_device("Scope").await.unwrap());
        assert!(store.device_keys_empty("Scope"));
        // site-wide messages untouched, plus the deletion notice
        let site_messages = store.messages(None);
        assert!(site_messages.iter().any(|m| m.contains("keep me")));
        assert!(site_messages.iter().any(|m| m.contains("Scope deleted")));
        assert_eq!(
            store.published(CHANNEL).last().unwrap(),
            "delDevice:Scope"
        );
    }

    #[tokio::test]
    async fn test_blob_ingest_persists_payload_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = crate::blob::BlobSink::new(dir.path()).unwrap();
        let ingest = Ingest::new(MemoryStore::new(), "", CHANNEL, LogLengths::default())
            .with_blob_sink(sink);

        let def = r#"<defBLOBVector device="Scope" name="CCD1" state="Ok" perm="ro"><defBLOB name="image" label="Image"/></defBLOBVector>"#;
        ingest.apply(&frame(def)).await.unwrap();
        let set = r#"<setBLOBVector device="Scope" name="CCD1" state="Ok" timestamp="2025-01-01T00:00:00"><oneBLOB name="image" size="4" format=".fits">dGVzdA==</oneBLOB></setBLOBVector>"#;
        ingest.apply(&frame(set)).await.unwrap();

        let store = ingest.store();
        // decoded binary in the store, base64 only on the wire
        assert_eq!(
            store.element_field("Scope", "CCD1", "image", "value").unwrap(),
            b"test"
        );
        let file = store
            .element_field("Scope", "CCD1", "image", "filepath")
            .unwrap();
        let file = String::from_utf8(file).unwrap();
        assert_eq!(file, "Scope-CCD1-image-2025-01-01T00_00_00.fits");
        assert_eq!(std::fs::read(dir.path().join(&file)).unwrap(), b"test");
        assert_eq!(
            store.published(CHANNEL).last().unwrap(),
            "setBLOBVector:CCD1:Scope"
        );
    }

    #[tokio::test]
    async fn test_client_direction_frames_do_not_touch_the_store() {
        let ingest = ingest(MemoryStore::new());
        let get = r#"<getProperties version="1.7"/>"#;
        assert!(ingest.apply(&frame(get)).await.unwrap().is_none());
        let new = r#"<newTextVector device="Scope" name="PORT"><oneText name="v">x</oneText></newTextVector>"#;
        assert!(ingest.apply(&frame(new)).await.unwrap().is_none());
        assert!(ingest.store().devices().await.unwrap().is_empty());
        assert!(ingest.store().published(CHANNEL).is_empty());
    }
}
