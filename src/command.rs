//! Client-side command issuing and the to-INDI relay.
//!
//! Local clients publish commands on the `to-indi` channel. Two payload
//! encodings coexist: **direct**, where the payload is the complete XML
//! frame (preferred), and the legacy **indirect** encoding
//! `"<cmd>:<stringkey>"`, where the arguments live in store keys the
//! client wrote beforehand and the relay composes the XML itself. The
//! relay detects the encoding by the leading `<`.
//!
//! Whenever a `newXxxVector` goes out, the property's state becomes
//! Busy in the store first; no `setXxxVector` alert accompanies it
//! because Busy reflects locally-initiated intent, not server
//! confirmation.

use crate::bridge::FrameQueue;
use crate::config::RedisServerConfig;
use crate::error::{Error, Result};
use crate::message::{
    BlobEnable, EnableBlob, GetProperties, MessageType, NewBlobVector, NewNumberVector,
    NewSwitchVector, NewTextVector, OneBlob, OneNumber, OneSwitch, OneText, SwitchState,
};
use crate::store::Store;
use crate::timestamp::Timestamp;
use futures_util::StreamExt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::PROTOCOL_VERSION;

/// Mark a property Busy after a client command, without publishing any
/// alert. Unknown devices or properties are ignored, the command may
/// race the definition.
pub async fn set_busy<S: Store>(store: &S, device: &str, name: &str) -> Result<()> {
    if !store.has_device(device).await? || !store.has_property(device, name).await? {
        return Ok(());
    }
    store.set_attribute(device, name, "state", "Busy").await
}

/// Relay between the `to-indi` channel and a bridge's sender queue
pub struct CommandRelay<S> {
    store: S,
    prefix: String,
    queue: Arc<FrameQueue>,
}

impl<S: Store> CommandRelay<S> {
    /// Relay publishing into `queue`; `prefix` scopes the scratch keys
    /// of the indirect encoding
    pub fn new(store: S, prefix: impl Into<String>, queue: Arc<FrameQueue>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            queue,
        }
    }

    /// Handle one published payload
    pub async fn handle(&self, payload: &[u8]) -> Result<()> {
        if payload.first() == Some(&b'<') {
            self.handle_direct(payload).await
        } else {
            self.handle_indirect(payload).await
        }
    }

    /// Direct encoding: the payload is the frame itself
    async fn handle_direct(&self, payload: &[u8]) -> Result<()> {
        let frame = match MessageType::from_bytes(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "unparseable direct command dropped");
                return Ok(());
            }
        };
        if frame.is_new_command() {
            if let (Some(device), Some(name)) = (frame.device(), frame.property()) {
                set_busy(&self.store, device, name).await?;
            }
        }
        self.queue.push(bytes::Bytes::copy_from_slice(payload));
        Ok(())
    }

    /// Indirect encoding: `"<cmd>:<stringkey>"`, arguments in the store
    async fn handle_indirect(&self, payload: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(payload)?;
        let Some((command, key)) = text.split_once(':') else {
            debug!(payload = text, "unrecognised command payload ignored");
            return Ok(());
        };
        let args = self.store.take_list(&self.scratch_key(key)).await?;
        let xml = match command {
            "getProperties" => self.compose_get_properties(&args),
            "enableBLOB" => self.compose_enable_blob(&args),
            "newTextVector" | "newNumberVector" | "newSwitchVector" | "newBLOBVector" => {
                self.compose_new_vector(command, &args).await?
            }
            _ => {
                debug!(command, "unrecognised command ignored");
                None
            }
        };
        if let Some(xml) = xml {
            self.queue.push(bytes::Bytes::from(xml));
        }
        Ok(())
    }

    /// The original client convention separates the prefix from the
    /// client-chosen string with a colon
    fn scratch_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    fn compose_get_properties(&self, args: &[String]) -> Option<String> {
        if args.len() < 2 {
            return None;
        }
        let frame = MessageType::GetProperties(GetProperties {
            version: Some(PROTOCOL_VERSION.to_string()),
            device: Some(args[0].clone()).filter(|d| !d.is_empty()),
            name: (!args[0].is_empty() && !args[1].is_empty()).then(|| args[1].clone()),
        });
        frame.to_xml().ok()
    }

    fn compose_enable_blob(&self, args: &[String]) -> Option<String> {
        // [device, name, timestamp (unused), Never|Also|Only]
        if args.len() != 4 || args[0].is_empty() {
            return None;
        }
        let value = BlobEnable::from_str(&args[3]).ok()?;
        let frame = MessageType::EnableBlob(EnableBlob {
            device: args[0].clone(),
            name: Some(args[1].clone()).filter(|n| !n.is_empty()),
            value,
        });
        frame.to_xml().ok()
    }

    async fn compose_new_vector(&self, command: &str, args: &[String]) -> Result<Option<String>> {
        // [device, name, timestamp, elementkey, ...]
        if args.len() < 4 || args[0].is_empty() || args[1].is_empty() {
            return Ok(None);
        }
        let device = args[0].clone();
        let name = args[1].clone();
        let timestamp = Timestamp::from_str(&args[2]).unwrap_or_else(|_| Timestamp::now());

        let mut elements = Vec::new();
        for key in &args[3..] {
            let fields = self.store.take_hash(&self.scratch_key(key)).await?;
            if fields.is_empty() {
                continue;
            }
            elements.push(fields);
        }

        let frame = match command {
            "newTextVector" => MessageType::NewTextVector(NewTextVector {
                device: device.clone(),
                name: name.clone(),
                timestamp: Some(timestamp),
                texts: elements
                    .iter()
                    .filter_map(|f| {
                        Some(OneText {
                            name: field_str(f, "name")?,
                            value: field_str(f, "value").unwrap_or_default(),
                        })
                    })
                    .collect(),
            }),
            "newNumberVector" => MessageType::NewNumberVector(NewNumberVector {
                device: device.clone(),
                name: name.clone(),
                timestamp: Some(timestamp),
                numbers: elements
                    .iter()
                    .filter_map(|f| {
                        Some(OneNumber {
                            name: field_str(f, "name")?,
                            value: field_str(f, "value").unwrap_or_default(),
                        })
                    })
                    .collect(),
            }),
            "newSwitchVector" => MessageType::NewSwitchVector(NewSwitchVector {
                device: device.clone(),
                name: name.clone(),
                timestamp: Some(timestamp),
                switches: elements
                    .iter()
                    .filter_map(|f| {
                        Some(OneSwitch {
                            name: field_str(f, "name")?,
                            value: SwitchState::from_str(&field_str(f, "value")?).ok()?,
                        })
                    })
                    .collect(),
            }),
            "newBLOBVector" => MessageType::NewBlobVector(NewBlobVector {
                device: device.clone(),
                name: name.clone(),
                timestamp: Some(timestamp),
                blobs: elements
                    .iter()
                    .filter_map(|f| {
                        // the client stores the raw payload; base64 is
                        // applied here, on the way to the wire
                        let payload = f.get("value")?.clone();
                        Some(OneBlob::encode(
                            field_str(f, "name")?,
                            field_str(f, "format").unwrap_or_default(),
                            &payload,
                        ))
                    })
                    .collect(),
            }),
            _ => return Ok(None),
        };

        set_busy(&self.store, &device, &name).await?;
        Ok(frame.to_xml().ok())
    }
}

fn field_str(fields: &std::collections::HashMap<String, Vec<u8>>, field: &str) -> Option<String> {
    fields
        .get(field)
        .map(|v| String::from_utf8_lossy(v).to_string())
}

/// Subscribe to the `to-indi` channel and feed the relay until the
/// connection drops
pub async fn run_relay<S: Store>(cfg: &RedisServerConfig, relay: &CommandRelay<S>) -> Result<()> {
    let client = redis::Client::open(cfg.url())?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(&cfg.to_indi_channel).await?;
    info!(channel = %cfg.to_indi_channel, "command relay subscribed");

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let payload: Vec<u8> = message.get_payload_bytes().to_vec();
        if let Err(e) = relay.handle(&payload).await {
            warn!(error = %e, "command relay failed to handle payload");
        }
    }
    Err(Error::Closed("to-indi subscription ended".to_string()))
}

// ---- client helpers -------------------------------------------------

/// Publish a `getProperties` request. No store state changes.
pub async fn get_properties<S: Store>(
    store: &S,
    channel: &str,
    device: Option<&str>,
    name: Option<&str>,
) -> Result<String> {
    let frame = MessageType::GetProperties(GetProperties {
        version: Some(PROTOCOL_VERSION.to_string()),
        device: device.map(|d| d.to_string()),
        name: name.map(|n| n.to_string()),
    });
    let xml = frame.to_xml()?;
    store.publish(channel, xml.as_bytes()).await?;
    Ok(xml)
}

/// Publish a `newTextVector`, marking the property Busy first
pub async fn new_text_vector<S: Store>(
    store: &S,
    channel: &str,
    device: &str,
    name: &str,
    values: &[(&str, &str)],
) -> Result<String> {
    let frame = MessageType::NewTextVector(NewTextVector {
        device: device.to_string(),
        name: name.to_string(),
        timestamp: Some(Timestamp::now()),
        texts: values
            .iter()
            .map(|(element, value)| OneText {
                name: element.to_string(),
                value: value.to_string(),
            })
            .collect(),
    });
    send_new(store, channel, device, name, &frame).await
}

/// Publish a `newNumberVector`, marking the property Busy first
pub async fn new_number_vector<S: Store>(
    store: &S,
    channel: &str,
    device: &str,
    name: &str,
    values: &[(&str, &str)],
) -> Result<String> {
    let frame = MessageType::NewNumberVector(NewNumberVector {
        device: device.to_string(),
        name: name.to_string(),
        timestamp: Some(Timestamp::now()),
        numbers: values
            .iter()
            .map(|(element, value)| OneNumber {
                name: element.to_string(),
                value: value.to_string(),
            })
            .collect(),
    });
    send_new(store, channel, device, name, &frame).await
}

/// Publish a `newSwitchVector`, marking the property Busy first
pub async fn new_switch_vector<S: Store>(
    store: &S,
    channel: &str,
    device: &str,
    name: &str,
    values: &[(&str, SwitchState)],
) -> Result<String> {
    let frame = MessageType::NewSwitchVector(NewSwitchVector {
        device: device.to_string(),
        name: name.to_string(),
        timestamp: Some(Timestamp::now()),
        switches: values
            .iter()
            .map(|(element, state)| OneSwitch {
                name: element.to_string(),
                value: *state,
            })
            .collect(),
    });
    send_new(store, channel, device, name, &frame).await
}

/// Publish a `newBLOBVector` with raw payloads, base64-encoding them on
/// the way out and marking the property Busy first
pub async fn new_blob_vector<S: Store>(
    store: &S,
    channel: &str,
    device: &str,
    name: &str,
    blobs: &[(&str, &str, &[u8])],
) -> Result<String> {
    let frame = MessageType::NewBlobVector(NewBlobVector {
        device: device.to_string(),
        name: name.to_string(),
        timestamp: Some(Timestamp::now()),
        blobs: blobs
            .iter()
            .map(|(element, format, payload)| OneBlob::encode(*element, *format, payload))
            .collect(),
    });
    send_new(store, channel, device, name, &frame).await
}

/// Publish an `enableBLOB` policy change. The property state does not
/// become Busy, no value change was requested.
pub async fn enable_blob<S: Store>(
    store: &S,
    channel: &str,
    device: &str,
    name: Option<&str>,
    policy: BlobEnable,
) -> Result<String> {
    let frame = MessageType::EnableBlob(EnableBlob {
        device: device.to_string(),
        name: name.map(|n| n.to_string()),
        value: policy,
    });
    let xml = frame.to_xml()?;
    store.publish(channel, xml.as_bytes()).await?;
    Ok(xml)
}

async fn send_new<S: Store>(
    store: &S,
    channel: &str,
    device: &str,
    name: &str,
    frame: &MessageType,
) -> Result<String> {
    let xml = frame.to_xml()?;
    // Busy lands before the frame so an immediate re-read is consistent
    set_busy(store, device, name).await?;
    store.publish(channel, xml.as_bytes()).await?;
    Ok(xml)
}
