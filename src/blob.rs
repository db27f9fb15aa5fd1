//! BLOB transfer policy and payload persistence.
//!
//! Each traffic source (a driver subprocess, the remote INDI server, a
//! listening-port client) carries its own [`BlobGate`] holding the
//! `enableBLOB` state for the devices behind it: `Never` (the default)
//! suppresses BLOB frames, `Also` passes everything, `Only` passes
//! nothing but BLOB frames. Accepted payloads are written to a folder
//! the web collaborators serve from.

use crate::error::{Error, Result};
use crate::message::{BlobEnable, EnableBlob, MessageType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-source `enableBLOB` state
#[derive(Debug, Default, Clone)]
pub struct BlobGate {
    by_device: HashMap<String, BlobEnable>,
    by_property: HashMap<(String, String), BlobEnable>,
}

impl BlobGate {
    /// Gate with every device at the default `Never`
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an `enableBLOB` instruction heading toward this source
    pub fn apply(&mut self, enable: &EnableBlob) {
        match &enable.name {
            Some(name) => {
                self.by_property
                    .insert((enable.device.clone(), name.clone()), enable.value);
            }
            None => {
                self.by_device.insert(enable.device.clone(), enable.value);
                // a device-wide instruction supersedes property overrides
                self.by_property.retain(|(d, _), _| d != &enable.device);
            }
        }
    }

    /// Effective policy for a device, or one property of it
    pub fn policy(&self, device: &str, name: Option<&str>) -> BlobEnable {
        if let Some(name) = name {
            if let Some(&policy) = self
                .by_property
                .get(&(device.to_string(), name.to_string()))
            {
                return policy;
            }
        }
        self.by_device
            .get(device)
            .copied()
            .unwrap_or(BlobEnable::Never)
    }

    /// Whether a frame from this source may pass. `setBLOBVector`
    /// payloads need a policy other than `Never`; under `Only`
    /// everything else from that device is dropped, including the
    /// declarations. Frames naming no device always pass.
    pub fn permits(&self, frame: &MessageType) -> bool {
        let Some(device) = frame.device() else {
            return true;
        };
        if matches!(frame, MessageType::SetBlobVector(_)) {
            self.policy(device, frame.property()) != BlobEnable::Never
        } else {
            self.policy(device, None) != BlobEnable::Only
        }
    }
}

/// Folder where accepted BLOB payloads are persisted
#[derive(Debug, Clone)]
pub struct BlobSink {
    folder: PathBuf,
}

impl BlobSink {
    /// Create the sink, making the folder if it is missing. Fails when
    /// the path exists but is not a directory or cannot be created.
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder)?;
        if !folder.is_dir() {
            return Err(Error::Config(format!(
                "BLOB folder {} is not a directory",
                folder.display()
            )));
        }
        Ok(Self { folder })
    }

    /// The folder payloads are written into
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Deterministic web-safe file name for one BLOB element value
    pub fn file_name(
        device: &str,
        property: &str,
        element: &str,
        timestamp: &str,
        format: &str,
    ) -> String {
        let suffix = if format.is_empty() || format.starts_with('.') {
            format.to_string()
        } else {
            format!(".{}", format)
        };
        format!(
            "{}-{}-{}-{}{}",
            sanitize(device),
            sanitize(property),
            sanitize(element),
            sanitize(timestamp),
            sanitize(&suffix)
        )
    }

    /// Write one payload. Failures are logged and swallowed: a full
    /// disk must not stop property ingest. Returns the file name when
    /// the write succeeded.
    pub async fn write(
        &self,
        device: &str,
        property: &str,
        element: &str,
        timestamp: &str,
        format: &str,
        payload: &[u8],
    ) -> Option<String> {
        let name = Self::file_name(device, property, element, timestamp, format);
        let path = self.folder.join(&name);
        match tokio::fs::write(&path, payload).await {
            Ok(()) => {
                debug!(file = %path.display(), bytes = payload.len(), "stored BLOB");
                Some(name)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to store BLOB");
                None
            }
        }
    }
}

/// Keep alphanumerics, dot and dash; everything else becomes `_`
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
