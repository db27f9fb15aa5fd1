//! Shared plumbing for the two driver-backed bridges.
//!
//! A pool of driver subprocesses shares one inbound command stream.
//! Commands naming a device go to the driver that declared it; frames
//! with no device, or one nobody has declared yet, are broadcast, which
//! is how `getProperties` reaches every driver during the handshake.

use super::FrameQueue;
use crate::blob::BlobGate;
use crate::message::MessageType;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One running driver and its routing state
pub(crate) struct DriverLink {
    /// The executable backing this link
    pub executable: String,
    /// Frames headed for the driver's stdin
    pub queue: Arc<FrameQueue>,
    /// The driver's BLOB policy
    pub gate: Arc<Mutex<BlobGate>>,
    /// Devices this driver has declared
    pub devices: Arc<Mutex<HashSet<String>>>,
}

impl DriverLink {
    pub fn new(executable: &str) -> Arc<Self> {
        Arc::new(Self {
            executable: executable.to_string(),
            queue: Arc::new(FrameQueue::new()),
            gate: Arc::new(Mutex::new(BlobGate::new())),
            devices: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn serves(&self, device: &str) -> bool {
        self.devices.lock().unwrap().contains(device)
    }
}

/// Route one command frame into the pool
pub(crate) fn route(links: &[Arc<DriverLink>], frame: Bytes) {
    let device = MessageType::from_bytes(&frame)
        .ok()
        .and_then(|f| f.device().map(|d| d.to_string()));
    let target = device
        .as_deref()
        .and_then(|d| links.iter().find(|link| link.serves(d)));
    match target {
        Some(link) => {
            debug!(driver = %link.executable, "command routed");
            link.queue.push(frame);
        }
        None => {
            for link in links {
                link.queue.push(frame.clone());
            }
        }
    }
}

/// Spawn the routing task; frames pushed onto the returned queue land
/// in the right driver queues.
pub(crate) fn spawn_router(links: Vec<Arc<DriverLink>>) -> Arc<FrameQueue> {
    let inbound = Arc::new(FrameQueue::new());
    let queue = Arc::clone(&inbound);
    tokio::spawn(async move {
        loop {
            let frame = queue.pop().await;
            route(&links, frame);
        }
    });
    inbound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_by_declared_device() {
        let a = DriverLink::new("driver_a");
        let b = DriverLink::new("driver_b");
        b.devices.lock().unwrap().insert("Scope".to_string());
        let links = vec![Arc::clone(&a), Arc::clone(&b)];

        route(
            &links,
            Bytes::from_static(b"<newTextVector device=\"Scope\" name=\"PORT\"><oneText name=\"v\">x</oneText></newTextVector>"),
        );
        assert!(a.queue.is_empty());
        assert_eq!(b.queue.len(), 1);
    }

    #[test]
    fn test_deviceless_and_unknown_frames_broadcast() {
        let a = DriverLink::new("driver_a");
        let b = DriverLink::new("driver_b");
        let links = vec![Arc::clone(&a), Arc::clone(&b)];

        route(
            &links,
            Bytes::from_static(b"<getProperties version=\"1.7\"/>"),
        );
        assert_eq!(a.queue.len(), 1);
        assert_eq!(b.queue.len(), 1);

        route(
            &links,
            Bytes::from_static(b"<newTextVector device=\"Nobody\" name=\"P\"><oneText name=\"v\">x</oneText></newTextVector>"),
        );
        assert_eq!(a.queue.len(), 2);
        assert_eq!(b.queue.len(), 2);
    }
}
