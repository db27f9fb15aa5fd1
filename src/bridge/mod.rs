//! Bridge orchestration.
//!
//! A bridge wires two transports together through two unidirectional
//! pipelines. Toward a transport sits a [`FrameQueue`]; away from it, a
//! reader task feeds the framer, completed frames are parsed off the
//! reader task and then ingested or forwarded. One module per topology:
//! INDI↔Redis, drivers↔Redis, MQTT↔Redis, INDI↔MQTT and MQTT↔port.

use crate::blob::BlobGate;
use crate::error::{Error, Result};
use crate::framer::Framer;
use crate::message::MessageType;
use crate::store::{Ingest, Store};
use crate::transport::{FrameSink, FrameSource};
use bytes::Bytes;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, warn};

mod driver_mqtt;
mod driver_pool;
mod driver_redis;
mod indi_mqtt;
mod indi_redis;
mod mqtt_port;
mod mqtt_redis;

pub use driver_mqtt::drivers_to_mqtt;
pub use driver_redis::drivers_to_redis;
pub use indi_mqtt::indi_to_mqtt;
pub use indi_redis::indi_to_redis;
pub use mqtt_port::mqtt_to_port;
pub use mqtt_redis::mqtt_to_redis;

/// Queue capacity between transports. Five frames, drop-oldest: the
/// INDI convention tolerates lost `setXxx` frames because the next one
/// carries full state.
pub const QUEUE_CAPACITY: usize = 5;

/// Bounded frame queue with drop-oldest backpressure
#[derive(Debug)]
pub struct FrameQueue {
    inner: Mutex<VecDeque<Bytes>>,
    notify: Notify,
    capacity: usize,
}

impl FrameQueue {
    /// Queue with the bridge-standard capacity
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    /// Queue with an explicit capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Append a frame; the oldest is dropped when full
    pub fn push(&self, frame: Bytes) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.len() == self.capacity {
                inner.pop_front();
                debug!("frame queue full, oldest frame dropped");
            }
            inner.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Take the next frame without waiting
    pub fn try_pop(&self) -> Option<Bytes> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Wait for the next frame
    pub async fn pop(&self) -> Bytes {
        loop {
            let notified = self.notify.notified();
            if let Some(frame) = self.try_pop() {
                return frame;
            }
            notified.await;
        }
    }

    /// Drop everything queued
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one delimited frame off the reader task. XML parsing is
/// CPU-bound, so it runs on the blocking pool rather than stalling the
/// socket read.
pub(crate) async fn parse_frame(bytes: Bytes) -> Option<MessageType> {
    let raw = bytes.clone();
    let parsed = tokio::task::spawn_blocking(move || MessageType::from_bytes(&bytes))
        .await
        .map_err(|e| Error::Parse(e.to_string()));
    match parsed {
        Ok(Ok(frame)) => Some(frame),
        Ok(Err(e)) | Err(e) => {
            warn!(error = %e, frame = %String::from_utf8_lossy(&raw[..raw.len().min(256)]), "frame dropped");
            None
        }
    }
}

/// Reader pipeline: receive chunks, frame them, parse, gate, ingest.
/// Runs until the source fails; store errors only skip the frame, the
/// next one retries.
pub(crate) async fn ingest_pipeline<R, S>(
    source: &mut R,
    mut framer: Framer,
    ingest: &Ingest<S>,
    gate: Option<Arc<Mutex<BlobGate>>>,
    devices: Option<Arc<Mutex<HashSet<String>>>>,
) -> Result<()>
where
    R: FrameSource,
    S: Store,
{
    loop {
        let chunk = source.recv().await?;
        for raw in framer.push(&chunk) {
            let Some(frame) = parse_frame(raw).await else {
                continue;
            };
            if let Some(gate) = &gate {
                if !gate.lock().unwrap().permits(&frame) {
                    debug!(tag = frame.tag(), "frame suppressed by BLOB policy");
                    continue;
                }
            }
            match ingest.apply(&frame).await {
                Ok(Some(device)) => {
                    if let Some(devices) = &devices {
                        devices.lock().unwrap().insert(device);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(tag = frame.tag(), error = %e, "store write failed, frame skipped"),
            }
        }
    }
}

/// Writer pipeline: drain a queue into a sink. Outbound `enableBLOB`
/// frames update the gate for the source behind this sink on the way
/// through. Runs until the sink fails.
pub(crate) async fn drain_pipeline<W>(
    queue: Arc<FrameQueue>,
    mut sink: W,
    gate: Option<Arc<Mutex<BlobGate>>>,
) -> Result<()>
where
    W: FrameSink,
{
    loop {
        let frame = queue.pop().await;
        if let Some(gate) = &gate {
            if frame.starts_with(b"<enableBLOB") {
                if let Ok(MessageType::EnableBlob(enable)) = MessageType::from_bytes(&frame) {
                    gate.lock().unwrap().apply(&enable);
                }
            }
        }
        sink.send(&frame).await?;
    }
}

/// The frame every bridge sends when a link (re)opens so the far side
/// re-declares all its properties
pub(crate) fn get_properties_frame() -> Bytes {
    Bytes::from_static(b"<getProperties version=\"1.7\"/>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let queue = FrameQueue::new();
        for i in 0..7u8 {
            queue.push(Bytes::from(vec![i]));
        }
        assert_eq!(queue.len(), QUEUE_CAPACITY);
        // 0 and 1 were dropped
        assert_eq!(queue.try_pop().unwrap()[0], 2);
        assert_eq!(queue.try_pop().unwrap()[0], 3);
    }

    #[tokio::test]
    async fn test_queue_pop_waits_for_push() {
        let queue = Arc::new(FrameQueue::new());
        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::task::yield_now().await;
        queue.push(Bytes::from_static(b"frame"));
        let frame = popper.await.unwrap();
        assert_eq!(&frame[..], b"frame");
    }

    #[tokio::test]
    async fn test_parse_frame_logs_and_drops_garbage() {
        assert!(parse_frame(Bytes::from_static(b"<unknownTag/>")).await.is_none());
        let ok = parse_frame(Bytes::from_static(b"<getProperties version=\"1.7\"/>"))
            .await
            .unwrap();
        assert_eq!(ok.tag(), "getProperties");
    }

    #[test]
    fn test_get_properties_frame() {
        assert_eq!(
            &get_properties_frame()[..],
            b"<getProperties version=\"1.7\"/>"
        );
    }
}
