//! MQTT client adapter.
//!
//! Both directions run at QoS 2. The receiver owns the event loop;
//! acknowledgements for outbound publishes progress while the receiver
//! is being polled, so a bridge must keep its reader task running. The
//! shared `comms` flag tracks broker connectivity: while it is down,
//! outbound frames are dropped rather than queued indefinitely, the
//! next `setXxxVector` carries full state anyway.

use super::{FrameSink, FrameSource};
use crate::config::MqttServerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Open a client and split it into its two pipeline halves. The
/// receiver subscribes to `subscribe_topics` on every (re)connect; the
/// sender publishes to `publish_topic`.
pub fn connect(
    cfg: &MqttServerConfig,
    subscribe_topics: &[&str],
    publish_topic: &str,
) -> Result<(MqttReceiver, MqttSender)> {
    cfg.validate()?;
    let mut options = MqttOptions::new(&cfg.client_id, &cfg.host, cfg.port);
    options.set_keep_alive(Duration::from_secs(30));
    if !cfg.username.is_empty() {
        options.set_credentials(&cfg.username, &cfg.password);
    }
    let (client, eventloop) = AsyncClient::new(options, 16);
    let comms = Arc::new(AtomicBool::new(false));
    info!(broker = %cfg.host, port = cfg.port, "MQTT client started");

    Ok((
        MqttReceiver {
            client: client.clone(),
            eventloop,
            topics: subscribe_topics.iter().map(|t| t.to_string()).collect(),
            comms: Arc::clone(&comms),
        },
        MqttSender {
            client,
            topic: publish_topic.to_string(),
            comms,
        },
    ))
}

/// Receiving half: owns the event loop
pub struct MqttReceiver {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: Vec<String>,
    comms: Arc<AtomicBool>,
}

impl MqttReceiver {
    /// Broker connectivity flag, shared with the sender
    pub fn comms(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.comms)
    }
}

#[async_trait]
impl FrameSource for MqttReceiver {
    async fn recv(&mut self) -> Result<Bytes> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // subscribing on every CONNACK renews the
                    // subscriptions across broker reconnects
                    self.comms.store(true, Ordering::SeqCst);
                    for topic in &self.topics {
                        self.client.subscribe(topic, QoS::ExactlyOnce).await?;
                    }
                    info!("MQTT connected, subscriptions renewed");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(publish.payload);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.comms.store(false, Ordering::SeqCst);
                    warn!("MQTT broker disconnected");
                }
                Ok(_) => {}
                Err(e) => {
                    self.comms.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
            }
        }
    }
}

/// Sending half: publishes at QoS 2, dropping while the broker is away
pub struct MqttSender {
    client: AsyncClient,
    topic: String,
    comms: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MqttSender {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        if !self.comms.load(Ordering::SeqCst) {
            debug!(topic = %self.topic, "MQTT down, outbound frame dropped");
            return Ok(());
        }
        self.client
            .publish(&self.topic, QoS::ExactlyOnce, false, frame.to_vec())
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(Error::from)
    }
}
