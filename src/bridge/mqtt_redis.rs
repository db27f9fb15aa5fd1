//! MQTT ↔ Redis bridge.
//!
//! Instrument data arriving on the `from_indi` topic is framed, parsed
//! and written to the store; commands published by local clients on the
//! `to-indi` channel are forwarded to the `to_indi` topic at QoS 2.
//! MQTT preserves message boundaries, so each payload is a complete
//! frame group; it still goes through the framer, which also sheds any
//! noise a foreign publisher slips in.

use super::{drain_pipeline, ingest_pipeline, FrameQueue};
use crate::blob::{BlobGate, BlobSink};
use crate::config::{LogLengths, MqttServerConfig, RedisServerConfig};
use crate::error::Result;
use crate::framer::Framer;
use crate::store::{Ingest, RedisStore, Store};
use crate::transport::{mqtt, RECONNECT_DELAY};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the MQTT↔Redis bridge until cancelled.
pub async fn mqtt_to_redis(
    mqtt_cfg: &MqttServerConfig,
    redis: &RedisServerConfig,
    lengths: LogLengths,
    sink: Option<BlobSink>,
) -> Result<()> {
    let store = RedisStore::open(redis, lengths).await?;
    store.clear().await?;

    let mut ingest = Ingest::new(
        store.clone(),
        redis.key_prefix.clone(),
        redis.from_indi_channel.clone(),
        lengths,
    );
    if let Some(sink) = sink {
        ingest = ingest.with_blob_sink(sink);
    }

    let (mut receiver, sender) = mqtt::connect(
        mqtt_cfg,
        &[mqtt_cfg.from_indi_topic.as_str()],
        &mqtt_cfg.to_indi_topic,
    )?;

    let queue = Arc::new(FrameQueue::new());
    let gate = Arc::new(Mutex::new(BlobGate::new()));

    let _relay_task =
        super::indi_redis::spawn_relay(store.clone(), redis.clone(), Arc::clone(&queue));
    let _writer_task = tokio::spawn(drain_pipeline(
        Arc::clone(&queue),
        sender,
        Some(Arc::clone(&gate)),
    ));

    info!(topic = %mqtt_cfg.from_indi_topic, "MQTT to Redis bridge started");
    loop {
        let result = ingest_pipeline(
            &mut receiver,
            Framer::client_bound(),
            &ingest,
            Some(Arc::clone(&gate)),
            None,
        )
        .await;
        if let Err(e) = result {
            warn!(error = %e, "MQTT link lost, retrying");
        }
        sleep(RECONNECT_DELAY).await;
    }
}
