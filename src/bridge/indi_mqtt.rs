//! INDI server ↔ MQTT bridge.
//!
//! The gateway side that sits next to the instruments: frames read from
//! the INDI socket are published on the `from_indi` topic, and command
//! frames arriving on the `to_indi` topic are written to the socket.
//! No store is involved; a Redis-side peer (`mqtt_to_redis`) does the
//! ingesting at the other end of the broker.

use super::{drain_pipeline, get_properties_frame, FrameQueue};
use crate::config::{IndiServerConfig, MqttServerConfig};
use crate::error::Result;
use crate::framer::Framer;
use crate::transport::{mqtt, FrameSink, FrameSource, IndiConnection, RECONNECT_DELAY};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the INDI↔MQTT bridge until cancelled.
pub async fn indi_to_mqtt(indi: &IndiServerConfig, mqtt_cfg: &MqttServerConfig) -> Result<()> {
    let (mut receiver, mut publisher) = mqtt::connect(
        mqtt_cfg,
        &[mqtt_cfg.to_indi_topic.as_str()],
        &mqtt_cfg.from_indi_topic,
    )?;

    // command frames picked off the broker, headed for the socket
    let to_indi = Arc::new(FrameQueue::new());
    {
        let to_indi = Arc::clone(&to_indi);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => to_indi.push(payload),
                    Err(e) => {
                        // a broker outage drops queued state, the next
                        // set frame carries everything again
                        to_indi.clear();
                        warn!(error = %e, "MQTT receive failed, retrying");
                        sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });
    }

    info!(server = %indi.address(), "INDI to MQTT bridge started");
    loop {
        let connection = match IndiConnection::connect(indi).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(server = %indi.address(), error = %e, "INDI connect failed, retrying");
                sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        let (mut reader, writer) = connection.split();
        to_indi.push(get_properties_frame());

        let writer_task = tokio::spawn(drain_pipeline(Arc::clone(&to_indi), writer, None));

        // frame the socket stream and publish one message per frame so
        // MQTT's message boundaries stay aligned with frame boundaries
        let mut framer = Framer::client_bound();
        let result = loop {
            let chunk = match reader.recv().await {
                Ok(chunk) => chunk,
                Err(e) => break Err(e),
            };
            let mut failed = Ok(());
            for frame in framer.push(&chunk) {
                if let Err(e) = publisher.send(&frame).await {
                    failed = Err(e);
                    break;
                }
            }
            if failed.is_err() {
                break failed;
            }
        };

        writer_task.abort();
        to_indi.clear();
        if let Err(e) = result {
            warn!(error = %e, "INDI link lost, reconnecting");
        }
        sleep(RECONNECT_DELAY).await;
    }
}
