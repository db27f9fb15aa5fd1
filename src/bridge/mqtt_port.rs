//! MQTT ↔ listening port bridge.
//!
//! Accepts local INDI clients on a TCP port and puts them on the MQTT
//! backbone: instrument data arriving on the `from_indi` and snoop data
//! topics fans out to every connected client through its own bounded
//! deque, while each client's commands are framed and published to the
//! `to_indi` topic. Every connection carries its own BLOB policy, set
//! by the `enableBLOB` frames it sends.

use super::{drain_pipeline, parse_frame, FrameQueue, QUEUE_CAPACITY};
use crate::blob::BlobGate;
use crate::config::MqttServerConfig;
use crate::error::{Error, Result};
use crate::framer::Framer;
use crate::message::MessageType;
use crate::transport::{mqtt, FrameSource, IO_TIMEOUT};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// One accepted client: its outbound deque and BLOB policy
struct ClientSlot {
    queue: FrameQueue,
    gate: Mutex<BlobGate>,
}

type Fanout = Arc<Mutex<HashMap<u64, Arc<ClientSlot>>>>;

/// Run the MQTT↔port bridge until cancelled.
pub async fn mqtt_to_port(mqtt_cfg: &MqttServerConfig, port: u16) -> Result<()> {
    let (mut receiver, sender) = mqtt::connect(
        mqtt_cfg,
        &[
            mqtt_cfg.from_indi_topic.as_str(),
            mqtt_cfg.snoop_data_topic.as_str(),
        ],
        &mqtt_cfg.to_indi_topic,
    )?;

    let clients: Fanout = Arc::new(Mutex::new(HashMap::new()));
    let to_mqtt = Arc::new(FrameQueue::new());
    let _publish_task = tokio::spawn(drain_pipeline(Arc::clone(&to_mqtt), sender, None));

    // fan incoming instrument data out to every connected client
    {
        let clients = Arc::clone(&clients);
        tokio::spawn(async move {
            let mut framer = Framer::client_bound();
            loop {
                let payload = match receiver.recv().await {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "MQTT receive failed, retrying");
                        tokio::time::sleep(crate::transport::RECONNECT_DELAY).await;
                        continue;
                    }
                };
                for raw in framer.push(&payload) {
                    fan_out(&clients, raw).await;
                }
            }
        });
    }

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening for INDI clients");
    let ids = AtomicU64::new(0);
    loop {
        let (socket, peer) = listener.accept().await?;
        let id = ids.fetch_add(1, Ordering::SeqCst);
        info!(%peer, "INDI client connected");
        let slot = Arc::new(ClientSlot {
            queue: FrameQueue::with_capacity(QUEUE_CAPACITY),
            gate: Mutex::new(BlobGate::new()),
        });
        clients.lock().unwrap().insert(id, Arc::clone(&slot));

        let clients = Arc::clone(&clients);
        let to_mqtt = Arc::clone(&to_mqtt);
        tokio::spawn(async move {
            if let Err(e) = serve_client(socket, &slot, &to_mqtt).await {
                debug!(%peer, error = %e, "client connection ended");
            }
            clients.lock().unwrap().remove(&id);
            info!(%peer, "INDI client disconnected");
        });
    }
}

/// Deliver one instrument frame to each connection that permits it
async fn fan_out(clients: &Fanout, raw: Bytes) {
    let parsed = parse_frame(raw.clone()).await;
    let slots: Vec<Arc<ClientSlot>> = clients.lock().unwrap().values().cloned().collect();
    for slot in slots {
        match &parsed {
            Some(frame) if !slot.gate.lock().unwrap().permits(frame) => {
                debug!(tag = frame.tag(), "frame suppressed by client BLOB policy");
            }
            _ => slot.queue.push(raw.clone()),
        }
    }
}

/// Pump one client connection in both directions
async fn serve_client(
    socket: TcpStream,
    slot: &Arc<ClientSlot>,
    to_mqtt: &Arc<FrameQueue>,
) -> Result<()> {
    let (mut read, mut write) = socket.into_split();

    let writer_slot = Arc::clone(slot);
    let writer_task = tokio::spawn(async move {
        loop {
            let frame = writer_slot.queue.pop().await;
            match timeout(IO_TIMEOUT, write.write_all(&frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(error = %e, "client write failed");
                    break;
                }
                Err(_) => {
                    debug!("client write timed out");
                    break;
                }
            }
        }
    });

    // frames from the client head for the instruments; enableBLOB also
    // adjusts this connection's own policy
    let mut framer = Framer::server_bound();
    let mut buf = BytesMut::with_capacity(8 * 1024);
    let result = loop {
        buf.clear();
        let n = match read.read_buf(&mut buf).await {
            Ok(n) => n,
            Err(e) => break Err(Error::Io(e)),
        };
        if n == 0 {
            break Err(Error::Closed("client closed the connection".to_string()));
        }
        for frame in framer.push(&buf.split()) {
            if frame.starts_with(b"<enableBLOB") {
                if let Ok(MessageType::EnableBlob(enable)) = MessageType::from_bytes(&frame) {
                    slot.gate.lock().unwrap().apply(&enable);
                }
            }
            to_mqtt.push(frame);
        }
    };

    writer_task.abort();
    result
}
