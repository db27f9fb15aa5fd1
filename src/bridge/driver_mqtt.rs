//! Driver subprocesses ↔ MQTT bridge.
//!
//! The instrument-side gateway for remote setups: local drivers run as
//! child processes, their output is published on the `from_indi` topic
//! and commands arriving on the `to_indi` and snoop control topics are
//! routed into the pool. Each driver's BLOB policy gates what it may
//! publish, exactly as on the Redis side.

use super::driver_pool::{spawn_router, DriverLink};
use super::{drain_pipeline, get_properties_frame, parse_frame, FrameQueue};
use crate::config::MqttServerConfig;
use crate::error::{Error, Result};
use crate::framer::Framer;
use crate::transport::driver::{log_stderr, DriverProcess};
use crate::transport::{mqtt, FrameSource, RECONNECT_DELAY};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the drivers↔MQTT bridge until every driver has exited.
pub async fn drivers_to_mqtt(drivers: &[String], mqtt_cfg: &MqttServerConfig) -> Result<()> {
    if drivers.is_empty() {
        return Err(Error::Config("no drivers given".to_string()));
    }

    let (mut receiver, sender) = mqtt::connect(
        mqtt_cfg,
        &[
            mqtt_cfg.to_indi_topic.as_str(),
            mqtt_cfg.snoop_control_topic.as_str(),
        ],
        &mqtt_cfg.from_indi_topic,
    )?;

    let to_mqtt = Arc::new(FrameQueue::new());
    let _publish_task = tokio::spawn(drain_pipeline(Arc::clone(&to_mqtt), sender, None));

    let mut processes = Vec::new();
    let mut links: Vec<Arc<DriverLink>> = Vec::new();
    let mut tasks = JoinSet::new();

    for executable in drivers {
        let mut process = DriverProcess::spawn(executable)?;
        let (mut reader, writer, stderr) = process.split()?;
        let link = DriverLink::new(executable);

        link.queue.push(get_properties_frame());

        tokio::spawn(log_stderr(executable.clone(), stderr));
        tokio::spawn(drain_pipeline(
            Arc::clone(&link.queue),
            writer,
            Some(Arc::clone(&link.gate)),
        ));

        let task_executable = executable.clone();
        let task_link = Arc::clone(&link);
        let task_queue = Arc::clone(&to_mqtt);
        tasks.spawn(async move {
            let mut framer = Framer::client_bound();
            loop {
                let chunk = match reader.recv().await {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(driver = %task_executable, error = %e, "driver pipeline ended");
                        break;
                    }
                };
                for raw in framer.push(&chunk) {
                    let Some(frame) = parse_frame(raw.clone()).await else {
                        continue;
                    };
                    // def frames reveal which devices sit behind this pipe
                    if frame.tag().starts_with("def") {
                        if let Some(device) = frame.device() {
                            task_link
                                .devices
                                .lock()
                                .unwrap()
                                .insert(device.to_string());
                        }
                    }
                    if task_link.gate.lock().unwrap().permits(&frame) {
                        task_queue.push(raw);
                    }
                }
            }
            task_executable
        });

        links.push(link);
        processes.push(process);
    }

    // commands off the broker fan into the pool by device
    let inbound = spawn_router(links);
    tokio::spawn(async move {
        let mut framer = Framer::server_bound();
        loop {
            let payload = match receiver.recv().await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "MQTT receive failed, retrying");
                    sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };
            for frame in framer.push(&payload) {
                inbound.push(frame);
            }
        }
    });

    info!(count = processes.len(), "drivers to MQTT bridge started");
    while let Some(finished) = tasks.join_next().await {
        match finished {
            Ok(executable) => info!(driver = %executable, "driver finished"),
            Err(e) => warn!(error = %e, "driver task failed"),
        }
    }
    Err(Error::Closed("all drivers exited".to_string()))
}
