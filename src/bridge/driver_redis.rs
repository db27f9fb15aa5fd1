//! Driver subprocesses ↔ Redis bridge.
//!
//! Each driver executable runs as a child process. Its stdout is framed
//! and ingested exactly like an INDI socket; a per-driver queue feeds
//! its stdin; stderr is line-logged. Client commands published on the
//! `to-indi` channel are routed through the shared driver pool.

use super::driver_pool::{spawn_router, DriverLink};
use super::{drain_pipeline, get_properties_frame, ingest_pipeline};
use crate::blob::BlobSink;
use crate::config::{LogLengths, RedisServerConfig};
use crate::error::{Error, Result};
use crate::framer::Framer;
use crate::store::{Ingest, RedisStore, Store};
use crate::timestamp::Timestamp;
use crate::transport::driver::{log_stderr, DriverProcess};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Run the drivers↔Redis bridge until every driver has exited.
pub async fn drivers_to_redis(
    drivers: &[String],
    redis: &RedisServerConfig,
    lengths: LogLengths,
    sink: Option<BlobSink>,
) -> Result<()> {
    if drivers.is_empty() {
        return Err(Error::Config("no drivers given".to_string()));
    }

    let store = RedisStore::open(redis, lengths).await?;
    store.clear().await?;

    let mut processes = Vec::new();
    let mut links: Vec<Arc<DriverLink>> = Vec::new();
    let mut tasks = JoinSet::new();

    for executable in drivers {
        let mut process = DriverProcess::spawn(executable)?;
        let (mut reader, writer, stderr) = process.split()?;
        let link = DriverLink::new(executable);

        // every driver is asked to declare itself at startup
        link.queue.push(get_properties_frame());

        tokio::spawn(log_stderr(executable.clone(), stderr));
        tokio::spawn(drain_pipeline(
            Arc::clone(&link.queue),
            writer,
            Some(Arc::clone(&link.gate)),
        ));

        let mut ingest = Ingest::new(
            store.clone(),
            redis.key_prefix.clone(),
            redis.from_indi_channel.clone(),
            lengths,
        );
        if let Some(sink) = &sink {
            ingest = ingest.with_blob_sink(sink.clone());
        }

        let task_executable = executable.clone();
        let task_store = store.clone();
        let gate = Arc::clone(&link.gate);
        let devices = Arc::clone(&link.devices);
        tasks.spawn(async move {
            let result = ingest_pipeline(
                &mut reader,
                Framer::client_bound(),
                &ingest,
                Some(gate),
                Some(devices),
            )
            .await;
            if let Err(e) = result {
                warn!(driver = %task_executable, error = %e, "driver pipeline ended");
            }
            let ts = Timestamp::now().to_string();
            let note = format!("Driver {} stopped", task_executable);
            if let Err(e) = task_store.append_message(None, &ts, &note).await {
                warn!(error = %e, "failed to record driver stop");
            }
            task_executable
        });

        record_start(&store, executable).await;
        links.push(link);
        processes.push(process);
    }

    let _relay_task = super::indi_redis::spawn_relay(
        store.clone(),
        redis.clone(),
        spawn_router(links),
    );

    info!(count = processes.len(), "drivers to Redis bridge started");
    while let Some(finished) = tasks.join_next().await {
        match finished {
            Ok(executable) => info!(driver = %executable, "driver finished"),
            Err(e) => warn!(error = %e, "driver task failed"),
        }
    }
    Err(Error::Closed("all drivers exited".to_string()))
}

async fn record_start(store: &RedisStore, executable: &str) {
    let ts = Timestamp::now().to_string();
    let note = format!("Driver {} started", executable);
    if let Err(e) = store.append_message(None, &ts, &note).await {
        warn!(error = %e, "failed to record driver start");
    }
}
