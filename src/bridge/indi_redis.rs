//! INDI server ↔ Redis bridge.
//!
//! Frames received from the INDI socket are framed, parsed and written
//! to the store with an alert per frame; commands published by local
//! clients on the `to-indi` channel flow back out of the socket. The
//! bridge outlives the socket: a broken link is reopened every two
//! seconds and a fresh `getProperties` makes the server re-declare
//! everything.

use super::{drain_pipeline, get_properties_frame, ingest_pipeline, FrameQueue};
use crate::blob::{BlobGate, BlobSink};
use crate::command::{run_relay, CommandRelay};
use crate::config::{IndiServerConfig, LogLengths, RedisServerConfig};
use crate::error::Result;
use crate::framer::Framer;
use crate::store::{Ingest, RedisStore, Store};
use crate::transport::{IndiConnection, RECONNECT_DELAY};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the INDI↔Redis bridge until cancelled.
///
/// The gateway keyspace is cleared on startup so stale state from a
/// previous run never survives.
pub async fn indi_to_redis(
    indi: &IndiServerConfig,
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

    let queue = Arc::new(FrameQueue::new());
    let gate = Arc::new(Mutex::new(BlobGate::new()));

    let _relay_task = spawn_relay(store.clone(), redis.clone(), Arc::clone(&queue));

    info!(server = %indi.address(), "INDI to Redis bridge started");
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

        // make the server re-declare everything on every (re)connect
        queue.push(get_properties_frame());

        let writer_task = tokio::spawn(drain_pipeline(
            Arc::clone(&queue),
            writer,
            Some(Arc::clone(&gate)),
        ));

        let result = ingest_pipeline(
            &mut reader,
            Framer::client_bound(),
            &ingest,
            Some(Arc::clone(&gate)),
            None,
        )
        .await;

        writer_task.abort();
        queue.clear();
        if let Err(e) = result {
            warn!(error = %e, "INDI link lost, reconnecting");
        }
        sleep(RECONNECT_DELAY).await;
    }
}

/// Keep the to-indi subscription alive alongside the bridge
pub(crate) fn spawn_relay(
    store: RedisStore,
    redis: RedisServerConfig,
    queue: Arc<FrameQueue>,
) -> tokio::task::JoinHandle<()> {
    let prefix = redis.key_prefix.clone();
    tokio::spawn(async move {
        let relay = CommandRelay::new(store, prefix, queue);
        loop {
            if let Err(e) = run_relay(&redis, &relay).await {
                warn!(error = %e, "command relay lost, resubscribing");
            }
            sleep(RECONNECT_DELAY).await;
        }
    })
}
