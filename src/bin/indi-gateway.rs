use clap::Parser;
use indi_gateway::blob::BlobSink;
use indi_gateway::bridge::{indi_to_redis, FrameQueue};
use indi_gateway::command::{run_relay, CommandRelay};
use indi_gateway::config::{IndiServerConfig, LogLengths, RedisServerConfig};
use indi_gateway::store::{RedisStore, Store};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// INDI gateway: stores instrument state in Redis and relays client
/// commands back to an INDI server. A web front-end (run separately)
/// reads the same keyspace and serves the BLOB folder.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory where received BLOBs are written
    blob_folder: std::path::PathBuf,

    /// Port of the web front-end (served by an external process)
    #[arg(short = 'p', long, default_value_t = 8000)]
    port: u16,

    /// Host of the web front-end (served by an external process)
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port of the INDI server
    #[arg(long, default_value_t = 7624)]
    iport: u16,

    /// Hostname of the INDI server
    #[arg(long, default_value = "localhost")]
    ihost: String,

    /// Port of the Redis server
    #[arg(long, default_value_t = 6379)]
    rport: u16,

    /// Hostname of the Redis server
    #[arg(long, default_value = "localhost")]
    rhost: String,

    /// Prefix applied to Redis keys
    #[arg(long, default_value = "indi_")]
    prefix: String,

    /// Redis channel used to publish data to the INDI server
    #[arg(long, default_value = "to_indi")]
    toindipub: String,

    /// Redis channel on which data is published from the INDI server
    #[arg(long, default_value = "from_indi")]
    fromindipub: String,

    /// Do not connect to an INDI server, run the client plumbing only
    #[arg(long, default_value_t = false)]
    clientonly: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let redis = RedisServerConfig {
        host: args.rhost.clone(),
        port: args.rport,
        db: 0,
        password: String::new(),
        key_prefix: args.prefix.clone(),
        to_indi_channel: args.toindipub.clone(),
        from_indi_channel: args.fromindipub.clone(),
    };
    if let Err(e) = redis.validate() {
        error!("invalid configuration: {}", e);
        return ExitCode::from(1);
    }

    let sink = match BlobSink::new(&args.blob_folder) {
        Ok(sink) => sink,
        Err(e) => {
            error!(
                "cannot use BLOB folder {}: {}",
                args.blob_folder.display(),
                e
            );
            return ExitCode::from(3);
        }
    };
    info!(folder = %sink.folder().display(), "BLOB folder ready");
    info!(
        "web front-end expected at http://{}:{} (external process)",
        args.host, args.port
    );

    let lengths = LogLengths::default();
    let indi = IndiServerConfig::new(args.ihost.clone(), args.iport);

    let outcome = if args.clientonly {
        tokio::select! {
            result = client_only(&redis, lengths) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                Ok(())
            }
        }
    } else {
        tokio::select! {
            result = indi_to_redis(&indi, &redis, lengths, Some(sink)) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                Ok(())
            }
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("gateway stopped: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Client-only mode: keep the store reachable for web clients and keep
/// marking properties Busy on their commands, but connect no INDI
/// server. Composed frames have nowhere to go and age out of the queue.
async fn client_only(redis: &RedisServerConfig, lengths: LogLengths) -> indi_gateway::Result<()> {
    let store = RedisStore::open(redis, lengths).await?;
    store.clear().await?;
    let queue = Arc::new(FrameQueue::new());
    let relay = CommandRelay::new(store, redis.key_prefix.clone(), queue);
    info!("client-only mode, no INDI connection");
    loop {
        if let Err(e) = run_relay(redis, &relay).await {
            warn!(error = %e, "command relay lost, resubscribing");
        }
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}
