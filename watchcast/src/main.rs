mod cli;
mod monitor;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use watchcast_core::config::AppConfig;
use watchcast_core::model::{ChannelRef, PipelineJob};
use watchcast_core::store::{ChannelStore, MemoryStore, SqliteStore};
use watchcast_core::{channels, logging};
use watchcast_discovery::{ChannelProbe, FanOutScheduler, VideoMetadataResolver};
use watchcast_ingest::{IngestQueue, IngestStatusClient};
use watchcast_pipeline::PipelineSupervisor;

use cli::Cli;
use monitor::MonitorService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| anyhow!("failed to load configuration: {e}"))?;
    if let Err(errors) = config.validate() {
        for err in &errors {
            eprintln!("configuration error: {err}");
        }
        std::process::exit(1);
    }

    let _log_guard = logging::init_logging(&config.logging)?;
    info!(?config, "starting watchcast");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(wait_for_shutdown(cancel_tx));

    if let Some(list_arg) = &cli.list {
        return run_list(&config, list_arg).await;
    }

    if let Some(video_url) = &cli.execute_url {
        return run_execute_url(&config, video_url, &cli).await;
    }

    let (channel, persistent) = if let Some(id) = cli.channel_id {
        let channels = channels::load_channels(Path::new(&config.channels_file))
            .context("loading channels file")?;
        let channel = channels
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("channel id {id} not found in {}", config.channels_file))?;
        (channel, true)
    } else if let Some(urls) = &cli.manual_channels {
        (
            ChannelRef {
                id: 0,
                urls: urls.clone(),
            },
            false,
        )
    } else {
        unreachable!("clap ArgGroup guarantees exactly one mode is set")
    };

    run_monitor(&config, channel, persistent, cli.debug, cancel_rx).await
}

async fn run_monitor(
    config: &AppConfig,
    channel: ChannelRef,
    persistent: bool,
    debug: bool,
    cancel: watch::Receiver<bool>,
) -> Result<()> {
    let store: Arc<dyn ChannelStore> = if persistent {
        let db_path = Path::new(&config.store_dir).join(format!("channel_{}.sqlite3", channel.id));
        Arc::new(SqliteStore::open(&db_path).await.context("opening channel store")?)
    } else {
        Arc::new(MemoryStore::new())
    };

    let probe = Arc::new(ChannelProbe::new(
        config.discovery.binary.clone(),
        config.allowed_hosts.clone(),
    ));
    let scheduler = Arc::new(FanOutScheduler::new(
        probe,
        config.probe_chunk_size,
        config.probe_concurrency,
    ));
    let resolver = Arc::new(VideoMetadataResolver::new(config.discovery.binary.clone()));

    let credential_dir = Path::new(&config.credential_storage_dir);
    let status = Arc::new(
        IngestStatusClient::new(
            config.ingest_api_base.clone(),
            config.ingest_username.clone(),
            config.ingest_password.clone(),
            channel.id,
            credential_dir,
            config.ingest_status_fail_open,
        )
        .context("initializing ingest status client")?,
    );
    let supervisor = Arc::new(PipelineSupervisor::new(
        config.extractor.binary.clone(),
        config.remuxer.binary.clone(),
        config.max_retries,
        Duration::from_secs(config.subprocess_shutdown_grace_sec),
    ));
    let queue = Arc::new(IngestQueue::new(status, supervisor, cancel.clone()));

    let mut service = MonitorService::new(
        channel,
        store,
        scheduler,
        resolver,
        queue,
        Duration::from_secs(config.poll_interval_sec),
        config.rtmp_path.clone(),
        debug,
    );

    service.run(cancel).await;
    Ok(())
}

async fn run_execute_url(config: &AppConfig, video_url: &str, cli: &Cli) -> Result<()> {
    let rtmp_url = cli.rtmp_details.clone().unwrap_or_else(|| config.rtmp_path.clone());
    let supervisor = PipelineSupervisor::new(
        config.extractor.binary.clone(),
        config.remuxer.binary.clone(),
        config.max_retries,
        Duration::from_secs(config.subprocess_shutdown_grace_sec),
    );
    let (_tx, rx) = watch::channel(false);
    let job = PipelineJob {
        video_url: video_url.to_string(),
        rtmp_url,
    };
    let outcome = supervisor.run(&job, rx).await?;
    if outcome.success() {
        info!(?outcome, "one-shot capture finished");
        Ok(())
    } else {
        error!(?outcome, "one-shot capture failed");
        std::process::exit(1);
    }
}

async fn run_list(config: &AppConfig, which: &str) -> Result<()> {
    let channels = channels::load_channels(Path::new(&config.channels_file))
        .context("loading channels file")?;

    let targets: Vec<_> = if which == "all" {
        channels
    } else {
        let id: i64 = which.parse().context("`--list` expects \"all\" or a channel id")?;
        channels.into_iter().filter(|c| c.id == id).collect()
    };

    for channel in targets {
        let db_path = Path::new(&config.store_dir).join(format!("channel_{}.sqlite3", channel.id));
        let store = SqliteStore::open(&db_path).await.context("opening channel store")?;
        let listing = store.list().await?;
        println!(
            "channel {}: {} seen, {} notified",
            channel.id,
            listing.seen.len(),
            listing.notified.len()
        );
        for (video_id, ts) in &listing.notified {
            println!("  {video_id} @ {ts}");
        }
    }

    Ok(())
}

async fn wait_for_shutdown(cancel_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C"),
            Err(e) => error!("failed to install Ctrl+C handler: {e}"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("received SIGTERM");
            }
            Err(e) => error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let _ = cancel_tx.send(true);
}
