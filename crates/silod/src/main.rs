//! silod - the silo console host
//!
//! Wires a synthetic device fleet into the in-process hub, runs the pipeline
//! coordinator over every partition, and archives blocks to the configured
//! sink until interrupted. Useful as a demo and as a harness for exercising
//! the buffering/checkpoint engine under load.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use silo_config::{Config, FaultPolicyKind, SinkConfig};
use silo_metrics::{ReporterConfig, UnifiedReporter};
use silo_pipeline::{Coordinator, FaultPolicy, FlushPolicy, RetryPolicy, WorkerConfig};
use silo_sinks::{
    BlobWriterConfig, BlobWriterFactory, IndexWriterConfig, IndexWriterFactory, NullWriterFactory,
    WriterFactory,
};
use silo_transport::simulator::{Simulator, SimulatorConfig};
use silo_transport::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, MemoryHub, OwnershipEvent,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Partitioned event-stream archiver
#[derive(Debug, Parser)]
#[command(name = "silod", version, about)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config);

    tracing::info!(
        partitions = config.hub.partitions,
        sink = config.sink.type_name(),
        simulator = config.simulator.enabled,
        "silod starting"
    );

    match config.sink.clone() {
        SinkConfig::Null => run_with_writers(config, Arc::new(NullWriterFactory)).await,
        SinkConfig::Blob(blob) => {
            let factory = BlobWriterFactory::new(
                BlobWriterConfig::default()
                    .with_base_path(&blob.path)
                    .with_max_file_bytes(blob.max_file_bytes),
            );
            run_with_writers(config, Arc::new(factory)).await
        }
        SinkConfig::Index(index) => {
            let factory = IndexWriterFactory::new(IndexWriterConfig {
                base_url: index.base_url,
                index_prefix: index.index_prefix,
                request_timeout: Duration::from_secs(index.request_timeout_secs),
            })
            .context("building index sink")?;
            run_with_writers(config, Arc::new(factory)).await
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            Config::from_file(path).with_context(|| format!("loading {}", path.display()))
        }
        None => {
            let default = std::path::Path::new("silo.toml");
            if default.exists() {
                Config::from_file(default).context("loading silo.toml")
            } else {
                tracing::debug!("no config file, using defaults");
                Ok(Config::default())
            }
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Pick the checkpoint store, then run
async fn run_with_writers<WF>(config: Config, writers: Arc<WF>) -> anyhow::Result<()>
where
    WF: WriterFactory + 'static,
{
    if config.checkpoint.store_dir.is_empty() {
        tracing::warn!("no checkpoint directory configured, checkpoints will not survive restart");
        run_pipeline(config, writers, Arc::new(MemoryCheckpointStore::new())).await
    } else {
        let store = FileCheckpointStore::open(&config.checkpoint.store_dir)
            .await
            .context("opening checkpoint store")?;
        run_pipeline(config, writers, Arc::new(store)).await
    }
}

async fn run_pipeline<WF, S>(config: Config, writers: Arc<WF>, store: Arc<S>) -> anyhow::Result<()>
where
    WF: WriterFactory + 'static,
    S: CheckpointStore + 'static,
{
    let cancel = CancellationToken::new();
    let hub = MemoryHub::new(config.hub.partitions);

    let coordinator = Coordinator::new(
        Arc::new(hub.clone()),
        writers,
        store,
        worker_config(&config),
        fault_policy(&config),
    );

    // Register one reporter provider per partition; the registry keeps the
    // counters alive across worker restarts.
    let registry = coordinator.metrics_registry();
    let mut reporter = UnifiedReporter::builder().config(ReporterConfig {
        enabled: config.metrics.enabled,
        interval: Duration::from_secs(config.metrics.interval_secs),
    });
    for partition in hub.partitions() {
        reporter = reporter.worker(Arc::new(registry.handle_for(partition)));
    }
    let reporter_task = tokio::spawn(reporter.build().run(cancel.child_token()));

    let (ownership_tx, ownership_rx) = mpsc::channel(16);
    let coordinator_task = tokio::spawn(coordinator.run(ownership_rx, cancel.child_token()));

    // This host owns every partition; there is no external lease manager.
    for partition in hub.partitions() {
        ownership_tx
            .send(OwnershipEvent::Acquired(partition))
            .await
            .context("coordinator stopped before acquiring partitions")?;
    }

    let simulator_task = if config.simulator.enabled {
        let simulator = Simulator::new(
            hub.clone(),
            SimulatorConfig {
                device_count: config.simulator.devices,
                event_interval: Duration::from_millis(config.simulator.event_interval_ms),
                events_per_device: config.simulator.events_per_device,
            },
        );
        Some(tokio::spawn(simulator.run(cancel.child_token())))
    } else {
        None
    };

    tracing::info!("silod running, ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("ctrl-c handler")?;
    tracing::info!("shutdown signal received, draining");

    cancel.cancel();
    drop(ownership_tx);

    coordinator_task.await.ok();
    if let Some(task) = simulator_task {
        task.await.ok();
    }
    reporter_task.await.ok();

    tracing::info!("silod stopped");
    Ok(())
}

fn worker_config(config: &Config) -> WorkerConfig {
    WorkerConfig {
        buffer_capacity: config.pipeline.buffer_capacity_bytes,
        flush: FlushPolicy::new(
            config.pipeline.fill_threshold,
            Duration::from_secs(config.pipeline.max_flush_interval_secs),
        ),
        receive_idle: Duration::from_millis(config.pipeline.receive_idle_ms),
        write_retry: retry_policy(&config.write_retry),
        write_timeout: Duration::from_secs(config.pipeline.write_timeout_secs),
        checkpoint_retry: retry_policy(&config.checkpoint.retry),
        checkpoint_timeout: Duration::from_secs(config.checkpoint.timeout_secs),
        drain_grace: Duration::from_secs(config.pipeline.drain_grace_secs),
    }
}

fn retry_policy(config: &silo_config::RetryConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        Duration::from_millis(config.base_delay_ms),
        Duration::from_millis(config.max_delay_ms),
    )
}

fn fault_policy(config: &Config) -> FaultPolicy {
    match config.fault.policy {
        FaultPolicyKind::Restart => FaultPolicy::Restart {
            max_restarts: config.fault.max_restarts,
        },
        FaultPolicyKind::Release => FaultPolicy::Release,
    }
}
