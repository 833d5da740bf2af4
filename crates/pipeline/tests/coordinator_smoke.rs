//! Coordinator smoke tests: ownership lifecycle and fault policies

mod support;

use std::sync::Arc;
use std::time::Duration;

use silo_pipeline::{Coordinator, FaultPolicy, WorkerConfig};
use silo_protocol::{PartitionId, StreamPosition};
use silo_transport::{MemoryHub, OwnershipEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use support::{fast_config, publish_events, RecordingStore, ScriptedFactory, ScriptedWriter, WriteStep};

const P0: PartitionId = PartitionId::new(0);
const P1: PartitionId = PartitionId::new(1);

/// Poll `cond` until it holds or the timeout elapses
async fn wait_for(cond: impl Fn() -> bool, what: &str) {
    let deadline = Duration::from_secs(5);
    let poll = async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(deadline, poll)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn coordinator_over(
    hub: &MemoryHub,
    factory: Arc<ScriptedFactory>,
    store: Arc<RecordingStore>,
    config: WorkerConfig,
    fault_policy: FaultPolicy,
) -> Coordinator<MemoryHub, ScriptedFactory, RecordingStore> {
    Coordinator::new(Arc::new(hub.clone()), factory, store, config, fault_policy)
}

#[tokio::test]
async fn test_acquire_process_stop() {
    let hub = MemoryHub::new(2);
    publish_events(&hub, P0, 5, 100);
    publish_events(&hub, P1, 3, 100);
    hub.close_all();

    let store = Arc::new(RecordingStore::new());
    let writer = ScriptedWriter::always_ok();
    let factory = Arc::new(ScriptedFactory::new([], writer.clone()));

    let coordinator = coordinator_over(
        &hub,
        Arc::clone(&factory),
        Arc::clone(&store),
        fast_config(64 * 1024),
        FaultPolicy::default(),
    );

    let (ownership_tx, ownership_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(coordinator.run(ownership_rx, cancel.clone()));

    ownership_tx.send(OwnershipEvent::Acquired(P0)).await.unwrap();
    ownership_tx.send(OwnershipEvent::Acquired(P1)).await.unwrap();

    let store_check = Arc::clone(&store);
    wait_for(
        move || {
            store_check.get(P0) == Some(StreamPosition::new(5))
                && store_check.get(P1) == Some(StreamPosition::new(3))
        },
        "both partitions to drain and checkpoint",
    )
    .await;

    assert_eq!(factory.created(), 2);

    cancel.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn test_faulted_worker_restarts_from_checkpoint() {
    let hub = MemoryHub::new(1);
    publish_events(&hub, P0, 3, 380);
    hub.close(P0).unwrap();

    let store = Arc::new(RecordingStore::new());
    // First worker's writer rejects its first block fatally; the replacement
    // writer accepts everything.
    let fatal_writer = ScriptedWriter::new([WriteStep::Fatal]);
    let ok_writer = ScriptedWriter::always_ok();
    let factory = Arc::new(ScriptedFactory::new([fatal_writer], ok_writer.clone()));

    let coordinator = coordinator_over(
        &hub,
        Arc::clone(&factory),
        Arc::clone(&store),
        fast_config(1024),
        FaultPolicy::Restart { max_restarts: 3 },
    );

    let (ownership_tx, ownership_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(coordinator.run(ownership_rx, cancel.clone()));

    ownership_tx.send(OwnershipEvent::Acquired(P0)).await.unwrap();

    let store_check = Arc::clone(&store);
    wait_for(
        move || store_check.get(P0) == Some(StreamPosition::new(3)),
        "restarted worker to finish the partition",
    )
    .await;

    // One faulted worker plus its replacement.
    assert_eq!(factory.created(), 2);

    // The replacement replayed from the beginning (nothing had checkpointed)
    // and wrote blocks in order.
    assert_eq!(ok_writer.written_watermarks(), vec![2, 3]);

    cancel.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn test_release_policy_gives_up_after_fault() {
    let hub = MemoryHub::new(1);
    publish_events(&hub, P0, 3, 380);
    hub.close(P0).unwrap();

    let store = Arc::new(RecordingStore::new());
    let fatal_writer = ScriptedWriter::new([WriteStep::Fatal]);
    let factory = Arc::new(ScriptedFactory::new(
        [fatal_writer.clone()],
        ScriptedWriter::always_ok(),
    ));

    let coordinator = coordinator_over(
        &hub,
        Arc::clone(&factory),
        Arc::clone(&store),
        fast_config(1024),
        FaultPolicy::Release,
    );

    let (ownership_tx, ownership_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(coordinator.run(ownership_rx, cancel.clone()));

    ownership_tx.send(OwnershipEvent::Acquired(P0)).await.unwrap();

    let factory_check = Arc::clone(&factory);
    wait_for(move || factory_check.created() == 1, "the worker to start").await;

    // Give the release decision time to land, then confirm no replacement
    // worker was ever created and no checkpoint advanced.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(factory.created(), 1);
    assert_eq!(store.get(P0), None);

    cancel.cancel();
    run.await.unwrap();
}

#[tokio::test]
async fn test_revoke_drains_partial_buffer() {
    let hub = MemoryHub::new(1);
    publish_events(&hub, P0, 2, 100);

    let store = Arc::new(RecordingStore::new());
    let writer = ScriptedWriter::always_ok();
    let factory = Arc::new(ScriptedFactory::new([], writer.clone()));

    let coordinator = coordinator_over(
        &hub,
        Arc::clone(&factory),
        Arc::clone(&store),
        fast_config(64 * 1024),
        FaultPolicy::default(),
    );

    let (ownership_tx, ownership_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(coordinator.run(ownership_rx, cancel.clone()));

    ownership_tx.send(OwnershipEvent::Acquired(P0)).await.unwrap();

    // Let the worker buffer both events, then revoke the lease.
    tokio::time::sleep(Duration::from_millis(150)).await;
    ownership_tx.send(OwnershipEvent::Revoked(P0)).await.unwrap();

    let store_check = Arc::clone(&store);
    wait_for(
        move || store_check.get(P0) == Some(StreamPosition::new(2)),
        "revoked worker to drain",
    )
    .await;
    assert_eq!(writer.written_watermarks(), vec![2]);

    cancel.cancel();
    run.await.unwrap();
}
