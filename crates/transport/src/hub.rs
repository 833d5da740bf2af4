//! MemoryHub - in-process partitioned event hub
//!
//! A complete transport implementation used by the integration tests and the
//! demo host. Each partition keeps an ordered, replayable log of events with
//! positions assigned on publish (1-based sequence numbers), so a worker can
//! resume from any checkpoint the way it would against a real broker.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use silo_protocol::{Event, PartitionId, StreamPosition};
use tokio::sync::Notify;

use crate::error::TransportError;
use crate::stream::{PartitionSource, Received, StreamFactory};

struct PartitionLog {
    events: Vec<Event>,
    closed: bool,
}

struct PartitionState {
    log: Mutex<PartitionLog>,
    notify: Notify,
}

struct HubInner {
    partitions: Vec<PartitionState>,
}

/// In-process partitioned event hub
///
/// Cheap to clone (shared state behind an `Arc`); publishers and subscribers
/// hold their own clones.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    /// Create a hub with `partition_count` empty partitions
    pub fn new(partition_count: u32) -> Self {
        let partitions = (0..partition_count)
            .map(|_| PartitionState {
                log: Mutex::new(PartitionLog {
                    events: Vec::new(),
                    closed: false,
                }),
                notify: Notify::new(),
            })
            .collect();

        Self {
            inner: Arc::new(HubInner { partitions }),
        }
    }

    /// Number of partitions
    pub fn partition_count(&self) -> u32 {
        self.inner.partitions.len() as u32
    }

    /// All partition ids, in order
    pub fn partitions(&self) -> Vec<PartitionId> {
        (0..self.partition_count()).map(PartitionId::new).collect()
    }

    fn state(&self, partition: PartitionId) -> Result<&PartitionState, TransportError> {
        self.inner
            .partitions
            .get(partition.as_usize())
            .ok_or_else(|| TransportError::UnknownPartition(partition.to_string()))
    }

    /// Publish an event, assigning it the next position in the partition
    ///
    /// Returns the assigned position. Publishing to a closed partition fails.
    pub fn publish(
        &self,
        partition: PartitionId,
        timestamp_ms: Option<u64>,
        payload: Bytes,
    ) -> Result<StreamPosition, TransportError> {
        let state = self.state(partition)?;
        let position = {
            let mut log = state.log.lock().expect("hub lock poisoned");
            if log.closed {
                return Err(TransportError::Closed(format!(
                    "partition {partition} is closed"
                )));
            }
            let position = StreamPosition::new(log.events.len() as u64 + 1);
            log.events.push(Event::new(position, timestamp_ms, payload));
            position
        };
        state.notify.notify_waiters();
        Ok(position)
    }

    /// Close one partition; subscribers observe `EndOfPartition` after
    /// draining what was published
    pub fn close(&self, partition: PartitionId) -> Result<(), TransportError> {
        let state = self.state(partition)?;
        state.log.lock().expect("hub lock poisoned").closed = true;
        state.notify.notify_waiters();
        Ok(())
    }

    /// Close every partition
    pub fn close_all(&self) {
        for id in self.partitions() {
            let _ = self.close(id);
        }
    }

    /// Number of events ever published to a partition (for tests)
    pub fn published_count(&self, partition: PartitionId) -> usize {
        self.state(partition)
            .map(|s| s.log.lock().expect("hub lock poisoned").events.len())
            .unwrap_or(0)
    }
}

impl StreamFactory for MemoryHub {
    type Source = MemoryPartitionSource;

    async fn open(
        &self,
        partition: PartitionId,
        checkpoint: Option<StreamPosition>,
    ) -> Result<Self::Source, TransportError> {
        // Validate the partition exists before handing out a source.
        self.state(partition)?;

        // Position N lives at log index N-1; resuming after checkpoint N
        // means the cursor starts at index N.
        let cursor = checkpoint.map(|p| p.as_u64() as usize).unwrap_or(0);

        Ok(MemoryPartitionSource {
            hub: self.clone(),
            partition,
            cursor,
        })
    }
}

/// Subscriber over one partition of a `MemoryHub`
///
/// Delivers events in position order starting after the resume checkpoint,
/// suspending when it catches up with the publishers.
pub struct MemoryPartitionSource {
    hub: MemoryHub,
    partition: PartitionId,
    cursor: usize,
}

impl MemoryPartitionSource {
    /// The partition this source reads
    pub fn partition(&self) -> PartitionId {
        self.partition
    }
}

impl PartitionSource for MemoryPartitionSource {
    async fn next(&mut self) -> Result<Received, TransportError> {
        let state = self.hub.state(self.partition)?;

        loop {
            // Register for wakeup before inspecting the log so a publish
            // between the check and the await cannot be missed
            // (`notify_waiters` only reaches enabled waiters).
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let log = state.log.lock().expect("hub lock poisoned");
                if self.cursor < log.events.len() {
                    let event = log.events[self.cursor].clone();
                    self.cursor += 1;
                    return Ok(Received::Event(event));
                }
                if log.closed {
                    return Ok(Received::EndOfPartition);
                }
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn test_publish_assigns_sequential_positions() {
        let hub = MemoryHub::new(2);
        let p0 = PartitionId::new(0);

        assert_eq!(hub.publish(p0, None, payload("a")).unwrap(), StreamPosition::new(1));
        assert_eq!(hub.publish(p0, None, payload("b")).unwrap(), StreamPosition::new(2));

        // Partitions are independent sequences.
        let p1 = PartitionId::new(1);
        assert_eq!(hub.publish(p1, None, payload("c")).unwrap(), StreamPosition::new(1));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_in_order() {
        let hub = MemoryHub::new(1);
        let p0 = PartitionId::new(0);
        hub.publish(p0, Some(100), payload("a")).unwrap();
        hub.publish(p0, Some(101), payload("b")).unwrap();
        hub.close(p0).unwrap();

        let mut source = hub.open(p0, None).await.unwrap();
        let Received::Event(first) = source.next().await.unwrap() else {
            panic!("expected event");
        };
        assert_eq!(first.position(), StreamPosition::new(1));

        let Received::Event(second) = source.next().await.unwrap() else {
            panic!("expected event");
        };
        assert_eq!(second.position(), StreamPosition::new(2));

        assert!(matches!(
            source.next().await.unwrap(),
            Received::EndOfPartition
        ));
    }

    #[tokio::test]
    async fn test_resume_after_checkpoint() {
        let hub = MemoryHub::new(1);
        let p0 = PartitionId::new(0);
        for i in 0..5 {
            hub.publish(p0, None, payload(&format!("ev{i}"))).unwrap();
        }

        let mut source = hub.open(p0, Some(StreamPosition::new(3))).await.unwrap();
        let Received::Event(event) = source.next().await.unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.position(), StreamPosition::new(4));
    }

    #[tokio::test]
    async fn test_next_wakes_on_publish() {
        let hub = MemoryHub::new(1);
        let p0 = PartitionId::new(0);
        let mut source = hub.open(p0, None).await.unwrap();

        let publisher = hub.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            publisher.publish(p0, None, payload("late")).unwrap();
        });

        let Received::Event(event) = source.next().await.unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.position(), StreamPosition::new(1));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_to_closed_partition_fails() {
        let hub = MemoryHub::new(1);
        let p0 = PartitionId::new(0);
        hub.close(p0).unwrap();
        assert!(hub.publish(p0, None, payload("x")).is_err());
    }

    #[tokio::test]
    async fn test_unknown_partition() {
        let hub = MemoryHub::new(1);
        assert!(matches!(
            hub.open(PartitionId::new(7), None).await,
            Err(TransportError::UnknownPartition(_))
        ));
    }
}
