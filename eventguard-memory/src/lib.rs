//! In-memory Event Log for `EventGuard`
//!
//! This crate provides an in-memory implementation of the `EventStore` trait
//! from the eventguard crate, useful for testing and development scenarios
//! where persistence is not required.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use eventguard::errors::{EventStoreError, EventStoreResult};
use eventguard::event::{EventData, RecordedEvent, StreamSlice};
use eventguard::event_store::EventStore;
use eventguard::types::{ExpectedRevision, StreamName, StreamRevision, Timestamp};
use parking_lot::{Mutex, RwLock};

/// One stream's events and revision.
#[derive(Debug)]
struct StreamRecord {
    events: Vec<RecordedEvent>,
    revision: StreamRevision,
}

impl Default for StreamRecord {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            revision: StreamRevision::new(0),
        }
    }
}

impl StreamRecord {
    /// Live revision, `None` while nothing has been appended.
    fn live_revision(&self) -> Option<StreamRevision> {
        (!self.events.is_empty()).then_some(self.revision)
    }
}

type SharedRecord = Arc<Mutex<StreamRecord>>;

fn live_revision(record: &SharedRecord) -> Option<StreamRevision> {
    record.lock().live_revision()
}

/// Thread-safe in-memory event store.
///
/// Cloning yields another handle onto the same storage. Each stream sits
/// behind its own lock, so the revision check and the append happen as one
/// step per stream while different streams never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<StreamName, SharedRecord>>>,
}

impl InMemoryEventStore {
    /// Create a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams holding at least one event.
    pub fn stream_count(&self) -> usize {
        self.streams
            .read()
            .values()
            .filter(|record| live_revision(record).is_some())
            .count()
    }

    fn existing(&self, stream_name: &StreamName) -> Option<SharedRecord> {
        self.streams.read().get(stream_name).cloned()
    }

    /// Record for `stream_name`, creating an empty one if needed.
    ///
    /// Only called once the expectation admits a missing stream, so an empty
    /// record is always filled by the append that created it.
    fn existing_or_empty(&self, stream_name: &StreamName) -> SharedRecord {
        if let Some(record) = self.existing(stream_name) {
            return record;
        }
        self.streams
            .write()
            .entry(stream_name.clone())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(name = "memory.read_stream", skip(self), fields(stream = %stream_name))]
    async fn read_stream(&self, stream_name: &StreamName) -> EventStoreResult<StreamSlice> {
        let record = self.existing(stream_name);
        let snapshot = record.as_ref().and_then(|record| {
            let record = record.lock();
            let revision = record.live_revision()?;
            Some((record.events.clone(), revision))
        });

        let Some((events, revision)) = snapshot else {
            tracing::debug!(stream = %stream_name, "memory.stream_not_found");
            return Err(EventStoreError::StreamNotFound(stream_name.clone()));
        };

        Ok(StreamSlice {
            stream_name: stream_name.clone(),
            events,
            revision,
        })
    }

    #[tracing::instrument(
        name = "memory.append_to_stream",
        skip(self, events),
        fields(stream = %stream_name, expected = %expected_revision, count = events.len())
    )]
    async fn append_to_stream(
        &self,
        stream_name: &StreamName,
        expected_revision: ExpectedRevision,
        events: Vec<EventData>,
    ) -> EventStoreResult<StreamRevision> {
        if events.is_empty() {
            return Err(EventStoreError::NothingToAppend(stream_name.clone()));
        }

        let record = match self.existing(stream_name) {
            Some(record) => record,
            None if !expected_revision.is_satisfied_by(None) => {
                tracing::debug!(stream = %stream_name, expected = %expected_revision, "memory.stream_not_found");
                return Err(EventStoreError::StreamNotFound(stream_name.clone()));
            }
            None => self.existing_or_empty(stream_name),
        };
        let mut record = record.lock();
        let actual = record.live_revision();

        if !expected_revision.is_satisfied_by(actual) {
            if actual.is_none() {
                tracing::debug!(stream = %stream_name, expected = %expected_revision, "memory.stream_not_found");
                return Err(EventStoreError::StreamNotFound(stream_name.clone()));
            }
            tracing::warn!(
                stream = %stream_name,
                expected = %expected_revision,
                actual = ?actual,
                "memory.version_conflict"
            );
            return Err(EventStoreError::RevisionConflict {
                stream: stream_name.clone(),
                expected: expected_revision,
                actual,
            });
        }

        let recorded_at = Timestamp::now();
        let mut revision = record.revision;
        for event in events {
            revision = revision.next_by(1);
            record.events.push(RecordedEvent {
                event_id: event.event_id,
                stream_name: stream_name.clone(),
                revision,
                event_type: event.event_type,
                data: event.data,
                metadata: event.metadata,
                recorded_at,
            });
        }
        record.revision = revision;

        tracing::debug!(stream = %stream_name, revision = %revision, "memory.append");
        Ok(revision)
    }

    async fn stream_revision(
        &self,
        stream_name: &StreamName,
    ) -> EventStoreResult<Option<StreamRevision>> {
        Ok(self.existing(stream_name).as_ref().and_then(live_revision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn stream(name: &str) -> StreamName {
        StreamName::try_new(name).unwrap()
    }

    fn event(event_type: &str) -> EventData {
        EventData::raw(event_type, json!({ "source": "test" }))
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryEventStore::new();
        assert_eq!(store.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_clone_shares_storage() {
        let store1 = InMemoryEventStore::new();
        #[allow(clippy::redundant_clone)]
        let store2 = store1.clone();

        assert!(Arc::ptr_eq(&store1.streams, &store2.streams));
    }

    #[tokio::test]
    async fn test_first_append_yields_revision_one() {
        let store = InMemoryEventStore::new();
        let stream_name = stream("account-1");

        let revision = store
            .append_to_stream(&stream_name, ExpectedRevision::NoStream, vec![event("opened")])
            .await
            .unwrap();

        assert_eq!(revision, StreamRevision::new(1));
        assert_eq!(
            store.stream_revision(&stream_name).await.unwrap(),
            Some(StreamRevision::new(1))
        );
    }

    #[tokio::test]
    async fn test_recorded_events_carry_positions() {
        let store = InMemoryEventStore::new();
        let stream_name = stream("account-1");

        store
            .append_to_stream(
                &stream_name,
                ExpectedRevision::NoStream,
                vec![event("opened"), event("credited"), event("debited")],
            )
            .await
            .unwrap();

        let slice = store.read_stream(&stream_name).await.unwrap();
        let revisions: Vec<u64> = slice
            .events
            .iter()
            .map(|recorded| recorded.revision.into_inner())
            .collect();
        assert_eq!(revisions, vec![1, 2, 3]);
        assert!(slice.events.iter().all(|recorded| recorded.stream_name == stream_name));
    }

    #[tokio::test]
    async fn test_failed_append_leaves_no_stream_behind() {
        let store = InMemoryEventStore::new();
        let stream_name = stream("account-1");

        let error = store
            .append_to_stream(
                &stream_name,
                ExpectedRevision::Exact(StreamRevision::new(1)),
                vec![event("credited")],
            )
            .await
            .unwrap_err();

        assert_eq!(error, EventStoreError::StreamNotFound(stream_name.clone()));
        assert_eq!(store.stream_count(), 0);
        assert!(store.streams.read().is_empty());
        assert!(store.read_stream(&stream_name).await.is_err());
        assert_eq!(store.stream_revision(&stream_name).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_appends_to_missing_streams_do_not_grow_storage() {
        let store = InMemoryEventStore::new();

        for n in 0..1000 {
            let error = store
                .append_to_stream(
                    &stream(&format!("account-{n}")),
                    ExpectedRevision::Exact(StreamRevision::new(1)),
                    vec![event("credited")],
                )
                .await
                .unwrap_err();
            assert!(matches!(error, EventStoreError::StreamNotFound(_)));
        }

        assert_eq!(store.streams.read().len(), 0);

        store
            .append_to_stream(&stream("account-0"), ExpectedRevision::NoStream, vec![event("opened")])
            .await
            .unwrap();
        assert_eq!(store.streams.read().len(), 1);
        assert_eq!(store.stream_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_append_is_rejected() {
        let store = InMemoryEventStore::new();
        let stream_name = stream("account-1");

        let error = store
            .append_to_stream(&stream_name, ExpectedRevision::Any, Vec::new())
            .await
            .unwrap_err();

        assert_eq!(error, EventStoreError::NothingToAppend(stream_name));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_conflict_is_logged() {
        let store = InMemoryEventStore::new();
        let stream_name = stream("account-1");
        store
            .append_to_stream(&stream_name, ExpectedRevision::NoStream, vec![event("opened")])
            .await
            .unwrap();

        let error = store
            .append_to_stream(&stream_name, ExpectedRevision::NoStream, vec![event("opened")])
            .await
            .unwrap_err();

        assert_eq!(
            error,
            EventStoreError::RevisionConflict {
                stream: stream_name,
                expected: ExpectedRevision::NoStream,
                actual: Some(StreamRevision::new(1)),
            }
        );
        assert!(logs_contain("memory.version_conflict"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_missing_stream_read_is_logged() {
        let store = InMemoryEventStore::new();
        let error = store.read_stream(&stream("ghost-1")).await.unwrap_err();

        assert!(matches!(error, EventStoreError::StreamNotFound(_)));
        assert!(logs_contain("memory.stream_not_found"));
    }

    proptest! {
        #[test]
        fn test_revision_counts_every_appended_event(batches in prop::collection::vec(1usize..6, 1..12)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let store = InMemoryEventStore::new();
                let stream_name = stream("counter-1");
                let mut expected = ExpectedRevision::NoStream;

                for size in &batches {
                    let events = (0..*size).map(|_| event("ticked")).collect();
                    let revision = store.append_to_stream(&stream_name, expected, events).await.unwrap();
                    expected = ExpectedRevision::Exact(revision);
                }

                let slice = store.read_stream(&stream_name).await.unwrap();
                let total: usize = batches.iter().sum();
                prop_assert_eq!(slice.revision, StreamRevision::new(total as u64));
                prop_assert_eq!(slice.len(), total);
                let revisions: Vec<u64> = slice.events.iter().map(|e| e.revision.into_inner()).collect();
                prop_assert_eq!(revisions, (1..=total as u64).collect::<Vec<_>>());
                Ok(())
            })?;
        }
    }
}
