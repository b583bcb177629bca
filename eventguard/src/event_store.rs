//! Event Log abstraction.
//!
//! [`EventStore`] is the port every storage backend implements. It owns the
//! only mutable shared state in the system: the per-stream event sequence
//! and its revision counter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::EventStoreResult;
use crate::event::{EventData, StreamSlice};
use crate::types::{ExpectedRevision, StreamName, StreamRevision};

/// Append-only, per-stream event storage with optimistic concurrency.
///
/// # Contract
///
/// - `read_stream` returns every event of a stream in append order together
///   with the live revision, or [`EventStoreError::StreamNotFound`] when the
///   stream has never been written.
/// - `append_to_stream` checks the expected revision and writes the batch as
///   one atomic step with respect to other appends on the same stream. Of
///   several concurrent appends expecting the same revision, exactly one
///   succeeds; the others fail with [`EventStoreError::RevisionConflict`].
///   An `Exact` expectation against an absent stream fails with
///   [`EventStoreError::StreamNotFound`]. Empty batches fail with
///   [`EventStoreError::NothingToAppend`].
/// - A successful append advances the revision by the batch size and returns
///   the new revision, which is the caller's next expected revision.
/// - Nothing is promised about ordering across different streams.
///
/// [`EventStoreError::StreamNotFound`]: crate::EventStoreError::StreamNotFound
/// [`EventStoreError::RevisionConflict`]: crate::EventStoreError::RevisionConflict
/// [`EventStoreError::NothingToAppend`]: crate::EventStoreError::NothingToAppend
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reads a whole stream.
    async fn read_stream(&self, stream_name: &StreamName) -> EventStoreResult<StreamSlice>;

    /// Appends a batch of events under an expected-revision guard.
    async fn append_to_stream(
        &self,
        stream_name: &StreamName,
        expected_revision: ExpectedRevision,
        events: Vec<EventData>,
    ) -> EventStoreResult<StreamRevision>;

    /// Returns the live revision, `None` if the stream does not exist.
    ///
    /// Callers whose append was cancelled or timed out use this to find out
    /// whether the append took effect before retrying.
    async fn stream_revision(&self, stream_name: &StreamName)
        -> EventStoreResult<Option<StreamRevision>>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for &T {
    async fn read_stream(&self, stream_name: &StreamName) -> EventStoreResult<StreamSlice> {
        (**self).read_stream(stream_name).await
    }

    async fn append_to_stream(
        &self,
        stream_name: &StreamName,
        expected_revision: ExpectedRevision,
        events: Vec<EventData>,
    ) -> EventStoreResult<StreamRevision> {
        (**self)
            .append_to_stream(stream_name, expected_revision, events)
            .await
    }

    async fn stream_revision(
        &self,
        stream_name: &StreamName,
    ) -> EventStoreResult<Option<StreamRevision>> {
        (**self).stream_revision(stream_name).await
    }
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn read_stream(&self, stream_name: &StreamName) -> EventStoreResult<StreamSlice> {
        (**self).read_stream(stream_name).await
    }

    async fn append_to_stream(
        &self,
        stream_name: &StreamName,
        expected_revision: ExpectedRevision,
        events: Vec<EventData>,
    ) -> EventStoreResult<StreamRevision> {
        (**self)
            .append_to_stream(stream_name, expected_revision, events)
            .await
    }

    async fn stream_revision(
        &self,
        stream_name: &StreamName,
    ) -> EventStoreResult<Option<StreamRevision>> {
        (**self).stream_revision(stream_name).await
    }
}
