//! Error types for `EventGuard`.
//!
//! Errors are layered the same way the components are:
//!
//! - [`EventStoreError`]: failures of the Event Log (missing stream, lost
//!   optimistic-concurrency race, storage and (de)serialization failures).
//! - [`AggregateStateInvalid`]: a fold finished without producing a complete
//!   aggregate.
//! - [`ETagError`](crate::etag::ETagError): malformed conditional tokens.
//! - [`CommandError`]: the caller-visible outcome of one command, mapping
//!   each of the above 1:1 and adding domain rejections.
//!
//! Every variant exposes a stable machine-readable code through `code()` so
//! the transport layer can choose its own presentation.

use std::time::Duration;

use thiserror::Error;

use crate::aggregate::RebuildError;
use crate::command::Rejection;
use crate::types::{ExpectedRevision, StreamName, StreamRevision};

/// Identifies the Event Log operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading a stream.
    ReadStream,
    /// Appending to a stream.
    AppendToStream,
    /// Probing a stream's revision.
    StreamRevision,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadStream => write!(f, "read_stream"),
            Self::AppendToStream => write!(f, "append_to_stream"),
            Self::StreamRevision => write!(f, "stream_revision"),
        }
    }
}

/// Errors returned by [`EventStore`](crate::EventStore) implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// The stream has never been written, or an `Exact` expectation targeted
    /// a stream that does not exist.
    #[error("stream '{0}' not found")]
    StreamNotFound(StreamName),

    /// The live revision did not satisfy the writer's expectation at the
    /// moment of the check-and-append.
    #[error("revision conflict on stream '{stream}': expected {expected}, actual {}", format_actual(.actual))]
    RevisionConflict {
        /// The stream that was being appended to.
        stream: StreamName,
        /// What the writer asserted.
        expected: ExpectedRevision,
        /// The live revision, `None` when the stream does not exist.
        actual: Option<StreamRevision>,
    },

    /// An append carried no events.
    #[error("nothing to append to stream '{0}'")]
    NothingToAppend(StreamName),

    /// An event payload could not be serialized.
    #[error("failed to serialize '{event_type}' event: {detail}")]
    SerializationFailed {
        /// Type tag of the event.
        event_type: String,
        /// Serializer message.
        detail: String,
    },

    /// A stored payload could not be decoded into the requested event type.
    #[error("failed to deserialize '{event_type}' event from stream '{stream}': {detail}")]
    DeserializationFailed {
        /// Stream the event was read from.
        stream: StreamName,
        /// Type tag of the stored event.
        event_type: String,
        /// Deserializer message.
        detail: String,
    },

    /// Infrastructure failure in the backing store.
    #[error("{operation} operation failed: {detail}")]
    StoreFailure {
        /// The operation that failed.
        operation: Operation,
        /// Backend-specific description.
        detail: String,
    },
}

fn format_actual(actual: &Option<StreamRevision>) -> String {
    actual.map_or_else(|| "no stream".to_string(), |revision| revision.to_string())
}

/// Result alias for Event Log operations.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// The folded state of a stream never satisfied the aggregate's
/// completeness predicate.
///
/// Signals an empty or corrupted history. Not recoverable by retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("aggregate '{aggregate_kind}' state is invalid after folding {events_folded} events")]
pub struct AggregateStateInvalid {
    /// Kind of the aggregate being folded.
    pub aggregate_kind: &'static str,
    /// How many events were applied before the predicate was checked.
    pub events_folded: usize,
}

/// Outcome of a command that did not append.
///
/// `R` is the command's domain rejection type.
#[derive(Debug, Error)]
pub enum CommandError<R: Rejection> {
    /// The command requires an existing stream and there is none.
    #[error("stream '{0}' not found")]
    StreamNotFound(StreamName),

    /// Lost an optimistic-concurrency race: the stream moved between read
    /// and append, or the supplied expected revision was stale. Re-read and
    /// retry at a higher layer.
    #[error("failed to append event to stream '{stream}': expected revision {expected}")]
    FailedToAppendEvent {
        /// The contested stream.
        stream: StreamName,
        /// The expectation that failed.
        expected: ExpectedRevision,
        /// The live revision at the moment of the check.
        actual: Option<StreamRevision>,
    },

    /// The stored history does not fold into a complete aggregate.
    #[error(transparent)]
    AggregateStateInvalid(#[from] AggregateStateInvalid),

    /// The decision function rejected the command.
    #[error("command rejected: {0}")]
    Rejected(R),

    /// A store operation did not finish in time.
    ///
    /// For [`Operation::AppendToStream`] the append may still have taken
    /// effect; probe the stream revision before retrying.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// The operation that was abandoned.
        operation: Operation,
        /// The configured limit.
        elapsed: Duration,
    },

    /// The aggregate id does not produce a valid stream name.
    #[error("invalid stream name for aggregate '{aggregate_kind}' id '{aggregate_id}'")]
    InvalidStreamName {
        /// Kind of the targeted aggregate.
        aggregate_kind: &'static str,
        /// The offending id.
        aggregate_id: String,
    },

    /// Any other Event Log failure.
    #[error(transparent)]
    EventStore(EventStoreError),
}

impl<R: Rejection> CommandError<R> {
    /// Stable machine-readable code for this outcome.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StreamNotFound(_) => "STREAM_NOT_FOUND",
            Self::FailedToAppendEvent { .. } => "FAILED_TO_APPEND_EVENT",
            Self::AggregateStateInvalid(_) => "AGGREGATE_STATE_INVALID",
            Self::Rejected(rejection) => rejection.code(),
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidStreamName { .. } => "INVALID_STREAM_NAME",
            Self::EventStore(_) => "EVENT_STORE_FAILURE",
        }
    }

    /// Whether re-reading the stream and re-submitting the same command can
    /// succeed. Only a lost optimistic-concurrency race qualifies.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::FailedToAppendEvent { .. })
    }

    /// The domain rejection, if the decision function refused the command.
    pub const fn rejection(&self) -> Option<&R> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl<R: Rejection> From<EventStoreError> for CommandError<R> {
    fn from(error: EventStoreError) -> Self {
        match error {
            EventStoreError::StreamNotFound(stream) => Self::StreamNotFound(stream),
            EventStoreError::RevisionConflict {
                stream,
                expected,
                actual,
            } => Self::FailedToAppendEvent {
                stream,
                expected,
                actual,
            },
            other => Self::EventStore(other),
        }
    }
}

impl<R: Rejection> From<RebuildError> for CommandError<R> {
    fn from(error: RebuildError) -> Self {
        match error {
            RebuildError::Decode(error) => error.into(),
            RebuildError::Invalid(invalid) => Self::AggregateStateInvalid(invalid),
        }
    }
}
