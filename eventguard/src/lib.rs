//! `EventGuard` - event-sourced aggregates guarded by optimistic concurrency
//!
//! Aggregate state is rebuilt by folding a stream's events through a pure
//! transition function. Commands decide on new events against that state,
//! and the decided events are appended only if the stream is still at the
//! revision the decision was based on.
//!
//! The pieces, leaves first:
//!
//! - [`EventStore`]: the Event Log port, with atomic per-stream
//!   check-and-append.
//! - [`Aggregate`] and [`fold`]: the Aggregate Folder.
//! - [`to_weak_etag`] and [`parse_weak_etag`]: the Revision Codec, mapping
//!   revisions to and from weak entity tags.
//! - [`CommandExecutor`]: the Command Coordinator running read, fold,
//!   decide and append for one [`CommandLogic`].
//!
//! Store implementations live in their own crates, e.g. `eventguard-memory`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod command;
pub mod config;
pub mod errors;
pub mod etag;
pub mod event;
pub mod event_store;
pub mod executor;
pub mod metadata;
pub mod types;

mod validation;

pub use aggregate::{aggregate_stream, fold, fold_slice, from_recorded, Aggregate, RebuildError};
pub use command::{
    CommandEnvelope, CommandLogic, CommandMetadata, EmptyDecision, NewEvents, Rejection,
    StreamRequirement,
};
pub use config::{ConfigError, ExecutorConfig, OperationTimeoutMs};
pub use errors::{
    AggregateStateInvalid, CommandError, EventStoreError, EventStoreResult, Operation,
};
pub use etag::{expected_revision_from_if_match, parse_weak_etag, to_weak_etag, ETagError};
pub use event::{Event, EventData, RecordedEvent, StreamSlice};
pub use event_store::EventStore;
pub use executor::{execute, CommandExecutor, CommandOutcome};
pub use metadata::{CausationId, CorrelationId, EventMetadata};
pub use types::{EventId, ExpectedRevision, StreamName, StreamNameError, StreamRevision, Timestamp};
