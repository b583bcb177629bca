//! Command Coordinator.
//!
//! Runs one command as a single read, fold, decide, append unit of work
//! against one stream:
//!
//! 1. Resolve the stream name from the command's aggregate id.
//! 2. Read the stream. A missing stream either ends the command with
//!    `STREAM_NOT_FOUND` or, for commands that may create their aggregate,
//!    means "no prior state".
//! 3. Fold the events into the aggregate.
//! 4. Let the command decide. A rejection ends the command; nothing is
//!    appended.
//! 5. Append the decided events, guarded by the command-supplied expected
//!    revision if there is one, otherwise by the revision just read.
//! 6. Report the new revision, the caller's next expected revision.
//!
//! There is no retry loop here. A lost race surfaces as
//! `FAILED_TO_APPEND_EVENT` and the caller decides what to do about it.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::aggregate::{fold_slice, Aggregate};
use crate::command::{CommandEnvelope, CommandLogic, Rejection, StreamRequirement};
use crate::config::ExecutorConfig;
use crate::errors::{CommandError, EventStoreError, EventStoreResult, Operation};
use crate::etag::to_weak_etag;
use crate::event::EventData;
use crate::event_store::EventStore;
use crate::metadata::EventMetadata;
use crate::types::{ExpectedRevision, StreamName, StreamRevision};

/// Result of a command that appended events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Stream the events were appended to.
    pub stream_name: StreamName,
    /// Revision after the append; the expected revision for the next write.
    pub next_expected_revision: StreamRevision,
    /// How many events the command appended.
    pub events_appended: usize,
}

impl CommandOutcome {
    /// Conditional token to hand back to the caller, e.g. as an `ETag`.
    pub fn etag(&self) -> String {
        to_weak_etag(self.next_expected_revision)
    }
}

/// Executes commands against an [`EventStore`].
///
/// The store is an explicitly owned handle; pass `&store` or an `Arc` to
/// share one store between executors.
#[derive(Debug, Clone)]
pub struct CommandExecutor<S> {
    store: S,
    config: ExecutorConfig,
}

impl<S> CommandExecutor<S>
where
    S: EventStore,
{
    /// Creates an executor with default configuration.
    pub const fn new(store: S) -> Self {
        Self {
            store,
            config: ExecutorConfig::new(),
        }
    }

    /// Creates an executor with the given configuration.
    pub const fn with_config(store: S, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes one command.
    ///
    /// # Errors
    ///
    /// - [`CommandError::InvalidStreamName`] if the aggregate id cannot name
    ///   a stream.
    /// - [`CommandError::StreamNotFound`] if the command needs an existing
    ///   aggregate and there is none, or an `Exact` precondition targeted a
    ///   missing stream.
    /// - [`CommandError::AggregateStateInvalid`] if the stored history does
    ///   not fold into a complete aggregate.
    /// - [`CommandError::Rejected`] if the decision function refused.
    /// - [`CommandError::FailedToAppendEvent`] if the stream's revision did
    ///   not match the expectation at append time.
    /// - [`CommandError::Timeout`] if a read or append exceeded the
    ///   configured limit. A timed-out append may still have taken effect.
    #[instrument(
        name = "executor.handle",
        skip_all,
        fields(
            aggregate_kind = <C::Aggregate as Aggregate>::KIND,
            aggregate_id = envelope.command.aggregate_id(),
            stream = tracing::field::Empty,
        )
    )]
    pub async fn handle<C>(
        &self,
        envelope: CommandEnvelope<C>,
    ) -> Result<CommandOutcome, CommandError<C::Rejection>>
    where
        C: CommandLogic,
    {
        let CommandEnvelope { command, metadata } = envelope;
        let aggregate_id = command.aggregate_id();

        let stream_name = C::Aggregate::stream_name(aggregate_id).map_err(|_| {
            CommandError::<C::Rejection>::InvalidStreamName {
                aggregate_kind: <C::Aggregate as Aggregate>::KIND,
                aggregate_id: aggregate_id.to_string(),
            }
        })?;
        tracing::Span::current().record("stream", tracing::field::display(&stream_name));

        let read = self
            .bounded::<C::Rejection, _, _>(Operation::ReadStream, self.store.read_stream(&stream_name))
            .await?;

        let slice = match read {
            Ok(slice) => Some(slice),
            Err(EventStoreError::StreamNotFound(_))
                if command.requirement() == StreamRequirement::MayBeNew =>
            {
                tracing::debug!(stream = %stream_name, "executor.new_stream");
                None
            }
            Err(error) => return Err(error.into()),
        };

        let (current, read_revision) = match &slice {
            Some(slice) => (
                Some(fold_slice::<C::Aggregate>(slice)?),
                Some(slice.revision),
            ),
            None => (None, None),
        };

        let decided = command.decide(current.as_ref()).map_err(|rejection| {
            tracing::info!(
                stream = %stream_name,
                code = rejection.code(),
                reason = %rejection,
                "executor.command_rejected"
            );
            CommandError::Rejected(rejection)
        })?;

        let expected_revision = resolve_expected_revision(metadata.expected_revision, read_revision);
        let event_metadata = EventMetadata {
            causation_id: metadata.causation_id,
            correlation_id: metadata.correlation_id,
            expected_revision: Some(expected_revision),
        };

        let events = decided
            .iter()
            .map(|event| EventData::from_event(event, event_metadata.clone()))
            .collect::<EventStoreResult<Vec<_>>>()?;
        let events_appended = events.len();

        let appended = self
            .bounded::<C::Rejection, _, _>(
                Operation::AppendToStream,
                self.store
                    .append_to_stream(&stream_name, expected_revision, events),
            )
            .await?;

        let next_expected_revision = appended.map_err(|error| {
            if let EventStoreError::RevisionConflict { actual, .. } = &error {
                tracing::warn!(
                    stream = %stream_name,
                    expected = %expected_revision,
                    actual = ?actual,
                    "executor.append_conflict"
                );
            }
            CommandError::<C::Rejection>::from(error)
        })?;

        tracing::info!(
            stream = %stream_name,
            revision = %next_expected_revision,
            events = events_appended,
            "executor.events_appended"
        );

        Ok(CommandOutcome {
            stream_name,
            next_expected_revision,
            events_appended,
        })
    }

    async fn bounded<R, T, F>(
        &self,
        operation: Operation,
        future: F,
    ) -> Result<EventStoreResult<T>, CommandError<R>>
    where
        F: Future<Output = EventStoreResult<T>> + Send,
        R: Rejection,
    {
        let Some(limit) = self.config.operation_timeout else {
            return Ok(future.await);
        };

        let elapsed = limit.as_duration();
        tokio::time::timeout(elapsed, future)
            .await
            .map_err(|_| {
                tracing::warn!(%operation, timeout_ms = u64::from(limit), "executor.operation_timed_out");
                CommandError::Timeout { operation, elapsed }
            })
    }
}

/// Executes one command with a default-configured executor.
///
/// Convenience for call sites that hold a store handle but no executor.
pub async fn execute<S, C>(
    store: S,
    envelope: CommandEnvelope<C>,
) -> Result<CommandOutcome, CommandError<C::Rejection>>
where
    S: EventStore,
    C: CommandLogic,
{
    CommandExecutor::new(store).handle(envelope).await
}

/// A caller-supplied expectation wins over the revision the executor read.
fn resolve_expected_revision(
    supplied: Option<ExpectedRevision>,
    read_revision: Option<StreamRevision>,
) -> ExpectedRevision {
    supplied.unwrap_or_else(|| read_revision.map_or(ExpectedRevision::NoStream, ExpectedRevision::Exact))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_expectation_takes_precedence() {
        let supplied = ExpectedRevision::Exact(StreamRevision::new(2));
        assert_eq!(
            resolve_expected_revision(Some(supplied), Some(StreamRevision::new(5))),
            supplied
        );
        assert_eq!(
            resolve_expected_revision(Some(ExpectedRevision::Any), None),
            ExpectedRevision::Any
        );
    }

    #[test]
    fn read_revision_becomes_exact_expectation() {
        assert_eq!(
            resolve_expected_revision(None, Some(StreamRevision::new(3))),
            ExpectedRevision::Exact(StreamRevision::new(3))
        );
    }

    #[test]
    fn missing_stream_expects_no_stream() {
        assert_eq!(resolve_expected_revision(None, None), ExpectedRevision::NoStream);
    }

    #[test]
    fn outcome_etag_is_weak_tag_of_next_revision() {
        let outcome = CommandOutcome {
            stream_name: StreamName::try_new("cashregister-CR1").unwrap(),
            next_expected_revision: StreamRevision::new(4),
            events_appended: 1,
        };
        assert_eq!(outcome.etag(), "W/\"4\"");
    }
}
