//! Commands and their pure decision functions.
//!
//! A command names one aggregate instance and decides, given the current
//! aggregate (or its absence), which events to append. Deciding is pure and
//! synchronous; reading and appending are the executor's job.

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::metadata::{CausationId, CorrelationId};
use crate::types::ExpectedRevision;

/// A non-empty, ordered batch of events produced by one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvents<E> {
    first: E,
    rest: Vec<E>,
}

impl<E> NewEvents<E> {
    /// A batch holding a single event.
    pub const fn one(event: E) -> Self {
        Self {
            first: event,
            rest: Vec::new(),
        }
    }

    /// Appends another event to the batch.
    #[must_use]
    pub fn with(mut self, event: E) -> Self {
        self.rest.push(event);
        self
    }

    /// Number of events in the batch, always at least one.
    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    /// Always `false`; present for symmetry with `len`.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the events in order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    /// Consumes the batch into a `Vec` in order.
    pub fn into_vec(self) -> Vec<E> {
        let mut events = Vec::with_capacity(1 + self.rest.len());
        events.push(self.first);
        events.extend(self.rest);
        events
    }
}

/// Returned when trying to build a [`NewEvents`] from an empty `Vec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a decision must produce at least one event")]
pub struct EmptyDecision;

impl<E> TryFrom<Vec<E>> for NewEvents<E> {
    type Error = EmptyDecision;

    fn try_from(events: Vec<E>) -> Result<Self, Self::Error> {
        let mut events = events.into_iter();
        let first = events.next().ok_or(EmptyDecision)?;
        Ok(Self {
            first,
            rest: events.collect(),
        })
    }
}

impl<E> IntoIterator for NewEvents<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// A domain rejection returned by a decision function.
///
/// Rejections are terminal for the command that produced them: submitting
/// the same command again against the same state is rejected again.
pub trait Rejection: StdError + Send + Sync + 'static {
    /// Stable machine-readable code, e.g. `"SHOPPING_CART_CLOSED"`.
    fn code(&self) -> &'static str;
}

/// Whether a command may run against a stream that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRequirement {
    /// The aggregate must already exist; a missing stream is reported as
    /// `STREAM_NOT_FOUND`.
    #[default]
    MustExist,
    /// The command may create the aggregate; a missing stream is decided
    /// on with no prior state.
    MayBeNew,
}

/// Business logic of one command against one aggregate.
///
/// ```rust,ignore
/// impl CommandLogic for StartShift {
///     type Aggregate = CashRegister;
///     type Rejection = CashRegisterRejection;
///
///     fn aggregate_id(&self) -> &str {
///         &self.cash_register_id
///     }
///
///     fn decide(&self, register: Option<&CashRegister>) -> Result<NewEvents<_>, _> {
///         let register = register.ok_or(CashRegisterRejection::NotFound)?;
///         if register.current_cashier_id.is_some() {
///             return Err(CashRegisterRejection::ShiftAlreadyStarted);
///         }
///         Ok(NewEvents::one(CashRegisterEvent::ShiftStarted {
///             cashier_id: self.cashier_id.clone(),
///         }))
///     }
/// }
/// ```
pub trait CommandLogic: Send + Sync {
    /// The aggregate this command targets.
    type Aggregate: Aggregate;

    /// Domain rejection type.
    type Rejection: Rejection;

    /// Id of the targeted aggregate instance.
    fn aggregate_id(&self) -> &str;

    /// Whether the command may create its aggregate.
    fn requirement(&self) -> StreamRequirement {
        StreamRequirement::MustExist
    }

    /// Decides which events to append given the current aggregate.
    ///
    /// `current` is `None` only for [`StreamRequirement::MayBeNew`]
    /// commands targeting a stream that does not exist yet.
    fn decide(
        &self,
        current: Option<&Self::Aggregate>,
    ) -> Result<NewEvents<<Self::Aggregate as Aggregate>::Event>, Self::Rejection>;
}

/// Caller-supplied context for one command submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Precondition taken from the request, e.g. an `If-Match` header.
    /// Takes precedence over the revision the executor reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revision: Option<ExpectedRevision>,
    /// Request or workflow the command belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Message that caused the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<CausationId>,
}

/// A command together with its submission metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope<C> {
    /// The command.
    pub command: C,
    /// Submission metadata.
    pub metadata: CommandMetadata,
}

impl<C> CommandEnvelope<C> {
    /// Wraps a command with empty metadata.
    pub fn new(command: C) -> Self {
        Self {
            command,
            metadata: CommandMetadata::default(),
        }
    }

    /// Sets the expected revision precondition.
    #[must_use]
    pub fn with_expected_revision(mut self, expected_revision: ExpectedRevision) -> Self {
        self.metadata.expected_revision = Some(expected_revision);
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.metadata.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the causation id.
    #[must_use]
    pub fn with_causation_id(mut self, causation_id: CausationId) -> Self {
        self.metadata.causation_id = Some(causation_id);
        self
    }
}
