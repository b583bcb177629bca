//! Aggregate Folder.
//!
//! Rebuilds aggregate state by a strict left fold of a stream's events
//! through a pure transition function, then checks the accumulated state
//! against the aggregate's completeness predicate.
//!
//! The accumulator (`Aggregate::State`) is allowed to be partial: before the
//! creating event has been applied, or while a history is only half replayed,
//! required fields may be missing. Only a *complete* aggregate ever leaves
//! the folder; [`Aggregate::complete`] is the total function that turns a
//! partial state into `Some(aggregate)` or `None`.

use crate::errors::{AggregateStateInvalid, EventStoreError};
use crate::event::{decode_known, Event, RecordedEvent, StreamSlice};
use crate::types::{StreamName, StreamNameError};

/// An event-sourced aggregate.
///
/// The implementing type is the *complete* aggregate state.
///
/// # Contract
///
/// - [`when`](Aggregate::when) is pure and total. Every event variant must be
///   handled by an exhaustive `match`; event types the aggregate does not
///   know are filtered out before they reach it (see
///   [`RecordedEvent::decode`](crate::RecordedEvent::decode)).
/// - [`complete`](Aggregate::complete) is pure and never panics.
pub trait Aggregate: Sized + Send + Sync {
    /// Stream-name prefix, e.g. `"shoppingcart"`.
    const KIND: &'static str;

    /// Events this aggregate is built from.
    type Event: Event;

    /// Fold accumulator. `Default` is the uninitialized state.
    type State: Default + Send;

    /// Applies one event to the accumulated state.
    fn when(state: Self::State, event: &Self::Event) -> Self::State;

    /// Returns the complete aggregate if every required field is present
    /// and valid.
    fn complete(state: Self::State) -> Option<Self>;

    /// Stream holding the history of the aggregate with the given id.
    fn stream_name(aggregate_id: &str) -> Result<StreamName, StreamNameError> {
        StreamName::for_aggregate(Self::KIND, aggregate_id)
    }
}

/// Folds `events` left to right from `initial` through `when`, then
/// validates the result with `complete`.
///
/// Every event is applied exactly once, in order, even if an intermediate
/// state is already complete or already hopeless.
pub fn aggregate_stream<'a, E, S, T, I, W, C>(
    aggregate_kind: &'static str,
    events: I,
    initial: S,
    when: W,
    complete: C,
) -> Result<T, AggregateStateInvalid>
where
    E: 'a,
    I: IntoIterator<Item = &'a E>,
    W: Fn(S, &E) -> S,
    C: FnOnce(S) -> Option<T>,
{
    let (state, events_folded) = events
        .into_iter()
        .fold((initial, 0_usize), |(state, folded), event| {
            (when(state, event), folded + 1)
        });

    complete(state).ok_or(AggregateStateInvalid {
        aggregate_kind,
        events_folded,
    })
}

/// Folds typed events into aggregate `A`.
pub fn fold<'a, A, I>(events: I) -> Result<A, AggregateStateInvalid>
where
    A: Aggregate,
    A::Event: 'a,
    I: IntoIterator<Item = &'a A::Event>,
{
    aggregate_stream(A::KIND, events, A::State::default(), A::when, A::complete)
}

/// Errors from rebuilding an aggregate straight from a stream read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RebuildError {
    /// A stored event could not be decoded.
    #[error(transparent)]
    Decode(#[from] EventStoreError),
    /// The decoded history is not a complete aggregate.
    #[error(transparent)]
    Invalid(#[from] AggregateStateInvalid),
}

/// Decodes stored events and folds them into aggregate `A`.
///
/// Events of types `A::Event` does not know are skipped, leaving the state
/// unchanged at that step.
pub fn from_recorded<A: Aggregate>(events: &[RecordedEvent]) -> Result<A, RebuildError> {
    let events = decode_known::<A::Event>(events)?;
    Ok(fold::<A, _>(&events)?)
}

/// Folds a whole stream read into aggregate `A`.
pub fn fold_slice<A: Aggregate>(slice: &StreamSlice) -> Result<A, RebuildError> {
    from_recorded(&slice.events)
}
