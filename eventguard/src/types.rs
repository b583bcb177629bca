//! Core types for the `EventGuard` event sourcing library.
//!
//! Every type here is constructed through a smart constructor so that an
//! instance, once it exists, is valid. Stream names, revisions and expected
//! revisions are the vocabulary shared by the Event Log, the Aggregate Folder
//! and the Command Coordinator.

use std::fmt;

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::no_glob_metacharacters;

/// Name of an append-only event stream.
///
/// Stream names are trimmed, non-empty, at most 255 characters and free of
/// glob metacharacters (`*`, `?`, `[`, `]`). Aggregate streams are named
/// `"<aggregate-kind>-<id>"`, see [`StreamName::for_aggregate`].
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_glob_metacharacters),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct StreamName(String);

impl StreamName {
    /// Builds the stream name owning the history of one aggregate instance.
    ///
    /// The result is a pure function of its inputs:
    /// `for_aggregate("cashregister", "CR1")` is always `cashregister-CR1`.
    /// An empty or whitespace-only id is rejected rather than producing a
    /// stream shared by every id-less aggregate of that kind.
    pub fn for_aggregate(kind: &str, aggregate_id: &str) -> Result<Self, StreamNameError> {
        let aggregate_id = aggregate_id.trim();
        if aggregate_id.is_empty() {
            return Err(StreamNameError::NotEmptyViolated);
        }
        Self::try_new(format!("{kind}-{aggregate_id}"))
    }
}

/// Revision of a stream: the number of events ever appended to it.
///
/// A stream that has never been written has no revision at all (see
/// [`ExpectedRevision::NoStream`]); the first append of a single event
/// yields revision 1.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct StreamRevision(u64);

impl StreamRevision {
    /// Revision reached after appending `count` more events.
    ///
    /// Saturates instead of wrapping so a revision can never move backwards.
    #[must_use]
    pub fn next_by(self, count: usize) -> Self {
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        Self::new(self.into_inner().saturating_add(count))
    }
}

/// A writer's precondition on the live revision of a stream.
///
/// Checked atomically by the Event Log at append time and never persisted
/// as stream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "revision", rename_all = "snake_case")]
pub enum ExpectedRevision {
    /// The stream must exist and sit at exactly this revision.
    Exact(StreamRevision),
    /// The stream must not exist yet.
    NoStream,
    /// No constraint; the append always passes the revision check.
    Any,
}

impl ExpectedRevision {
    /// Whether a stream whose live revision is `actual` satisfies this
    /// expectation. `None` means the stream does not exist.
    pub fn is_satisfied_by(self, actual: Option<StreamRevision>) -> bool {
        match (self, actual) {
            (Self::Any, _) | (Self::NoStream, None) => true,
            (Self::Exact(expected), Some(actual)) => expected == actual,
            (Self::NoStream, Some(_)) | (Self::Exact(_), None) => false,
        }
    }
}

impl From<StreamRevision> for ExpectedRevision {
    fn from(revision: StreamRevision) -> Self {
        Self::Exact(revision)
    }
}

impl fmt::Display for ExpectedRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(revision) => write!(f, "{revision}"),
            Self::NoStream => f.write_str("no_stream"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Identity of a stored event, a `UUIDv7` so ids sort by creation time.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRef,
    Display,
    Serialize,
    Deserialize
))]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a fresh time-ordered event id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// UTC instant at which the Event Log recorded an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn stream_name_for_aggregate_is_deterministic(id in "[a-zA-Z0-9_-]{1,64}") {
            let first = StreamName::for_aggregate("shoppingcart", &id).unwrap();
            let second = StreamName::for_aggregate("shoppingcart", &id).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.as_ref(), format!("shoppingcart-{id}"));
        }

        #[test]
        fn next_by_never_decreases(start in 0u64..u64::MAX, count in 0usize..10_000) {
            let revision = StreamRevision::new(start);
            prop_assert!(revision.next_by(count) >= revision);
        }
    }

    #[test]
    fn stream_name_for_aggregate_rejects_blank_id() {
        assert!(StreamName::for_aggregate("cashregister", "").is_err());
        assert!(StreamName::for_aggregate("cashregister", "   ").is_err());
    }

    #[test]
    fn stream_name_rejects_glob_metacharacters() {
        assert!(StreamName::try_new("cart-*").is_err());
        assert!(StreamName::for_aggregate("cart", "a?b").is_err());
    }

    #[test]
    fn stream_name_rejects_overlong_names() {
        assert!(StreamName::try_new("a".repeat(256)).is_err());
        assert!(StreamName::try_new("a".repeat(255)).is_ok());
    }

    #[test]
    fn next_by_advances_by_batch_size() {
        assert_eq!(StreamRevision::new(3).next_by(1), StreamRevision::new(4));
        assert_eq!(StreamRevision::new(3).next_by(5), StreamRevision::new(8));
    }

    #[test]
    fn next_by_saturates_at_max() {
        let top = StreamRevision::new(u64::MAX);
        assert_eq!(top.next_by(1), top);
    }

    #[test]
    fn expected_revision_precondition_table() {
        let three = StreamRevision::new(3);
        let four = StreamRevision::new(4);

        assert!(ExpectedRevision::Any.is_satisfied_by(None));
        assert!(ExpectedRevision::Any.is_satisfied_by(Some(three)));
        assert!(ExpectedRevision::NoStream.is_satisfied_by(None));
        assert!(!ExpectedRevision::NoStream.is_satisfied_by(Some(three)));
        assert!(ExpectedRevision::Exact(three).is_satisfied_by(Some(three)));
        assert!(!ExpectedRevision::Exact(three).is_satisfied_by(Some(four)));
        assert!(!ExpectedRevision::Exact(three).is_satisfied_by(None));
    }

    #[test]
    fn expected_revision_display() {
        assert_eq!(ExpectedRevision::Exact(StreamRevision::new(7)).to_string(), "7");
        assert_eq!(ExpectedRevision::NoStream.to_string(), "no_stream");
        assert_eq!(ExpectedRevision::Any.to_string(), "any");
    }

    #[test]
    fn generated_event_ids_are_v7_and_unique() {
        let first = EventId::generate();
        let second = EventId::generate();
        assert_ne!(first, second);
        assert_eq!(first.as_ref().get_version(), Some(uuid::Version::SortRand));
    }
}
