//! Event metadata: causation, correlation and the revision an event was
//! appended under.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{EventId, ExpectedRevision};

/// Links every event produced while serving one logical request.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsRef,
    Display,
    Serialize,
    Deserialize
))]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh `UUIDv7` correlation id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Identifies the message (usually an earlier event) that caused an event.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsRef,
    Display,
    Serialize,
    Deserialize
))]
pub struct CausationId(Uuid);

impl From<EventId> for CausationId {
    fn from(event_id: EventId) -> Self {
        Self::new(*event_id.as_ref())
    }
}

/// Metadata stored alongside each event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// The message that caused this event, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<CausationId>,
    /// The request or workflow this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// The expected revision the writer asserted when appending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revision: Option<ExpectedRevision>,
}

impl EventMetadata {
    /// Empty metadata.
    pub const fn new() -> Self {
        Self {
            causation_id: None,
            correlation_id: None,
            expected_revision: None,
        }
    }

    /// Sets the causation id.
    #[must_use]
    pub const fn with_causation_id(mut self, causation_id: CausationId) -> Self {
        self.causation_id = Some(causation_id);
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Records the expected revision used for the append.
    #[must_use]
    pub const fn with_expected_revision(mut self, expected_revision: ExpectedRevision) -> Self {
        self.expected_revision = Some(expected_revision);
        self
    }
}
