//! Event model.
//!
//! Domain events are plain Rust enums. On their way into the Event Log they
//! become [`EventData`]: a type tag, a JSON payload and [`EventMetadata`].
//! On their way out they are [`RecordedEvent`]s, carrying the stream name,
//! the revision they were appended at and the instant they were recorded.
//!
//! Domain event enums are expected to use serde's adjacent tagging,
//! `#[serde(tag = "type", content = "data", rename_all = "kebab-case")]`,
//! so the stored type tag and payload line up with the enum variant.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::EventStoreError;
use crate::metadata::EventMetadata;
use crate::types::{EventId, StreamName, StreamRevision, Timestamp};

/// A domain event that can be stored in and decoded from the Event Log.
pub trait Event: Serialize + DeserializeOwned + Send + Sync {
    /// Type tag of this event, e.g. `"shift-started"`.
    fn event_type(&self) -> &'static str;

    /// Every type tag this event type knows how to decode.
    ///
    /// Stored events whose tag is not listed are treated as unknown and
    /// skipped when folding.
    fn all_event_types() -> &'static [&'static str];
}

/// An event ready to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    /// Identity assigned before the append.
    pub event_id: EventId,
    /// Type tag.
    pub event_type: String,
    /// JSON payload (`Value::Null` for payload-less events).
    pub data: Value,
    /// Causation, correlation and expected revision.
    pub metadata: EventMetadata,
}

impl EventData {
    /// Serializes a domain event for appending.
    pub fn from_event<E: Event>(event: &E, metadata: EventMetadata) -> Result<Self, EventStoreError> {
        let event_type = event.event_type();
        let serialized = serde_json::to_value(event).map_err(|error| {
            EventStoreError::SerializationFailed {
                event_type: event_type.to_string(),
                detail: error.to_string(),
            }
        })?;

        let data = match serialized {
            Value::Object(mut tagged) => tagged.remove("data").unwrap_or(Value::Null),
            other => other,
        };

        Ok(Self {
            event_id: EventId::generate(),
            event_type: event_type.to_string(),
            data,
            metadata,
        })
    }

    /// Builds event data from an already-encoded payload.
    ///
    /// Used by writers that do not own a Rust type for the event, such as
    /// other services sharing the stream.
    pub fn raw(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: EventId::generate(),
            event_type: event_type.into(),
            data,
            metadata: EventMetadata::new(),
        }
    }
}

/// An event as stored in a stream. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Identity of the event.
    pub event_id: EventId,
    /// Stream the event belongs to.
    pub stream_name: StreamName,
    /// Position of the event in its stream, starting at 1.
    pub revision: StreamRevision,
    /// Type tag.
    pub event_type: String,
    /// JSON payload.
    pub data: Value,
    /// Metadata stored with the event.
    pub metadata: EventMetadata,
    /// When the Event Log recorded the event.
    pub recorded_at: Timestamp,
}

impl RecordedEvent {
    /// Decodes the payload as `E`.
    ///
    /// Returns `Ok(None)` when `E` does not know this event's type tag, so
    /// that events appended by newer writers never break older readers.
    /// A known tag with a payload that does not match is an error.
    pub fn decode<E: Event>(&self) -> Result<Option<E>, EventStoreError> {
        if !E::all_event_types().contains(&self.event_type.as_str()) {
            return Ok(None);
        }

        let tagged = if self.data.is_null() {
            json!({ "type": self.event_type })
        } else {
            json!({ "type": self.event_type, "data": self.data })
        };

        serde_json::from_value(tagged)
            .map(Some)
            .map_err(|error| EventStoreError::DeserializationFailed {
                stream: self.stream_name.clone(),
                event_type: self.event_type.clone(),
                detail: error.to_string(),
            })
    }
}

/// Snapshot of one stream returned by a read.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSlice {
    /// The stream that was read.
    pub stream_name: StreamName,
    /// Events in stream order.
    pub events: Vec<RecordedEvent>,
    /// Live revision at the moment of the read.
    pub revision: StreamRevision,
}

impl StreamSlice {
    /// Number of events read.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events were read.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Decodes every known event, in stream order, skipping unknown types.
    pub fn decode<E: Event>(&self) -> Result<Vec<E>, EventStoreError> {
        decode_known(&self.events)
    }
}

/// Decodes the events `E` knows, in order, skipping unknown type tags.
pub fn decode_known<E: Event>(events: &[RecordedEvent]) -> Result<Vec<E>, EventStoreError> {
    let mut decoded = Vec::with_capacity(events.len());
    for recorded in events {
        match recorded.decode::<E>()? {
            Some(event) => decoded.push(event),
            None => tracing::debug!(
                stream = %recorded.stream_name,
                revision = %recorded.revision,
                event_type = %recorded.event_type,
                "event.unknown_type_skipped"
            ),
        }
    }
    Ok(decoded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data", rename_all = "kebab-case")]
    pub(crate) enum LampEvent {
        Installed { lamp_id: String },
        SwitchedOn,
        SwitchedOff,
        BulbReplaced { watts: u32 },
    }

    impl Event for LampEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Installed { .. } => "installed",
                Self::SwitchedOn => "switched-on",
                Self::SwitchedOff => "switched-off",
                Self::BulbReplaced { .. } => "bulb-replaced",
            }
        }

        fn all_event_types() -> &'static [&'static str] {
            &["installed", "switched-on", "switched-off", "bulb-replaced"]
        }
    }

    pub(crate) fn record(stream: &str, revision: u64, data: EventData) -> RecordedEvent {
        RecordedEvent {
            event_id: data.event_id,
            stream_name: StreamName::try_new(stream).unwrap(),
            revision: StreamRevision::new(revision),
            event_type: data.event_type,
            data: data.data,
            metadata: data.metadata,
            recorded_at: Timestamp::now(),
        }
    }

    #[test]
    fn from_event_splits_tag_and_payload() {
        let data = EventData::from_event(
            &LampEvent::Installed {
                lamp_id: "L1".to_string(),
            },
            EventMetadata::new(),
        )
        .unwrap();

        assert_eq!(data.event_type, "installed");
        assert_eq!(data.data, json!({ "lamp_id": "L1" }));
    }

    #[test]
    fn payloadless_events_store_null_data() {
        let data = EventData::from_event(&LampEvent::SwitchedOn, EventMetadata::new()).unwrap();
        assert_eq!(data.event_type, "switched-on");
        assert!(data.data.is_null());
    }

    #[test]
    fn decode_restores_the_domain_event() {
        let original = LampEvent::BulbReplaced { watts: 60 };
        let recorded = record(
            "lamp-L1",
            4,
            EventData::from_event(&original, EventMetadata::new()).unwrap(),
        );

        assert_eq!(recorded.decode::<LampEvent>().unwrap(), Some(original));
    }

    #[test]
    fn decode_skips_unknown_types() {
        let recorded = record("lamp-L1", 1, EventData::raw("lamp-painted", json!({ "colour": "red" })));
        assert_eq!(recorded.decode::<LampEvent>().unwrap(), None);
    }

    #[test]
    fn decode_rejects_malformed_payload_of_known_type() {
        let recorded = record("lamp-L1", 1, EventData::raw("bulb-replaced", json!({ "watts": "bright" })));
        let error = recorded.decode::<LampEvent>().unwrap_err();
        assert!(matches!(
            error,
            EventStoreError::DeserializationFailed { ref event_type, .. } if event_type == "bulb-replaced"
        ));
    }

    #[test]
    fn slice_decode_keeps_stream_order_and_drops_unknowns() {
        let slice = StreamSlice {
            stream_name: StreamName::try_new("lamp-L1").unwrap(),
            events: vec![
                record("lamp-L1", 1, EventData::from_event(&LampEvent::SwitchedOn, EventMetadata::new()).unwrap()),
                record("lamp-L1", 2, EventData::raw("lamp-painted", Value::Null)),
                record("lamp-L1", 3, EventData::from_event(&LampEvent::SwitchedOff, EventMetadata::new()).unwrap()),
            ],
            revision: StreamRevision::new(3),
        };

        assert_eq!(
            slice.decode::<LampEvent>().unwrap(),
            vec![LampEvent::SwitchedOn, LampEvent::SwitchedOff]
        );
    }
}
