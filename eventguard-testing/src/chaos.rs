use std::time::Duration;

use async_trait::async_trait;
use eventguard::{
    EventData, EventStore, EventStoreError, EventStoreResult, ExpectedRevision, Operation,
    StreamName, StreamRevision, StreamSlice,
};
use nutype::nutype;
use parking_lot::Mutex;
use rand::{random, rngs::StdRng, Rng, SeedableRng};

/// Probability value for chaos injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject and 1.0 means always inject.
///
/// # Examples
///
/// ```
/// use eventguard_testing::chaos::Probability;
///
/// assert!(Probability::try_new(0.5).is_ok());
/// assert!(Probability::try_new(1.5).is_err());
/// assert!(Probability::try_new(-0.1).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

impl Probability {
    /// Clamps into range; NaN means "never".
    fn clamped(value: f32) -> Option<Self> {
        Self::try_new(value.clamp(0.0, 1.0)).ok()
    }
}

/// What to inject and how often. Unset probabilities never inject.
#[derive(Debug, Clone, Default)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Option<Probability>,
    revision_conflict_probability: Option<Probability>,
    latency: Option<Duration>,
    append_ack_latency: Option<Duration>,
}

impl ChaosConfig {
    /// Seeded configuration so runs are reproducible.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Chance that a read or append fails with a store failure.
    #[must_use]
    pub fn with_failure_probability(mut self, probability: f32) -> Self {
        self.failure_probability = Probability::clamped(probability);
        self
    }

    /// Chance that an append fails with a revision conflict.
    #[must_use]
    pub fn with_revision_conflict_probability(mut self, probability: f32) -> Self {
        self.revision_conflict_probability = Probability::clamped(probability);
        self
    }

    /// Delay applied before every delegated operation.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay between a delegated append taking effect and it being
    /// acknowledged, like a store that commits and then stalls on the reply.
    #[must_use]
    pub const fn with_append_ack_latency(mut self, latency: Duration) -> Self {
        self.append_ack_latency = Some(latency);
        self
    }
}

/// Wraps a store in a [`ChaosEventStore`].
pub trait ChaosEventStoreExt: Sized {
    /// Adds fault injection in front of `self`.
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self>;
}

/// An [`EventStore`] that injects failures, conflicts and latency in front
/// of a real store.
#[derive(Debug)]
pub struct ChaosEventStore<S> {
    store: S,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
}

impl<S> ChaosEventStore<S> {
    /// Wraps `store`.
    pub fn new(store: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            store,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    fn should_inject(&self, probability: Option<Probability>) -> bool {
        let Some(probability) = probability else {
            return false;
        };
        let probability: f32 = probability.into();

        if probability <= 0.0 {
            return false;
        }

        if probability >= 1.0 {
            return true;
        }

        self.rng.lock().random_bool(f64::from(probability))
    }

    async fn delay(&self) {
        if let Some(latency) = self.config.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl<S> EventStore for ChaosEventStore<S>
where
    S: EventStore,
{
    async fn read_stream(&self, stream_name: &StreamName) -> EventStoreResult<StreamSlice> {
        let should_fail = self.should_inject(self.config.failure_probability);
        self.delay().await;

        if should_fail {
            tracing::debug!(stream = %stream_name, "chaos.read_failure_injected");
            return Err(EventStoreError::StoreFailure {
                operation: Operation::ReadStream,
                detail: "injected failure".to_string(),
            });
        }

        self.store.read_stream(stream_name).await
    }

    async fn append_to_stream(
        &self,
        stream_name: &StreamName,
        expected_revision: ExpectedRevision,
        events: Vec<EventData>,
    ) -> EventStoreResult<StreamRevision> {
        let should_conflict = self.should_inject(self.config.revision_conflict_probability);
        let should_fail = self.should_inject(self.config.failure_probability);
        self.delay().await;

        if should_conflict {
            // A conflict needs a live stream; a missing one follows the store's
            // own policy instead.
            match self.store.stream_revision(stream_name).await? {
                Some(actual) => {
                    tracing::debug!(stream = %stream_name, "chaos.conflict_injected");
                    return Err(EventStoreError::RevisionConflict {
                        stream: stream_name.clone(),
                        expected: expected_revision,
                        actual: Some(actual),
                    });
                }
                None if matches!(expected_revision, ExpectedRevision::Exact(_)) => {
                    tracing::debug!(stream = %stream_name, "chaos.stream_not_found_injected");
                    return Err(EventStoreError::StreamNotFound(stream_name.clone()));
                }
                None => {}
            }
        }

        if should_fail {
            tracing::debug!(stream = %stream_name, "chaos.append_failure_injected");
            return Err(EventStoreError::StoreFailure {
                operation: Operation::AppendToStream,
                detail: "injected failure".to_string(),
            });
        }

        let revision = self
            .store
            .append_to_stream(stream_name, expected_revision, events)
            .await?;

        if let Some(latency) = self.config.append_ack_latency {
            tracing::debug!(stream = %stream_name, revision = %revision, "chaos.append_ack_delayed");
            tokio::time::sleep(latency).await;
        }
        Ok(revision)
    }

    async fn stream_revision(
        &self,
        stream_name: &StreamName,
    ) -> EventStoreResult<Option<StreamRevision>> {
        self.store.stream_revision(stream_name).await
    }
}

impl<S> ChaosEventStoreExt for S
where
    S: EventStore,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self> {
        ChaosEventStore::new(self, config)
    }
}
