use std::fmt;
use std::sync::Arc;

use eventguard::{
    EventData, EventStore, EventStoreError, ExpectedRevision, StreamName, StreamRevision,
};
use serde_json::json;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Number of writers racing in [`test_concurrent_exclusion`].
const CONTENDERS: usize = 8;

#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(
        scenario: &'static str,
        operation: &'static str,
        error: &EventStoreError,
    ) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

pub type ContractTestResult = Result<(), ContractTestFailure>;

fn contract_stream(scenario: &'static str, label: &str) -> Result<StreamName, ContractTestFailure> {
    // Unique per run so suites can share one backing store.
    let raw = format!("contract-{scenario}-{label}-{}", Uuid::now_v7());

    StreamName::try_new(raw.clone()).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct stream name `{raw}`: {error}"),
        )
    })
}

fn contract_event(label: &str) -> EventData {
    EventData::raw("contract-test-event", json!({ "label": label }))
}

fn revision(value: u64) -> StreamRevision {
    StreamRevision::new(value)
}

async fn append<S: EventStore>(
    scenario: &'static str,
    store: &S,
    stream: &StreamName,
    expected: ExpectedRevision,
    events: Vec<EventData>,
) -> Result<StreamRevision, ContractTestFailure> {
    store
        .append_to_stream(stream, expected, events)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "append_to_stream", &error))
}

fn expect_revision(
    scenario: &'static str,
    what: &str,
    actual: StreamRevision,
    expected: StreamRevision,
) -> ContractTestResult {
    if actual == expected {
        Ok(())
    } else {
        Err(ContractTestFailure::assertion(
            scenario,
            format!("{what}: expected revision {expected}, got {actual}"),
        ))
    }
}

pub async fn test_read_missing_stream<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "read_missing_stream";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "ghost")?;

    match store.read_stream(&stream).await {
        Err(EventStoreError::StreamNotFound(name)) if name == stream => {}
        Err(error) => return Err(ContractTestFailure::store_error(SCENARIO, "read_stream", &error)),
        Ok(slice) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("expected STREAM_NOT_FOUND, read {} events", slice.len()),
            ))
        }
    }

    match store.stream_revision(&stream).await {
        Ok(None) => Ok(()),
        Ok(Some(revision)) => Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("missing stream reported revision {revision}"),
        )),
        Err(error) => Err(ContractTestFailure::store_error(SCENARIO, "stream_revision", &error)),
    }
}

pub async fn test_basic_append_read<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "basic_append_read";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "single")?;

    let first = append(SCENARIO, &store, &stream, ExpectedRevision::NoStream, vec![contract_event("first")]).await?;
    expect_revision(SCENARIO, "first append", first, revision(1))?;

    let second = append(SCENARIO, &store, &stream, ExpectedRevision::Exact(first), vec![contract_event("second")]).await?;
    expect_revision(SCENARIO, "second append", second, revision(2))?;

    let slice = store
        .read_stream(&stream)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", &error))?;

    expect_revision(SCENARIO, "read", slice.revision, revision(2))?;

    let labels: Vec<_> = slice
        .events
        .iter()
        .map(|event| event.data["label"].as_str().unwrap_or_default().to_string())
        .collect();
    if labels != ["first", "second"] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("events out of order or missing: {labels:?}"),
        ));
    }

    let positions: Vec<_> = slice.events.iter().map(|event| event.revision).collect();
    if positions != [revision(1), revision(2)] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("events carry wrong revisions: {positions:?}"),
        ));
    }

    Ok(())
}

pub async fn test_revision_conflict<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "revision_conflict";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "shared")?;

    append(SCENARIO, &store, &stream, ExpectedRevision::NoStream, vec![contract_event("one")]).await?;
    append(SCENARIO, &store, &stream, ExpectedRevision::Exact(revision(1)), vec![contract_event("two")]).await?;

    let stale = ExpectedRevision::Exact(revision(1));
    match store
        .append_to_stream(&stream, stale, vec![contract_event("stale")])
        .await
    {
        Err(EventStoreError::RevisionConflict { expected, actual, .. })
            if expected == stale && actual == Some(revision(2)) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(SCENARIO, "append_to_stream", &error))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected revision conflict but append succeeded",
            ))
        }
    }

    // A rejected append must leave no trace.
    let slice = store
        .read_stream(&stream)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", &error))?;
    expect_revision(SCENARIO, "after conflict", slice.revision, revision(2))?;
    if slice.len() != 2 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("conflicting append leaked events: stream holds {}", slice.len()),
        ));
    }

    Ok(())
}

pub async fn test_no_stream_expectation<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "no_stream_expectation";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "create-once")?;

    append(SCENARIO, &store, &stream, ExpectedRevision::NoStream, vec![contract_event("created")]).await?;

    match store
        .append_to_stream(&stream, ExpectedRevision::NoStream, vec![contract_event("again")])
        .await
    {
        Err(EventStoreError::RevisionConflict { actual: Some(actual), .. }) if actual == revision(1) => Ok(()),
        Err(error) => Err(ContractTestFailure::store_error(SCENARIO, "append_to_stream", &error)),
        Ok(_) => Err(ContractTestFailure::assertion(
            SCENARIO,
            "NoStream append succeeded against an existing stream",
        )),
    }
}

pub async fn test_exact_on_missing_stream<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "exact_on_missing_stream";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "absent")?;

    match store
        .append_to_stream(&stream, ExpectedRevision::Exact(revision(1)), vec![contract_event("orphan")])
        .await
    {
        Err(EventStoreError::StreamNotFound(name)) if name == stream => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(SCENARIO, "append_to_stream", &error))
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "Exact append created a stream that did not exist",
            ))
        }
    }

    match store.stream_revision(&stream).await {
        Ok(None) => Ok(()),
        Ok(Some(revision)) => Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("failed append left the stream at revision {revision}"),
        )),
        Err(error) => Err(ContractTestFailure::store_error(SCENARIO, "stream_revision", &error)),
    }
}

pub async fn test_concurrent_exclusion<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "concurrent_exclusion";

    let store = Arc::new(make_store());
    let stream = contract_stream(SCENARIO, "contended")?;

    let base = append(SCENARIO, &store, &stream, ExpectedRevision::NoStream, vec![contract_event("base")]).await?;

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let mut handles = Vec::with_capacity(CONTENDERS);
    for contender in 0..CONTENDERS {
        let store = Arc::clone(&store);
        let stream = stream.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            let _ = barrier.wait().await;
            store
                .append_to_stream(
                    &stream,
                    ExpectedRevision::Exact(base),
                    vec![contract_event(&format!("contender-{contender}"))],
                )
                .await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => winners += 1,
            Ok(Err(EventStoreError::RevisionConflict { .. })) => conflicts += 1,
            Ok(Err(error)) => {
                return Err(ContractTestFailure::store_error(SCENARIO, "append_to_stream", &error))
            }
            Err(join_error) => {
                return Err(ContractTestFailure::assertion(
                    SCENARIO,
                    format!("contender task failed: {join_error}"),
                ))
            }
        }
    }

    if winners != 1 || conflicts != CONTENDERS - 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected exactly one winner, got {winners} winners and {conflicts} conflicts"),
        ));
    }

    let live = store
        .stream_revision(&stream)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "stream_revision", &error))?;
    if live != Some(base.next_by(1)) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected revision {} after the race, got {live:?}", base.next_by(1)),
        ));
    }

    Ok(())
}

pub async fn test_batch_append<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "batch_append";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "batch")?;

    let batch = vec![contract_event("a"), contract_event("b"), contract_event("c")];
    let after_batch = append(SCENARIO, &store, &stream, ExpectedRevision::NoStream, batch).await?;
    expect_revision(SCENARIO, "batch append", after_batch, revision(3))?;

    // The returned revision is the next expected revision.
    let after_next = append(SCENARIO, &store, &stream, ExpectedRevision::Exact(after_batch), vec![contract_event("d")]).await?;
    expect_revision(SCENARIO, "follow-up append", after_next, revision(4))?;

    match store
        .append_to_stream(&stream, ExpectedRevision::Any, Vec::new())
        .await
    {
        Err(EventStoreError::NothingToAppend(_)) => Ok(()),
        Err(error) => Err(ContractTestFailure::store_error(SCENARIO, "append_to_stream", &error)),
        Ok(_) => Err(ContractTestFailure::assertion(
            SCENARIO,
            "empty append was accepted",
        )),
    }
}

pub async fn test_stream_isolation<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "stream_isolation";

    let store = make_store();
    let stream_a = contract_stream(SCENARIO, "a")?;
    let stream_b = contract_stream(SCENARIO, "b")?;

    append(SCENARIO, &store, &stream_a, ExpectedRevision::NoStream, vec![contract_event("a1"), contract_event("a2")]).await?;
    let b = append(SCENARIO, &store, &stream_b, ExpectedRevision::NoStream, vec![contract_event("b1")]).await?;
    expect_revision(SCENARIO, "independent stream", b, revision(1))?;

    let slice = store
        .read_stream(&stream_b)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", &error))?;

    if slice.events.iter().any(|event| event.stream_name != stream_b) || slice.len() != 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "read of stream-b returned events from another stream",
        ));
    }

    Ok(())
}

pub async fn test_any_expectation<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + 'static,
{
    const SCENARIO: &str = "any_expectation";

    let store = make_store();
    let stream = contract_stream(SCENARIO, "unguarded")?;

    let created = append(SCENARIO, &store, &stream, ExpectedRevision::Any, vec![contract_event("first")]).await?;
    expect_revision(SCENARIO, "Any on a missing stream", created, revision(1))?;

    let extended = append(SCENARIO, &store, &stream, ExpectedRevision::Any, vec![contract_event("second")]).await?;
    expect_revision(SCENARIO, "Any on an existing stream", extended, revision(2))
}

#[macro_export]
macro_rules! event_store_contract_tests {
    (suite = $suite:ident, make_store = $make_store:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_any_expectation, test_basic_append_read, test_batch_append,
                test_concurrent_exclusion, test_exact_on_missing_stream,
                test_no_stream_expectation, test_read_missing_stream, test_revision_conflict,
                test_stream_isolation,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn read_missing_stream_contract() {
                test_read_missing_stream($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn basic_append_read_contract() {
                test_basic_append_read($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn revision_conflict_contract() {
                test_revision_conflict($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn no_stream_expectation_contract() {
                test_no_stream_expectation($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn exact_on_missing_stream_contract() {
                test_exact_on_missing_stream($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn concurrent_exclusion_contract() {
                test_concurrent_exclusion($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn batch_append_contract() {
                test_batch_append($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn stream_isolation_contract() {
                test_stream_isolation($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn any_expectation_contract() {
                test_any_expectation($make_store)
                    .await
                    .expect("event store contract failed");
            }
        }
    };
}

pub use event_store_contract_tests;
