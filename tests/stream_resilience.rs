//! Resilience-loop behavior driven by scripted session-driver and publisher
//! doubles. Backoff delays are shrunk to milliseconds so episodes play out
//! quickly.

use async_trait::async_trait;
use pricestream::backoff::BackoffPolicy;
use pricestream::error::StreamError;
use pricestream::publisher::Publisher;
use pricestream::session::{InfoColumn, SessionDriver, TerminalSession};
use pricestream::stream::{PriceStream, ShutdownSignal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_policy() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_millis(1),
        cap: Duration::from_millis(8),
        max_attempts: 5,
    }
}

fn column(label: &str, value: &str) -> InfoColumn {
    InfoColumn {
        label: Some(label.to_string()),
        value: Some(value.to_string()),
    }
}

fn full_columns() -> Vec<InfoColumn> {
    vec![
        column("BID", "21049.75"),
        column("ASK", "21050.50"),
        column("LAST", "21050.25"),
    ]
}

type ReadResult = Result<Vec<InfoColumn>, StreamError>;

/// Session whose reads are scripted front-to-back; once the script runs out,
/// reads fail like a dead browser. Optionally triggers shutdown on each read
/// to simulate an operator interrupt arriving mid-streaming.
struct ScriptedSession {
    reads: Mutex<Vec<ReadResult>>,
    closed: Arc<AtomicUsize>,
    interrupt_on_read: Option<Arc<ShutdownSignal>>,
}

impl ScriptedSession {
    fn new(reads: Vec<ReadResult>, closed: Arc<AtomicUsize>) -> Self {
        Self {
            reads: Mutex::new(reads),
            closed,
            interrupt_on_read: None,
        }
    }
}

#[async_trait]
impl TerminalSession for ScriptedSession {
    async fn read_columns(&self) -> ReadResult {
        if let Some(signal) = &self.interrupt_on_read {
            signal.trigger();
        }
        let mut reads = self.reads.lock().unwrap();
        if reads.is_empty() {
            Err(StreamError::Transport("scripted session exhausted".into()))
        } else {
            reads.remove(0)
        }
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

type StartResult = Result<Box<dyn TerminalSession>, StreamError>;

struct ScriptedDriver {
    outcomes: Mutex<Vec<StartResult>>,
    starts: AtomicUsize,
}

impl ScriptedDriver {
    fn new(outcomes: Vec<StartResult>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            starts: AtomicUsize::new(0),
        }
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionDriver for ScriptedDriver {
    async fn start(&self) -> StartResult {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            Err(StreamError::Auth("scripted driver exhausted".into()))
        } else {
            outcomes.remove(0)
        }
    }
}

struct RecordingPublisher {
    messages: Mutex<Vec<(String, String)>>,
    fail_next: AtomicUsize,
    interrupt_on_publish: Option<Arc<ShutdownSignal>>,
}

impl RecordingPublisher {
    fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            interrupt_on_publish: None,
        }
    }

    fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StreamError> {
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(StreamError::Publish("injected publish failure".into()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((channel.to_string(), payload.to_string()));
        if let Some(signal) = &self.interrupt_on_publish {
            signal.trigger();
        }
        Ok(())
    }
}

fn stream_under_test(
    driver: Arc<ScriptedDriver>,
    publisher: Arc<RecordingPublisher>,
) -> PriceStream {
    PriceStream::new(driver, publisher, fast_policy(), "TEST_PRICESTREAM".into())
}

#[tokio::test]
async fn five_consecutive_start_failures_are_fatal_with_no_sixth_attempt() {
    let driver = Arc::new(ScriptedDriver::new(
        (0..10)
            .map(|i| Err(StreamError::Transport(format!("connect refused #{i}"))))
            .collect(),
    ));
    let publisher = Arc::new(RecordingPublisher::new());
    let stream = stream_under_test(Arc::clone(&driver), Arc::clone(&publisher));

    let result = stream.run(&ShutdownSignal::new()).await;

    assert!(matches!(result, Err(StreamError::Transport(_))));
    assert_eq!(driver.starts(), 5, "no sixth attempt may be made");
    assert!(publisher.messages().is_empty());
}

#[tokio::test]
async fn partial_snapshot_publishes_nulls_and_counts_as_success() {
    let shutdown = ShutdownSignal::new();
    let closed = Arc::new(AtomicUsize::new(0));

    // One read with only LAST rendered; the interrupt lands during the read,
    // so the loop finishes the publish and then observes it between cycles.
    let mut session = ScriptedSession::new(
        vec![Ok(vec![column("LAST", "21050.25")])],
        Arc::clone(&closed),
    );
    session.interrupt_on_read = Some(Arc::clone(&shutdown));

    let driver = Arc::new(ScriptedDriver::new(vec![Ok(Box::new(session) as _)]));
    let publisher = Arc::new(RecordingPublisher::new());
    let stream = stream_under_test(Arc::clone(&driver), Arc::clone(&publisher));

    stream.run(&shutdown).await.expect("clean shutdown");

    let messages = publisher.messages();
    assert_eq!(messages.len(), 1);
    let (channel, payload) = &messages[0];
    assert_eq!(channel, "TEST_PRICESTREAM");

    let value: serde_json::Value = serde_json::from_str(payload).unwrap();
    assert!(value["TIMESTAMP"].is_string());
    assert!(!value["TIMESTAMP"].as_str().unwrap().is_empty());
    assert_eq!(value["LAST"], "21050.25");
    assert!(value["BID"].is_null());
    assert!(value["ASK"].is_null());
}

#[tokio::test]
async fn cancellation_between_cycles_tears_down_once_without_restart() {
    let shutdown = ShutdownSignal::new();
    let closed = Arc::new(AtomicUsize::new(0));

    let mut session = ScriptedSession::new(
        vec![Ok(full_columns()), Ok(full_columns())],
        Arc::clone(&closed),
    );
    session.interrupt_on_read = Some(Arc::clone(&shutdown));

    let driver = Arc::new(ScriptedDriver::new(vec![Ok(Box::new(session) as _)]));
    let publisher = Arc::new(RecordingPublisher::new());
    let stream = stream_under_test(Arc::clone(&driver), Arc::clone(&publisher));

    let result = stream.run(&shutdown).await;

    assert!(result.is_ok(), "cancellation is the clean exit path");
    assert_eq!(closed.load(Ordering::SeqCst), 1, "teardown exactly once");
    assert_eq!(driver.starts(), 1, "no restart after cancellation");
    assert_eq!(publisher.messages().len(), 1);
}

#[tokio::test]
async fn retry_counter_resets_on_publish_not_on_login() {
    let closed = Arc::new(AtomicUsize::new(0));

    // Session 1 logs in but yields zero info columns: one failed attempt.
    let no_data = ScriptedSession::new(vec![Ok(Vec::new())], Arc::clone(&closed));
    // Session 2 publishes once (resetting the budget), then the browser dies.
    let healthy_then_dead = ScriptedSession::new(
        vec![
            Ok(full_columns()),
            Err(StreamError::Transport("browser gone".into())),
        ],
        Arc::clone(&closed),
    );

    // After the reset, a full budget of 5 fresh failures is needed before the
    // fatal escalation: the transport loss plus four failed starts.
    let driver = Arc::new(ScriptedDriver::new(vec![
        Ok(Box::new(no_data) as _),
        Ok(Box::new(healthy_then_dead) as _),
        Err(StreamError::Transport("down".into())),
        Err(StreamError::Transport("down".into())),
        Err(StreamError::Transport("down".into())),
        Err(StreamError::Transport("down".into())),
    ]));
    let publisher = Arc::new(RecordingPublisher::new());
    let stream = stream_under_test(Arc::clone(&driver), Arc::clone(&publisher));

    let result = stream.run(&ShutdownSignal::new()).await;

    assert!(result.is_err());
    assert_eq!(
        driver.starts(),
        6,
        "successful publish must reset the attempt counter"
    );
    assert_eq!(publisher.messages().len(), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 2, "both sessions torn down");
}

#[tokio::test]
async fn login_alone_never_resets_the_retry_counter() {
    let closed = Arc::new(AtomicUsize::new(0));

    // Every session authenticates fine but the price region never renders.
    let outcomes: Vec<StartResult> = (0..10)
        .map(|_| {
            Ok(Box::new(ScriptedSession::new(
                vec![Ok(Vec::new())],
                Arc::clone(&closed),
            )) as _)
        })
        .collect();

    let driver = Arc::new(ScriptedDriver::new(outcomes));
    let publisher = Arc::new(RecordingPublisher::new());
    let stream = stream_under_test(Arc::clone(&driver), Arc::clone(&publisher));

    let result = stream.run(&ShutdownSignal::new()).await;

    assert!(matches!(result, Err(StreamError::NoData)));
    assert_eq!(driver.starts(), 5, "logins alone must not refill the budget");
    assert!(publisher.messages().is_empty());
    assert_eq!(closed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn publish_failure_is_logged_not_restarted() {
    let shutdown = ShutdownSignal::new();
    let closed = Arc::new(AtomicUsize::new(0));

    let session = ScriptedSession::new(
        vec![Ok(full_columns()), Ok(full_columns())],
        Arc::clone(&closed),
    );
    let driver = Arc::new(ScriptedDriver::new(vec![Ok(Box::new(session) as _)]));

    // First publish fails; the second succeeds and triggers the interrupt so
    // the loop exits cleanly.
    let mut publisher = RecordingPublisher::new();
    publisher.fail_next.store(1, Ordering::SeqCst);
    publisher.interrupt_on_publish = Some(Arc::clone(&shutdown));
    let publisher = Arc::new(publisher);

    let stream = stream_under_test(Arc::clone(&driver), Arc::clone(&publisher));
    stream.run(&shutdown).await.expect("clean shutdown");

    assert_eq!(driver.starts(), 1, "publish failure must not restart");
    assert_eq!(
        publisher.messages().len(),
        1,
        "the next cycle retries with fresh data"
    );
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}
