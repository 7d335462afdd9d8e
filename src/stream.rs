//! Resilience loop — the state machine that keeps the stream alive.
//!
//! `STARTING → LOGGED_IN → STREAMING → (RESTARTING ⟲ STARTING) → SHUT_DOWN`.
//!
//! One session is processed at a time and the scrape/publish/backoff sequence
//! is strictly sequential; cancellation is observed between cycles so an
//! in-flight publish always completes before teardown.

use crate::backoff::{BackoffPolicy, RetryState};
use crate::error::StreamError;
use crate::extract;
use crate::publisher::Publisher;
use crate::session::{SessionDriver, TerminalSession};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Operator cancellation signal, observable as a flag between cycles and
/// awaitable during backoff waits.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    notify: Notify,
    triggered: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark shutdown requested and wake any waiter.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if it already was.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.triggered() {
            return;
        }
        notified.await;
    }
}

/// Outcome of one scrape/publish cycle.
enum CycleOutcome {
    Published,
    /// Publish failed; logged, no restart — the next cycle retries with
    /// fresh data.
    PublishFailed,
}

/// Why the streaming state was left.
enum StreamExit {
    Cancelled,
    SessionLost(StreamError),
}

/// Continue/stop decision after a backoff wait.
enum Backoff {
    Continue,
    Cancelled,
}

/// The resilient extraction loop.
///
/// Owns the session lifecycle exclusively: it is the only entity that creates
/// or destroys sessions, and teardown runs exactly once per session on every
/// exit path.
pub struct PriceStream {
    driver: Arc<dyn SessionDriver>,
    publisher: Arc<dyn Publisher>,
    policy: BackoffPolicy,
    channel: String,
}

impl PriceStream {
    pub fn new(
        driver: Arc<dyn SessionDriver>,
        publisher: Arc<dyn Publisher>,
        policy: BackoffPolicy,
        channel: String,
    ) -> Self {
        Self {
            driver,
            publisher,
            policy,
            channel,
        }
    }

    /// Run until operator cancellation (`Ok`) or retry-budget exhaustion
    /// (`Err` with the terminal failure).
    pub async fn run(&self, shutdown: &ShutdownSignal) -> Result<(), StreamError> {
        let mut retry = RetryState::new();
        let mut announced = false;

        loop {
            if shutdown.triggered() {
                info!("shutdown requested, not starting a new session");
                return Ok(());
            }

            // STARTING
            let session = match self.driver.start().await {
                Ok(session) => session,
                Err(err) => {
                    error!("session start failed: {err}");
                    match self.apply_backoff(&mut retry, err, shutdown).await? {
                        Backoff::Continue => continue,
                        Backoff::Cancelled => return Ok(()),
                    }
                }
            };

            // LOGGED_IN; the retry budget is NOT reset here — a session that
            // logs in but never extracts a price is still failing.
            info!("login successful, entering scrape loop");

            // STREAMING
            let exit = self
                .stream_cycles(session.as_ref(), &mut retry, &mut announced, shutdown)
                .await;

            // Guaranteed teardown, exactly once per session.
            session.close().await;

            match exit {
                StreamExit::Cancelled => {
                    info!("operator cancellation, session torn down");
                    return Ok(());
                }
                StreamExit::SessionLost(err) => {
                    error!("streaming failed: {err}; restarting session");
                    match self.apply_backoff(&mut retry, err, shutdown).await? {
                        Backoff::Continue => continue,
                        Backoff::Cancelled => return Ok(()),
                    }
                }
            }
        }
    }

    /// Steady-state self-loop: extract, publish, reset retry state.
    async fn stream_cycles(
        &self,
        session: &dyn TerminalSession,
        retry: &mut RetryState,
        announced: &mut bool,
        shutdown: &ShutdownSignal,
    ) -> StreamExit {
        loop {
            match self.run_cycle(session).await {
                Ok(CycleOutcome::Published) => {
                    retry.reset();
                    if !*announced {
                        info!("scrape loop connected and streaming price data");
                        *announced = true;
                    }
                }
                Ok(CycleOutcome::PublishFailed) => {}
                Err(err) => return StreamExit::SessionLost(err),
            }

            // Cancellation is observed between cycles only, so the in-flight
            // publish above has already completed.
            if shutdown.triggered() {
                return StreamExit::Cancelled;
            }
        }
    }

    async fn run_cycle(&self, session: &dyn TerminalSession) -> Result<CycleOutcome, StreamError> {
        let started = Instant::now();

        let snapshot = extract::extract(session).await?;
        let payload = serde_json::to_string(&snapshot)
            .map_err(|e| StreamError::Publish(format!("snapshot serialization failed: {e}")))?;

        let outcome = match self.publisher.publish(&self.channel, &payload).await {
            Ok(()) => {
                debug!("published snapshot: {payload}");
                CycleOutcome::Published
            }
            Err(err) => {
                error!("publish failed: {err}");
                CycleOutcome::PublishFailed
            }
        };

        debug!("cycle executed in {:.4}s", started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Record a failure and wait out the computed backoff delay.
    ///
    /// Returns `Err` with the causing failure once the attempt budget is
    /// exhausted, `Backoff::Cancelled` if shutdown arrives during the wait.
    async fn apply_backoff(
        &self,
        retry: &mut RetryState,
        cause: StreamError,
        shutdown: &ShutdownSignal,
    ) -> Result<Backoff, StreamError> {
        let attempt = retry.record_failure();
        if attempt >= self.policy.max_attempts {
            error!(
                "retry budget exhausted after {attempt} consecutive attempt(s)"
            );
            return Err(cause);
        }

        let delay = self.policy.delay_for(attempt);
        warn!(
            "restart attempt {attempt}/{} in {}ms",
            self.policy.max_attempts,
            delay.as_millis()
        );
        tokio::select! {
            _ = shutdown.wait() => Ok(Backoff::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(Backoff::Continue),
        }
    }
}
