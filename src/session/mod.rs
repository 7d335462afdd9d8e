//! Session abstraction over the automated browser.
//!
//! Defines the `SessionDriver` and `TerminalSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide), so the
//! resilience loop can be driven by test doubles.

pub mod chromium;

use crate::error::StreamError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One labeled data region in the terminal's price display, as read from the
/// page. Columns missing either part carry no price (e.g. the instrument
/// symbol column) and are skipped by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoColumn {
    pub label: Option<String>,
    pub value: Option<String>,
}

/// Starts authenticated terminal sessions.
///
/// A driver never retries internally; any navigation or field-interaction
/// failure propagates as a fatal start failure and restarts are the
/// resilience loop's responsibility.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Authenticate a fresh browser session against the terminal.
    async fn start(&self) -> Result<Box<dyn TerminalSession>, StreamError>;
}

/// One authenticated browser context. At most one is active at a time, owned
/// exclusively by the resilience loop.
#[async_trait]
pub trait TerminalSession: Send + Sync {
    /// Read all info columns currently rendered on the price view.
    async fn read_columns(&self) -> Result<Vec<InfoColumn>, StreamError>;

    /// Tear down the session. Best-effort: teardown failures are logged,
    /// never propagated.
    async fn close(self: Box<Self>);
}
