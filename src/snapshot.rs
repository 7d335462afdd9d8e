//! Point-in-time price snapshots.

use serde::{Deserialize, Serialize};

/// Wall-clock timestamp format with microsecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One point-in-time reading of last/bid/ask prices plus capture timestamp.
///
/// The timestamp is always present; the three price fields are independently
/// optional because the source UI may omit a field transiently. Snapshots are
/// created fresh on every extraction cycle, published, and never retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    #[serde(rename = "TIMESTAMP")]
    pub timestamp: String,
    #[serde(rename = "LAST")]
    pub last: Option<String>,
    #[serde(rename = "BID")]
    pub bid: Option<String>,
    #[serde(rename = "ASK")]
    pub ask: Option<String>,
}

impl PriceSnapshot {
    /// Create an empty snapshot carrying only the capture timestamp.
    pub fn new(timestamp: String) -> Self {
        Self {
            timestamp,
            last: None,
            bid: None,
            ask: None,
        }
    }
}

/// Capture the current wall-clock time in the fixed snapshot format.
pub fn capture_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
