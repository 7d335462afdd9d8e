//! Extraction routine — map rendered info columns to a price snapshot.

use crate::error::StreamError;
use crate::session::{InfoColumn, TerminalSession};
use crate::snapshot::{self, PriceSnapshot};

/// Page script returning every info column as a `{label, value}` pair.
///
/// The label lives in a `small.text-muted` child and the price figure in a
/// `.number` child; auxiliary columns (e.g. the instrument symbol) carry
/// neither and come back as nulls.
pub const INFO_COLUMN_QUERY: &str = r#"
Array.from(document.querySelectorAll('.info-column')).map((column) => {
    const label = column.querySelector('small.text-muted');
    const value = column.querySelector('.number');
    return {
        label: label ? label.innerText.trim() : null,
        value: value ? value.innerText.trim() : null,
    };
})
"#;

/// Read the current price snapshot from an active session.
///
/// The timestamp is captured at the moment of the query to bound staleness.
/// Zero info columns means the page is not in the expected state (logged out,
/// still loading, or the UI changed) and fails with [`StreamError::NoData`].
/// A successful call always returns a timestamp; price fields default to
/// absent so the stream stays degraded-but-alive when a field is transiently
/// unrendered.
pub async fn extract(session: &dyn TerminalSession) -> Result<PriceSnapshot, StreamError> {
    let timestamp = snapshot::capture_timestamp();
    let columns = session.read_columns().await?;
    if columns.is_empty() {
        return Err(StreamError::NoData);
    }
    Ok(fold_columns(&columns, timestamp))
}

/// Fold labeled columns into a snapshot.
///
/// Recognized labels are exactly `ASK`, `BID`, `LAST` (case-sensitive); any
/// other label is ignored. Columns missing a label or value are skipped
/// silently.
pub fn fold_columns(columns: &[InfoColumn], timestamp: String) -> PriceSnapshot {
    let mut snapshot = PriceSnapshot::new(timestamp);
    for column in columns {
        let (Some(label), Some(value)) = (&column.label, &column.value) else {
            continue;
        };
        let value = value.trim();
        match label.as_str() {
            "LAST" => snapshot.last = Some(value.to_string()),
            "BID" => snapshot.bid = Some(value.to_string()),
            "ASK" => snapshot.ask = Some(value.to_string()),
            _ => {}
        }
    }
    snapshot
}
