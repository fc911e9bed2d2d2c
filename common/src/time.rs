use std::time::{SystemTime, UNIX_EPOCH};

// Milliseconds since the unix epoch, used for receipts and telemetry events.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
