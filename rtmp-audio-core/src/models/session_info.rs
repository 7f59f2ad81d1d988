use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::destination::Destination;

/// Counters maintained by the pump loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_captured: u64,
    /// Frames skipped because every encoder input slot was occupied.
    pub frames_dropped: u64,
    pub units_sent: u64,
    /// Units with no payload or a non-positive timestamp.
    pub units_discarded: u64,
    pub bytes_sent: u64,
}

/// Snapshot of the active (or most recent) session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub destination: Destination,
    pub started_at: DateTime<Utc>,
    pub stats: SessionStats,
}

impl SessionInfo {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn report_shape() {
        let info = SessionInfo {
            id: Uuid::nil(),
            destination: Destination::parse("rtmps://example.com/app/key").unwrap(),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            stats: SessionStats {
                frames_captured: 3,
                units_sent: 2,
                bytes_sent: 4096,
                ..SessionStats::default()
            },
        };

        let value: serde_json::Value = serde_json::from_str(&info.to_json().unwrap()).unwrap();
        assert_eq!(value["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["destination"]["scheme"], "rtmps");
        assert_eq!(value["destination"]["port"], 443);
        assert_eq!(value["destination"]["stream_key"], "key");
        assert_eq!(value["started_at"], "2024-05-01T12:00:00Z");
        assert_eq!(value["stats"]["bytes_sent"], 4096);
    }
}
