use serde::Serialize;

/// Structured trace events emitted across all spotweb crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionConnected {
        access_point: String,
        reconnect: bool,
    },
    SessionEnded {
        deliberate: bool,
    },
    ReconnectScheduled {
        attempt: u64,
        delay_ms: u64,
    },
    MercuryRequest {
        uri: String,
        method: String,
        status: Option<i32>,
        duration_ms: u64,
    },
    BatchIssued {
        uri: String,
        size: usize,
    },
    CallTimedOut {
        message_id: u64,
        command: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(
            trace_event = %json,
            at = %chrono::Utc::now().to_rfc3339(),
            "sw_event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_value(TraceEvent::BatchIssued {
            uri: "hm://metadata/tracks".into(),
            size: 3,
        })
        .unwrap();
        assert_eq!(json["event"], "BatchIssued");
        assert_eq!(json["size"], 3);
    }
}
