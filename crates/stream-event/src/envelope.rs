//! The wire envelope: `{event_id, event_type, timestamp, session_id, payload}`
//! One JSON object per line, ndjson-framed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::event::EventPayload;

/// A fully-addressed event ready to be written to the wire. `event_id` is the
/// publishing outbox row's id (`OutboxRow.id` doubles as the public
/// `event_id` clients dedupe on); it is `None` only for the synthetic
/// heartbeat, which is never deduped because it is never buffered.
#[derive(Clone, Debug, Serialize)]
pub struct StreamEnvelope {
    pub event_id: Option<Uuid>,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    pub payload: serde_json::Value,
}

impl StreamEnvelope {
    pub fn new(
        event_id: Option<Uuid>,
        session_id: Uuid,
        timestamp: DateTime<Utc>,
        payload: &EventPayload,
    ) -> Self {
        Self {
            event_id,
            event_type: payload.kind().to_string(),
            timestamp,
            session_id,
            payload: payload.to_payload_value(),
        }
    }

    pub fn heartbeat(session_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self::new(None, session_id, timestamp, &EventPayload::Heartbeat)
    }

    /// Renders one ndjson line: a JSON object followed by `\n` (wire
    /// frame). Never panics — `StreamEnvelope`'s fields are all directly
    /// serializable.
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"event_type":"error","message":"serialize failure: {e}"}}"#)
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_line_has_trailing_newline_and_no_embedded_newline() {
        let env = StreamEnvelope::new(
            Some(Uuid::nil()),
            Uuid::nil(),
            Utc::now(),
            &EventPayload::TaskStarted {
                task_id: Uuid::nil(),
            },
        );
        let line = env.to_ndjson_line();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn heartbeat_has_no_event_id() {
        let env = StreamEnvelope::heartbeat(Uuid::nil(), Utc::now());
        assert!(env.event_id.is_none());
        assert_eq!(env.event_type, "heartbeat");
    }
}
