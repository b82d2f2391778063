//! Fan-out from one publisher to many readers per session. A
//! slow reader whose bounded queue is full is dropped rather than made to
//! backpressure the publisher or every other reader.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atrium_core::{CoreError, SessionId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use stream_event::{EventPayload, StreamEnvelope};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ring::RingBuffer;

/// The broadcast hand-off the outbox publisher drives retry/backoff from:
/// `atrium-stream` implements it for real delivery, tests substitute a fake
/// that fails on command, the same shape `atrium-bus::TaskExecutor` uses to
/// make agent execution fault-injectable.
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn publish_rendered(
        &self,
        session_id: SessionId,
        event_id: Option<Uuid>,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoreError>;
}

struct Reader {
    id: Uuid,
    tx: mpsc::Sender<StreamEnvelope>,
}

struct SessionState {
    ring: RingBuffer,
    readers: Vec<Reader>,
}

struct SessionHandle {
    state: Mutex<SessionState>,
    heartbeat: JoinHandle<()>,
}

pub struct StreamManager {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    ring_capacity: usize,
    ring_ttl: Duration,
    reader_queue_capacity: usize,
    heartbeat_interval: Duration,
}

impl StreamManager {
    pub fn new(
        ring_capacity: usize,
        ring_ttl: Duration,
        reader_queue_capacity: usize,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            ring_capacity,
            ring_ttl,
            reader_queue_capacity,
            heartbeat_interval,
        }
    }

    fn handle_for(self: &Arc<Self>, session_id: SessionId) -> Arc<SessionHandle> {
        if let Some(existing) = self.sessions.get(&session_id) {
            return existing.clone();
        }
        let state = Mutex::new(SessionState {
            ring: RingBuffer::new(self.ring_capacity, self.ring_ttl),
            readers: Vec::new(),
        });
        let manager = self.clone();
        let heartbeat = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.heartbeat_interval);
            loop {
                ticker.tick().await;
                manager.broadcast_heartbeat(session_id).await;
            }
        });
        let handle = Arc::new(SessionHandle { state, heartbeat });
        self.sessions.insert(session_id, handle.clone());
        handle
    }

    async fn broadcast_heartbeat(&self, session_id: SessionId) {
        let Some(handle) = self.sessions.get(&session_id).map(|h| h.clone()) else {
            return;
        };
        let envelope = StreamEnvelope::heartbeat(session_id.as_uuid(), Utc::now());
        let mut state = handle.state.lock().await;
        state.readers.retain(|r| r.tx.try_send(envelope.clone()).is_ok());
    }

    /// Publishes one event: appends it to the session's ring buffer (for
    /// future resume) and fans it out to every currently-subscribed reader.
    pub async fn publish(self: &Arc<Self>, session_id: SessionId, event_id: Option<Uuid>, payload: &EventPayload) {
        let envelope = StreamEnvelope::new(event_id, session_id.as_uuid(), Utc::now(), payload);
        self.publish_envelope(session_id, envelope, payload.is_heartbeat()).await;
    }

    /// Publishes an already-rendered envelope (the outbox publisher's path:
    /// the wire shape was fixed at write time, so there is no `EventPayload`
    /// to reconstruct from the stored row). In-process fan-out never fails
    /// once a session handle exists, so this always returns `Ok`; the
    /// fallible signature is for `EventBroadcaster` callers that may not be
    /// talking to this in-process manager at all.
    pub async fn publish_rendered(
        self: &Arc<Self>,
        session_id: SessionId,
        event_id: Option<Uuid>,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoreError> {
        let envelope = StreamEnvelope {
            event_id,
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            session_id: session_id.as_uuid(),
            payload,
        };
        self.publish_envelope(session_id, envelope, false).await;
        Ok(())
    }

    async fn publish_envelope(self: &Arc<Self>, session_id: SessionId, envelope: StreamEnvelope, is_heartbeat: bool) {
        let handle = self.handle_for(session_id);
        let mut state = handle.state.lock().await;
        if !is_heartbeat {
            state.ring.push(envelope.clone());
        }
        state.readers.retain(|r| r.tx.try_send(envelope.clone()).is_ok());
    }

    /// Subscribes a new reader. When `since` is `Some`, replays every ring
    /// entry strictly newer than that watermark before the reader starts
    /// receiving the live tail, so a resumed client sees a gap-free sequence.
    pub async fn subscribe(
        self: &Arc<Self>,
        session_id: SessionId,
        since: Option<DateTime<Utc>>,
    ) -> mpsc::Receiver<StreamEnvelope> {
        let handle = self.handle_for(session_id);
        let (tx, rx) = mpsc::channel(self.reader_queue_capacity);
        let mut state = handle.state.lock().await;
        if let Some(since) = since {
            for envelope in state.ring.replay_since(since) {
                // Backlog replay blocks briefly rather than dropping; only
                // the live tail drops a reader that cannot keep up.
                let _ = tx.send(envelope).await;
            }
        }
        state.readers.push(Reader { id: Uuid::new_v4(), tx });
        rx
    }

    pub fn remove_session(&self, session_id: SessionId) {
        if let Some((_, handle)) = self.sessions.remove(&session_id) {
            handle.heartbeat.abort();
        }
    }
}

/// Adapts an `Arc<StreamManager>` to [`EventBroadcaster`]: the manager's own
/// methods take `self: &Arc<Self>` (session handles spawn heartbeat tasks
/// that outlive any single call), which a plain `&self` trait method can't
/// receive directly, so this holds the `Arc` itself instead of the manager.
pub struct StreamBroadcaster(Arc<StreamManager>);

impl StreamBroadcaster {
    pub fn new(manager: Arc<StreamManager>) -> Self {
        Self(manager)
    }
}

#[async_trait]
impl EventBroadcaster for StreamBroadcaster {
    async fn publish_rendered(
        &self,
        session_id: SessionId,
        event_id: Option<Uuid>,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoreError> {
        self.0.publish_rendered(session_id, event_id, event_type, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribed_reader() {
        let manager = Arc::new(StreamManager::new(16, Duration::from_secs(60), 8, Duration::from_secs(30)));
        let session_id = SessionId::new();
        let mut rx = manager.subscribe(session_id, None).await;
        manager
            .publish(session_id, Some(Uuid::new_v4()), &EventPayload::TaskStarted { task_id: Uuid::nil() })
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "task_started");
    }

    #[tokio::test]
    async fn resume_replays_only_events_after_watermark() {
        let manager = Arc::new(StreamManager::new(16, Duration::from_secs(60), 8, Duration::from_secs(30)));
        let session_id = SessionId::new();
        manager
            .publish(session_id, Some(Uuid::new_v4()), &EventPayload::TaskStarted { task_id: Uuid::nil() })
            .await;
        let watermark = Utc::now();
        manager
            .publish(session_id, Some(Uuid::new_v4()), &EventPayload::TaskCompleted { task_id: Uuid::nil() })
            .await;

        let mut rx = manager.subscribe(session_id, Some(watermark)).await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type, "task_completed");
    }

    #[tokio::test]
    async fn slow_reader_is_dropped_not_backpressured() {
        let manager = Arc::new(StreamManager::new(16, Duration::from_secs(60), 1, Duration::from_secs(30)));
        let session_id = SessionId::new();
        let _rx = manager.subscribe(session_id, None).await;
        // Reader queue capacity is 1; two publishes in a row without the
        // reader draining should not make `publish` hang.
        manager
            .publish(session_id, Some(Uuid::new_v4()), &EventPayload::TaskStarted { task_id: Uuid::nil() })
            .await;
        manager
            .publish(session_id, Some(Uuid::new_v4()), &EventPayload::TaskCompleted { task_id: Uuid::nil() })
            .await;
    }
}
