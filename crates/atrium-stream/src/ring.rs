//! A bounded, TTL-pruned buffer of recently published envelopes, used to
//! replay events to a client that resumes with `since=<timestamp>`.
//! Heartbeats never enter this buffer.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stream_event::StreamEnvelope;

pub struct RingBuffer {
    entries: VecDeque<StreamEnvelope>,
    capacity: usize,
    ttl: Duration,
}

impl RingBuffer {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            ttl,
        }
    }

    pub fn push(&mut self, envelope: StreamEnvelope) {
        self.prune(Utc::now());
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(envelope);
    }

    /// All envelopes with `timestamp > since`, in publish order: strictly
    /// after the watermark, so a client that disconnects and resumes never
    /// sees a duplicate nor a gap as long as the entry is still within the
    /// TTL window.
    pub fn replay_since(&mut self, since: DateTime<Utc>) -> Vec<StreamEnvelope> {
        self.prune(Utc::now());
        self.entries
            .iter()
            .filter(|e| e.timestamp > since)
            .cloned()
            .collect()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(front) = self.entries.front() {
            if now.signed_duration_since(front.timestamp).to_std().unwrap_or_default() > self.ttl {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn envelope_at(ts: DateTime<Utc>) -> StreamEnvelope {
        StreamEnvelope::new(Some(Uuid::new_v4()), Uuid::nil(), ts, &stream_event::EventPayload::TaskStarted { task_id: Uuid::nil() })
    }

    #[test]
    fn replay_returns_only_entries_strictly_after_watermark() {
        let mut ring = RingBuffer::new(10, Duration::from_secs(3600));
        let t0 = Utc::now();
        ring.push(envelope_at(t0));
        let t1 = t0 + chrono::Duration::seconds(1);
        ring.push(envelope_at(t1));
        let replayed = ring.replay_since(t0);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].timestamp, t1);
    }

    #[test]
    fn push_beyond_capacity_evicts_oldest() {
        let mut ring = RingBuffer::new(2, Duration::from_secs(3600));
        let t0 = Utc::now();
        ring.push(envelope_at(t0));
        ring.push(envelope_at(t0 + chrono::Duration::seconds(1)));
        ring.push(envelope_at(t0 + chrono::Duration::seconds(2)));
        assert_eq!(ring.len(), 2);
        let replayed = ring.replay_since(t0 - chrono::Duration::seconds(1));
        assert_eq!(replayed.len(), 2);
    }

    #[test]
    fn entries_older_than_ttl_are_pruned() {
        let mut ring = RingBuffer::new(10, Duration::from_millis(10));
        let old = Utc::now() - chrono::Duration::seconds(60);
        ring.push(envelope_at(old));
        std::thread::sleep(Duration::from_millis(20));
        ring.push(envelope_at(Utc::now()));
        assert_eq!(ring.len(), 1);
    }
}
