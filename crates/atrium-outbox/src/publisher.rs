//! Background outbox publisher. Polls for `pending` rows,
//! publishes each through the Stream Manager, and marks it `published`. A
//! row that keeps failing is retried with capped backoff up to a ceiling,
//! then parked as `failed` rather than retried forever — delivery is
//! at-least-once, never exactly-once, so clients dedupe on `event_id`.

use std::sync::Arc;
use std::time::Duration;

use atrium_config::OutboxConfig;
use atrium_storage::OutboxRepo;
use atrium_stream::EventBroadcaster;
use tokio_util::sync::CancellationToken;

pub struct OutboxPublisher {
    outbox: OutboxRepo,
    stream: Arc<dyn EventBroadcaster>,
    config: OutboxConfig,
}

impl OutboxPublisher {
    pub fn new(outbox: OutboxRepo, stream: Arc<dyn EventBroadcaster>, config: OutboxConfig) -> Self {
        Self { outbox, stream, config }
    }

    /// Runs the poll loop until `shutdown` is cancelled. Intended to be
    /// spawned once per process at startup.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(err) = self.publish_batch().await {
                        tracing::warn!(error = %err, "outbox publish batch failed");
                    }
                }
            }
        }
    }

    async fn publish_batch(&self) -> Result<(), atrium_storage::StorageError> {
        let rows = self.outbox.claim_pending(self.config.claim_batch_size as i64).await?;
        for row in rows {
            self.publish_row(row).await;
        }
        Ok(())
    }

    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        backoff_for_attempt(&self.config, attempt)
    }

    async fn publish_row(&self, row: atrium_core::OutboxRow) {
        let broadcast = self
            .stream
            .publish_rendered(row.session_id, Some(row.id.as_uuid()), &row.event_type, row.payload.clone())
            .await;

        match broadcast {
            Ok(()) => match self.outbox.mark_published(row.id.as_uuid()).await {
                Ok(()) => {}
                Err(err) => {
                    tracing::warn!(error = %err, event_id = %row.id, "failed to mark outbox row published");
                    self.retry_or_fail(&row).await;
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, event_id = %row.id, "outbox row broadcast failed");
                self.retry_or_fail(&row).await;
            }
        }
    }

    /// Shared retry/terminal-failure path for both a broadcast failure and a
    /// `mark_published` failure: either one leaves the row undelivered, so
    /// both drive the same capped-backoff retry or terminal `failed` state.
    async fn retry_or_fail(&self, row: &atrium_core::OutboxRow) {
        if row.attempts >= self.config.retry_max_attempts {
            let _ = self.outbox.mark_failed(row.id.as_uuid()).await;
        } else {
            tokio::time::sleep(self.backoff_for_attempt(row.attempts)).await;
            let _ = self.outbox.requeue(row.id.as_uuid()).await;
        }
    }
}

fn backoff_for_attempt(config: &OutboxConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let scaled =
        Duration::from_millis(config.retry_base_delay_ms).saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX));
    scaled.min(Duration::from_millis(config.retry_max_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atrium_core::{CoreError, SessionId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    #[test]
    fn backoff_doubles_then_caps_at_configured_max() {
        let config = OutboxConfig::default();
        let first = backoff_for_attempt(&config, 1);
        let second = backoff_for_attempt(&config, 2);
        assert_eq!(second, first * 2);
        let far_out = backoff_for_attempt(&config, 30);
        assert_eq!(far_out, Duration::from_millis(config.retry_max_delay_ms));
    }

    /// Fails its first `fail_times` calls, then succeeds, the same
    /// configurable-flake shape `atrium-bus`'s executor test fake uses.
    struct FlakyBroadcaster {
        calls: AtomicU32,
        fail_times: u32,
    }

    #[async_trait]
    impl EventBroadcaster for FlakyBroadcaster {
        async fn publish_rendered(
            &self,
            _session_id: SessionId,
            _event_id: Option<Uuid>,
            _event_type: &str,
            _payload: serde_json::Value,
        ) -> Result<(), CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                return Err(CoreError::Transient("simulated publish fault".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn broadcast_failure_is_observable_and_requeues_below_retry_ceiling() {
        let broadcaster = Arc::new(FlakyBroadcaster {
            calls: AtomicU32::new(0),
            fail_times: 1,
        });
        let result = broadcaster
            .publish_rendered(SessionId::new(), Some(Uuid::new_v4()), "message_created", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(CoreError::Transient(_))));

        let second = broadcaster
            .publish_rendered(SessionId::new(), Some(Uuid::new_v4()), "message_created", serde_json::json!({}))
            .await;
        assert!(second.is_ok());
    }
}
