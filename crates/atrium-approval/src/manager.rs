//! Approval Manager: risk-dependent timeout, a pre-timeout
//! warning, and a strict terminal state machine — once an approval leaves
//! `pending` it never re-enters it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use atrium_config::ApprovalConfig;
use atrium_core::{
    ApprovalDecision, ApprovalId, ApprovalKind, ApprovalRequest, ApprovalStatus, CoreError,
    RiskLevel, SessionId, UserId,
};
use atrium_storage::ApprovalRepo;
use atrium_stream::StreamManager;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use stream_event::EventPayload;
use tokio::sync::watch;

struct SessionRetryWindow {
    attempts: VecDeque<DateTime<Utc>>,
}

pub struct ApprovalManager {
    repo: ApprovalRepo,
    stream: Arc<StreamManager>,
    config: ApprovalConfig,
    waiters: DashMap<ApprovalId, watch::Sender<ApprovalStatus>>,
    retry_windows: DashMap<SessionId, SessionRetryWindow>,
}

impl ApprovalManager {
    pub fn new(repo: ApprovalRepo, stream: Arc<StreamManager>, config: ApprovalConfig) -> Self {
        Self {
            repo,
            stream,
            config,
            waiters: DashMap::new(),
            retry_windows: DashMap::new(),
        }
    }

    fn check_and_record_retry(&self, session_id: SessionId) -> Result<(), CoreError> {
        let now = Utc::now();
        let window = Duration::from_secs(self.config.retry_cooldown_seconds);
        let mut entry = self.retry_windows.entry(session_id).or_insert_with(|| SessionRetryWindow {
            attempts: VecDeque::new(),
        });
        while let Some(front) = entry.attempts.front() {
            if now.signed_duration_since(*front).to_std().unwrap_or_default() > window {
                entry.attempts.pop_front();
            } else {
                break;
            }
        }
        if entry.attempts.len() as u32 >= self.config.max_retries_per_session {
            return Err(CoreError::MaxRetriesExceeded(format!(
                "session {session_id} exceeded {} approval requests within {}s",
                self.config.max_retries_per_session, self.config.retry_cooldown_seconds
            )));
        }
        entry.attempts.push_back(now);
        Ok(())
    }

    fn timeout_seconds_for(&self, kind: ApprovalKind, risk: RiskLevel) -> u64 {
        resolve_timeout_seconds(&self.config, kind, risk)
    }

    /// Opens a new approval. Low-risk tool calls auto-approve immediately;
    /// everything else is created `pending` and a timeout watcher is spawned.
    pub async fn request(
        self: &Arc<Self>,
        session_id: SessionId,
        kind: ApprovalKind,
        risk: RiskLevel,
        subject: &str,
        params: serde_json::Value,
        requester: UserId,
    ) -> Result<ApprovalRequest, CoreError> {
        self.check_and_record_retry(session_id)?;

        let timeout_seconds = self.timeout_seconds_for(kind, risk);
        let request = self
            .repo
            .create(session_id.as_uuid(), kind, risk, subject, params, timeout_seconds)
            .await
            .map_err(CoreError::from)?;

        let (tx, _rx) = watch::channel(ApprovalStatus::Pending);
        self.waiters.insert(request.id, tx);

        if risk.auto_approves() && kind == ApprovalKind::Tool {
            return self.resolve(request.id, ApprovalDecision::Approve, requester).await;
        }

        // A human must decide: tell the client an approval is pending before
        // parking the caller on the timeout watcher below.
        self.stream
            .publish(
                session_id,
                None,
                &EventPayload::ToolApprovalRequest {
                    approval_id: request.id.as_uuid(),
                    tool_name: subject.to_string(),
                    params: request.params.clone(),
                    risk: risk.as_str().to_string(),
                    timeout_seconds,
                },
            )
            .await;

        let manager = self.clone();
        tokio::spawn(async move {
            manager.watch_timeout(session_id, request.id, timeout_seconds).await;
        });

        Ok(request)
    }

    async fn watch_timeout(self: Arc<Self>, session_id: SessionId, approval_id: ApprovalId, timeout_seconds: u64) {
        if timeout_seconds == 0 {
            return;
        }
        let warning_lead = self.config.warning_before_timeout_seconds.min(timeout_seconds);
        let warn_after = timeout_seconds - warning_lead;

        tokio::time::sleep(Duration::from_secs(warn_after)).await;
        if !self.is_still_pending(approval_id).await {
            return;
        }
        self.stream
            .publish(
                session_id,
                None,
                &EventPayload::ApprovalTimeoutWarning {
                    approval_id: approval_id.as_uuid(),
                    remaining_seconds: warning_lead,
                },
            )
            .await;

        tokio::time::sleep(Duration::from_secs(warning_lead)).await;
        if !self.is_still_pending(approval_id).await {
            return;
        }
        if let Ok(true) = self.repo.expire(approval_id.as_uuid()).await {
            if let Some(tx) = self.waiters.get(&approval_id) {
                let _ = tx.send(ApprovalStatus::TimedOut);
            }
            self.stream
                .publish(
                    session_id,
                    None,
                    &EventPayload::ApprovalTimeout {
                        approval_id: approval_id.as_uuid(),
                    },
                )
                .await;
        }
    }

    async fn is_still_pending(&self, approval_id: ApprovalId) -> bool {
        matches!(
            self.repo.get(approval_id.as_uuid()).await.map(|r| r.status),
            Ok(ApprovalStatus::Pending)
        )
    }

    /// Resolves a pending approval. Resolving one already resolved is an
    /// `AlreadyResolved` error, never a silent no-op.
    pub async fn resolve(
        &self,
        approval_id: ApprovalId,
        decision: ApprovalDecision,
        resolver: UserId,
    ) -> Result<ApprovalRequest, CoreError> {
        let applied = self
            .repo
            .resolve(approval_id.as_uuid(), decision, resolver.as_uuid())
            .await
            .map_err(CoreError::from)?;
        if !applied {
            return Err(CoreError::AlreadyResolved(format!("approval {approval_id}")));
        }
        let request = self.repo.get(approval_id.as_uuid()).await.map_err(CoreError::from)?;

        if let Some(tx) = self.waiters.get(&approval_id) {
            let _ = tx.send(request.status);
        }
        self.stream
            .publish(
                request.session_id,
                None,
                &EventPayload::ApprovalResolved {
                    approval_id: approval_id.as_uuid(),
                    decision: match decision {
                        ApprovalDecision::Approve => "approve".to_string(),
                        ApprovalDecision::Reject => "reject".to_string(),
                    },
                    resolver: resolver.as_uuid(),
                },
            )
            .await;
        Ok(request)
    }

    /// Blocks until the approval leaves `pending`, without polling.
    pub async fn wait_for_resolution(&self, approval_id: ApprovalId) -> Result<ApprovalStatus, CoreError> {
        let mut rx = self
            .waiters
            .get(&approval_id)
            .ok_or_else(|| CoreError::NotFound(format!("approval {approval_id}")))?
            .subscribe();
        loop {
            if *rx.borrow() != ApprovalStatus::Pending {
                return Ok(*rx.borrow());
            }
            if rx.changed().await.is_err() {
                return self.repo.get(approval_id.as_uuid()).await.map(|r| r.status).map_err(CoreError::from);
            }
        }
    }
}

/// Risk-dependent timeout policy, factored out of the manager
/// so it is testable without a live database connection.
fn resolve_timeout_seconds(config: &ApprovalConfig, kind: ApprovalKind, risk: RiskLevel) -> u64 {
    match kind {
        ApprovalKind::Plan => config.plan_timeout_seconds,
        ApprovalKind::Tool => match risk {
            RiskLevel::Low => 0,
            RiskLevel::Medium => config.medium_risk_timeout_seconds,
            RiskLevel::High => config.high_risk_timeout_seconds,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_risk_tool_auto_approves_with_zero_timeout() {
        let config = ApprovalConfig::default();
        assert_eq!(resolve_timeout_seconds(&config, ApprovalKind::Tool, RiskLevel::Low), 0);
    }

    #[test]
    fn medium_and_high_risk_use_configured_timeouts() {
        let config = ApprovalConfig::default();
        assert_eq!(
            resolve_timeout_seconds(&config, ApprovalKind::Tool, RiskLevel::Medium),
            config.medium_risk_timeout_seconds
        );
        assert_eq!(
            resolve_timeout_seconds(&config, ApprovalKind::Tool, RiskLevel::High),
            config.high_risk_timeout_seconds
        );
    }

    #[test]
    fn plan_approvals_use_their_own_timeout_regardless_of_risk() {
        let config = ApprovalConfig::default();
        assert_eq!(
            resolve_timeout_seconds(&config, ApprovalKind::Plan, RiskLevel::Low),
            config.plan_timeout_seconds
        );
    }
}
