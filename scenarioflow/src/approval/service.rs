//! Channel-backed approval for out-of-band UIs.

use super::{ApprovalDecision, ApprovalHandler, ApprovalRequest};
use crate::errors::{Result, ScenarioError};
use crate::state::Decision;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

struct PendingApproval {
    request: ApprovalRequest,
    created_at: Instant,
    response_tx: oneshot::Sender<ApprovalDecision>,
}

/// Registers approval requests and waits for an external responder.
///
/// A UI (websocket handler, CLI prompt, ...) lists
/// [`ApprovalService::pending_requests`], shows the request and answers
/// with [`ApprovalService::respond`]. With a timeout configured, an
/// unanswered request resolves to the default decision.
#[derive(Default)]
pub struct ApprovalService {
    requests: RwLock<HashMap<Uuid, PendingApproval>>,
    timeout: Option<Duration>,
    default_decision: Decision,
}

impl ApprovalService {
    /// Creates a service that waits indefinitely.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves unanswered requests to `default_decision` after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration, default_decision: Decision) -> Self {
        self.timeout = Some(timeout);
        self.default_decision = default_decision;
        self
    }

    /// Answers a pending request. Returns false if the id is unknown.
    pub fn respond(&self, request_id: Uuid, decision: ApprovalDecision) -> bool {
        match self.requests.write().remove(&request_id) {
            Some(pending) => {
                info!(
                    request_id = %request_id,
                    decision = ?decision.decision,
                    waited_ms = pending.created_at.elapsed().as_secs_f64() * 1000.0,
                    "Approval answered"
                );
                pending.response_tx.send(decision).is_ok()
            }
            None => false,
        }
    }

    /// Cancels a pending request; the waiting pipeline fails.
    pub fn cancel(&self, request_id: Uuid) -> bool {
        self.requests.write().remove(&request_id).is_some()
    }

    /// Returns a copy of a pending request.
    #[must_use]
    pub fn request(&self, request_id: Uuid) -> Option<ApprovalRequest> {
        self.requests
            .read()
            .get(&request_id)
            .map(|pending| pending.request.clone())
    }

    /// Lists pending request ids.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<Uuid> {
        self.requests.read().keys().copied().collect()
    }

    /// Number of pending requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.requests.read().len()
    }
}

impl std::fmt::Debug for ApprovalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalService")
            .field("pending_count", &self.pending_count())
            .field("timeout", &self.timeout)
            .field("default_decision", &self.default_decision)
            .finish()
    }
}

#[async_trait]
impl ApprovalHandler for ApprovalService {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        self.requests.write().insert(
            request_id,
            PendingApproval {
                request,
                created_at: Instant::now(),
                response_tx: tx,
            },
        );
        info!(request_id = %request_id, "Approval requested");

        let answer = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(answer) => answer,
                Err(_) => {
                    self.requests.write().remove(&request_id);
                    warn!(
                        request_id = %request_id,
                        default = ?self.default_decision,
                        "Approval timed out, using default decision"
                    );
                    return Ok(ApprovalDecision {
                        decision: self.default_decision,
                        modifications: None,
                    });
                }
            },
            None => rx.await,
        };

        answer.map_err(|_| ScenarioError::approval(format!("request {request_id} was cancelled")))
    }
}
