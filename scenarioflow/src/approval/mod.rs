//! The human approval gate.
//!
//! The analysis pipeline suspends once per pass to ask an
//! [`ApprovalHandler`] whether the generated improvements should go
//! forward. The pipeline puts no timeout on the call; handlers that need
//! one implement it themselves (see [`ApprovalService::with_timeout`]).

mod service;

pub use service::ApprovalService;

use crate::errors::Result;
use crate::state::{Decision, StageResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What the approver is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// The proposed improvements.
    pub improvements: StageResult,
    /// The diagnosis they address.
    pub diagnosis: StageResult,
}

/// The approver's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Whether to continue.
    #[serde(default)]
    pub decision: Decision,
    /// Free-text changes requested alongside an approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<String>,
}

impl ApprovalDecision {
    /// An approval without modifications.
    #[must_use]
    pub fn approve() -> Self {
        Self::default()
    }

    /// A rejection.
    #[must_use]
    pub fn reject() -> Self {
        Self {
            decision: Decision::No,
            modifications: None,
        }
    }

    /// Attaches requested modifications.
    #[must_use]
    pub fn with_modifications(mut self, modifications: impl Into<String>) -> Self {
        self.modifications = Some(modifications.into());
        self
    }
}

/// Collaborator that decides whether improvements go forward.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Asks for a decision. May suspend for as long as a human takes.
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision>;
}

#[async_trait]
impl<H: ApprovalHandler + ?Sized> ApprovalHandler for Arc<H> {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision> {
        (**self).request_approval(request).await
    }
}

/// Approves everything immediately. Used when no handler is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalHandler for AutoApprove {
    async fn request_approval(&self, _request: ApprovalRequest) -> Result<ApprovalDecision> {
        Ok(ApprovalDecision::approve())
    }
}

type ApprovalFn = dyn Fn(ApprovalRequest) -> BoxFuture<'static, Result<ApprovalDecision>> + Send + Sync;

/// Adapts an async closure into an [`ApprovalHandler`].
pub struct FnApproval {
    handler: Box<ApprovalFn>,
}

impl FnApproval {
    /// Wraps `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(ApprovalRequest) -> BoxFuture<'static, Result<ApprovalDecision>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for FnApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnApproval").finish_non_exhaustive()
    }
}

#[async_trait]
impl ApprovalHandler for FnApproval {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalDecision> {
        (self.handler)(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::{json, Map};

    fn request() -> ApprovalRequest {
        ApprovalRequest {
            improvements: Map::new(),
            diagnosis: Map::new(),
        }
    }

    #[test]
    fn test_auto_approve() {
        let decision = tokio_test::block_on(AutoApprove.request_approval(request())).unwrap();
        assert_eq!(decision, ApprovalDecision::approve());
    }

    #[tokio::test]
    async fn test_fn_approval() {
        let handler = FnApproval::new(|req: ApprovalRequest| {
            async move {
                if req.improvements.is_empty() {
                    Ok(ApprovalDecision::reject())
                } else {
                    Ok(ApprovalDecision::approve().with_modifications("shorter"))
                }
            }
            .boxed()
        });

        let decision = handler.request_approval(request()).await.unwrap();
        assert_eq!(decision.decision, Decision::No);
    }

    #[test]
    fn test_decision_wire_format() {
        let decision: ApprovalDecision = serde_json::from_value(json!({"decision": "no"})).unwrap();
        assert_eq!(decision, ApprovalDecision::reject());

        let decision: ApprovalDecision = serde_json::from_value(json!({})).unwrap();
        assert!(decision.decision.is_approved());

        assert_eq!(
            serde_json::to_value(ApprovalDecision::approve().with_modifications("x")).unwrap(),
            json!({"decision": "yes", "modifications": "x"})
        );
    }
}
