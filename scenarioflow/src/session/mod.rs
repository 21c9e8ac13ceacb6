//! The session/model collaborator.
//!
//! Scenarioflow never talks to a model provider directly. Stage functions
//! hand a [`SessionRequest`] to a [`Session`] and get back a
//! [`SessionResponse`] whose shape varies by provider; the extraction layer
//! normalizes it before use.

mod profile;
mod response;
mod retry;

pub use profile::StageProfile;
pub use response::{ResponseFragment, SessionResponse};
pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig, RetryState, RetryingSession};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One prompt sent to the model together with the stage's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Configuration of the stage issuing the request.
    pub profile: StageProfile,
    /// The user prompt.
    pub prompt: String,
}

impl SessionRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(profile: StageProfile, prompt: impl Into<String>) -> Self {
        Self {
            profile,
            prompt: prompt.into(),
        }
    }
}

/// An opaque model session.
///
/// Implementations wrap whatever runtime actually invokes the model. Errors
/// are reported through [`crate::errors::ScenarioError::Session`] and are
/// propagated by the pipelines unchanged.
#[async_trait]
pub trait Session: Send + Sync {
    /// Executes one prompt and returns the raw response.
    async fn execute(&self, request: &SessionRequest) -> Result<SessionResponse>;
}

#[async_trait]
impl<S: Session + ?Sized> Session for Arc<S> {
    async fn execute(&self, request: &SessionRequest) -> Result<SessionResponse> {
        (**self).execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_request_carries_profile() {
        let request = SessionRequest::new(StageProfile::analyzer(), "Analyze this");

        assert_eq!(request.prompt, "Analyze this");
        assert_eq!(request.profile.name, "analyzer");
    }
}
