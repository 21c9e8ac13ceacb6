//! Test doubles and fixtures for scenarioflow pipelines.
//!
//! This module provides:
//! - A scripted [`Session`](crate::session::Session) that records requests
//! - Stub stage implementations with per-stage call counters
//! - State assertions and sample inputs

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_rejected, assert_stage_keys, assert_stages_absent};
pub use fixtures::{object, sample_style_samples, sample_tutorial, state_through};
pub use mocks::{ScriptedSession, StubBlogStages, StubTutorialStages};
