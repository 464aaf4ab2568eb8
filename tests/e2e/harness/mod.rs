//! E2E test harness for ledger sessions.
//!
//! Scenarios drive a real `TestSession` over an in-memory ledger, on a
//! paused clock so retries and timeouts cost no wall time.

#![allow(dead_code)]

pub mod assertions;
pub mod steps;
pub mod workspace;

// Re-export commonly used types
pub use assertions::Assertion;
pub use scenario::{call, deploy, issue_token, sync_users, with_default_retries, Scenario};
pub use steps::{ErrorMatch, ScriptedStep, StepAction};
