//! Harness Core Library
//!
//! State propagation for multi-step end-to-end tests against a remote ledger:
//! - Named artifacts (tokens, contract addresses, breadcrumbs) that survive
//!   process restarts
//! - A role-based account directory synced on demand
//! - Per-step correlation ids on every outgoing operation
//! - Bounded retry and timeout for ledger interactions
//!
//! # Quick Start
//!
//! ```
//! use harness_core::{Artifact, ArtifactStore, BreadcrumbValue};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = ArtifactStore::open(tmp.path()).unwrap();
//!
//! // One step leaves a value behind
//! store
//!     .save("nonce", &Artifact::Breadcrumb(BreadcrumbValue::U64(5)))
//!     .unwrap();
//!
//! // A later step, possibly in another process, picks it up
//! let nonce: u64 = store.load_breadcrumb_as("nonce").unwrap();
//! assert_eq!(nonce, 5);
//! ```
//!
//! # Sessions
//!
//! A [`TestSession`] is loaded once per run directory, then driven step by
//! step, either by hand (`before_step` / `after_step`) or through a
//! [`Suite`]:
//!
//! ```ignore
//! let mut session = TestSession::new(interactor, provider);
//! session.load("devnet", "runs/lending").await?;
//!
//! let ctx = session.before_step(&StepDecl::new("Issue USD"))?;
//! session.sync_users(&["whale"]).await?;
//! let outcome = session.interact(&ctx, "whale", OperationSpec::new("issueToken")).await?;
//! session.save_breadcrumb("usdIdentifier", outcome.data["identifier"].to_string())?;
//! session.after_step(&ctx, None)?;
//!
//! session.generate_report()?;
//! session.destroy()?;
//! ```

mod accounts;
mod config;
mod correlation;
mod error;
mod ledger;
mod lock;
#[cfg(any(test, feature = "test-support"))]
mod memory;
mod report;
mod retry;
mod runner;
mod session;
mod store;
mod types;

pub use accounts::AccountDirectory;
pub use config::{Config, NetworkSection, RetryConfig, RunnerConfig, UserConfig, CONFIG_FILE};
pub use correlation::{CorrelationTracker, StepContext};
pub use error::{FailureClass, HarnessError, Result};
pub use ledger::{
    execute_interaction, Interactor, NetworkProvider, OperationSpec, Outcome, OutcomeStatus,
    ProviderError, TransportError,
};
pub use lock::{RunDirLock, LOCK_FILE};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryLedger, SentOperation};
pub use report::{
    FileReportSink, MemoryReportSink, NamedArtifact, ReportEntry, ReportSink, SessionReport,
    StepStatus, REPORT_JSON_FILE, REPORT_TEXT_FILE,
};
pub use retry::{execute, AttemptError, Executed, RetryPolicy};
pub use runner::{Step, Suite, SuiteOutcome};
pub use session::{RetryOverride, StepDecl, TestSession};
pub use store::{ArtifactStore, STORE_FILE, STORE_SCHEMA_VERSION};
pub use types::*;
