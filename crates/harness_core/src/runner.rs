//! Ordered execution of declared steps with bail semantics.

use crate::correlation::StepContext;
use crate::error::{HarnessError, Result};
use crate::report::SessionReport;
use crate::session::{RetryOverride, StepDecl, TestSession};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, Instrument};

/// One step of a workflow.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name, shown in logs and the report.
    fn name(&self) -> &str;

    /// Step timeout override.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Retry override for interactions inside the step.
    fn retries(&self) -> RetryOverride {
        RetryOverride::Inherit
    }

    /// Runs the step. Artifacts it needs come from the session.
    async fn run(&self, session: &mut TestSession, ctx: &StepContext) -> Result<()>;
}

/// Counts and first error of a suite run.
#[derive(Debug)]
pub struct SuiteOutcome {
    /// Steps that passed.
    pub passed: usize,
    /// Steps that failed.
    pub failed: usize,
    /// Steps not run after a bail.
    pub skipped: usize,
    /// Error of the first failing step.
    pub first_error: Option<HarnessError>,
    /// The report as written to the sink.
    pub report: SessionReport,
}

impl SuiteOutcome {
    /// True if no step failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs steps in order against a loaded session, then renders the report.
pub struct Suite<'a> {
    session: &'a mut TestSession,
    bail: bool,
}

impl<'a> Suite<'a> {
    /// Suite over `session`; bail behaviour comes from `[runner]`.
    pub fn new(session: &'a mut TestSession) -> Self {
        let bail = session.config().runner.bail;
        Self { session, bail }
    }

    /// Abort the remaining steps after the first failure.
    pub fn bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    /// Runs every step, marking the rest skipped once a step fails with
    /// bail enabled. The report is generated in every case.
    ///
    /// # Errors
    ///
    /// Only session-level failures are returned: the session not being
    /// loaded, or the report sink being unwritable. Step failures are
    /// reported in [`SuiteOutcome`].
    pub async fn run(self, steps: &[&dyn Step]) -> Result<SuiteOutcome> {
        let Suite { session, bail } = self;
        let default_timeout = session.config().runner.step_timeout();
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut first_error = None;
        let mut bailed = false;

        for step in steps {
            if bailed {
                session.record_skipped(step.name())?;
                skipped += 1;
                continue;
            }

            let decl = StepDecl {
                name: step.name().to_string(),
                timeout: step.timeout(),
                retries: step.retries(),
            };
            let timeout = decl.timeout.unwrap_or(default_timeout);
            let ctx = session.before_step(&decl)?;
            let span = ctx.span();

            let result = match tokio::time::timeout(timeout, step.run(session, &ctx))
                .instrument(span)
                .await
            {
                Ok(result) => result,
                Err(_) => Err(HarnessError::StepTimedOut {
                    step: decl.name.clone(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

            match result {
                Ok(()) => {
                    session.after_step(&ctx, None)?;
                    passed += 1;
                }
                Err(e) => {
                    error!(
                        step = %ctx.step(),
                        correlation_id = %ctx.correlation_id(),
                        error = %e,
                        retryable = e.is_retryable(),
                        "Step failed"
                    );
                    session.after_step(&ctx, Some(e.to_string()))?;
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    bailed = bail;
                }
            }
        }

        let report = session.generate_report()?;
        Ok(SuiteOutcome {
            passed,
            failed,
            skipped,
            first_error,
            report,
        })
    }
}
