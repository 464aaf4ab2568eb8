//! Session lifecycle for a multi-step ledger test run.
//!
//! A [`TestSession`] owns the artifact store, the account directory, the
//! correlation tracker and the report. It moves through
//! `Uninitialized -> Loaded -> Active -> Finalized -> Destroyed`; every
//! operation checks the state it is allowed in.

use crate::accounts::AccountDirectory;
use crate::config::Config;
use crate::correlation::{CorrelationTracker, StepContext};
use crate::error::{HarnessError, Result};
use crate::ledger::{execute_interaction, Interactor, NetworkProvider, OperationSpec, Outcome};
use crate::lock::RunDirLock;
use crate::report::{
    FileReportSink, NamedArtifact, ReportEntry, ReportSink, SessionReport, StepStatus,
};
use crate::retry::{self, AttemptError, RetryPolicy};
use crate::store::ArtifactStore;
use crate::types::{
    Account, Address, Artifact, ArtifactKind, BreadcrumbValue, FromBreadcrumb, NetworkConfig,
    SessionState, TokenDescriptor,
};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// How a step overrides the session retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOverride {
    /// Use the `[retry]` policy unchanged.
    #[default]
    Inherit,
    /// Use `runner.default_retries` retries.
    Default,
    /// Use exactly this many retries after the first attempt.
    Count(u32),
}

/// Declaration of a step: its name plus optional overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDecl {
    /// Step name, usually the full test title.
    pub name: String,
    /// Step timeout; `runner.step_timeout_secs` when absent. Interactions
    /// still running when it expires fail with `StepTimedOut`.
    pub timeout: Option<Duration>,
    /// Retry override for interactions inside the step.
    pub retries: RetryOverride,
}

impl StepDecl {
    /// Step with no overrides.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: None,
            retries: RetryOverride::Inherit,
        }
    }

    /// Overrides the step timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry count.
    pub fn retries(mut self, retries: RetryOverride) -> Self {
        self.retries = retries;
        self
    }
}

/// Bookkeeping for the step between `before_step` and `after_step`.
#[derive(Debug)]
struct StepRun {
    ctx: StepContext,
    started: Instant,
    timeout: Duration,
}

impl StepRun {
    fn deadline(&self) -> Option<Instant> {
        self.started.checked_add(self.timeout)
    }
}

/// Process-wide harness state shared by all steps of a run.
pub struct TestSession {
    state: SessionState,
    interactor: Arc<dyn Interactor>,
    provider: Arc<dyn NetworkProvider>,
    sink: Option<Box<dyn ReportSink>>,
    network: String,
    work_dir: Option<PathBuf>,
    config: Config,
    policy: RetryPolicy,
    lock: Option<RunDirLock>,
    store: Option<ArtifactStore>,
    users: AccountDirectory,
    correlation: CorrelationTracker,
    network_config: Option<NetworkConfig>,
    report: SessionReport,
    current: Option<StepRun>,
}

impl TestSession {
    /// Creates an unloaded session over the two ledger capabilities.
    pub fn new(interactor: Arc<dyn Interactor>, provider: Arc<dyn NetworkProvider>) -> Self {
        Self {
            state: SessionState::Uninitialized,
            interactor,
            provider,
            sink: None,
            network: String::new(),
            work_dir: None,
            config: Config::default(),
            policy: RetryPolicy::default(),
            lock: None,
            store: None,
            users: AccountDirectory::default(),
            correlation: CorrelationTracker::new(),
            network_config: None,
            report: SessionReport::default(),
            current: None,
        }
    }

    /// Writes the report to `sink` instead of `report.txt`/`report.json`.
    pub fn with_report_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Opens the run directory and fetches network parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless uninitialized, `RunDirLocked`
    /// if another process owns `work_dir`, and `NetworkUnreachable` if the
    /// provider cannot answer. Nothing is kept open on error.
    pub async fn load(&mut self, network: &str, work_dir: impl AsRef<Path>) -> Result<()> {
        self.require(&[SessionState::Uninitialized], SessionState::Loaded)?;
        let work_dir = work_dir.as_ref();

        let lock = RunDirLock::acquire(work_dir)?;
        let config = Config::load(work_dir)?;
        if config.network.name != network {
            warn!(
                configured = %config.network.name,
                requested = network,
                "Network differs from session.toml, using the requested one"
            );
        }
        let policy = config.retry.policy()?;

        let store = ArtifactStore::open(work_dir)?;
        let mut users = AccountDirectory::from_config(&config.users);
        let restored = users.restore(store.load_accounts()?);

        let network_config = self
            .provider
            .get_network_config()
            .await
            .map_err(|e| HarnessError::NetworkUnreachable(e.to_string()))?;

        info!(
            network,
            work_dir = %work_dir.display(),
            users = users.len(),
            restored,
            chain_id = %network_config.chain_id,
            "Session loaded"
        );

        self.network = network.to_string();
        self.work_dir = Some(work_dir.to_path_buf());
        self.config = config;
        self.policy = policy;
        self.lock = Some(lock);
        self.store = Some(store);
        self.users = users;
        self.correlation.reset();
        self.network_config = Some(network_config);
        self.report = SessionReport::new(network);
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Refetches global network parameters.
    pub async fn sync_network_config(&mut self) -> Result<&NetworkConfig> {
        self.require_loaded("sync_network_config")?;
        let network_config = self
            .provider
            .get_network_config()
            .await
            .map_err(|e| HarnessError::NetworkUnreachable(e.to_string()))?;
        debug!(chain_id = %network_config.chain_id, "Synced network config");
        Ok(self.network_config.insert(network_config))
    }

    /// Refreshes the given roles from the network and persists them.
    ///
    /// Other roles keep their cached state. The cached accounts only change
    /// once the fetched state has been written to the store.
    pub async fn sync_users(&mut self, roles: &[&str]) -> Result<()> {
        self.require_loaded("sync_users")?;
        let updated = self.users.fetch(roles, self.provider.as_ref()).await?;
        self.store()?.save_accounts(&updated)?;
        self.users.apply(updated);
        Ok(())
    }

    /// Starts a step and returns its context.
    pub fn before_step(&mut self, decl: &StepDecl) -> Result<StepContext> {
        self.require(
            &[SessionState::Loaded, SessionState::Active],
            SessionState::Active,
        )?;
        if let Some(open) = self.current.take() {
            warn!(step = %open.ctx.step(), "Previous step never finished");
            self.finish(open, Some("step did not finish".to_string()));
        }

        let policy = match decl.retries {
            RetryOverride::Inherit => self.policy,
            RetryOverride::Default => self.policy.with_retries(self.config.runner.default_retries),
            RetryOverride::Count(retries) => self.policy.with_retries(retries),
        };
        let ctx = self.correlation.set_step(&decl.name, policy);
        info!(
            step = %ctx.step(),
            correlation_id = %ctx.correlation_id(),
            "Step started"
        );

        self.current = Some(StepRun {
            ctx: ctx.clone(),
            started: Instant::now(),
            timeout: decl.timeout.unwrap_or(self.config.runner.step_timeout()),
        });
        self.state = SessionState::Active;
        Ok(ctx)
    }

    /// Records the outcome of the step started with `ctx`.
    pub fn after_step(&mut self, ctx: &StepContext, error: Option<String>) -> Result<()> {
        self.require(&[SessionState::Active], SessionState::Active)?;
        let run = match self.current.take() {
            Some(run) if run.ctx.correlation_id() == ctx.correlation_id() => run,
            other => {
                self.current = other;
                return Err(HarnessError::InvalidStateTransition {
                    from: format!("step {}", ctx.step()),
                    to: "after_step".to_string(),
                });
            }
        };
        self.finish(run, error);
        Ok(())
    }

    /// Records a step that was not run.
    pub fn record_skipped(&mut self, name: &str) -> Result<()> {
        self.require_loaded("record_skipped")?;
        debug!(step = name, "Step skipped");
        self.report.append(ReportEntry::skipped(name));
        Ok(())
    }

    fn finish(&mut self, run: StepRun, error: Option<String>) {
        let attempts = run.ctx.attempts();
        let duration_ms = u64::try_from(run.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = if error.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Passed
        };
        info!(
            step = %run.ctx.step(),
            correlation_id = %run.ctx.correlation_id(),
            ?status,
            duration_ms,
            attempts,
            "Step finished"
        );
        self.report.append(ReportEntry {
            step: run.ctx.step().to_string(),
            correlation_id: run.ctx.correlation_id(),
            status,
            duration_ms,
            attempts,
            error,
        });
    }

    /// Runs `operation` under the step's retry policy.
    ///
    /// Attempts count toward the step's report entry as they start, whether
    /// or not the operation succeeds.
    ///
    /// # Errors
    ///
    /// Returns `OperationFailed` from the retry layer, or `StepTimedOut` if
    /// the step deadline passes first.
    pub async fn execute<T, F, Fut>(&mut self, ctx: &StepContext, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, AttemptError>>,
    {
        self.require(&[SessionState::Active], SessionState::Active)?;
        let deadline = self.step_deadline(ctx);
        let executed = within_step(ctx, deadline, retry::execute(ctx, ctx.policy(), operation))
            .await?;
        Ok(executed.value)
    }

    /// Sends `operation` as `role` through the retry layer.
    pub async fn interact(
        &mut self,
        ctx: &StepContext,
        role: &str,
        operation: OperationSpec,
    ) -> Result<Outcome> {
        self.require(&[SessionState::Active], SessionState::Active)?;
        let user = self.users.get_user(role)?.clone();
        let interactor = Arc::clone(&self.interactor);
        let deadline = self.step_deadline(ctx);
        let sent = execute_interaction(ctx, ctx.policy(), interactor.as_ref(), &user, &operation);
        let executed = within_step(ctx, deadline, sent).await?;
        Ok(executed.value)
    }

    /// Deadline and timeout of the open step, if `ctx` is that step.
    fn step_deadline(&self, ctx: &StepContext) -> Option<(Instant, Duration)> {
        self.current
            .as_ref()
            .filter(|run| run.ctx == *ctx)
            .and_then(|run| Some((run.deadline()?, run.timeout)))
    }

    /// Saves a token descriptor under `name`.
    pub fn save_token(&mut self, name: &str, token: TokenDescriptor) -> Result<()> {
        self.writable_store("save_token")?
            .save(name, &Artifact::Token(token))
    }

    /// Loads the token saved under `name`.
    pub fn load_token(&self, name: &str) -> Result<TokenDescriptor> {
        self.store()?.load_token(name)
    }

    /// Saves a contract address under `name`.
    pub fn save_address(&mut self, name: &str, address: Address) -> Result<()> {
        self.writable_store("save_address")?
            .save(name, &Artifact::Address(address))
    }

    /// Loads the address saved under `name`.
    pub fn load_address(&self, name: &str) -> Result<Address> {
        self.store()?.load_address(name)
    }

    /// Saves a breadcrumb under `name`; its type is fixed by the value.
    pub fn save_breadcrumb(&mut self, name: &str, value: impl Into<BreadcrumbValue>) -> Result<()> {
        self.writable_store("save_breadcrumb")?
            .save(name, &Artifact::Breadcrumb(value.into()))
    }

    /// Loads the breadcrumb saved under `name`.
    pub fn load_breadcrumb(&self, name: &str) -> Result<BreadcrumbValue> {
        self.store()?.load_breadcrumb(name)
    }

    /// Loads the breadcrumb saved under `name` as `T`.
    pub fn load_breadcrumb_as<T: FromBreadcrumb>(&self, name: &str) -> Result<T> {
        self.store()?.load_breadcrumb_as(name)
    }

    /// Renders the report to the sink and finalizes the session.
    ///
    /// Allowed once at least the session is loaded; a session with zero
    /// steps yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns `ReportUnwritable` if the sink fails; the session then stays
    /// in its current state.
    pub fn generate_report(&mut self) -> Result<SessionReport> {
        self.require(
            &[SessionState::Loaded, SessionState::Active],
            SessionState::Finalized,
        )?;
        if let Some(open) = self.current.take() {
            warn!(step = %open.ctx.step(), "Step still open at report time");
            self.finish(open, Some("step did not finish".to_string()));
        }

        let mut report = self.report.clone();
        report.chain_id = self.network_config.as_ref().map(|c| c.chain_id.clone());
        report.accounts = self.users.snapshot();
        let store = self.store()?;
        for kind in [ArtifactKind::Token, ArtifactKind::Address, ArtifactKind::Breadcrumb] {
            report.artifacts.extend(
                store
                    .list(kind)?
                    .into_iter()
                    .map(|(name, artifact)| NamedArtifact { name, artifact }),
            );
        }

        match self.sink.as_mut() {
            Some(sink) => sink.write(&report)?,
            None => {
                let dir = self.work_dir.clone().unwrap_or_default();
                FileReportSink::new(dir).write(&report)?;
            }
        }

        info!(
            passed = report.count(StepStatus::Passed),
            failed = report.count(StepStatus::Failed),
            skipped = report.count(StepStatus::Skipped),
            "Report generated"
        );
        self.report = report.clone();
        self.state = SessionState::Finalized;
        Ok(report)
    }

    /// Clears the store and releases every handle. Idempotent.
    pub fn destroy(&mut self) -> Result<()> {
        if self.state == SessionState::Destroyed {
            return Ok(());
        }
        self.require(&[SessionState::Finalized], SessionState::Destroyed)?;

        if let Some(store) = self.store.as_ref() {
            store.clear()?;
        }
        if let Some(store) = self.store.take() {
            store.close();
        }
        self.users = AccountDirectory::default();
        self.correlation.reset();
        self.lock = None;
        self.state = SessionState::Destroyed;
        info!(network = %self.network, "Session destroyed");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Network name given to `load`.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Run directory given to `load`.
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// Configuration read at load.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Network parameters from the last fetch.
    pub fn network_config(&self) -> Option<&NetworkConfig> {
        self.network_config.as_ref()
    }

    /// The account directory.
    pub fn users(&self) -> &AccountDirectory {
        &self.users
    }

    /// Account registered under `role`.
    pub fn get_user(&self, role: &str) -> Result<&Account> {
        self.users.get_user(role)
    }

    /// The correlation tracker.
    pub fn correlation(&self) -> &CorrelationTracker {
        &self.correlation
    }

    /// Entries recorded so far.
    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    fn require(&self, allowed: &[SessionState], to: SessionState) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(HarnessError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            })
        }
    }

    fn require_loaded(&self, operation: &str) -> Result<()> {
        match self.state {
            SessionState::Loaded | SessionState::Active => Ok(()),
            state => Err(HarnessError::InvalidStateTransition {
                from: state.to_string(),
                to: operation.to_string(),
            }),
        }
    }

    fn store(&self) -> Result<&ArtifactStore> {
        self.store
            .as_ref()
            .ok_or_else(|| HarnessError::InvalidStateTransition {
                from: self.state.to_string(),
                to: "artifact access".to_string(),
            })
    }

    fn writable_store(&self, operation: &str) -> Result<&ArtifactStore> {
        self.require_loaded(operation)?;
        self.store()
    }
}

/// Awaits `fut`, failing with `StepTimedOut` once `deadline` passes.
async fn within_step<T, Fut>(
    ctx: &StepContext,
    deadline: Option<(Instant, Duration)>,
    fut: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    let Some((deadline, timeout)) = deadline else {
        return fut.await;
    };

    match time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                step = %ctx.step(),
                correlation_id = %ctx.correlation_id(),
                attempts = ctx.attempts(),
                "Step deadline passed during interaction"
            );
            Err(HarnessError::StepTimedOut {
                step: ctx.step().to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}
