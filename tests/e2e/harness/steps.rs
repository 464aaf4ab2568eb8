use async_trait::async_trait;
use harness_core::{
    Address, BreadcrumbValue, FailureClass, HarnessError, OperationSpec, RetryOverride, Step,
    StepContext, StepDecl, TestSession, TokenDescriptor,
};
use std::time::Duration;

use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Session lifecycle
    Load {
        network: String,
    },
    BeginStep {
        decl: StepDecl,
    },
    Action(StepAction),
    EndStep,
    GenerateReport,
    Destroy,

    // Whole invocations through the suite runner
    RunSuite {
        steps: Vec<ScriptedStep>,
        bail: bool,
    },

    // Ledger scripting
    Fund {
        address: String,
        balance: u128,
    },
    LedgerFailsNext {
        operation: String,
        times: u32,
    },
    LedgerRejects {
        operation: String,
        message: String,
    },
    LedgerOffline(bool),
    LedgerLatency(Duration),

    // Failure simulation
    Crash,
    Restart {
        network: String,
    },

    // The inner step must fail with a matching error
    ExpectError {
        step: Box<ScenarioStep>,
        expected: ErrorMatch,
    },

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}

/// Work done inside a step
#[derive(Debug, Clone)]
pub enum StepAction {
    SyncUsers(Vec<String>),
    IssueToken {
        role: String,
        ticker: String,
        decimals: u32,
        save_as: String,
    },
    Deploy {
        role: String,
        save_as: String,
    },
    Call {
        role: String,
        operation: String,
    },
    SaveAddress {
        name: String,
        address: String,
    },
    SaveBreadcrumb {
        name: String,
        value: BreadcrumbValue,
    },
    SaveNonce {
        role: String,
        name: String,
    },
    IncrementBreadcrumb {
        name: String,
    },
    RequireBreadcrumb {
        name: String,
    },
    RequireAddress {
        name: String,
    },
}

/// Which error an `ExpectError` step accepts
#[derive(Debug, Clone)]
pub enum ErrorMatch {
    OperationFailed {
        class: FailureClass,
        attempts: Option<u32>,
    },
    ArtifactNotFound,
    BreadcrumbTypeMismatch,
    UnknownRole,
    NetworkUnreachable,
    InvalidStateTransition,
    RunDirLocked,
    StepTimedOut {
        timeout_ms: Option<u64>,
    },
}

impl ErrorMatch {
    pub fn matches(&self, error: &HarnessError) -> bool {
        match (self, error) {
            (
                Self::OperationFailed { class, attempts },
                HarnessError::OperationFailed {
                    class: found,
                    attempts: used,
                    ..
                },
            ) => class == found && attempts.map_or(true, |n| n == *used),
            (
                Self::StepTimedOut { timeout_ms },
                HarnessError::StepTimedOut {
                    timeout_ms: found, ..
                },
            ) => timeout_ms.map_or(true, |ms| ms == *found),
            (Self::ArtifactNotFound, HarnessError::ArtifactNotFound { .. })
            | (Self::BreadcrumbTypeMismatch, HarnessError::BreadcrumbTypeMismatch { .. })
            | (Self::UnknownRole, HarnessError::UnknownRole(_))
            | (Self::NetworkUnreachable, HarnessError::NetworkUnreachable(_))
            | (Self::InvalidStateTransition, HarnessError::InvalidStateTransition { .. })
            | (Self::RunDirLocked, HarnessError::RunDirLocked { .. }) => true,
            _ => false,
        }
    }
}

/// Performs one action inside the step identified by `ctx`
pub async fn apply_action(
    session: &mut TestSession,
    ctx: &StepContext,
    action: &StepAction,
) -> harness_core::Result<()> {
    match action {
        StepAction::SyncUsers(roles) => {
            let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
            session.sync_users(&roles).await
        }
        StepAction::IssueToken {
            role,
            ticker,
            decimals,
            save_as,
        } => {
            let operation = OperationSpec::new("issueToken")
                .with_args(serde_json::json!({ "ticker": ticker, "decimals": decimals }));
            let outcome = session.interact(ctx, role, operation).await?;
            let identifier = outcome.data["identifier"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            session.save_token(
                save_as,
                TokenDescriptor {
                    identifier,
                    ticker: ticker.clone(),
                    decimals: *decimals,
                    supply: "0".to_string(),
                },
            )
        }
        StepAction::Deploy { role, save_as } => {
            let outcome = session
                .interact(ctx, role, OperationSpec::new("deploy"))
                .await?;
            let address: Address = outcome.data["address"]
                .as_str()
                .unwrap_or_default()
                .parse()?;
            session.save_address(save_as, address)
        }
        StepAction::Call { role, operation } => session
            .interact(ctx, role, OperationSpec::new(operation.as_str()))
            .await
            .map(|_| ()),
        StepAction::SaveAddress { name, address } => {
            let address: Address = address.parse()?;
            session.save_address(name, address)
        }
        StepAction::SaveBreadcrumb { name, value } => session.save_breadcrumb(name, value.clone()),
        StepAction::SaveNonce { role, name } => {
            let nonce = session.get_user(role)?.state.nonce;
            session.save_breadcrumb(name, nonce)
        }
        StepAction::IncrementBreadcrumb { name } => {
            let value: u64 = session.load_breadcrumb_as(name)?;
            session.save_breadcrumb(name, value + 1)
        }
        StepAction::RequireBreadcrumb { name } => session.load_breadcrumb(name).map(|_| ()),
        StepAction::RequireAddress { name } => session.load_address(name).map(|_| ()),
    }
}

/// A step for the suite runner, made of actions
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub name: String,
    pub actions: Vec<StepAction>,
    pub timeout: Option<Duration>,
    pub retries: RetryOverride,
}

impl ScriptedStep {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            actions: Vec::new(),
            timeout: None,
            retries: RetryOverride::Inherit,
        }
    }

    pub fn action(mut self, action: StepAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: RetryOverride) -> Self {
        self.retries = retries;
        self
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn retries(&self) -> RetryOverride {
        self.retries
    }

    async fn run(&self, session: &mut TestSession, ctx: &StepContext) -> harness_core::Result<()> {
        for action in &self.actions {
            apply_action(session, ctx, action).await?;
        }
        Ok(())
    }
}
