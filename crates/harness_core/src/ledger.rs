//! Capabilities the harness consumes from the ledger side.
//!
//! Transaction building, signing and transport live behind these traits. The
//! harness only decides when to call them and how to classify what comes back.

use crate::correlation::StepContext;
use crate::error::Result;
use crate::retry::{self, AttemptError, Executed, RetryPolicy};
use crate::types::{Account, AccountState, ChainIdentity, NetworkConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Instrument;

/// An operation to send on behalf of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Operation name, e.g. `issueToken` or `deposit`.
    pub name: String,
    /// Arguments, opaque to the harness.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Gas limit to request, if the caller cares.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

impl OperationSpec {
    /// Operation with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: serde_json::Value::Null,
            gas_limit: None,
        }
    }

    /// Sets the arguments.
    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    /// Sets the gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Final status reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Executed and finalized.
    Success,
    /// Rejected by the ledger or the contract.
    Failure,
}

/// What the ledger returned for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Final status.
    pub status: OutcomeStatus,
    /// Returned data, opaque to the harness.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Rejection reason for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    /// Successful outcome carrying `data`.
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            status: OutcomeStatus::Success,
            data,
            message: None,
        }
    }

    /// Rejected outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            data: serde_json::Value::Null,
            message: Some(message.into()),
        }
    }

    /// True if the ledger accepted the operation.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// The operation never produced an outcome (connection, gateway, finality wait).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// The network provider could not answer a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("provider error: {0}")]
pub struct ProviderError(pub String);

/// Sends operations for users and waits for their outcome.
#[async_trait]
pub trait Interactor: Send + Sync {
    /// Sends `operation` as `user` and waits until the ledger reports an outcome.
    async fn send(
        &self,
        ctx: &StepContext,
        user: &Account,
        operation: &OperationSpec,
    ) -> std::result::Result<Outcome, TransportError>;
}

/// Read-only view of network and account state.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Current nonce and balance of an account.
    async fn get_account(
        &self,
        identity: &ChainIdentity,
    ) -> std::result::Result<AccountState, ProviderError>;

    /// Global network parameters.
    async fn get_network_config(&self) -> std::result::Result<NetworkConfig, ProviderError>;
}

/// Sends `operation` through the retry layer.
///
/// Transport errors are retried; a failure outcome is fatal. The same
/// `operation` value is sent on every attempt.
pub async fn execute_interaction<I>(
    ctx: &StepContext,
    policy: &RetryPolicy,
    interactor: &I,
    user: &Account,
    operation: &OperationSpec,
) -> Result<Executed<Outcome>>
where
    I: Interactor + ?Sized,
{
    let span = tracing::debug_span!(
        "interaction",
        step = %ctx.step(),
        correlation_id = %ctx.correlation_id(),
        role = %user.role,
        operation = %operation.name
    );

    retry::execute(ctx, policy, |_attempt| async move {
        match interactor.send(ctx, user, operation).await {
            Ok(outcome) if outcome.is_success() => Ok(outcome),
            Ok(outcome) => Err(AttemptError::fatal(
                outcome
                    .message
                    .unwrap_or_else(|| format!("{} rejected", operation.name)),
            )),
            Err(e) => Err(AttemptError::retryable(e.to_string())),
        }
    })
    .instrument(span)
    .await
}
