//! In-memory ledger implementing both capabilities, for tests.
//!
//! Operations always succeed unless a failure was scripted for their name.
//! State lives behind a mutex so one ledger can outlive several sessions,
//! which is how restarts are simulated.

use crate::correlation::StepContext;
use crate::ledger::{Interactor, NetworkProvider, OperationSpec, Outcome, ProviderError, TransportError};
use crate::types::{Account, AccountState, ChainIdentity, NetworkConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// An operation the ledger received.
#[derive(Debug, Clone, PartialEq)]
pub struct SentOperation {
    /// Role of the sender.
    pub role: String,
    /// Operation as received.
    pub operation: OperationSpec,
    /// Step the operation was sent from.
    pub step: String,
    /// Correlation id it carried.
    pub correlation_id: Uuid,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, AccountState>,
    transient: HashMap<String, u32>,
    rejections: HashMap<String, String>,
    offline: bool,
    latency: Duration,
    min_gas_price: Option<u64>,
    sent: Vec<SentOperation>,
    queries: usize,
    issued: u32,
    deployed: u32,
}

/// Scriptable ledger living in process memory.
#[derive(Debug)]
pub struct MemoryLedger {
    network: NetworkConfig,
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    /// Empty ledger reporting `chain_id`.
    pub fn new(chain_id: &str) -> Self {
        Self {
            network: NetworkConfig {
                chain_id: chain_id.to_string(),
                min_gas_price: 1_000_000_000,
            },
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Credits `balance` to `address`, creating the account if needed.
    pub fn fund(&self, address: &str, balance: u128) {
        self.state()
            .accounts
            .entry(address.to_string())
            .or_default()
            .balance += balance;
    }

    /// Current state of `address`, if it exists.
    pub fn account(&self, address: &str) -> Option<AccountState> {
        self.state().accounts.get(address).copied()
    }

    /// The next `times` sends of `operation` fail with a transport error.
    pub fn fail_next(&self, operation: &str, times: u32) {
        self.state()
            .transient
            .insert(operation.to_string(), times);
    }

    /// Every send of `operation` is rejected with `message`.
    pub fn reject(&self, operation: &str, message: &str) {
        self.state()
            .rejections
            .insert(operation.to_string(), message.to_string());
    }

    /// While offline every call fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Delay applied to every send.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Gas price reported by later network config queries.
    pub fn set_min_gas_price(&self, price: u64) {
        self.state().min_gas_price = Some(price);
    }

    /// Operations received so far, including failed ones.
    pub fn sent(&self) -> Vec<SentOperation> {
        self.state().sent.clone()
    }

    /// Number of account queries served.
    pub fn queries(&self) -> usize {
        self.state().queries
    }

    fn apply(&self, state: &mut LedgerState, user: &Account, operation: &OperationSpec) -> Outcome {
        let account = state
            .accounts
            .entry(user.identity.address.clone())
            .or_default();
        account.nonce += 1;
        let nonce = account.nonce;

        match operation.name.as_str() {
            "issueToken" => {
                state.issued += 1;
                let ticker = operation.args["ticker"].as_str().unwrap_or("TKN");
                Outcome::success(serde_json::json!({
                    "identifier": format!("{}-{:06x}", ticker, state.issued),
                    "nonce": nonce,
                }))
            }
            "deploy" => {
                state.deployed += 1;
                Outcome::success(serde_json::json!({
                    "address": format!("0x{:064x}", state.deployed),
                    "nonce": nonce,
                }))
            }
            _ => Outcome::success(serde_json::json!({
                "operation": operation.name,
                "nonce": nonce,
            })),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new("local")
    }
}

#[async_trait]
impl Interactor for MemoryLedger {
    async fn send(
        &self,
        ctx: &StepContext,
        user: &Account,
        operation: &OperationSpec,
    ) -> Result<Outcome, TransportError> {
        let latency = {
            let mut state = self.state();
            state.sent.push(SentOperation {
                role: user.role.clone(),
                operation: operation.clone(),
                step: ctx.step().to_string(),
                correlation_id: ctx.correlation_id(),
            });
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if state.offline {
            return Err(TransportError("ledger offline".to_string()));
        }
        if let Some(remaining) = state.transient.get_mut(&operation.name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError(format!(
                    "{} not finalized in time",
                    operation.name
                )));
            }
        }
        if let Some(message) = state.rejections.get(&operation.name) {
            return Ok(Outcome::failure(message.clone()));
        }
        Ok(self.apply(&mut state, user, operation))
    }
}

#[async_trait]
impl NetworkProvider for MemoryLedger {
    async fn get_account(&self, identity: &ChainIdentity) -> Result<AccountState, ProviderError> {
        let mut state = self.state();
        if state.offline {
            return Err(ProviderError("ledger offline".to_string()));
        }
        state.queries += 1;
        Ok(state
            .accounts
            .get(&identity.address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_network_config(&self) -> Result<NetworkConfig, ProviderError> {
        let state = self.state();
        if state.offline {
            return Err(ProviderError("ledger offline".to_string()));
        }
        let mut network = self.network.clone();
        if let Some(price) = state.min_gas_price {
            network.min_gas_price = price;
        }
        Ok(network)
    }
}
