use anyhow::Result;
use harness_core::{BreadcrumbValue, MemoryLedger, SessionState, StepStatus, TestSession};

/// Declarative assertions on harness state
pub enum Assertion {
    // Session
    SessionState(SessionState),
    NoSession,
    LockFileExists(bool),

    // Artifacts
    TokenExists {
        name: String,
        ticker: String,
    },
    AddressEquals {
        name: String,
        address: String,
    },
    BreadcrumbEquals {
        name: String,
        value: BreadcrumbValue,
    },
    BreadcrumbMissing(String),
    AddressMissing(String),

    // Accounts
    AccountSynced(String),
    AccountNonce {
        role: String,
        nonce: u64,
    },

    // Report
    StepStatus {
        step: String,
        status: StepStatus,
    },
    StepAttempts {
        step: String,
        attempts: u32,
    },
    StepCount(usize),
    ReportContains(String),
    ReportFileExists,

    // Ledger
    LedgerReceived {
        operation: String,
        count: usize,
    },
    CorrelationConsistent,

    // Custom
    Custom(Box<dyn Fn(&TestSession, &MemoryLedger) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionState(s) => write!(f, "SessionState({:?})", s),
            Self::NoSession => write!(f, "NoSession"),
            Self::LockFileExists(b) => write!(f, "LockFileExists({})", b),
            Self::TokenExists { name, ticker } => {
                write!(f, "TokenExists {{ name: {:?}, ticker: {:?} }}", name, ticker)
            }
            Self::AddressEquals { name, address } => {
                write!(f, "AddressEquals {{ name: {:?}, address: {:?} }}", name, address)
            }
            Self::BreadcrumbEquals { name, value } => {
                write!(f, "BreadcrumbEquals {{ name: {:?}, value: {:?} }}", name, value)
            }
            Self::BreadcrumbMissing(name) => write!(f, "BreadcrumbMissing({:?})", name),
            Self::AddressMissing(name) => write!(f, "AddressMissing({:?})", name),
            Self::AccountSynced(role) => write!(f, "AccountSynced({:?})", role),
            Self::AccountNonce { role, nonce } => {
                write!(f, "AccountNonce {{ role: {:?}, nonce: {} }}", role, nonce)
            }
            Self::StepStatus { step, status } => {
                write!(f, "StepStatus {{ step: {:?}, status: {:?} }}", step, status)
            }
            Self::StepAttempts { step, attempts } => {
                write!(f, "StepAttempts {{ step: {:?}, attempts: {} }}", step, attempts)
            }
            Self::StepCount(n) => write!(f, "StepCount({})", n),
            Self::ReportContains(s) => write!(f, "ReportContains({:?})", s),
            Self::ReportFileExists => write!(f, "ReportFileExists"),
            Self::LedgerReceived { operation, count } => write!(
                f,
                "LedgerReceived {{ operation: {:?}, count: {} }}",
                operation, count
            ),
            Self::CorrelationConsistent => write!(f, "CorrelationConsistent"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
