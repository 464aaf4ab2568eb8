//! Core data types for the harness.

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, nothing opened yet.
    Uninitialized,
    /// Store, directory and network config are in place.
    Loaded,
    /// At least one step has started.
    Active,
    /// Report rendered; no more steps accepted.
    Finalized,
    /// Store cleared and all handles released.
    Destroyed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Kinds of named artifacts kept in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ArtifactKind {
    /// Issued token descriptors.
    Token = 0,
    /// Deployed contract addresses.
    Address = 1,
    /// Values handed from one step to a later one.
    Breadcrumb = 2,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Address => write!(f, "address"),
            Self::Breadcrumb => write!(f, "breadcrumb"),
        }
    }
}

/// On-ledger identity of a user. Opaque to the harness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIdentity {
    /// Account address as the ledger spells it.
    pub address: String,
    /// Reference to key material (e.g. a PEM path); never read by the harness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Account state as last reported by the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Next nonce to use.
    pub nonce: u64,
    /// Native balance in the smallest denomination.
    pub balance: u128,
}

/// A user known to the session under a logical role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Logical role ("whale", "firstUser", ...).
    pub role: String,
    /// Chain identity.
    pub identity: ChainIdentity,
    /// Cached state.
    pub state: AccountState,
    /// Whether `state` came from the network at least once.
    pub synced: bool,
}

impl Account {
    /// Creates an account that has not been synced yet.
    pub fn new(role: impl Into<String>, identity: ChainIdentity) -> Self {
        Self {
            role: role.into(),
            identity,
            state: AccountState::default(),
            synced: false,
        }
    }
}

/// Global parameters of the network a session runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Chain identifier.
    pub chain_id: String,
    /// Minimum accepted gas price.
    pub min_gas_price: u64,
}

/// Descriptor of an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    /// Ledger identifier, e.g. `USD-a1b2c3`.
    pub identifier: String,
    /// Ticker requested at issuance.
    pub ticker: String,
    /// Number of decimals.
    pub decimals: u32,
    /// Initial supply in the smallest denomination, as decimal text.
    pub supply: String,
}

/// Raw address of a deployed contract.
///
/// Textual form is `0x` followed by lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(Vec<u8>);

impl Address {
    /// Wraps raw address bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| HarnessError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;
        hex::decode(digits)
            .map(Self)
            .map_err(|e| HarnessError::InvalidAddress(format!("{}: {}", s, e)))
    }
}

impl TryFrom<String> for Address {
    type Error = HarnessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Value carried by a breadcrumb. The variant is its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BreadcrumbValue {
    /// Unsigned integer (nonces, amounts that fit).
    U64(u64),
    /// Signed integer.
    I64(i64),
    /// Free text (token identifiers, hashes).
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Structured value.
    Json(serde_json::Value),
}

impl BreadcrumbValue {
    /// Name of the declared type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

impl fmt::Display for BreadcrumbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U64(v) => write!(f, "{}", v),
            Self::I64(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{:?}", v),
            Self::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for BreadcrumbValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<i64> for BreadcrumbValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<String> for BreadcrumbValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for BreadcrumbValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for BreadcrumbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<serde_json::Value> for BreadcrumbValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Types a breadcrumb can be read back as.
pub trait FromBreadcrumb: Sized {
    /// Declared type this Rust type accepts.
    const TYPE_NAME: &'static str;

    /// Extracts the value if the declared type matches.
    fn from_breadcrumb(value: BreadcrumbValue) -> Option<Self>;
}

impl FromBreadcrumb for u64 {
    const TYPE_NAME: &'static str = "u64";

    fn from_breadcrumb(value: BreadcrumbValue) -> Option<Self> {
        match value {
            BreadcrumbValue::U64(v) => Some(v),
            _ => None,
        }
    }
}

impl FromBreadcrumb for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn from_breadcrumb(value: BreadcrumbValue) -> Option<Self> {
        match value {
            BreadcrumbValue::I64(v) => Some(v),
            _ => None,
        }
    }
}

impl FromBreadcrumb for String {
    const TYPE_NAME: &'static str = "text";

    fn from_breadcrumb(value: BreadcrumbValue) -> Option<Self> {
        match value {
            BreadcrumbValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl FromBreadcrumb for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_breadcrumb(value: BreadcrumbValue) -> Option<Self> {
        match value {
            BreadcrumbValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

impl FromBreadcrumb for serde_json::Value {
    const TYPE_NAME: &'static str = "json";

    fn from_breadcrumb(value: BreadcrumbValue) -> Option<Self> {
        match value {
            BreadcrumbValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// A named artifact value, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    /// Issued token.
    Token(TokenDescriptor),
    /// Deployed contract address.
    Address(Address),
    /// Step-to-step value.
    Breadcrumb(BreadcrumbValue),
}

impl Artifact {
    /// Kind of this artifact.
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Token(_) => ArtifactKind::Token,
            Self::Address(_) => ArtifactKind::Address,
            Self::Breadcrumb(_) => ArtifactKind::Breadcrumb,
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(t) => write!(
                f,
                "{} (ticker {}, {} decimals, supply {})",
                t.identifier, t.ticker, t.decimals, t.supply
            ),
            Self::Address(a) => write!(f, "{}", a),
            Self::Breadcrumb(b) => write!(f, "{} = {}", b.type_name(), b),
        }
    }
}
