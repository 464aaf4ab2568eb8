//! Durable artifact store.
//!
//! Artifacts and account snapshots live in a redb database inside the run
//! directory, so a later process (or a later step after a crash) sees exactly
//! what earlier steps saved. Tokens and addresses share the `artifacts` table
//! under a kind prefix; breadcrumbs have their own table keyed by name.

use crate::error::{storage, HarnessError, Result};
use crate::types::{
    Account, Address, Artifact, ArtifactKind, BreadcrumbValue, FromBreadcrumb, TokenDescriptor,
};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the store inside a run directory.
pub const STORE_FILE: &str = "session.redb";

/// Store schema version.
pub const STORE_SCHEMA_VERSION: u32 = 2;

const METADATA_TABLE: TableDefinition<&str, u32> = TableDefinition::new("metadata");
const ACCOUNTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
const ARTIFACTS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("artifacts");
const BREADCRUMBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("breadcrumbs");

/// Encode artifact key: kind_byte + name_utf8.
fn encode_artifact_key(kind: ArtifactKind, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(kind as u8);
    key.extend_from_slice(name.as_bytes());
    key
}

fn decode_artifact(name: &str, bytes: &[u8]) -> Result<Artifact> {
    serde_json::from_slice(bytes)
        .map_err(|e| HarnessError::Deserialization(format!("artifact {}: {}", name, e)))
}

fn decode_breadcrumb(name: &str, bytes: &[u8]) -> Result<Artifact> {
    serde_json::from_slice(bytes)
        .map(Artifact::Breadcrumb)
        .map_err(|e| HarnessError::Deserialization(format!("breadcrumb {}: {}", name, e)))
}

/// Named, kind-partitioned persistence for one run directory.
pub struct ArtifactStore {
    db: Database,
    path: PathBuf,
}

impl ArtifactStore {
    /// Opens the store in `work_dir`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `StoreCorrupted` if the file exists with another schema version.
    pub fn open(work_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(work_dir)?;
        let path = work_dir.join(STORE_FILE);

        let db = Database::create(&path).map_err(|e| {
            HarnessError::StoreCorrupted(format!("failed to open {}: {}", path.display(), e))
        })?;

        let write_txn = db.begin_write().map_err(storage("begin write"))?;
        {
            let mut meta = write_txn
                .open_table(METADATA_TABLE)
                .map_err(storage("open metadata table"))?;
            let found = meta
                .get("version")
                .map_err(storage("read schema version"))?
                .map(|v| v.value());
            match found {
                Some(version) if version != STORE_SCHEMA_VERSION => {
                    return Err(HarnessError::StoreCorrupted(format!(
                        "schema version mismatch: found {}, expected {}",
                        version, STORE_SCHEMA_VERSION
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert("version", STORE_SCHEMA_VERSION)
                        .map_err(storage("write schema version"))?;
                }
            }
            write_txn
                .open_table(ACCOUNTS_TABLE)
                .map_err(storage("open accounts table"))?;
            write_txn
                .open_table(ARTIFACTS_TABLE)
                .map_err(storage("open artifacts table"))?;
            write_txn
                .open_table(BREADCRUMBS_TABLE)
                .map_err(storage("open breadcrumbs table"))?;
        }
        write_txn.commit().map_err(storage("commit"))?;

        debug!(path = %path.display(), "Opened artifact store");
        Ok(Self { db, path })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or overwrites `name` within the artifact's kind.
    pub fn save(&self, name: &str, artifact: &Artifact) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(storage("begin write"))?;
        match artifact {
            Artifact::Breadcrumb(value) => {
                let bytes = serde_json::to_vec(value).map_err(|e| {
                    HarnessError::Serialization(format!("breadcrumb {}: {}", name, e))
                })?;
                let mut table = write_txn
                    .open_table(BREADCRUMBS_TABLE)
                    .map_err(storage("open breadcrumbs table"))?;
                table
                    .insert(name, bytes.as_slice())
                    .map_err(storage("insert breadcrumb"))?;
            }
            _ => {
                let key = encode_artifact_key(artifact.kind(), name);
                let bytes = serde_json::to_vec(artifact).map_err(|e| {
                    HarnessError::Serialization(format!("artifact {}: {}", name, e))
                })?;
                let mut table = write_txn
                    .open_table(ARTIFACTS_TABLE)
                    .map_err(storage("open artifacts table"))?;
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(storage("insert artifact"))?;
            }
        }
        write_txn.commit().map_err(storage("commit"))?;

        debug!(kind = %artifact.kind(), name, "Saved artifact");
        Ok(())
    }

    /// Loads `name` of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactNotFound` if nothing was saved under that name and kind.
    pub fn load(&self, kind: ArtifactKind, name: &str) -> Result<Artifact> {
        let not_found = || HarnessError::ArtifactNotFound {
            kind,
            name: name.to_string(),
        };
        let read_txn = self.db.begin_read().map_err(storage("begin read"))?;

        if kind == ArtifactKind::Breadcrumb {
            let table = read_txn
                .open_table(BREADCRUMBS_TABLE)
                .map_err(storage("open breadcrumbs table"))?;
            let value = table
                .get(name)
                .map_err(storage("read breadcrumb"))?
                .ok_or_else(not_found)?;
            return decode_breadcrumb(name, value.value());
        }

        let key = encode_artifact_key(kind, name);
        let table = read_txn
            .open_table(ARTIFACTS_TABLE)
            .map_err(storage("open artifacts table"))?;

        let value = table
            .get(key.as_slice())
            .map_err(storage("read artifact"))?
            .ok_or_else(not_found)?;
        let artifact = decode_artifact(name, value.value())?;

        if artifact.kind() != kind {
            return Err(HarnessError::ArtifactKindMismatch {
                name: name.to_string(),
                expected: kind,
                found: artifact.kind(),
            });
        }
        Ok(artifact)
    }

    /// Loads a token descriptor.
    pub fn load_token(&self, name: &str) -> Result<TokenDescriptor> {
        match self.load(ArtifactKind::Token, name)? {
            Artifact::Token(token) => Ok(token),
            other => Err(mismatch(name, ArtifactKind::Token, &other)),
        }
    }

    /// Loads a contract address.
    pub fn load_address(&self, name: &str) -> Result<Address> {
        match self.load(ArtifactKind::Address, name)? {
            Artifact::Address(address) => Ok(address),
            other => Err(mismatch(name, ArtifactKind::Address, &other)),
        }
    }

    /// Loads a breadcrumb with whatever type it was saved as.
    pub fn load_breadcrumb(&self, name: &str) -> Result<BreadcrumbValue> {
        match self.load(ArtifactKind::Breadcrumb, name)? {
            Artifact::Breadcrumb(value) => Ok(value),
            other => Err(mismatch(name, ArtifactKind::Breadcrumb, &other)),
        }
    }

    /// Loads a breadcrumb and checks its declared type.
    ///
    /// # Errors
    ///
    /// Returns `BreadcrumbTypeMismatch` if it was saved with another type.
    pub fn load_breadcrumb_as<T: FromBreadcrumb>(&self, name: &str) -> Result<T> {
        let value = self.load_breadcrumb(name)?;
        let found = value.type_name();
        T::from_breadcrumb(value).ok_or_else(|| HarnessError::BreadcrumbTypeMismatch {
            name: name.to_string(),
            expected: T::TYPE_NAME,
            found,
        })
    }

    /// All artifacts of one kind, sorted by name.
    pub fn list(&self, kind: ArtifactKind) -> Result<Vec<(String, Artifact)>> {
        let read_txn = self.db.begin_read().map_err(storage("begin read"))?;

        if kind == ArtifactKind::Breadcrumb {
            let table = read_txn
                .open_table(BREADCRUMBS_TABLE)
                .map_err(storage("open breadcrumbs table"))?;
            let mut entries = Vec::new();
            for entry in table.iter().map_err(storage("iterate breadcrumbs"))? {
                let (key, value) = entry.map_err(storage("read breadcrumb entry"))?;
                let name = key.value().to_string();
                let artifact = decode_breadcrumb(&name, value.value())?;
                entries.push((name, artifact));
            }
            return Ok(entries);
        }

        let table = read_txn
            .open_table(ARTIFACTS_TABLE)
            .map_err(storage("open artifacts table"))?;

        let mut entries = Vec::new();
        for entry in table.iter().map_err(storage("iterate artifacts"))? {
            let (key, value) = entry.map_err(storage("read artifact entry"))?;
            let key = key.value();
            if key.first() != Some(&(kind as u8)) {
                continue;
            }
            let name = String::from_utf8_lossy(&key[1..]).into_owned();
            let artifact = decode_artifact(&name, value.value())?;
            entries.push((name, artifact));
        }
        Ok(entries)
    }

    /// Persists the cached state of the given accounts in one transaction.
    pub fn save_accounts(&self, accounts: &[Account]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(storage("begin write"))?;
        {
            let mut table = write_txn
                .open_table(ACCOUNTS_TABLE)
                .map_err(storage("open accounts table"))?;
            for account in accounts {
                let bytes = serde_json::to_vec(account).map_err(|e| {
                    HarnessError::Serialization(format!("account {}: {}", account.role, e))
                })?;
                table
                    .insert(account.role.as_str(), bytes.as_slice())
                    .map_err(storage("insert account"))?;
            }
        }
        write_txn.commit().map_err(storage("commit"))?;
        Ok(())
    }

    /// All persisted accounts, sorted by role.
    pub fn load_accounts(&self) -> Result<Vec<Account>> {
        let read_txn = self.db.begin_read().map_err(storage("begin read"))?;
        let table = read_txn
            .open_table(ACCOUNTS_TABLE)
            .map_err(storage("open accounts table"))?;

        let mut accounts = Vec::new();
        for entry in table.iter().map_err(storage("iterate accounts"))? {
            let (key, value) = entry.map_err(storage("read account entry"))?;
            let account: Account = serde_json::from_slice(value.value()).map_err(|e| {
                HarnessError::Deserialization(format!("account {}: {}", key.value(), e))
            })?;
            accounts.push(account);
        }
        Ok(accounts)
    }

    /// Removes every artifact, breadcrumb and account. The schema version is kept.
    pub fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(storage("begin write"))?;
        write_txn
            .delete_table(ARTIFACTS_TABLE)
            .map_err(storage("delete artifacts table"))?;
        write_txn
            .delete_table(BREADCRUMBS_TABLE)
            .map_err(storage("delete breadcrumbs table"))?;
        write_txn
            .delete_table(ACCOUNTS_TABLE)
            .map_err(storage("delete accounts table"))?;
        write_txn
            .open_table(ARTIFACTS_TABLE)
            .map_err(storage("open artifacts table"))?;
        write_txn
            .open_table(BREADCRUMBS_TABLE)
            .map_err(storage("open breadcrumbs table"))?;
        write_txn
            .open_table(ACCOUNTS_TABLE)
            .map_err(storage("open accounts table"))?;
        write_txn.commit().map_err(storage("commit"))?;

        debug!(path = %self.path.display(), "Cleared artifact store");
        Ok(())
    }

    /// Releases the database handle.
    pub fn close(self) {
        debug!(path = %self.path.display(), "Closed artifact store");
    }
}

fn mismatch(name: &str, expected: ArtifactKind, found: &Artifact) -> HarnessError {
    HarnessError::ArtifactKindMismatch {
        name: name.to_string(),
        expected,
        found: found.kind(),
    }
}
