//! Account identity types.
//!
//! An [`AccountKey`] is the sanitized identifier used for every piece of
//! account-scoped state: sequence counters, scoped safety state, failure
//! tags, and status rows. Master and user keys live in disjoint namespaces
//! so a user named "master" can never share the master's counter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SequenceError;

/// Whether an account leads or follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum AccountRole {
    /// The single account whose fills are replicated.
    Master,
    /// A subscriber account identified by an operator-chosen id.
    User(String),
}

impl AccountRole {
    #[must_use]
    pub const fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "MASTER"),
            Self::User(id) => write!(f, "USER:{id}"),
        }
    }
}

/// Sanitized, storage-safe account identifier.
///
/// Only `[a-z0-9_-]` survive; input is lowercased first. Master accounts
/// map to `master`, user accounts to `user_<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    /// Key reserved for the master account.
    pub const MASTER: &'static str = "master";

    /// Derive the key for a role.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidAccountId`] when a user id has no
    /// characters left after sanitizing.
    pub fn for_role(role: &AccountRole) -> Result<Self, SequenceError> {
        match role {
            AccountRole::Master => Ok(Self(Self::MASTER.to_string())),
            AccountRole::User(id) => {
                let cleaned = sanitize(id);
                if cleaned.is_empty() {
                    return Err(SequenceError::InvalidAccountId(id.clone()));
                }
                Ok(Self(format!("user_{cleaned}")))
            }
        }
    }

    /// The master account key.
    #[must_use]
    pub fn master() -> Self {
        Self(Self::MASTER.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        self.0 == Self::MASTER
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip everything outside `[a-z0-9_-]` after lowercasing.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

/// Opaque reference to an account's credentials.
///
/// Holds the name of the environment variable that carries the secret; the
/// secret itself is resolved by the broker adapter and never logged.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHandle(String);

impl CredentialHandle {
    #[must_use]
    pub fn new(env_var: impl Into<String>) -> Self {
        Self(env_var.into())
    }

    /// Name of the environment variable holding the secret.
    #[must_use]
    pub fn env_var(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialHandle(${})", self.0)
    }
}

/// Static identity of one configured account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub key: AccountKey,
    pub role: AccountRole,
    /// Identifier of the broker adapter serving this account.
    pub broker: String,
    pub credential: CredentialHandle,
}

impl Account {
    /// Build an account, deriving its sanitized key from the role.
    ///
    /// # Errors
    ///
    /// Fails when the user id sanitizes to nothing.
    pub fn new(
        role: AccountRole,
        broker: impl Into<String>,
        credential: CredentialHandle,
    ) -> Result<Self, SequenceError> {
        Ok(Self {
            key: AccountKey::for_role(&role)?,
            role,
            broker: broker.into(),
            credential,
        })
    }

    #[must_use]
    pub const fn is_master(&self) -> bool {
        self.role.is_master()
    }
}
