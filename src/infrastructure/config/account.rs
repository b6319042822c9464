//! Account and paper-broker configuration.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{Account, AccountRole, CredentialHandle};
use crate::error::SequenceError;

/// Broker kinds that can be built from configuration.
pub const SUPPORTED_BROKERS: &[&str] = &["paper"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Master,
    User,
}

/// One `[[accounts]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub role: RoleKind,
    /// Required for users; ignored for the master.
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_broker")]
    pub broker: String,
    /// Environment variable holding the API secret. Never the secret itself.
    #[serde(default)]
    pub credential_env: Option<String>,
    /// Symbols this account's worker evaluates.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Users only: receive replicated master fills.
    #[serde(default = "default_copy_master")]
    pub copy_master: bool,
    /// Users only: overrides `[replication].risk_ceiling_pct`.
    #[serde(default)]
    pub risk_ceiling_pct: Option<Decimal>,
    /// Starting cash for the paper broker.
    #[serde(default = "default_paper_balance")]
    pub paper_balance: Decimal,
}

fn default_broker() -> String {
    "paper".to_string()
}

const fn default_copy_master() -> bool {
    true
}

fn default_paper_balance() -> Decimal {
    Decimal::from(10_000)
}

impl AccountConfig {
    #[must_use]
    pub fn role(&self) -> AccountRole {
        match self.role {
            RoleKind::Master => AccountRole::Master,
            RoleKind::User => AccountRole::User(self.id.clone()),
        }
    }

    /// Credential variable, defaulting to `WARDEN_<ID>_CREDENTIALS`.
    #[must_use]
    pub fn credential_env(&self) -> String {
        self.credential_env.clone().unwrap_or_else(|| {
            let id = match self.role {
                RoleKind::Master => "MASTER".to_string(),
                RoleKind::User => self.id.to_uppercase().replace(['-', ' '], "_"),
            };
            format!("WARDEN_{id}_CREDENTIALS")
        })
    }

    /// # Errors
    ///
    /// Returns [`SequenceError::InvalidAccountId`] for an unusable user id.
    pub fn to_account(&self) -> Result<Account, SequenceError> {
        Account::new(
            self.role(),
            self.broker.clone(),
            CredentialHandle::new(self.credential_env()),
        )
    }
}

/// `[paper]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Static price per symbol.
    pub prices: HashMap<String, Decimal>,
}
