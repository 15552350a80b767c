//! The account registry: every configured account, with name and id lookups.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AccountConfig;
use crate::error::CompileError;

/// A single account, immutable once the registry is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    name: String,
    id: String,
    is_parent: bool,
    saml_provider: Option<String>,
}

impl Account {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            is_parent: false,
            saml_provider: None,
        }
    }

    pub fn parent(mut self) -> Self {
        self.is_parent = true;
        self
    }

    pub fn with_saml_provider(mut self, provider: impl Into<String>) -> Self {
        self.saml_provider = Some(provider.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_parent(&self) -> bool {
        self.is_parent
    }

    pub fn saml_provider(&self) -> Option<&str> {
        self.saml_provider.as_deref()
    }

    /// `arn:aws:iam::<id>:root`
    pub fn root_arn(&self) -> String {
        format!("arn:aws:iam::{}:root", self.id)
    }

    /// `arn:aws:iam::<id>:role/<role>`
    pub fn role_arn(&self, role: &str) -> String {
        format!("arn:aws:iam::{}:role/{role}", self.id)
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// All accounts, ordered by name, with bidirectional name/id maps.
///
/// Name and id uniqueness, numeric ids and the single parent are checked when
/// the registry is built, so lookups afterwards can rely on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistry {
    accounts: BTreeMap<String, Account>,
    id_to_name: BTreeMap<String, String>,
    parent: String,
}

impl AccountRegistry {
    /// Build the registry from the `accounts:` section of the config.
    pub fn load(accounts: &BTreeMap<String, AccountConfig>) -> Result<Self, CompileError> {
        Self::new(accounts.iter().map(|(name, cfg)| Account {
            name: name.clone(),
            id: cfg.id.clone(),
            is_parent: cfg.parent,
            saml_provider: cfg.saml_provider.clone(),
        }))
    }

    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Result<Self, CompileError> {
        let mut by_name: BTreeMap<String, Account> = BTreeMap::new();
        let mut id_to_name: BTreeMap<String, String> = BTreeMap::new();

        for account in accounts {
            if account.id.is_empty() || !account.id.chars().all(|c| c.is_ascii_digit()) {
                return Err(CompileError::InvalidAccountId {
                    account: account.name,
                    id: account.id,
                });
            }
            if by_name.contains_key(&account.name) {
                return Err(CompileError::DuplicateAccountName(account.name));
            }
            if let Some(first) = id_to_name.get(&account.id) {
                return Err(CompileError::DuplicateAccountId {
                    id: account.id.clone(),
                    first: first.clone(),
                    second: account.name,
                });
            }
            debug!(
                event = "Registry",
                phase = "Account",
                name = account.name.as_str(),
                id = account.id.as_str(),
                parent = account.is_parent
            );
            id_to_name.insert(account.id.clone(), account.name.clone());
            by_name.insert(account.name.clone(), account);
        }

        let parents: Vec<String> = by_name
            .values()
            .filter(|a| a.is_parent)
            .map(|a| a.name.clone())
            .collect();
        let parent = match parents.len() {
            0 => return Err(CompileError::MissingParentAccount),
            1 => parents[0].clone(),
            _ => return Err(CompileError::MultipleParentAccounts(parents)),
        };

        Ok(Self {
            accounts: by_name,
            id_to_name,
            parent,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    /// Like [`AccountRegistry::get`], failing with `UnknownAccount`.
    pub fn account(&self, name: &str) -> Result<&Account, CompileError> {
        self.get(name)
            .ok_or_else(|| CompileError::UnknownAccount(name.to_string()))
    }

    /// Every account, ordered by name.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn resolve_id_to_name(&self, id: &str) -> Result<&str, CompileError> {
        self.id_to_name
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| CompileError::UnknownAccount(id.to_string()))
    }

    pub fn resolve_name_to_id(&self, name: &str) -> Result<&str, CompileError> {
        self.account(name).map(Account::id)
    }

    /// Convert between friendly names and ids: a numeric value maps to its
    /// account name, anything else to its account id.
    pub fn map_account(&self, value: &str) -> Result<&str, CompileError> {
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
            self.resolve_id_to_name(value)
        } else {
            self.resolve_name_to_id(value)
        }
    }

    pub fn is_parent(&self, name: &str) -> bool {
        self.parent == name
    }

    pub fn parent_name(&self) -> &str {
        &self.parent
    }

    pub fn parent(&self) -> &Account {
        // The parent is validated to exist in `new`.
        &self.accounts[&self.parent]
    }

    /// The SAML provider configured on the parent account.
    pub fn saml_provider(&self) -> Option<&str> {
        self.parent().saml_provider()
    }

    pub fn all(&self) -> BTreeSet<String> {
        self.accounts.keys().cloned().collect()
    }

    pub fn children(&self) -> BTreeSet<String> {
        self.accounts
            .keys()
            .filter(|name| **name != self.parent)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
