//! Typed configuration model.
//!
//! A configuration document looks like:
//!
//! ```yaml
//! accounts:
//!   root: { id: 111111111111, parent: true, saml_provider: idp }
//!   dev: { id: 222222222222 }
//! policies:
//!   ReadOnly: { policy_file: readonly.json.j2, in_accounts: [all] }
//! roles:
//!   Admin: { trusts: [root, idp], managed_policies: [ReadOnly] }
//! ```
//!
//! Every entity may carry `in_accounts`, a list of account pattern tokens.
//! When it is absent, the per-kind default from [`EntityKind::default_context`] applies.
//! Values may use the `!env_var`, `!secret` and `!include` tags, see [`TagResolver`].

mod account;
mod entities;
mod global;
mod kind;
mod policy;
mod tags;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

pub use account::AccountConfig;
pub use entities::{BucketConfig, BucketPolicyConfig, GroupConfig, RoleConfig, TrailConfig, UserConfig};
pub use global::{GlobalConfig, NameSettings, TemplateOutputs};
pub use kind::EntityKind;
pub use policy::{AssumeConfig, PolicyBody, PolicyConfig, PolicyFile};
pub use tags::{SECRETS_FILE, TagResolver};

/// The whole configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    pub accounts: BTreeMap<String, AccountConfig>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyConfig>,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
    #[serde(default)]
    pub users: BTreeMap<String, UserConfig>,
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketConfig>,
    #[serde(default, alias = "cloudtrail")]
    pub trails: BTreeMap<String, TrailConfig>,
}

impl Config {
    /// Parse a configuration from YAML text.
    ///
    /// `!env_var` reads the process environment; `!secret` and `!include` need
    /// [`Config::from_path`] or [`Config::from_yaml_with`].
    pub fn from_yaml_str(text: &str) -> Result<Self, CompileError> {
        Self::from_yaml_with(text, &TagResolver::new())
    }

    /// Parse YAML text, resolving its tags with `tags` first.
    pub fn from_yaml_with(text: &str, tags: &TagResolver) -> Result<Self, CompileError> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        let config: Config = serde_yaml::from_value(tags.resolve(document)?)?;
        if config.accounts.is_empty() {
            return Err(CompileError::Parse(
                "no account data was provided, at least one account must be present".to_string(),
            ));
        }
        Ok(config)
    }

    /// Read and parse a configuration file, with secrets and includes found next to it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CompileError::Io(format!("failed to read {}: {e}", path.display()))
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_yaml_with(&text, &TagResolver::for_dir(dir)?)
    }
}
