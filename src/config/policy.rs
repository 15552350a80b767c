use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompileError;
use crate::traits::Placed;

use super::kind::EntityKind;

/// One entry of the `policies:` section.
///
/// Exactly one of `inline`, `policy_file` or `assume` decides the body, see [`PolicyConfig::body`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inline policies are not emitted on their own, groups carry them.
    #[serde(default)]
    pub inline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_vars: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assume: Option<AssumeConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default)]
    pub retain_on_delete: bool,
}

/// A policy that grants `sts:AssumeRole` on the named roles in the matched accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssumeConfig {
    pub accounts: Vec<String>,
    pub roles: Vec<String>,
}

/// A templated policy document on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyFile<'a> {
    pub path: &'a str,
    pub template_vars: Option<&'a Value>,
}

/// What a policy's document is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyBody<'a> {
    Inline,
    File(PolicyFile<'a>),
    Assume(&'a AssumeConfig),
}

impl PolicyConfig {
    pub fn from_file(path: impl Into<String>) -> Self {
        Self {
            policy_file: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_assume(accounts: Vec<String>, roles: Vec<String>) -> Self {
        Self {
            assume: Some(AssumeConfig { accounts, roles }),
            ..Default::default()
        }
    }

    pub fn placed_in(mut self, tokens: &[&str]) -> Self {
        self.in_accounts = Some(tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    /// The body of the policy named `name`, failing unless exactly one form is set.
    pub fn body(&self, name: &str) -> Result<PolicyBody<'_>, CompileError> {
        match (self.inline, &self.policy_file, &self.assume) {
            (true, None, None) => Ok(PolicyBody::Inline),
            (false, Some(path), None) => Ok(PolicyBody::File(PolicyFile {
                path,
                template_vars: self.template_vars.as_ref(),
            })),
            (false, None, Some(assume)) => Ok(PolicyBody::Assume(assume)),
            _ => Err(CompileError::InvalidPolicyBody(name.to_string())),
        }
    }
}

impl Placed for PolicyConfig {
    fn kind() -> EntityKind {
        EntityKind::Policy
    }

    fn in_accounts(&self) -> Option<&[String]> {
        self.in_accounts.as_deref()
    }

    fn retain_on_delete(&self) -> bool {
        self.retain_on_delete
    }
}
