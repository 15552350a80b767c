//! IAM policy documents in their JSON wire shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// The policy language version every generated document uses.
pub const POLICY_VERSION: &str = "2012-10-17";

pub const ASSUME_ROLE: &str = "sts:AssumeRole";
pub const ASSUME_ROLE_WITH_SAML: &str = "sts:AssumeRoleWithSAML";

/// Audience a SAML assertion must carry to be accepted for console sign-in.
pub const SAML_AUDIENCE: &str = "https://signin.aws.amazon.com/saml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// Who a statement applies to, e.g. `{"AWS": "arn:aws:iam::123456789012:root"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    #[serde(rename = "AWS")]
    Aws(String),
    Service(String),
    Federated(String),
}

/// Condition operator -> condition key -> value.
pub type Condition = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Statement {
    /// Let `principal` assume the role carrying this trust statement.
    pub fn trust(principal: Principal) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(principal),
            action: ASSUME_ROLE.to_string(),
            resource: None,
            condition: None,
        }
    }

    /// Let a SAML-federated identity from `provider_arn` assume the role.
    pub fn saml_trust(provider_arn: impl Into<String>) -> Self {
        let mut condition = Condition::new();
        condition.insert(
            "StringEquals".to_string(),
            BTreeMap::from([("SAML:aud".to_string(), SAML_AUDIENCE.to_string())]),
        );
        Self {
            effect: Effect::Allow,
            principal: Some(Principal::Federated(provider_arn.into())),
            action: ASSUME_ROLE_WITH_SAML.to_string(),
            resource: None,
            condition: Some(condition),
        }
    }

    /// Allow assuming the role with ARN `role_arn`.
    pub fn assume_role(role_arn: impl Into<String>) -> Self {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: ASSUME_ROLE.to_string(),
            resource: Some(role_arn.into()),
            condition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    pub fn len(&self) -> usize {
        self.statement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statement.is_empty()
    }

    pub fn to_value(&self) -> serde_json::Value {
        // A document of strings and maps always serializes.
        serde_json::to_value(self).unwrap_or_default()
    }
}
