//! Cross-entity references: managed policy ARNs, imports and local refs.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::PolicyConfig;
use crate::error::CompileError;
use crate::matcher::AccountMatcher;
use crate::template::scrub_name;
use crate::traits::Placed;

const ARN_PREFIX: &str = "arn:aws";
const IMPORT_PREFIX: &str = "import:";

/// A resolved `managed_policies` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind")]
pub enum ManagedPolicyReference {
    /// An explicit ARN, passed through untouched.
    Literal { arn: String },
    /// An export of another stack.
    Import { key: String },
    /// A managed policy declared in this configuration and placed in the same account.
    LocalRef { name: String },
}

impl ManagedPolicyReference {
    /// The value to put into a `ManagedPolicyArns` list.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal { arn } => Value::String(arn.clone()),
            Self::Import { key } => import_value(key),
            Self::LocalRef { name } => json!({ "Ref": scrub_name(name) }),
        }
    }
}

/// A user, group or role name that may be imported from another stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ValueRef {
    Literal(String),
    Import(String),
}

impl ValueRef {
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix(IMPORT_PREFIX) {
            Some(key) => ValueRef::Import(key.to_string()),
            None => ValueRef::Literal(value.to_string()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(value) => Value::String(value.clone()),
            Self::Import(key) => import_value(key),
        }
    }
}

fn import_value(key: &str) -> Value {
    json!({ "Fn::ImportValue": key })
}

/// Where each declared policy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    inline: bool,
    accounts: BTreeSet<String>,
}

/// Resolves managed policy references against the declared policies.
///
/// Every policy's placement is computed once, up front, so a reference is
/// checked against the complete set of policies regardless of the order
/// entities are visited in.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    placements: BTreeMap<String, Placement>,
    /// Declared policies whose own `in_accounts` failed, with that failure.
    unplaced: BTreeMap<String, CompileError>,
}

impl ReferenceResolver {
    /// Fails with the first policy whose `in_accounts` does not resolve.
    pub fn new(
        policies: &BTreeMap<String, PolicyConfig>,
        matcher: &AccountMatcher<'_>,
    ) -> Result<Self, CompileError> {
        let (resolver, errors) = Self::partial(policies, matcher);
        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(resolver),
        }
    }

    /// A resolver over every policy whose `in_accounts` resolves, plus the errors of those that do not.
    ///
    /// A reference to an unplaced policy fails with that policy's own placement error.
    pub fn partial(
        policies: &BTreeMap<String, PolicyConfig>,
        matcher: &AccountMatcher<'_>,
    ) -> (Self, Vec<CompileError>) {
        let mut placements = BTreeMap::new();
        let mut unplaced = BTreeMap::new();
        for (name, policy) in policies {
            match matcher.resolve(&policy.context()) {
                Ok(accounts) => {
                    placements.insert(
                        name.clone(),
                        Placement {
                            inline: policy.inline,
                            accounts,
                        },
                    );
                }
                Err(e) => {
                    unplaced.insert(name.clone(), e);
                }
            }
        }
        let errors = unplaced.values().cloned().collect();
        (
            Self {
                placements,
                unplaced,
            },
            errors,
        )
    }

    /// Whether a policy named `name` is declared at all.
    pub fn is_declared(&self, name: &str) -> bool {
        self.placements.contains_key(name) || self.unplaced.contains_key(name)
    }

    /// The accounts a declared policy is placed in.
    pub fn placement(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.placements.get(name).map(|p| &p.accounts)
    }

    /// Resolve one `managed_policies` entry for `entity`, which lives in `account`.
    pub fn resolve_managed_policy(
        &self,
        reference: &str,
        account: &str,
        entity: &str,
    ) -> Result<ManagedPolicyReference, CompileError> {
        let resolved = if reference.starts_with(ARN_PREFIX) {
            ManagedPolicyReference::Literal {
                arn: reference.to_string(),
            }
        } else if let Some(key) = reference.strip_prefix(IMPORT_PREFIX) {
            ManagedPolicyReference::Import {
                key: key.to_string(),
            }
        } else if let Some(error) = self.unplaced.get(reference) {
            return Err(error.clone());
        } else {
            let placement =
                self.placements
                    .get(reference)
                    .ok_or_else(|| CompileError::UndeclaredPolicy {
                        policy: reference.to_string(),
                        entity: entity.to_string(),
                    })?;
            if placement.inline {
                return Err(CompileError::InlinePolicyReference {
                    policy: reference.to_string(),
                    entity: entity.to_string(),
                });
            }
            if !placement.accounts.contains(account) {
                return Err(CompileError::PolicyNotInAccount {
                    policy: reference.to_string(),
                    account: account.to_string(),
                    entity: entity.to_string(),
                });
            }
            ManagedPolicyReference::LocalRef {
                name: reference.to_string(),
            }
        };

        debug!(
            event = "Resolve",
            phase = "ManagedPolicy",
            entity = entity,
            account = account,
            reference = ?resolved
        );
        Ok(resolved)
    }

    /// Resolve a whole `managed_policies` list, failing on the first bad entry.
    pub fn resolve_managed_policies<S: AsRef<str>>(
        &self,
        references: &[S],
        account: &str,
        entity: &str,
    ) -> Result<Vec<ManagedPolicyReference>, CompileError> {
        references
            .iter()
            .map(|r| self.resolve_managed_policy(r.as_ref(), account, entity))
            .collect()
    }

    /// Users, groups and roles are referenced by name; `import:` values become
    /// imports, anything else is taken verbatim since it may exist outside the template.
    pub fn resolve_import_or_literal<S: AsRef<str>>(values: &[S]) -> Vec<ValueRef> {
        values.iter().map(|v| ValueRef::parse(v.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::sample_registry;
    use yare::parameterized;

    fn resolver() -> ReferenceResolver {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        let mut policies = BTreeMap::new();
        policies.insert(
            "RootOnly".to_string(),
            PolicyConfig::from_file("root.json").placed_in(&["root"]),
        );
        policies.insert("Everywhere".to_string(), PolicyConfig::from_file("all.json"));
        policies.insert(
            "Children".to_string(),
            PolicyConfig::from_file("c.json").placed_in(&["children"]),
        );
        policies.insert(
            "Inline".to_string(),
            PolicyConfig {
                inline: true,
                ..Default::default()
            },
        );
        ReferenceResolver::new(&policies, &matcher).unwrap()
    }

    #[parameterized(
        literal = { "arn:aws:iam::123:policy/X", "dev" },
        literal_any_account = { "arn:aws:iam::aws:policy/ReadOnlyAccess", "root" },
    )]
    fn test_literal_arn_passes_through(reference: &str, account: &str) {
        let resolved = resolver()
            .resolve_managed_policy(reference, account, "R")
            .unwrap();
        assert_eq!(
            resolved,
            ManagedPolicyReference::Literal {
                arn: reference.to_string()
            }
        );
        assert_eq!(resolved.to_value(), Value::String(reference.to_string()));
    }

    #[test]
    fn test_import() {
        let resolved = resolver()
            .resolve_managed_policy("import:shared-ReadOnlyPolicyArn", "dev", "R")
            .unwrap();
        assert_eq!(
            resolved,
            ManagedPolicyReference::Import {
                key: "shared-ReadOnlyPolicyArn".to_string()
            }
        );
        assert_eq!(
            resolved.to_value(),
            json!({"Fn::ImportValue": "shared-ReadOnlyPolicyArn"})
        );
    }

    #[parameterized(
        root_only_in_root = { "RootOnly", "root" },
        everywhere_in_dev = { "Everywhere", "dev" },
        everywhere_in_root = { "Everywhere", "root" },
        children_in_prod = { "Children", "prod" },
    )]
    fn test_local_ref_placed(policy: &str, account: &str) {
        let resolved = resolver()
            .resolve_managed_policy(policy, account, "R")
            .unwrap();
        assert_eq!(
            resolved,
            ManagedPolicyReference::LocalRef {
                name: policy.to_string()
            }
        );
    }

    #[parameterized(
        root_only_in_dev = { "RootOnly", "dev" },
        children_in_root = { "Children", "root" },
    )]
    fn test_local_ref_not_placed(policy: &str, account: &str) {
        assert_eq!(
            resolver().resolve_managed_policy(policy, account, "R"),
            Err(CompileError::PolicyNotInAccount {
                policy: policy.to_string(),
                account: account.to_string(),
                entity: "R".to_string(),
            })
        );
    }

    #[test]
    fn test_undeclared() {
        assert_eq!(
            resolver().resolve_managed_policy("Missing", "dev", "R"),
            Err(CompileError::UndeclaredPolicy {
                policy: "Missing".to_string(),
                entity: "R".to_string(),
            })
        );
    }

    #[test]
    fn test_inline_cannot_be_referenced() {
        assert!(matches!(
            resolver().resolve_managed_policy("Inline", "dev", "R"),
            Err(CompileError::InlinePolicyReference { .. })
        ));
    }

    #[test]
    fn test_local_ref_value_is_scrubbed() {
        let reference = ManagedPolicyReference::LocalRef {
            name: "read-only_policy".to_string(),
        };
        assert_eq!(reference.to_value(), json!({"Ref": "readonlypolicy"}));
    }

    #[test]
    fn test_resolve_list_stops_on_error() {
        let err = resolver()
            .resolve_managed_policies(&["Everywhere", "Missing", "RootOnly"], "dev", "R")
            .unwrap_err();
        assert!(matches!(err, CompileError::UndeclaredPolicy { policy, .. } if policy == "Missing"));
    }

    #[test]
    fn test_import_or_literal() {
        let values = ReferenceResolver::resolve_import_or_literal(&["Admins", "import:shared-Group"]);
        assert_eq!(
            values,
            vec![
                ValueRef::Literal("Admins".to_string()),
                ValueRef::Import("shared-Group".to_string())
            ]
        );
        assert_eq!(values[1].to_value(), json!({"Fn::ImportValue": "shared-Group"}));
    }

    #[test]
    fn test_partial_keeps_resolvable_policies() {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        let mut policies = BTreeMap::new();
        policies.insert(
            "Bad".to_string(),
            PolicyConfig::from_file("bad.json").placed_in(&["staging"]),
        );
        policies.insert(
            "Good".to_string(),
            PolicyConfig::from_file("good.json").placed_in(&["root"]),
        );

        let (resolver, errors) = ReferenceResolver::partial(&policies, &matcher);
        assert_eq!(errors, vec![CompileError::UnresolvedPattern("staging".into())]);
        assert!(resolver.is_declared("Bad"));
        assert!(resolver.placement("Bad").is_none());
        assert_eq!(
            resolver.resolve_managed_policy("Bad", "dev", "R"),
            Err(CompileError::UnresolvedPattern("staging".into()))
        );
        assert!(resolver.resolve_managed_policy("Good", "root", "R").is_ok());
        assert_eq!(
            ReferenceResolver::new(&policies, &matcher).unwrap_err(),
            CompileError::UnresolvedPattern("staging".into())
        );
    }

    #[test]
    fn test_placement_is_exposed() {
        let resolver = resolver();
        assert!(resolver.is_declared("RootOnly"));
        assert!(!resolver.is_declared("Nope"));
        assert_eq!(resolver.placement("Children").unwrap().len(), 2);
    }
}
