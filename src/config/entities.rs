//! Roles, groups, users, buckets and trails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::Placed;

use super::kind::EntityKind;
use super::policy::PolicyFile;

macro_rules! placed {
    ($ty:ty, $kind:expr) => {
        impl Placed for $ty {
            fn kind() -> EntityKind {
                $kind
            }

            fn in_accounts(&self) -> Option<&[String]> {
                self.in_accounts.as_deref()
            }

            fn retain_on_delete(&self) -> bool {
                self.retain_on_delete
            }
        }
    };
}

/// One entry of the `roles:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_accounts: Option<Vec<String>>,
    /// Accounts, the SAML provider, or service principals allowed to assume the role.
    pub trusts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policies: Vec<String>,
    #[serde(default)]
    pub retain_on_delete: bool,
}

impl RoleConfig {
    /// Service principal that also gets an instance profile for the role.
    pub const EC2_SERVICE: &'static str = "ec2.amazonaws.com";

    pub fn needs_instance_profile(&self) -> bool {
        self.trusts.iter().any(|t| t == Self::EC2_SERVICE)
    }
}

/// One entry of the `groups:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policies: Vec<String>,
    /// Role names; one group per (child account, role) is emitted,
    /// each allowed to assume that role in that child account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_policies: Option<Vec<String>>,
    #[serde(default)]
    pub retain_on_delete: bool,
}

/// One entry of the `users:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policies: Vec<String>,
    /// Initial console password; a reset is required on first login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub retain_on_delete: bool,
}

/// One entry of the `buckets:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_policy: Option<BucketPolicyConfig>,
    #[serde(default)]
    pub retain_on_delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketPolicyConfig {
    pub policy_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_vars: Option<Value>,
}

impl BucketPolicyConfig {
    pub fn file(&self) -> PolicyFile<'_> {
        PolicyFile {
            path: &self.policy_file,
            template_vars: self.template_vars.as_ref(),
        }
    }
}

/// One entry of the `trails:` (or `cloudtrail:`) section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_accounts: Option<Vec<String>>,
    /// Target bucket. When it names a configured bucket, the trail depends on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiregion: Option<bool>,
    #[serde(
        default,
        alias = "GlobalEvents",
        skip_serializing_if = "Option::is_none"
    )]
    pub global_events: Option<bool>,
    #[serde(default)]
    pub retain_on_delete: bool,
}

placed!(RoleConfig, EntityKind::Role);
placed!(GroupConfig, EntityKind::Group);
placed!(UserConfig, EntityKind::User);
placed!(BucketConfig, EntityKind::Bucket);
placed!(TrailConfig, EntityKind::Trail);
