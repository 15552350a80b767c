use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// The `global:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    #[serde(default)]
    pub names: NameSettings,
    #[serde(default)]
    pub template_outputs: TemplateOutputs,
}

/// Whether resources of a kind get an explicit physical name
/// (`RoleName`, `GroupName`, ...) or let CloudFormation generate one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NameSettings {
    pub policies: bool,
    pub roles: bool,
    pub users: bool,
    pub groups: bool,
    pub buckets: bool,
    #[serde(alias = "cloudtrail")]
    pub trails: bool,
}

impl Default for NameSettings {
    fn default() -> Self {
        Self {
            policies: false,
            roles: true,
            users: true,
            groups: true,
            buckets: false,
            trails: false,
        }
    }
}

/// Whether ARN outputs (and their exports) are added to the templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemplateOutputs {
    #[default]
    Enabled,
    Disabled,
}

impl TemplateOutputs {
    pub fn enabled(&self) -> bool {
        matches!(self, TemplateOutputs::Enabled)
    }
}
