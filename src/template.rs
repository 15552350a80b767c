//! CloudFormation templates: one per account, filled by the builders through [`TemplateSink`].

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;

use crate::accounts::{Account, AccountRegistry};
use crate::error::CompileError;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Logical id of the build version output every template carries.
pub const BUILD_OUTPUT: &str = "TemplateBuild";

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("scrub regex is valid"));

/// Strip everything but ASCII letters and digits, giving a valid logical id.
pub fn scrub_name(name: &str) -> String {
    NON_ALPHANUMERIC.replace_all(name, "").into_owned()
}

/// CloudFormation resource types the builders emit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, Serialize, Deserialize,
)]
pub enum ResourceKind {
    #[strum(serialize = "AWS::IAM::ManagedPolicy")]
    #[serde(rename = "AWS::IAM::ManagedPolicy")]
    ManagedPolicy,
    #[strum(serialize = "AWS::IAM::Role")]
    #[serde(rename = "AWS::IAM::Role")]
    Role,
    #[strum(serialize = "AWS::IAM::InstanceProfile")]
    #[serde(rename = "AWS::IAM::InstanceProfile")]
    InstanceProfile,
    #[strum(serialize = "AWS::IAM::Group")]
    #[serde(rename = "AWS::IAM::Group")]
    Group,
    #[strum(serialize = "AWS::IAM::User")]
    #[serde(rename = "AWS::IAM::User")]
    User,
    #[strum(serialize = "AWS::S3::Bucket")]
    #[serde(rename = "AWS::S3::Bucket")]
    Bucket,
    #[strum(serialize = "AWS::S3::BucketPolicy")]
    #[serde(rename = "AWS::S3::BucketPolicy")]
    BucketPolicy,
    #[strum(serialize = "AWS::CloudTrail::Trail")]
    #[serde(rename = "AWS::CloudTrail::Trail")]
    Trail,
}

/// A template output, exported as `<stack name>-<logical id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub logical_id: String,
    pub description: String,
    pub value: Value,
}

impl OutputDescriptor {
    pub fn new(logical_id: impl Into<String>, description: impl Into<String>, value: Value) -> Self {
        Self {
            logical_id: logical_id.into(),
            description: description.into(),
            value,
        }
    }

    pub fn export_name(&self) -> Value {
        json!({ "Fn::Sub": format!("${{AWS::StackName}}-{}", self.logical_id) })
    }

    fn to_value(&self) -> Value {
        json!({
            "Description": self.description,
            "Value": self.value,
            "Export": { "Name": self.export_name() },
        })
    }
}

/// One resource for one account, as handed to a [`TemplateSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub account: String,
    pub logical_id: String,
    pub kind: ResourceKind,
    pub properties: Map<String, Value>,
    pub retain_on_delete: bool,
    pub depends_on: Option<String>,
    pub outputs: Vec<OutputDescriptor>,
}

impl ResourceDescriptor {
    pub fn new(account: impl Into<String>, logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            account: account.into(),
            logical_id: logical_id.into(),
            kind,
            properties: Map::new(),
            retain_on_delete: false,
            depends_on: None,
            outputs: Vec::new(),
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Set `key` only when `value` is present.
    pub fn property_opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.property(key, value),
            None => self,
        }
    }

    /// Set a list property only when it has entries.
    pub fn list_property(self, key: &str, values: Vec<Value>) -> Self {
        if values.is_empty() {
            self
        } else {
            self.property(key, Value::Array(values))
        }
    }

    pub fn retain(mut self, retain_on_delete: bool) -> Self {
        self.retain_on_delete = retain_on_delete;
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on = Some(logical_id.into());
        self
    }

    pub fn output(mut self, output: OutputDescriptor) -> Self {
        self.outputs.push(output);
        self
    }

    fn to_value(&self) -> Value {
        let mut resource = Map::new();
        resource.insert("Type".to_string(), Value::String(self.kind.to_string()));
        if !self.properties.is_empty() {
            resource.insert(
                "Properties".to_string(),
                Value::Object(self.properties.clone()),
            );
        }
        if self.retain_on_delete {
            resource.insert("DeletionPolicy".to_string(), json!("Retain"));
        }
        if let Some(depends_on) = &self.depends_on {
            resource.insert("DependsOn".to_string(), json!(depends_on));
        }
        Value::Object(resource)
    }
}

/// A resource that has been emitted, for other resources to point at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub account: String,
    pub logical_id: String,
}

impl ResourceHandle {
    /// `{"Ref": <logical id>}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.logical_id })
    }

    /// `{"Fn::GetAtt": [<logical id>, <attr>]}`
    pub fn get_att(&self, attr: &str) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id, attr] })
    }
}

/// Receives resources from the builders.
pub trait TemplateSink {
    fn emit(&mut self, resource: ResourceDescriptor) -> Result<ResourceHandle, CompileError>;
}

/// The template of a single account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: String,
    description: String,
    resources: BTreeMap<String, Value>,
    outputs: BTreeMap<String, Value>,
    #[serde(skip)]
    account: String,
}

impl Template {
    pub fn new(account: &Account, build_version: &str) -> Self {
        let build = OutputDescriptor::new(
            BUILD_OUTPUT,
            "CloudFormation Template Build Number",
            json!(build_version),
        );
        let mut outputs = BTreeMap::new();
        outputs.insert(build.logical_id.clone(), build.to_value());
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: format!(
                "Build {build_version} - IAM Users, Groups, Roles, and Policies for account {account}"
            ),
            resources: BTreeMap::new(),
            outputs,
            account: account.name().to_string(),
        }
    }

    pub fn add(&mut self, resource: ResourceDescriptor) -> Result<ResourceHandle, CompileError> {
        let duplicate = |logical_id: &str| CompileError::DuplicateResource {
            account: self.account.clone(),
            logical_id: logical_id.to_string(),
        };
        if self.resources.contains_key(&resource.logical_id) {
            return Err(duplicate(&resource.logical_id));
        }
        if let Some(output) = resource
            .outputs
            .iter()
            .find(|o| self.outputs.contains_key(&o.logical_id))
        {
            return Err(duplicate(&output.logical_id));
        }

        for output in &resource.outputs {
            self.outputs
                .insert(output.logical_id.clone(), output.to_value());
        }
        self.resources
            .insert(resource.logical_id.clone(), resource.to_value());

        debug!(
            event = "Emit",
            phase = "Resource",
            account = self.account.as_str(),
            logical_id = resource.logical_id.as_str(),
            kind = resource.kind.as_ref(),
            outputs = resource.outputs.len()
        );
        Ok(ResourceHandle {
            account: resource.account,
            logical_id: resource.logical_id,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    pub fn output(&self, logical_id: &str) -> Option<&Value> {
        self.outputs.get(logical_id)
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Result<Value, CompileError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Every account's template, keyed by account name.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSet {
    build_version: String,
    templates: BTreeMap<String, Template>,
}

impl TemplateSet {
    pub fn new(registry: &AccountRegistry, build_version: impl Into<String>) -> Self {
        let build_version = build_version.into();
        let templates = registry
            .accounts()
            .map(|account| {
                (
                    account.name().to_string(),
                    Template::new(account, &build_version),
                )
            })
            .collect();
        Self {
            build_version,
            templates,
        }
    }

    pub fn build_version(&self) -> &str {
        &self.build_version
    }

    pub fn get(&self, account: &str) -> Option<&Template> {
        self.templates.get(account)
    }

    /// Every template, ordered by account name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.templates.iter().map(|(name, t)| (name.as_str(), t))
    }

    pub fn resource_count(&self) -> usize {
        self.templates.values().map(Template::resource_count).sum()
    }
}

impl TemplateSink for TemplateSet {
    fn emit(&mut self, resource: ResourceDescriptor) -> Result<ResourceHandle, CompileError> {
        let template = self
            .templates
            .get_mut(&resource.account)
            .ok_or_else(|| CompileError::UnknownAccount(resource.account.clone()))?;
        template.add(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::sample_registry;
    use insta::assert_json_snapshot;
    use std::str::FromStr;
    use yare::parameterized;

    #[parameterized(
        plain = { "Admin", "Admin" },
        dashes = { "read-only", "readonly" },
        underscores = { "ci_deploy_role", "cideployrole" },
        spaces_and_dots = { "Team A.prod", "TeamAprod" },
        digits = { "123-456", "123456" },
        unicode = { "café", "caf" },
    )]
    fn test_scrub_name(name: &str, expected: &str) {
        assert_eq!(scrub_name(name), expected);
    }

    #[test]
    fn test_resource_kind_strings() {
        assert_eq!(ResourceKind::Role.to_string(), "AWS::IAM::Role");
        assert_eq!(ResourceKind::Trail.as_ref(), "AWS::CloudTrail::Trail");
        assert_eq!(
            ResourceKind::from_str("AWS::S3::BucketPolicy").unwrap(),
            ResourceKind::BucketPolicy
        );
        assert_eq!(
            serde_json::to_value(ResourceKind::InstanceProfile).unwrap(),
            json!("AWS::IAM::InstanceProfile")
        );
    }

    #[test]
    fn test_handle_values() {
        let handle = ResourceHandle {
            account: "dev".into(),
            logical_id: "AdminRole".into(),
        };
        assert_eq!(handle.reference(), json!({"Ref": "AdminRole"}));
        assert_eq!(
            handle.get_att("Arn"),
            json!({"Fn::GetAtt": ["AdminRole", "Arn"]})
        );
    }

    #[test]
    fn test_template_shape() {
        let registry = sample_registry();
        let mut set = TemplateSet::new(&registry, "2026-01-02Z03:04:05");
        let handle = set
            .emit(
                ResourceDescriptor::new("dev", "logsBucket", ResourceKind::Bucket)
                    .property("BucketName", "logs")
                    .retain(true)
                    .output(OutputDescriptor::new(
                        "logsBucketArn",
                        "logs Bucket ARN",
                        json!({"Fn::GetAtt": ["logsBucket", "Arn"]}),
                    )),
            )
            .unwrap();
        set.emit(
            ResourceDescriptor::new("dev", "auditTrail", ResourceKind::Trail)
                .depends_on(handle.logical_id.clone()),
        )
        .unwrap();

        let template = set.get("dev").unwrap();
        assert_json_snapshot!(template.to_value().unwrap(), @r###"
        {
          "AWSTemplateFormatVersion": "2010-09-09",
          "Description": "Build 2026-01-02Z03:04:05 - IAM Users, Groups, Roles, and Policies for account dev (222222222222)",
          "Outputs": {
            "TemplateBuild": {
              "Description": "CloudFormation Template Build Number",
              "Export": {
                "Name": {
                  "Fn::Sub": "${AWS::StackName}-TemplateBuild"
                }
              },
              "Value": "2026-01-02Z03:04:05"
            },
            "logsBucketArn": {
              "Description": "logs Bucket ARN",
              "Export": {
                "Name": {
                  "Fn::Sub": "${AWS::StackName}-logsBucketArn"
                }
              },
              "Value": {
                "Fn::GetAtt": [
                  "logsBucket",
                  "Arn"
                ]
              }
            }
          },
          "Resources": {
            "auditTrail": {
              "DependsOn": "logsBucket",
              "Type": "AWS::CloudTrail::Trail"
            },
            "logsBucket": {
              "DeletionPolicy": "Retain",
              "Properties": {
                "BucketName": "logs"
              },
              "Type": "AWS::S3::Bucket"
            }
          }
        }
        "###);
    }

    #[test]
    fn test_every_account_gets_a_template() {
        let registry = sample_registry();
        let set = TemplateSet::new(&registry, "v1");
        let accounts: Vec<&str> = set.iter().map(|(name, _)| name).collect();
        assert_eq!(accounts, vec!["dev", "prod", "root"]);
        assert!(set.iter().all(|(_, t)| !t.has_resources()));
        assert!(set.get("root").unwrap().output(BUILD_OUTPUT).is_some());
        assert_eq!(set.resource_count(), 0);
    }

    #[test]
    fn test_build_output_is_exported() {
        let registry = sample_registry();
        let set = TemplateSet::new(&registry, "v7");
        let build = set.get("prod").unwrap().output(BUILD_OUTPUT).unwrap();
        assert_eq!(build["Value"], "v7");
        assert_eq!(build["Description"], "CloudFormation Template Build Number");
        assert_eq!(
            build["Export"]["Name"],
            json!({"Fn::Sub": "${AWS::StackName}-TemplateBuild"})
        );
    }

    #[test]
    fn test_unknown_account() {
        let registry = sample_registry();
        let mut set = TemplateSet::new(&registry, "v1");
        assert_eq!(
            set.emit(ResourceDescriptor::new("staging", "X", ResourceKind::Role)),
            Err(CompileError::UnknownAccount("staging".into()))
        );
    }

    #[test]
    fn test_duplicate_resource() {
        let registry = sample_registry();
        let mut set = TemplateSet::new(&registry, "v1");
        set.emit(ResourceDescriptor::new("dev", "AdminRole", ResourceKind::Role))
            .unwrap();
        assert_eq!(
            set.emit(ResourceDescriptor::new("dev", "AdminRole", ResourceKind::Role)),
            Err(CompileError::DuplicateResource {
                account: "dev".into(),
                logical_id: "AdminRole".into(),
            })
        );
        set.emit(ResourceDescriptor::new("prod", "AdminRole", ResourceKind::Role))
            .unwrap();
        assert_eq!(set.resource_count(), 2);
    }

    #[test]
    fn test_duplicate_output() {
        let registry = sample_registry();
        let mut set = TemplateSet::new(&registry, "v1");
        let err = set
            .emit(
                ResourceDescriptor::new("dev", "X", ResourceKind::Role)
                    .output(OutputDescriptor::new(BUILD_OUTPUT, "clash", json!("x"))),
            )
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateResource { logical_id, .. } if logical_id == BUILD_OUTPUT));
        assert!(!set.get("dev").unwrap().has_resources());
    }

    #[test]
    fn test_optional_properties() {
        let descriptor = ResourceDescriptor::new("dev", "X", ResourceKind::User)
            .property_opt("UserName", None::<String>)
            .property_opt("Path", Some("/"))
            .list_property("Groups", vec![]);
        assert_eq!(descriptor.properties.len(), 1);
        assert_eq!(descriptor.properties["Path"], "/");
    }
}
