//! The compiler: accounts, validation, then every entity kind in dependency order.

use std::path::PathBuf;

use chrono::Utc;
use strum::IntoEnumIterator;
use tracing::info;

use crate::accounts::AccountRegistry;
use crate::builders::{BuildContext, build_kind};
use crate::config::{Config, EntityKind};
use crate::error::CompileError;
use crate::matcher::AccountMatcher;
use crate::references::ReferenceResolver;
use crate::render::{DirectorySource, PolicyRenderer, PolicySource};
use crate::template::TemplateSet;
use crate::validate::validate;

/// Format of the build version stamped into every template.
pub const BUILD_VERSION_FORMAT: &str = "%Y-%m-%dZ%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub build_version: String,
}

impl CompileOptions {
    pub fn new(build_version: impl Into<String>) -> Self {
        Self {
            build_version: build_version.into(),
        }
    }

    /// Options stamped with the current UTC time.
    pub fn now() -> Self {
        Self::new(Utc::now().format(BUILD_VERSION_FORMAT).to_string())
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::now()
    }
}

/// The result of a successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub registry: AccountRegistry,
    pub templates: TemplateSet,
}

pub struct Compiler<S> {
    renderer: PolicyRenderer<S>,
    options: CompileOptions,
}

impl Compiler<DirectorySource> {
    /// A compiler reading policy files from `policy_dir`.
    pub fn with_policy_dir(policy_dir: impl Into<PathBuf>, options: CompileOptions) -> Self {
        Self::new(DirectorySource::new(policy_dir), options)
    }
}

impl<S: PolicySource> Compiler<S> {
    pub fn new(source: S, options: CompileOptions) -> Self {
        Self {
            renderer: PolicyRenderer::new(source),
            options,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile `config` into one template per account.
    ///
    /// The whole configuration is validated first; nothing is built if it has any error.
    pub fn compile(&self, config: &Config) -> Result<Compilation, CompileError> {
        info!(
            event = "Compile",
            phase = "Start",
            build_version = self.options.build_version.as_str(),
            accounts = config.accounts.len()
        );

        let registry = AccountRegistry::load(&config.accounts)?;
        validate(config, &registry)?;

        let matcher = AccountMatcher::new(&registry);
        let resolver = ReferenceResolver::new(&config.policies, &matcher)?;
        let ctx = BuildContext::new(config, &registry, &resolver, &self.renderer);

        let mut templates = TemplateSet::new(&registry, self.options.build_version.as_str());
        for kind in EntityKind::iter() {
            build_kind(&ctx, &mut templates, kind)?;
        }

        info!(
            event = "Compile",
            phase = "Finish",
            resources = templates.resource_count()
        );
        Ok(Compilation {
            registry,
            templates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MemorySource;
    use chrono::NaiveDateTime;

    const CONFIG: &str = r#"
accounts:
  root: { id: 111111111111, parent: true, saml_provider: idp }
  dev: { id: 222222222222 }
policies:
  ReadOnly: { policy_file: ro.json }
roles:
  Admin: { trusts: [root, idp], managed_policies: [ReadOnly] }
users:
  alice: {}
"#;

    fn compiler() -> Compiler<MemorySource> {
        let source = MemorySource::new().with(
            "ro.json",
            r#"{"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": "iam:Get*", "Resource": "*"}]}"#,
        );
        Compiler::new(source, CompileOptions::new("2026-10-18Z12:00:00"))
    }

    #[test]
    fn test_compile() {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        let compilation = compiler().compile(&config).unwrap();
        let templates = &compilation.templates;

        let dev: Vec<&str> = templates.get("dev").unwrap().resource_ids().collect();
        assert_eq!(dev, vec!["AdminRole", "ReadOnly"]);
        let root: Vec<&str> = templates.get("root").unwrap().resource_ids().collect();
        assert_eq!(root, vec!["AdminRole", "ReadOnly", "aliceUser"]);
        assert_eq!(templates.build_version(), "2026-10-18Z12:00:00");
        assert_eq!(compilation.registry.parent_name(), "root");
    }

    #[test]
    fn test_nothing_is_built_when_invalid() {
        let config = Config::from_yaml_str(
            "accounts: { root: { id: 1, parent: true } }\nroles: { R: { trusts: [nowhere] } }",
        )
        .unwrap();
        assert_eq!(
            compiler().compile(&config).unwrap_err(),
            CompileError::UnknownTrust("nowhere".into())
        );
    }

    #[test]
    fn test_registry_errors_come_first() {
        let config = Config::from_yaml_str("accounts: { a: { id: 1 } }").unwrap();
        assert_eq!(
            compiler().compile(&config).unwrap_err(),
            CompileError::MissingParentAccount
        );
    }

    #[test]
    fn test_build_version_format() {
        let version = CompileOptions::now().build_version;
        assert!(NaiveDateTime::parse_from_str(&version, BUILD_VERSION_FORMAT).is_ok());
    }
}
