//! Rendering of `policy_file` templates into JSON policy documents.

use std::collections::BTreeMap;
use std::path::PathBuf;

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::accounts::Account;
use crate::config::{Config, PolicyFile};
use crate::error::CompileError;

/// Where policy template text comes from.
pub trait PolicySource {
    /// The raw template text for `path`, relative to the source root.
    fn read(&self, path: &str) -> Result<String, CompileError>;
}

/// Policy templates in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PolicySource for DirectorySource {
    fn read(&self, path: &str) -> Result<String, CompileError> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|e| CompileError::PolicyFileRead {
            path: full.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Policy templates held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(path.into(), text.into());
        self
    }
}

impl PolicySource for MemorySource {
    fn read(&self, path: &str) -> Result<String, CompileError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CompileError::PolicyFileRead {
                path: path.to_string(),
                reason: "no such file".to_string(),
            })
    }
}

/// Variables visible inside a policy template.
#[derive(Debug, Serialize)]
struct RenderContext<'a> {
    config: &'a Config,
    account: &'a str,
    parent_account: &'a str,
    template_vars: &'a Value,
}

/// Renders policy templates with strict undefined handling, so a typo in a
/// variable name fails the run instead of producing an empty string.
pub struct PolicyRenderer<S> {
    source: S,
    env: Environment<'static>,
}

impl<S: PolicySource> PolicyRenderer<S> {
    pub fn new(source: S) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { source, env }
    }

    /// Render `file` for `account` and parse the result as a JSON document.
    pub fn render(
        &self,
        file: PolicyFile<'_>,
        config: &Config,
        account: &Account,
        parent: &Account,
    ) -> Result<Value, CompileError> {
        let text = self.source.read(file.path)?;
        let empty = Value::Object(Default::default());
        let ctx = RenderContext {
            config,
            account: account.id(),
            parent_account: parent.id(),
            template_vars: file.template_vars.unwrap_or(&empty),
        };

        let rendered =
            self.env
                .render_str(&text, ctx)
                .map_err(|e| CompileError::PolicyFileRender {
                    path: file.path.to_string(),
                    reason: e.to_string(),
                })?;

        let document: Value =
            serde_json::from_str(&rendered).map_err(|e| CompileError::PolicyFileJson {
                path: file.path.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            event = "Render",
            phase = "PolicyFile",
            path = file.path,
            account = account.name()
        );
        Ok(document)
    }
}
