//! YAML tag substitution: `!env_var`, `!secret` and `!include`.
//!
//! Tags are resolved on the untyped document before it is deserialized, so the
//! typed model only ever sees plain values. Any other tag is rejected.
//!
//! ```yaml
//! accounts:
//!   root: { id: !env_var ROOT_ACCOUNT_ID 111111111111, parent: true }
//! users:
//!   alice: { password: !secret alice_password }
//! roles: !include roles.yaml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::CompileError;

/// File holding `!secret` values.
pub const SECRETS_FILE: &str = "secrets.yaml";

/// Resolves the tags of one configuration document.
#[derive(Debug, Clone, Default)]
pub struct TagResolver {
    base_dir: Option<PathBuf>,
    secrets: Mapping,
    /// `None` reads the process environment.
    env: Option<BTreeMap<String, String>>,
    including: Vec<PathBuf>,
}

impl TagResolver {
    /// No secrets, no include directory, process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver for a configuration file living in `dir`.
    ///
    /// `!include` paths are relative to `dir`. Secrets come from `secrets.yaml` in `dir`
    /// and in every parent directory; a nearer file wins for the same key.
    pub fn for_dir(dir: &Path) -> Result<Self, CompileError> {
        let mut resolver = Self {
            base_dir: Some(dir.to_path_buf()),
            ..Self::default()
        };
        for ancestor in dir.ancestors() {
            let path = ancestor.join(SECRETS_FILE);
            if !path.is_file() {
                continue;
            }
            let Value::Mapping(secrets) = read_yaml(&path)? else {
                return Err(CompileError::Parse(format!(
                    "{} must be a mapping of secret names to values",
                    path.display()
                )));
            };
            debug!(event = "Load", phase = "Secrets", path = %path.display(), secrets = secrets.len());
            for (key, value) in secrets {
                if !resolver.secrets.contains_key(&key) {
                    resolver.secrets.insert(key, value);
                }
            }
        }
        Ok(resolver)
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.secrets.insert(Value::String(key.into()), value.into());
        self
    }

    /// Look environment variables up in `vars` instead of the process environment.
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Replace every tagged value in `value`.
    pub fn resolve(&self, value: Value) -> Result<Value, CompileError> {
        match value {
            Value::Tagged(tagged) => self.substitute(*tagged),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::Mapping(mapping) => mapping
                .into_iter()
                .map(|(key, value)| Ok((key, self.resolve(value)?)))
                .collect::<Result<Mapping, CompileError>>()
                .map(Value::Mapping),
            other => Ok(other),
        }
    }

    fn substitute(&self, tagged: TaggedValue) -> Result<Value, CompileError> {
        let tag = tagged.tag.to_string();
        let tag = tag.trim_start_matches('!');
        let argument = match &tagged.value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(CompileError::Parse(format!(
                    "tag !{tag} takes a single scalar argument"
                )));
            }
        };

        match tag {
            "env_var" => self.env_var(&argument),
            "secret" => self.secret(&argument),
            "include" => self.include(&argument),
            other => Err(CompileError::Parse(format!("unsupported tag !{other}"))),
        }
    }

    /// `!env_var NAME [default words...]`
    fn env_var(&self, argument: &str) -> Result<Value, CompileError> {
        let mut words = argument.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| CompileError::Parse("!env_var needs a variable name".to_string()))?;
        let default = words.join(" ");

        let found = match &self.env {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        match found {
            Some(value) => Ok(Value::String(value)),
            None if !default.is_empty() => Ok(Value::String(default)),
            None => Err(CompileError::UndefinedEnvVar(name.to_string())),
        }
    }

    fn secret(&self, key: &str) -> Result<Value, CompileError> {
        let value = self
            .secrets
            .get(key)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedSecret(key.to_string()))?;
        debug!(event = "Resolve", phase = "Secret", key = key);
        Ok(value)
    }

    fn include(&self, file: &str) -> Result<Value, CompileError> {
        let Some(dir) = &self.base_dir else {
            return Err(CompileError::Parse(format!(
                "!include {file} needs a configuration file to be relative to"
            )));
        };
        let path = dir.join(file);
        if self.including.contains(&path) {
            return Err(CompileError::Parse(format!(
                "{} includes itself",
                path.display()
            )));
        }

        let mut nested = self.clone();
        nested.base_dir = path.parent().map(Path::to_path_buf);
        nested.including.push(path.clone());
        debug!(event = "Load", phase = "Include", path = %path.display());
        nested.resolve(read_yaml(&path)?)
    }
}

fn read_yaml(path: &Path) -> Result<Value, CompileError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CompileError::Io(format!("failed to read {}: {e}", path.display())))?;
    Ok(serde_yaml::from_str(&text)?)
}
