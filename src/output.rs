//! Writing compiled templates to disk.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, info};

use crate::accounts::AccountRegistry;
use crate::error::CompileError;
use crate::template::{Template, TemplateSet};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    pub fn render(&self, template: &Template) -> Result<String, CompileError> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(template)?),
            OutputFormat::Yaml => serde_yaml::to_string(template)
                .map_err(|e| CompileError::Serialize(e.to_string())),
        }
    }
}

/// `<account>_<id>_<config name>.template`
pub fn template_file_name(account: &str, id: &str, config_name: &str) -> String {
    format!("{account}_{id}_{config_name}.template")
}

/// Write every template with at least one resource into `dir`, returning the paths written.
pub fn write_templates(
    templates: &TemplateSet,
    registry: &AccountRegistry,
    dir: &Path,
    config_name: &str,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, CompileError> {
    fs::create_dir_all(dir)
        .map_err(|e| CompileError::Io(format!("failed to create {}: {e}", dir.display())))?;

    let mut written = Vec::new();
    for (account, template) in templates.iter() {
        if !template.has_resources() {
            debug!(event = "Write", phase = "Skip", account = account);
            continue;
        }
        let id = registry.resolve_name_to_id(account)?;
        let path = dir.join(template_file_name(account, id, config_name));
        let text = format.render(template)?;
        fs::write(&path, text)
            .map_err(|e| CompileError::Io(format!("failed to write {}: {e}", path.display())))?;

        info!(
            event = "Write",
            phase = "Template",
            account = account,
            path = %path.display(),
            resources = template.resource_count()
        );
        written.push(path);
    }
    Ok(written)
}
