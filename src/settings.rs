// Installation settings for an app's manifest parameters, read from a JSON
// or YAML config file or asked for interactively.

use crate::error::ZatError;
use crate::manifest::Parameter;
use crate::ui::Prompter;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "settings.yml";

pub type Settings = Map<String, Value>;

/// Read a settings file. `.json` files are parsed as JSON, anything else as
/// YAML. Returns `None` when the file does not exist.
pub fn from_file(path: &Path) -> Result<Option<Settings>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let is_json = path.extension().map_or(false, |ext| ext == "json");
    let value: Value = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    };
    match value {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(Some(Map::new())),
        _ => anyhow::bail!("{} must contain a mapping of setting names", path.display()),
    }
}

/// Settings for `parameters`. With a config file every parameter takes its
/// file value or default, and required ones must be present; without one the
/// user is asked for each parameter.
pub fn resolve(
    parameters: &[Parameter],
    config: &Path,
    prompter: &dyn Prompter,
) -> Result<Settings> {
    let mut settings = Map::new();
    match from_file(config)? {
        Some(file) => {
            log::debug!("reading settings from {}", config.display());
            for parameter in parameters {
                match file.get(&parameter.name).or(parameter.default.as_ref()) {
                    Some(value) => {
                        settings.insert(parameter.name.clone(), value.clone());
                    }
                    None if parameter.required => {
                        anyhow::bail!(ZatError::MissingSetting(parameter.name.clone()));
                    }
                    None => {}
                }
            }
        }
        None => {
            for parameter in parameters {
                let value = ask(parameter, prompter)?;
                if let Some(value) = value {
                    settings.insert(parameter.name.clone(), value);
                }
            }
        }
    }
    Ok(settings)
}

fn ask(parameter: &Parameter, prompter: &dyn Prompter) -> Result<Option<Value>> {
    let default = parameter.default.as_ref().map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let prompt = format!("Enter a value for parameter '{}':", parameter.name);
    loop {
        let answer = if parameter.secure {
            prompter.secret(&prompt)?
        } else {
            prompter.input(&prompt, default.as_deref())?
        };
        let answer = answer.trim().to_string();
        if !answer.is_empty() {
            return Ok(Some(Value::String(answer)));
        }
        if let Some(default) = &parameter.default {
            return Ok(Some(default.clone()));
        }
        if !parameter.required {
            return Ok(None);
        }
    }
}
