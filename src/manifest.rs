// App manifest (`manifest.json`) and app directory validation.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REQUIREMENTS_FILE: &str = "requirements.json";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: Option<String>,
    pub author: Option<Author>,
    pub default_locale: Option<String>,
    pub location: Option<Value>,
    pub framework_version: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub requirements_only: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

/// A setting the app expects at install time.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Parameter {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub secure: bool,
    pub default: Option<Value>,
}

impl Manifest {
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Products the app is installed into. Locations keyed by product name
    /// are used as-is; legacy string/array locations and requirements-only
    /// apps mean the support product.
    pub fn product_names(&self) -> Vec<String> {
        match &self.location {
            Some(Value::Object(products)) if !products.is_empty() => {
                products.keys().cloned().collect()
            }
            _ => vec!["support".to_string()],
        }
    }

    /// URIs of every location, used to check local iframe assets.
    fn location_uris(&self) -> Vec<String> {
        let mut uris = Vec::new();
        if let Some(Value::Object(products)) = &self.location {
            for locations in products.values() {
                let Value::Object(locations) = locations else {
                    continue;
                };
                for target in locations.values() {
                    match target {
                        Value::String(uri) => uris.push(uri.clone()),
                        Value::Object(obj) => {
                            if let Some(Value::String(uri)) = obj.get("url") {
                                uris.push(uri.clone());
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        uris
    }
}

/// Check an app directory, returning every problem found.
pub fn validate(app_dir: &Path) -> Vec<String> {
    let path = app_dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return vec![format!("Could not find {}", MANIFEST_FILE)];
    }
    let manifest = match Manifest::load(app_dir) {
        Ok(manifest) => manifest,
        Err(e) => return vec![format!("{:#}", e)],
    };

    let mut problems = Vec::new();
    let author = manifest.author.clone().unwrap_or_default();
    if author.name.as_deref().map_or(true, str::is_empty) {
        problems.push("Missing required field in manifest: author name".to_string());
    }
    if author.email.as_deref().map_or(true, str::is_empty) {
        problems.push("Missing required field in manifest: author email".to_string());
    }
    if manifest.framework_version.is_none() {
        problems.push("Missing required field in manifest: frameworkVersion".to_string());
    }

    match &manifest.default_locale {
        None => problems.push("Missing required field in manifest: defaultLocale".to_string()),
        Some(locale) => {
            let translation = app_dir.join("translations").join(format!("{}.json", locale));
            if !translation.is_file() {
                problems.push(format!(
                    "Missing translation file for default locale: translations/{}.json",
                    locale
                ));
            }
        }
    }

    if !manifest.requirements_only && manifest.location.is_none() {
        problems.push("Missing required field in manifest: location".to_string());
    }

    for uri in manifest.location_uris() {
        if uri.starts_with("http://") || uri.starts_with("https://") || uri.starts_with('_') {
            continue;
        }
        if !app_dir.join(&uri).is_file() {
            problems.push(format!("Location points to a missing file: {}", uri));
        }
    }

    let mut seen = HashSet::new();
    for parameter in &manifest.parameters {
        if parameter.name.is_empty() {
            problems.push("Parameters must have a name".to_string());
        } else if !seen.insert(parameter.name.as_str()) {
            problems.push(format!("Duplicate parameter name: {}", parameter.name));
        }
    }

    let requirements = app_dir.join(REQUIREMENTS_FILE);
    if requirements.is_file() {
        let parsed = std::fs::read_to_string(&requirements)
            .map_err(anyhow::Error::from)
            .and_then(|c| serde_json::from_str::<Value>(&c).map_err(anyhow::Error::from));
        if let Err(e) = parsed {
            problems.push(format!("{} is not valid JSON: {}", REQUIREMENTS_FILE, e));
        }
    }

    problems
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    pub const VALID_MANIFEST: &str = r#"{
  "name": "Hello",
  "author": { "name": "Ada", "email": "ada@example.com" },
  "defaultLocale": "en",
  "location": { "support": { "ticket_sidebar": "assets/iframe.html" } },
  "frameworkVersion": "2.0",
  "version": "1.0",
  "parameters": [
    { "name": "token", "type": "text", "required": true, "secure": true },
    { "name": "color", "type": "text", "default": "blue" }
  ]
}"#;

    /// Write a minimal valid app into `dir`.
    pub fn write_app(dir: &Path) {
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::create_dir_all(dir.join("translations")).unwrap();
        std::fs::write(dir.join("manifest.json"), VALID_MANIFEST).unwrap();
        std::fs::write(dir.join("assets/iframe.html"), "<html></html>").unwrap();
        std::fs::write(dir.join("translations/en.json"), "{}").unwrap();
    }
}
