// Small persisted key/value store used between command runs.
//
// The local cache lives in `<app dir>/.zat` and is the only file written.
// A global `~/.zat` may hold defaults, either per subdomain or under a
// `default` section, e.g. `{"default": {"username": "me@example.com"}}`.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const CACHE_FILE: &str = ".zat";
const DEFAULT_SECTION: &str = "default";

pub struct Cache {
    local_path: PathBuf,
    global_path: Option<PathBuf>,
}

impl Cache {
    /// Cache for the app in `app_dir`, backed by the user's global file.
    pub fn open(app_dir: &Path) -> Self {
        Self::with_paths(
            app_dir.join(CACHE_FILE),
            dirs::home_dir().map(|home| home.join(CACHE_FILE)),
        )
    }

    /// Explicit paths, used in tests.
    pub fn with_paths(local_path: PathBuf, global_path: Option<PathBuf>) -> Self {
        Self {
            local_path,
            global_path,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Look `key` up locally, then in the global file under `subdomain`,
    /// then under the global `default` section.
    pub fn fetch(&self, key: &str, subdomain: Option<&str>) -> Result<Option<String>> {
        let local = read_map(&self.local_path)?;
        if let Some(value) = local.get(key).and_then(as_text) {
            return Ok(Some(value));
        }

        let Some(global_path) = &self.global_path else {
            return Ok(None);
        };
        let global = read_map(global_path)?;
        let sections = subdomain.into_iter().chain(std::iter::once(DEFAULT_SECTION));
        for section in sections {
            let value = global
                .get(section)
                .and_then(|s| s.get(key))
                .and_then(as_text);
            if value.is_some() {
                return Ok(value);
            }
        }
        Ok(None)
    }

    /// Merge `pairs` into the local cache file.
    pub fn save(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let mut map = read_map(&self.local_path)?;
        for (key, value) in pairs {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
        log::debug!("saving {} key(s) to {}", pairs.len(), self.local_path.display());
        write_atomic(&self.local_path, &Value::Object(map))
    }

    /// Remove the local cache file if there is one.
    pub fn clear(&self) -> Result<()> {
        if self.local_path.exists() {
            std::fs::remove_file(&self.local_path)
                .with_context(|| format!("removing cache file {}", self.local_path.display()))?;
        }
        Ok(())
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_map(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading cache file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(&content)
        .with_context(|| format!("parsing cache file {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("cache file {} is not a JSON object", path.display()),
    }
}

fn write_atomic(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value).context("serializing cache")?;

    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;

    // Holds credentials-adjacent data.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
    }

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("finalizing cache file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> Cache {
        Cache::with_paths(dir.path().join(".zat"), Some(dir.path().join("global.zat")))
    }

    #[test]
    fn missing_file_fetches_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert_eq!(cache.fetch("app_id", None).unwrap(), None);
    }

    #[test]
    fn save_merges_with_existing_keys() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.save(&[("subdomain", "acme")]).unwrap();
        cache.save(&[("app_id", "42")]).unwrap();

        assert_eq!(cache.fetch("subdomain", None).unwrap().as_deref(), Some("acme"));
        assert_eq!(cache.fetch("app_id", None).unwrap().as_deref(), Some("42"));
        assert!(!dir.path().join(".zat.tmp").exists());
    }

    #[test]
    fn numbers_are_returned_as_text() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".zat"), r#"{"app_id": 456}"#).unwrap();
        let cache = cache_in(&dir);
        assert_eq!(cache.fetch("app_id", None).unwrap().as_deref(), Some("456"));
    }

    #[test]
    fn global_file_scoped_by_subdomain_then_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("global.zat"),
            r#"{"acme": {"username": "a@acme.com"}, "default": {"username": "me@x.com", "password": "pw"}}"#,
        )
        .unwrap();
        let cache = cache_in(&dir);

        assert_eq!(
            cache.fetch("username", Some("acme")).unwrap().as_deref(),
            Some("a@acme.com")
        );
        assert_eq!(
            cache.fetch("username", Some("other")).unwrap().as_deref(),
            Some("me@x.com")
        );
        assert_eq!(cache.fetch("password", Some("acme")).unwrap().as_deref(), Some("pw"));
    }

    #[test]
    fn local_value_wins_over_global() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("global.zat"), r#"{"default": {"username": "g@x.com"}}"#)
            .unwrap();
        let cache = cache_in(&dir);
        cache.save(&[("username", "l@x.com")]).unwrap();
        assert_eq!(cache.fetch("username", None).unwrap().as_deref(), Some("l@x.com"));
    }

    #[test]
    fn clear_removes_local_file_only() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.save(&[("app_id", "1")]).unwrap();
        cache.clear().unwrap();
        assert!(!cache.local_path().exists());
        // clearing twice is fine
        cache.clear().unwrap();
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".zat"), "not json").unwrap();
        assert!(cache_in(&dir).fetch("app_id", None).is_err());
    }
}
