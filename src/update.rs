// Weekly version check against the public gem registry.

use crate::cache::Cache;
use crate::ui::{self, Tone};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use semver::Version;
use serde::Deserialize;

/// Release of zendesk_apps_tools whose behaviour this build matches. Both
/// `zat version` and the registry comparison use it.
pub const TOOLS_VERSION: &str = "3.9.2";

pub const DEFAULT_REGISTRY_URL: &str = "https://rubygems.org/api/v1/gems/zendesk_apps_tools.json";
pub const LAST_CHECK_KEY: &str = "zat_update_check";
pub const CHECK_INTERVAL_DAYS: i64 = 7;

const DATE_FORMAT: &str = "%Y-%m-%d";
const CHECKING_MESSAGE: &str = "Checking for new version of zendesk_apps_tools";
const OUTDATED_MESSAGE: &str =
    "Your version of Zendesk Apps Tools is outdated. Update by running: gem update zendesk_apps_tools";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Checked recently; nothing was fetched.
    Skipped,
    UpToDate,
    Outdated { latest: Version },
}

#[derive(Deserialize)]
struct GemInfo {
    version: String,
}

/// Whether a check is due given the date of the last one.
pub fn check_due(last_check: Option<&str>, today: NaiveDate) -> bool {
    match last_check.and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()) {
        Some(last) => last <= today - Duration::days(CHECK_INTERVAL_DAYS),
        None => true,
    }
}

/// Parse registry versions, which may have fewer or more than three parts
/// (`3.9`, `3.9.2.1`).
pub fn parse_version(raw: &str) -> Option<Version> {
    if let Ok(version) = Version::parse(raw.trim()) {
        return Some(version);
    }
    let mut parts = raw
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;
    Some(Version::new(major, minor, patch))
}

pub struct UpdateChecker {
    client: reqwest::blocking::Client,
    registry_url: String,
    current: Version,
}

impl UpdateChecker {
    pub fn new(registry_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("zat/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;
        let current = parse_version(TOOLS_VERSION)
            .with_context(|| format!("Tools version is not valid: {}", TOOLS_VERSION))?;
        Ok(Self {
            client,
            registry_url: registry_url.to_string(),
            current,
        })
    }

    pub fn with_current_version(mut self, current: Version) -> Self {
        self.current = current;
        self
    }

    pub fn current_version(&self) -> &Version {
        &self.current
    }

    pub fn latest_version(&self) -> Result<Version> {
        log::debug!("GET {}", self.registry_url);
        let response = self
            .client
            .get(&self.registry_url)
            .send()
            .context("Failed to reach the gem registry")?;
        if !response.status().is_success() {
            anyhow::bail!("Gem registry answered {}", response.status());
        }
        let info: GemInfo = response.json().context("Failed to parse gem registry response")?;
        parse_version(&info.version)
            .with_context(|| format!("Unrecognised version from registry: {}", info.version))
    }

    /// Check for a newer release at most once per interval, remembering
    /// the date of the last check in `cache`.
    pub fn check(&self, cache: &Cache, today: NaiveDate) -> Result<UpdateStatus> {
        let last = cache.fetch(LAST_CHECK_KEY, None)?;
        if !check_due(last.as_deref(), today) {
            return Ok(UpdateStatus::Skipped);
        }

        ui::say_status("info", CHECKING_MESSAGE, Tone::Info);
        let latest = self.latest_version()?;
        let checked_on = today.format(DATE_FORMAT).to_string();
        cache.save(&[(LAST_CHECK_KEY, checked_on.as_str())])?;

        if latest > self.current {
            ui::say_status("warning", OUTDATED_MESSAGE, Tone::Warning);
            Ok(UpdateStatus::Outdated { latest })
        } else {
            Ok(UpdateStatus::UpToDate)
        }
    }
}
