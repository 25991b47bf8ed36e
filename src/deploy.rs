// Deploy command layer: composes upload, create/update, job polling,
// app-id lookup and installation into the `create` and `update` flows.

use crate::api::{ApiClient, InstallationRequest, JobStatus};
use crate::cache::Cache;
use crate::error::ZatError;
use crate::manifest::{self, Manifest, MANIFEST_FILE};
use crate::package;
use crate::settings;
use crate::ui::{self, Prompter, Tone};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLLS: u32 = 150;

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Prebuilt package to upload instead of packaging the app directory.
    pub zipfile: Option<PathBuf>,
    /// Settings file used when installing.
    pub config: PathBuf,
    pub install: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub zipfile: Option<PathBuf>,
    /// App id given on the command line; takes precedence over the cache.
    pub app_id: Option<String>,
}

pub struct Deployer<'a> {
    api: &'a ApiClient,
    cache: &'a Cache,
    prompter: &'a dyn Prompter,
    app_dir: PathBuf,
    poll_interval: Duration,
    max_polls: u32,
}

impl<'a> Deployer<'a> {
    pub fn new(
        api: &'a ApiClient,
        cache: &'a Cache,
        prompter: &'a dyn Prompter,
        app_dir: &Path,
    ) -> Self {
        Self {
            api,
            cache,
            prompter,
            app_dir: app_dir.to_path_buf(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Upload `zipfile`, or validate and package the app directory first.
    pub fn upload(&self, zipfile: Option<&Path>) -> Result<u64> {
        let path = match zipfile {
            Some(path) => path.to_path_buf(),
            None => {
                let problems = manifest::validate(&self.app_dir);
                if !problems.is_empty() {
                    anyhow::bail!(ZatError::Invalid(problems));
                }
                package::package(&self.app_dir)?
            }
        };
        ui::say_status("Upload", &format!("Uploading {}", path.display()), Tone::Info);
        let upload_id = self.api.upload_package(&path)?;
        log::debug!("upload id {}", upload_id);
        Ok(upload_id)
    }

    /// Create a new app, optionally installing it. Returns the app id.
    pub fn create(&self, options: &CreateOptions) -> Result<u64> {
        let manifest = self.load_manifest()?;
        let name = match (&options.zipfile, manifest.as_ref().and_then(|m| m.name.clone())) {
            (None, Some(name)) => name,
            _ => self.prompter.input("Enter app name:", None)?,
        };

        let upload_id = self.upload(options.zipfile.as_deref())?;
        let job_id = self.api.create_app(&name, upload_id)?;
        let status = self.wait_for_job(&job_id)?;
        let app_id = status
            .app_id
            .with_context(|| format!("Job {} finished without an app id", job_id))?;
        self.cache.save(&[("app_id", app_id.to_string().as_str())])?;
        ui::say_status("Create", "OK", Tone::Success);

        if options.install {
            self.install(app_id, &name, manifest.as_ref(), &options.config)?;
        }
        Ok(app_id)
    }

    /// Push a new version of an existing app. Returns the app id.
    pub fn update(&self, options: &UpdateOptions) -> Result<u64> {
        let app_id = match &options.app_id {
            Some(id) => id.clone(),
            None => match self.cache.fetch("app_id", None)? {
                Some(id) => id,
                None => self.find_app_id()?.to_string(),
            },
        };
        let app_id: u64 = app_id.trim().parse().map_err(|_| ZatError::AppIdNotFound)?;
        if !self.api.app_exists(app_id)? {
            anyhow::bail!(ZatError::AppIdNotFound);
        }

        let upload_id = self.upload(options.zipfile.as_deref())?;
        let job_id = self.api.update_app(app_id, upload_id)?;
        self.wait_for_job(&job_id)?;
        self.cache.save(&[("app_id", app_id.to_string().as_str())])?;
        ui::say_status("Update", "OK", Tone::Success);
        Ok(app_id)
    }

    /// Ask for the app's name and look its id up in the account's app list.
    pub fn find_app_id(&self) -> Result<u64> {
        ui::say_status("Update", "app ID is missing, searching...", Tone::Info);
        let name = self.prompter.input("Enter the name of the app:", None)?;
        let apps = self.api.list_apps().unwrap_or_else(|e| {
            log::debug!("app list unavailable: {:#}", e);
            Vec::new()
        });
        apps.iter()
            .find(|app| app.name == name)
            .map(|app| app.id)
            .ok_or_else(|| ZatError::AppNotFound.into())
    }

    /// Poll a job until it completes or fails.
    pub fn wait_for_job(&self, job_id: &str) -> Result<JobStatus> {
        let spinner = ui::spinner("Waiting for the platform to process the app...")?;
        let result = self.poll(job_id, &spinner);
        spinner.finish_and_clear();
        result
    }

    fn poll(&self, job_id: &str, spinner: &ProgressBar) -> Result<JobStatus> {
        for attempt in 1..=self.max_polls {
            let status = self.api.job_status(job_id)?;
            log::debug!("job {} is {} (poll {})", job_id, status.status, attempt);
            if status.is_completed() {
                return Ok(status);
            }
            if status.is_failed() {
                let message = status
                    .message
                    .unwrap_or_else(|| format!("Job {} {}", job_id, status.status));
                anyhow::bail!(ZatError::JobFailed(message));
            }
            spinner.set_message(format!("Status: {}", status.status));
            if attempt < self.max_polls {
                std::thread::sleep(self.poll_interval);
            }
        }
        anyhow::bail!(ZatError::JobTimeout(job_id.to_string()))
    }

    fn install(
        &self,
        app_id: u64,
        name: &str,
        manifest: Option<&Manifest>,
        config: &Path,
    ) -> Result<()> {
        let parameters = manifest.map(|m| m.parameters.as_slice()).unwrap_or_default();
        let mut settings = settings::resolve(parameters, &self.config_path(config), self.prompter)?;
        settings.insert("name".to_string(), Value::String(name.to_string()));

        let products = manifest
            .map(Manifest::product_names)
            .unwrap_or_else(|| vec!["support".to_string()]);
        let request = InstallationRequest { app_id, settings };
        for product in products {
            self.api.install_app(&product, &request)?;
            ui::say_status("Install", &format!("Installed {} in {}", name, product), Tone::Success);
        }
        Ok(())
    }

    fn load_manifest(&self) -> Result<Option<Manifest>> {
        if self.app_dir.join(MANIFEST_FILE).is_file() {
            Manifest::load(&self.app_dir).map(Some)
        } else {
            Ok(None)
        }
    }

    fn config_path(&self, config: &Path) -> PathBuf {
        if config.is_absolute() {
            config.to_path_buf()
        } else {
            self.app_dir.join(config)
        }
    }
}
