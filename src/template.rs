// `new`: writes a fresh app skeleton (manifest, iframe page, translations),
// or unpacks the scaffold project and writes only the manifest over it.

use crate::connection::EMAIL_PATTERN;
use crate::manifest::MANIFEST_FILE;
use crate::ui::Prompter;
use anyhow::{Context, Result};
use serde_json::json;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const DEFAULT_IFRAME_URI: &str = "assets/iframe.html";
pub const DEFAULT_SCAFFOLD_URL: &str = "https://github.com/zendesk/app_scaffold/archive/master.zip";
const IFRAME_TEMPLATE: &str = include_str!("../templates/iframe.html");

#[derive(Debug, Clone)]
pub struct NewApp {
    pub author_name: String,
    pub author_email: String,
    pub author_url: Option<String>,
    pub app_name: String,
    pub iframe_uri: String,
    pub dir: PathBuf,
}

fn ask_required(prompter: &dyn Prompter, prompt: &str, default: Option<&str>) -> Result<String> {
    loop {
        let answer = prompter.input(prompt, default)?.trim().to_string();
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

/// Collect the details of the new app.
pub fn ask(prompter: &dyn Prompter) -> Result<NewApp> {
    let author_name = ask_required(prompter, "Enter this app author's name:", None)?;
    let author_email = loop {
        let email = ask_required(prompter, "Enter this app author's email:", None)?;
        if EMAIL_PATTERN.is_match(&email) && !email.ends_with("/token") {
            break email;
        }
    };
    let author_url = prompter
        .input("Enter this app author's url:", Some(""))?
        .trim()
        .to_string();
    let app_name = ask_required(prompter, "Enter a name for this new app:", None)?;
    let iframe_uri = ask_required(
        prompter,
        "Enter your iFrame URI or leave it blank to use a default local template page:",
        Some(DEFAULT_IFRAME_URI),
    )?;
    let dir = ask_required(
        prompter,
        "Enter a directory name to save the new app (will create the dir if it does not exist):",
        Some(app_name.as_str()),
    )?;

    Ok(NewApp {
        author_name,
        author_email,
        author_url: (!author_url.is_empty()).then_some(author_url),
        app_name,
        iframe_uri,
        dir: PathBuf::from(dir),
    })
}

fn ensure_empty(root: &Path) -> Result<()> {
    if root.is_dir()
        && std::fs::read_dir(root)
            .with_context(|| format!("Failed to read {}", root.display()))?
            .next()
            .is_some()
    {
        anyhow::bail!("{} already exists and is not empty", root.display());
    }
    Ok(())
}

fn manifest_json(app: &NewApp) -> Result<String> {
    let manifest = json!({
        "name": app.app_name,
        "author": {
            "name": app.author_name,
            "email": app.author_email,
            "url": app.author_url,
        },
        "defaultLocale": "en",
        "private": true,
        "location": {
            "support": {
                "ticket_sidebar": { "url": app.iframe_uri, "flexible": true }
            }
        },
        "version": "1.0",
        "frameworkVersion": "2.0",
        "parameters": [],
    });
    Ok(serde_json::to_string_pretty(&manifest)?)
}

/// Write the skeleton under `base` and return the app directory.
pub fn write(app: &NewApp, base: &Path) -> Result<PathBuf> {
    let root = base.join(&app.dir);
    ensure_empty(&root)?;

    let translations = json!({
        "app": {
            "name": app.app_name,
            "short_description": "A short description of what the app does.",
            "long_description": "A longer description shown on the app's details page.",
            "installation_instructions": "Click install."
        }
    });

    write_file(&root.join(MANIFEST_FILE), &manifest_json(app)?)?;
    write_file(
        &root.join("translations").join("en.json"),
        &serde_json::to_string_pretty(&translations)?,
    )?;
    if app.iframe_uri == DEFAULT_IFRAME_URI {
        write_file(
            &root.join(DEFAULT_IFRAME_URI),
            &IFRAME_TEMPLATE.replace("{{APP_NAME}}", &app.app_name),
        )?;
    } else {
        std::fs::create_dir_all(root.join("assets"))
            .with_context(|| format!("Failed to create {}", root.join("assets").display()))?;
    }
    Ok(root)
}

/// Download the scaffold archive from `url`, unpack it under `base` and
/// replace its manifest with one built from `app`.
pub fn write_scaffold(app: &NewApp, base: &Path, url: &str) -> Result<PathBuf> {
    let root = base.join(&app.dir);
    ensure_empty(&root)?;

    let archive = download(url)?;
    let extracted = extract(&archive, &root)?;
    log::debug!("extracted {} scaffold files into {}", extracted, root.display());
    write_file(&root.join(MANIFEST_FILE), &manifest_json(app)?)?;
    Ok(root)
}

fn download(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("zat/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;
    log::debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to download scaffold from {}", url))?;
    if !response.status().is_success() {
        anyhow::bail!("Scaffold download from {} answered {}", url, response.status());
    }
    let bytes = response.bytes().context("Failed to read scaffold archive")?;
    Ok(bytes.to_vec())
}

/// Unpack every file in `archive` under `root`, dropping the archive's
/// top-level directory. Returns the number of files written.
fn extract(archive: &[u8], root: &Path) -> Result<usize> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .context("Scaffold download is not a zip archive")?;
    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .with_context(|| format!("Failed to read scaffold entry {}", index))?;
        let Some(name) = entry.enclosed_name() else {
            log::warn!("skipping scaffold entry with unsafe path {}", entry.name());
            continue;
        };
        let relative: PathBuf = name.components().skip(1).collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = root.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut out = std::fs::File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        written += 1;
    }
    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
