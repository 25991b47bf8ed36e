// Packager: zips an app directory into an upload-ready archive under
// `<app dir>/tmp/`.

use anyhow::{Context, Result};
use glob::Pattern;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

pub const TMP_DIR: &str = "tmp";
pub const IGNORE_FILE: &str = ".zatignore";

/// Read `.zatignore` glob patterns (blank lines and `#` comments skipped).
fn ignore_patterns(app_dir: &Path) -> Result<Vec<Pattern>> {
    let path = app_dir.join(IGNORE_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            Pattern::new(line.trim_end_matches('/'))
                .with_context(|| format!("Invalid pattern in {}: {}", IGNORE_FILE, line))
        })
        .collect()
}

fn relative_name(app_dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(app_dir).ok()?;
    let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    Some(parts.join("/"))
}

fn is_shipped(app_dir: &Path, entry: &DirEntry, ignored: &[Pattern]) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let hidden = entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'));
    if hidden {
        return false;
    }
    let Some(rel) = relative_name(app_dir, entry.path()) else {
        return false;
    };
    if entry.depth() == 1 && rel == TMP_DIR {
        return false;
    }
    !ignored.iter().any(|pattern| pattern.matches(&rel))
}

/// Files that go into the package, as sorted `/`-separated relative paths.
pub fn package_files(app_dir: &Path) -> Result<Vec<String>> {
    let ignored = ignore_patterns(app_dir)?;
    let mut files = Vec::new();
    let walker = WalkDir::new(app_dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| is_shipped(app_dir, entry, &ignored));
    for entry in walker {
        let entry = entry.context("Failed to walk app directory")?;
        if entry.file_type().is_file() {
            if let Some(rel) = relative_name(app_dir, entry.path()) {
                files.push(rel);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Zip the app into `tmp/app-<timestamp>.zip` and return the archive path.
pub fn package(app_dir: &Path) -> Result<PathBuf> {
    let tmp = app_dir.join(TMP_DIR);
    std::fs::create_dir_all(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let dest = tmp.join(format!("app-{}.zip", stamp));

    let files = package_files(app_dir)?;
    let out = File::create(&dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut zip = zip::ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for rel in &files {
        log::debug!("adding {}", rel);
        zip.start_file(rel.clone(), options)
            .with_context(|| format!("Failed to add {} to package", rel))?;
        let mut source = File::open(app_dir.join(rel))
            .with_context(|| format!("Failed to open {}", rel))?;
        std::io::copy(&mut source, &mut zip)
            .with_context(|| format!("Failed to write {} to package", rel))?;
    }
    zip.finish().context("Failed to finish package")?;

    log::info!("packaged {} file(s) into {}", files.len(), dest.display());
    Ok(dest)
}

/// Delete packages left in `tmp/`. Returns how many were removed.
pub fn clean(app_dir: &Path) -> Result<usize> {
    let tmp = app_dir.join(TMP_DIR);
    if !tmp.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(&tmp).with_context(|| format!("Failed to read {}", tmp.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "zip") {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::testing::write_app;
    use tempfile::TempDir;

    #[test]
    fn skips_hidden_tmp_and_ignored_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write_app(root);
        std::fs::write(root.join(".zat"), "{}").unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::create_dir_all(root.join("tmp")).unwrap();
        std::fs::write(root.join("tmp/old.zip"), "zip").unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/app.ts"), "code").unwrap();
        std::fs::write(root.join("notes.md"), "todo").unwrap();
        std::fs::write(root.join(".zatignore"), "# dev only\nsrc\n*.md\n").unwrap();

        let files = package_files(root).unwrap();
        assert_eq!(
            files,
            vec!["assets/iframe.html", "manifest.json", "translations/en.json"]
        );
    }

    #[test]
    fn package_writes_zip_with_app_files() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path());

        let zip_path = package(dir.path()).unwrap();
        assert!(zip_path.starts_with(dir.path().join("tmp")));
        let name = zip_path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("app-") && name.ends_with(".zip"));

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["assets/iframe.html", "manifest.json", "translations/en.json"]);
        let manifest = archive.by_name("manifest.json").unwrap();
        assert!(manifest.size() > 0);
    }

    #[test]
    fn repackaging_does_not_include_previous_packages() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path());
        package(dir.path()).unwrap();
        assert!(!package_files(dir.path()).unwrap().iter().any(|f| f.starts_with("tmp/")));
    }

    #[test]
    fn clean_removes_only_zips() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("tmp");
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("app-1.zip"), "a").unwrap();
        std::fs::write(tmp.join("app-2.zip"), "b").unwrap();
        std::fs::write(tmp.join("keep.txt"), "c").unwrap();

        assert_eq!(clean(dir.path()).unwrap(), 2);
        assert!(tmp.join("keep.txt").exists());
        assert_eq!(clean(TempDir::new().unwrap().path()).unwrap(), 0);
    }
}
