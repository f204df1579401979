//! On-disk snapshot trees.
//!
//! ```text
//! .routedoc/
//!   endpoints/          latest snapshot, editable
//!     00.yaml
//!     01.yaml
//!     custom.0.yaml     user-authored, never touched
//!   endpoints.cache/    baseline for the next run, regenerated every run
//!     00.yaml
//!     01.yaml
//! ```
//!
//! One file per group, numbered in group order. Cache files are the latest files prefixed
//! with [`CACHE_MARKER`].

use crate::config::RunContext;
use crate::model::{Endpoint, Group};
use crate::ordering::natural_cmp;
use crate::reconcile::PriorSnapshot;
use crate::serializer::{parse_group, serialize_group, write_to_file};
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name prefix reserved for user-authored endpoint files.
pub const CUSTOM_PREFIX: &str = "custom.";

/// First line of every cache file.
pub const CACHE_MARKER: &str = "## Autogenerated by routedoc. DO NOT MODIFY.";

const EXAMPLE_CUSTOM_FILE: &str = "custom.0.yaml";

const EXAMPLE_CUSTOM: &str = r#"# To include an endpoint that isn't a part of your routes, add it to this file
# (or any other file starting with "custom.") as a list of endpoints.
# Each endpoint is merged into the group with the same group_name, or starts a new group.
# This file is never overwritten.
#
# - http_methods:
#     - GET
#   uri: healthcheck
#   metadata:
#     group_name: Other
#     title: Health check
#     description: Reports whether the service is up.
#     authenticated: false
#   headers:
#     Accept: application/json
#   query_parameters:
#     verbose:
#       name: verbose
#       type: boolean
#       description: Include component details.
#       required: false
#       example: true
#   responses:
#     - status: 200
#       content: '{"status": "up"}'
"#;

/// User-authored endpoints read from one `custom.*` file.
#[derive(Debug)]
pub struct CustomFile {
    pub path: PathBuf,
    pub endpoints: Vec<Endpoint>,
}

/// Reads and replaces the latest and cache trees of one output directory.
pub struct SnapshotStore {
    latest_dir: PathBuf,
    cache_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(latest_dir: PathBuf, cache_dir: PathBuf) -> Self {
        Self {
            latest_dir,
            cache_dir,
        }
    }

    pub fn from_context(ctx: &RunContext) -> Self {
        Self::new(ctx.latest_dir(), ctx.cache_dir())
    }

    pub fn latest_dir(&self) -> &Path {
        &self.latest_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Groups of the latest tree. A missing directory yields no groups.
    pub fn read_latest(&self) -> Result<Vec<Group>> {
        read_groups(&self.latest_dir)
    }

    /// Groups of the cache tree. A missing directory yields no groups.
    pub fn read_cache(&self) -> Result<Vec<Group>> {
        read_groups(&self.cache_dir)
    }

    /// Both trees of the previous run.
    ///
    /// # Errors
    ///
    /// Fails when a snapshot file exists but cannot be read or parsed. A broken latest file
    /// would otherwise be deleted by the next [`write`](Self::write), losing the user's edits.
    pub fn read_prior(&self) -> Result<PriorSnapshot> {
        let prior = PriorSnapshot {
            cache: self.read_cache()?,
            latest: self.read_latest()?,
        };
        debug!(
            "Prior snapshot: {} cached groups, {} latest groups",
            prior.cache.len(),
            prior.latest.len()
        );
        Ok(prior)
    }

    /// Every `custom.*` file of the latest tree, in natural file name order.
    pub fn read_custom(&self) -> Result<Vec<CustomFile>> {
        let mut files = Vec::new();
        for path in list_yaml_files(&self.latest_dir)? {
            if !is_custom(&path) {
                continue;
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let mut endpoints: Vec<Endpoint> = if is_blank_yaml(&content) {
                Vec::new()
            } else {
                serde_yaml::from_str(&content).with_context(|| {
                    format!("Failed to parse custom endpoints in {}", path.display())
                })?
            };
            for endpoint in &mut endpoints {
                endpoint.refresh_clean_parameters();
            }
            debug!("{} custom endpoints in {}", endpoints.len(), path.display());
            files.push(CustomFile { path, endpoints });
        }
        Ok(files)
    }

    /// Replace both trees with `groups`.
    ///
    /// Every generated file of the latest tree is removed first; `custom.*` files stay. The
    /// cache tree is recreated from scratch.
    pub fn write(&self, groups: &[Group]) -> Result<()> {
        let rendered = groups
            .iter()
            .map(serialize_group)
            .collect::<Result<Vec<String>>>()?;

        fs::create_dir_all(&self.latest_dir).with_context(|| {
            format!("Failed to create directory: {}", self.latest_dir.display())
        })?;
        for path in list_files(&self.latest_dir)? {
            if !is_custom(&path) {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove file: {}", path.display()))?;
            }
        }
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).with_context(|| {
                format!("Failed to remove directory: {}", self.cache_dir.display())
            })?;
        }

        for (index, content) in rendered.iter().enumerate() {
            let file_name = format!("{:02}.yaml", index);
            write_to_file(content, &self.latest_dir.join(&file_name))?;
            write_to_file(
                &format!("{}\n{}", CACHE_MARKER, content),
                &self.cache_dir.join(&file_name),
            )?;
        }

        info!(
            "Wrote {} group files to {}",
            rendered.len(),
            self.latest_dir.display()
        );
        Ok(())
    }

    /// Write the commented example custom file unless the user has custom files already.
    ///
    /// Returns whether the file was written.
    pub fn write_example_custom(&self) -> Result<bool> {
        if list_files(&self.latest_dir)?.iter().any(|path| is_custom(path)) {
            return Ok(false);
        }
        write_to_file(EXAMPLE_CUSTOM, &self.latest_dir.join(EXAMPLE_CUSTOM_FILE))?;
        Ok(true)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Only comments and whitespace.
fn is_blank_yaml(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

fn is_custom(path: &Path) -> bool {
    file_name(path).starts_with(CUSTOM_PREFIX)
}

/// Regular files directly inside `dir`, in natural name order. Missing directories are empty.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| {
            natural_cmp(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
        });
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to list directory: {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn list_yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_files(dir)?
        .into_iter()
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("yaml"))
        .collect())
}

fn read_groups(dir: &Path) -> Result<Vec<Group>> {
    let mut groups = Vec::new();
    for path in list_yaml_files(dir)? {
        if is_custom(&path) {
            continue;
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let group = parse_group(&content)
            .with_context(|| format!("Invalid snapshot file: {}", path.display()))?;
        groups.push(group);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn group(name: &str, uris: &[&str]) -> Group {
        Group {
            name: name.to_string(),
            description: String::new(),
            endpoints: uris
                .iter()
                .map(|uri| {
                    let mut endpoint = Endpoint {
                        http_methods: vec!["GET".to_string()],
                        uri: uri.to_string(),
                        ..Default::default()
                    };
                    endpoint.metadata.group_name = name.to_string();
                    endpoint
                })
                .collect(),
        }
    }

    fn store(temp_dir: &TempDir) -> SnapshotStore {
        SnapshotStore::new(
            temp_dir.path().join("endpoints"),
            temp_dir.path().join("endpoints.cache"),
        )
    }

    #[test]
    fn test_missing_directories_are_an_empty_baseline() {
        let temp_dir = TempDir::new().unwrap();
        let prior = store(&temp_dir).read_prior().unwrap();
        assert!(prior.is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let groups = vec![group("Admin", &["admin"]), group("Users", &["users", "users/{id}"])];
        store.write(&groups).unwrap();

        assert!(store.latest_dir().join("00.yaml").exists());
        assert!(store.latest_dir().join("01.yaml").exists());
        assert_eq!(store.read_latest().unwrap(), groups);
        assert_eq!(store.read_cache().unwrap(), groups);

        let latest = fs::read_to_string(store.latest_dir().join("01.yaml")).unwrap();
        let cache = fs::read_to_string(store.cache_dir().join("01.yaml")).unwrap();
        assert_eq!(cache, format!("{}\n{}", CACHE_MARKER, latest));
    }

    #[test]
    fn test_rewrite_removes_stale_files_but_keeps_custom() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .write(&[group("A", &["a"]), group("B", &["b"]), group("C", &["c"])])
            .unwrap();
        fs::write(store.latest_dir().join("custom.extra.yaml"), "[]").unwrap();
        fs::write(store.cache_dir().join("stray.txt"), "x").unwrap();

        store.write(&[group("A", &["a"])]).unwrap();

        let names: Vec<String> = list_files(store.latest_dir())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["00.yaml", "custom.extra.yaml"]);
        assert_eq!(list_files(store.cache_dir()).unwrap().len(), 1);
    }

    #[test]
    fn test_files_read_in_natural_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let groups: Vec<Group> = (0..12).map(|i| group(&format!("G{}", i), &["x"])).collect();
        store.write(&groups).unwrap();
        fs::rename(
            store.latest_dir().join("10.yaml"),
            store.latest_dir().join("100.yaml"),
        )
        .unwrap();

        let names: Vec<String> = store.read_latest().unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names.last().map(String::as_str), Some("G10"));
        assert_eq!(names[10], "G11");
    }

    #[test]
    fn test_broken_latest_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.write(&[group("A", &["a"])]).unwrap();
        fs::write(store.latest_dir().join("00.yaml"), "name: [broken").unwrap();

        let err = store.read_prior().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid snapshot file"));
    }

    #[test]
    fn test_custom_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.write(&[]).unwrap();

        assert!(store.write_example_custom().unwrap());
        assert!(!store.write_example_custom().unwrap());

        fs::write(
            store.latest_dir().join("custom.1.yaml"),
            "- http_methods: [GET]\n  uri: healthcheck\n  metadata:\n    group_name: Other\n",
        )
        .unwrap();

        let custom = store.read_custom().unwrap();
        assert_eq!(custom.len(), 2);
        assert!(custom[0].endpoints.is_empty());
        assert_eq!(custom[1].endpoints[0].uri, "healthcheck");
        assert_eq!(custom[1].endpoints[0].metadata.group_name, "Other");

        // Custom files never show up as groups.
        assert!(store.read_latest().unwrap().is_empty());
    }
}
