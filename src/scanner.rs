use anyhow::{bail, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Finds the Rust sources that may define route handlers.
///
/// Build output (`target`) and hidden directories are never entered. Entries that cannot be
/// read are reported as warnings and skipped.
pub struct SourceScanner {
    root: PathBuf,
}

/// Sources found under a project root.
#[derive(Debug, Default)]
pub struct SourceSet {
    /// `.rs` files, sorted by path
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl SourceScanner {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory.
    pub fn scan(&self) -> Result<SourceSet> {
        if !self.root.is_dir() {
            bail!("Source root is not a directory: {}", self.root.display());
        }

        let mut set = SourceSet::default();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file()
                        && path.extension().and_then(|ext| ext.to_str()) == Some("rs")
                    {
                        set.files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    set.warnings.push(warning);
                }
            }
        }

        debug!("Found {} source files under {}", set.files.len(), self.root.display());
        Ok(set)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || name == "target")
}
