//! Serialization of groups, both for the snapshot trees and for the ordered output handed to
//! renderers.
//!
//! Snapshot files hold a single [`Group`] as YAML. Multi-line strings come out as block
//! literals and every map keeps its insertion order, so an unchanged group always serializes
//! to the same bytes.

use crate::model::{CleanParameters, Endpoint, Group};
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serializes one group as a snapshot file body.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_group(group: &Group) -> Result<String> {
    serde_yaml::to_string(group)
        .with_context(|| format!("Failed to serialize group `{}` to YAML", group.name))
}

/// Parses a snapshot file body.
pub fn parse_group(content: &str) -> Result<Group> {
    serde_yaml::from_str(content).context("Failed to parse group YAML")
}

/// The ordered documentation, as consumed by renderers.
#[derive(Debug, Serialize)]
pub struct DocumentView<'a> {
    pub title: &'a str,
    pub groups: Vec<GroupView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct GroupView<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub endpoints: Vec<EndpointView<'a>>,
}

/// An endpoint together with its derived fields.
#[derive(Debug, Serialize)]
pub struct EndpointView<'a> {
    pub endpoint_id: String,
    #[serde(flatten)]
    pub endpoint: &'a Endpoint,
    pub clean_url_parameters: &'a CleanParameters,
    pub clean_query_parameters: &'a CleanParameters,
    pub clean_body_parameters: &'a CleanParameters,
}

impl<'a> DocumentView<'a> {
    pub fn new(title: &'a str, groups: &'a [Group]) -> Self {
        Self {
            title,
            groups: groups
                .iter()
                .map(|group| GroupView {
                    name: &group.name,
                    description: &group.description,
                    endpoints: group.endpoints.iter().map(EndpointView::new).collect(),
                })
                .collect(),
        }
    }
}

impl<'a> EndpointView<'a> {
    pub fn new(endpoint: &'a Endpoint) -> Self {
        Self {
            endpoint_id: endpoint.endpoint_id(),
            endpoint,
            clean_url_parameters: &endpoint.clean_url_parameters,
            clean_query_parameters: &endpoint.clean_query_parameters,
            clean_body_parameters: &endpoint.clean_body_parameters,
        }
    }
}

/// Serializes a value to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(value).context("Failed to serialize document to YAML")
}

/// Serializes a value to pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(value).context("Failed to serialize document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file and any missing parent directories, or overwrites the file if it exists.
///
/// # Errors
///
/// Returns an error if a directory or the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
