//! Run configuration, loaded from YAML, and the context threaded through a run.

use crate::model::Stage;
use crate::ordering::OrderSpec;
use crate::route::HandlerResolver;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "routedoc.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Documentation title, passed through to renderers
    pub title: String,
    /// Group for endpoints whose metadata names none
    pub default_group: String,
    /// Directory holding the latest and cache snapshot trees
    pub output_dir: PathBuf,
    /// Restore hand-edited sections from the previous run
    pub preserve_user_changes: bool,
    pub auth: AuthConfig,
    /// Adapters to run for each stage, in order
    pub strategies: IndexMap<Stage, Vec<StrategyEntry>>,
    pub groups: GroupsConfig,
}

/// How authenticated endpoints advertise their credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Whether endpoints are authenticated unless their metadata says otherwise
    pub default: bool,
    #[serde(rename = "in")]
    pub location: AuthLocation,
    /// Header, query or body parameter name
    pub name: String,
    pub placeholder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLocation {
    Bearer,
    Basic,
    Header,
    Query,
    Body,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupsConfig {
    /// Partial, possibly nested order of groups, subgroups and endpoints
    pub order: OrderSpec,
}

/// One configured strategy, as written in the config file.
///
/// ```yaml
/// headers:
///   - doc_comments
///   - adapter: route_settings
///     except: ["GET health*"]
///   - overrides:
///       Accept: application/json
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StrategyEntry {
    Named(String),
    Detailed(StrategyDescriptor),
}

/// The long form of a [`StrategyEntry`]. A misspelled key is rejected rather than dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyDescriptor {
    pub adapter: Option<String>,
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub overrides: Option<serde_yaml::Value>,
}

impl StrategyEntry {
    fn named(adapter: &str) -> Self {
        StrategyEntry::Named(adapter.to_string())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default: false,
            location: AuthLocation::Bearer,
            name: "Authorization".to_string(),
            placeholder: "{YOUR_AUTH_KEY}".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "API Documentation".to_string(),
            default_group: "Endpoints".to_string(),
            output_dir: PathBuf::from(".routedoc"),
            preserve_user_changes: true,
            auth: AuthConfig::default(),
            strategies: default_strategies(),
            groups: GroupsConfig::default(),
        }
    }
}

fn default_strategies() -> IndexMap<Stage, Vec<StrategyEntry>> {
    let mut json_headers = serde_yaml::Mapping::new();
    json_headers.insert("Content-Type".into(), "application/json".into());
    json_headers.insert("Accept".into(), "application/json".into());

    let mut strategies = IndexMap::new();
    strategies.insert(
        Stage::Metadata,
        vec![StrategyEntry::named("doc_comments"), StrategyEntry::named("route_settings")],
    );
    strategies.insert(
        Stage::UrlParameters,
        vec![
            StrategyEntry::named("uri_parameters"),
            StrategyEntry::named("doc_comments"),
            StrategyEntry::named("route_settings"),
        ],
    );
    strategies.insert(
        Stage::QueryParameters,
        vec![StrategyEntry::named("doc_comments"), StrategyEntry::named("route_settings")],
    );
    strategies.insert(
        Stage::Headers,
        vec![
            StrategyEntry::named("doc_comments"),
            StrategyEntry::named("route_settings"),
            StrategyEntry::Detailed(StrategyDescriptor {
                overrides: Some(serde_yaml::Value::Mapping(json_headers)),
                ..Default::default()
            }),
        ],
    );
    strategies.insert(
        Stage::BodyParameters,
        vec![StrategyEntry::named("doc_comments"), StrategyEntry::named("route_settings")],
    );
    strategies.insert(
        Stage::Responses,
        vec![StrategyEntry::named("doc_comments"), StrategyEntry::named("route_settings")],
    );
    strategies.insert(
        Stage::ResponseFields,
        vec![StrategyEntry::named("doc_comments"), StrategyEntry::named("route_settings")],
    );
    strategies
}

impl Config {
    /// Parse config text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_FILE`] is used when present,
    /// otherwise the built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !candidate.exists() {
                    info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                candidate
            }
        };

        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

/// Everything a run needs besides the routes themselves.
#[derive(Clone)]
pub struct RunContext {
    pub config: Config,
    /// Present when handler source is available for inspection
    pub resolver: Option<Arc<dyn HandlerResolver>>,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HandlerResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Directory of the editable snapshot tree.
    pub fn latest_dir(&self) -> PathBuf {
        self.config.output_dir.join("endpoints")
    }

    /// Directory of the generated baseline tree.
    pub fn cache_dir(&self) -> PathBuf {
        self.config.output_dir.join("endpoints.cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_group, "Endpoints");
        assert!(config.preserve_user_changes);
        assert_eq!(config.strategies.len(), 7);
        assert!(config.groups.order.is_empty());
    }

    #[test]
    fn test_empty_config_file_uses_defaults() {
        let config = Config::from_yaml("   \n").unwrap();
        assert_eq!(config.output_dir, PathBuf::from(".routedoc"));
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
title: Shop API
default_group: General
output_dir: docs/.routedoc
auth:
  enabled: true
  in: header
  name: X-Api-Key
strategies:
  metadata:
    - doc_comments
  responses:
    - adapter: route_settings
      only: ["GET *"]
    - overrides:
        - status: 500
          content: "oops"
groups:
  order:
    - Users
    - "*"
    - Admin
"#;
        let config = Config::from_yaml(content).unwrap();
        assert_eq!(config.title, "Shop API");
        assert_eq!(config.default_group, "General");
        assert!(config.auth.enabled);
        assert_eq!(config.auth.location, AuthLocation::Header);
        assert_eq!(config.auth.name, "X-Api-Key");
        assert_eq!(config.auth.placeholder, "{YOUR_AUTH_KEY}");

        // An explicit strategies table replaces the defaults entirely.
        assert_eq!(config.strategies.len(), 2);
        let responses = &config.strategies[&Stage::Responses];
        match &responses[0] {
            StrategyEntry::Detailed(descriptor) => {
                assert_eq!(descriptor.adapter.as_deref(), Some("route_settings"));
                assert_eq!(descriptor.only, vec!["GET *".to_string()]);
            }
            other => panic!("unexpected entry: {:?}", other),
        }
        assert!(matches!(
            &responses[1],
            StrategyEntry::Detailed(StrategyDescriptor { overrides: Some(_), .. })
        ));
        assert_eq!(config.groups.order.top_level_names(), vec!["Users", "*", "Admin"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml("colour: blue\n").is_err());
    }

    #[test]
    fn test_misspelled_strategy_filter_rejected() {
        let content = r#"
strategies:
  headers:
    - adapter: route_settings
      exept: ["GET *"]
"#;
        assert!(Config::from_yaml(content).is_err());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/routedoc.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "default_group: Misc\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.default_group, "Misc");
        assert_eq!(config.strategies.len(), 7);
    }

    #[test]
    fn test_run_context_dirs() {
        let mut config = Config::default();
        config.output_dir = PathBuf::from("out");
        let ctx = RunContext::new(config);
        assert_eq!(ctx.latest_dir(), PathBuf::from("out/endpoints"));
        assert_eq!(ctx.cache_dir(), PathBuf::from("out/endpoints.cache"));
        assert!(ctx.resolver.is_none());
    }
}
