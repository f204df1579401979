//! Routes handed to the assembler, and where they come from.

use crate::model::{MetadataPatch, ParameterMap, Response, ResponseField};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// A candidate route discovered in the host application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Route {
    /// HTTP methods, e.g. `["GET", "HEAD"]`
    pub methods: Vec<String>,
    /// URI template, e.g. `users/{id}`
    pub uri: String,
    /// Optional route name, matched by `only`/`except` patterns
    pub name: Option<String>,
    /// Handler reference, e.g. `handlers::users::show` or `UserController::show`
    pub handler: Option<String>,
    /// Explicitly excluded from documentation
    pub hidden: bool,
    /// Static per-route section data
    pub settings: RouteSettings,
}

/// Section data configured statically for a single route.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteSettings {
    pub metadata: Option<MetadataPatch>,
    pub headers: Option<IndexMap<String, String>>,
    pub url_parameters: Option<ParameterMap>,
    pub query_parameters: Option<ParameterMap>,
    pub body_parameters: Option<ParameterMap>,
    pub responses: Option<Vec<Response>>,
    pub response_fields: Option<IndexMap<String, ResponseField>>,
}

impl Route {
    pub fn new(methods: &[&str], uri: &str, handler: &str) -> Self {
        Self {
            methods: methods.iter().map(|m| m.to_string()).collect(),
            uri: uri.to_string(),
            handler: Some(handler.to_string()),
            ..Default::default()
        }
    }

    /// Human readable form used in log lines, e.g. `[GET] users/{id}`.
    pub fn representation(&self) -> String {
        format!("[{}] {}", self.methods.join(","), self.uri)
    }

    /// The URI without its leading slash.
    pub fn path_without_slash(&self) -> &str {
        self.uri.trim_start_matches('/')
    }
}

/// Yields the candidate routes of an application.
pub trait RouteSource {
    fn routes(&self) -> Result<Vec<Route>>;
}

/// Resolves handler references to something adapters can introspect.
pub trait HandlerResolver: Send + Sync {
    /// Whether the handler exists.
    fn resolves(&self, handler: &str) -> bool;

    /// Whether the handler is explicitly excluded from documentation.
    fn is_hidden(&self, handler: &str) -> bool;
}

/// Reads routes from a YAML manifest:
///
/// ```yaml
/// routes:
///   - methods: [GET]
///     uri: users/{id}
///     handler: handlers::show_user
/// ```
pub struct ManifestRouteSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RouteManifest {
    #[serde(default)]
    routes: Vec<Route>,
}

impl ManifestRouteSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parse manifest text.
    pub fn parse(content: &str) -> Result<Vec<Route>> {
        let manifest: RouteManifest =
            serde_yaml::from_str(content).context("Failed to parse route manifest")?;
        Ok(manifest
            .routes
            .into_iter()
            .map(|mut route| {
                route.methods = route.methods.iter().map(|m| m.to_uppercase()).collect();
                route
            })
            .collect())
    }
}

impl RouteSource for ManifestRouteSource {
    fn routes(&self) -> Result<Vec<Route>> {
        debug!("Reading route manifest: {}", self.path.display());
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read route manifest: {}", self.path.display()))?;
        let routes = Self::parse(&content)
            .with_context(|| format!("Invalid route manifest: {}", self.path.display()))?;
        debug!("Loaded {} routes from manifest", routes.len());
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_manifest() {
        let content = r#"
routes:
  - methods: [get, head]
    uri: users/{id}
    name: users.show
    handler: handlers::show_user
  - methods: [POST]
    uri: /users
    handler: handlers::create_user
    hidden: true
    settings:
      metadata:
        group_name: Users
      headers:
        X-Tenant: acme
"#;
        let routes = ManifestRouteSource::parse(content).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].methods, vec!["GET", "HEAD"]);
        assert_eq!(routes[0].name.as_deref(), Some("users.show"));
        assert!(!routes[0].hidden);
        assert!(routes[1].hidden);
        assert_eq!(routes[1].path_without_slash(), "users");
        let metadata = routes[1].settings.metadata.as_ref().unwrap();
        assert_eq!(metadata.group_name.as_deref(), Some("Users"));
        assert_eq!(routes[1].settings.headers.as_ref().unwrap()["X-Tenant"], "acme");
    }

    #[test]
    fn test_parse_manifest_rejects_unknown_settings() {
        let content = r#"
routes:
  - methods: [GET]
    uri: users
    settings:
      bogus: 1
"#;
        assert!(ManifestRouteSource::parse(content).is_err());
    }

    #[test]
    fn test_route_representation() {
        let route = Route::new(&["GET", "HEAD"], "users/{id}", "show");
        assert_eq!(route.representation(), "[GET,HEAD] users/{id}");
    }

    #[test]
    fn test_read_manifest_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("routes.yaml");
        std::fs::write(&path, "routes:\n  - methods: [GET]\n    uri: ping\n").unwrap();

        let routes = ManifestRouteSource::new(path).routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].uri, "ping");
        assert!(routes[0].handler.is_none());
    }

    #[test]
    fn test_missing_manifest_file() {
        let source = ManifestRouteSource::new(PathBuf::from("/nonexistent/routes.yaml"));
        let err = source.routes().unwrap_err();
        assert!(err.to_string().contains("Failed to read route manifest"));
    }
}
