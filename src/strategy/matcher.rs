//! `only` / `except` route filters.
//!
//! Patterns use `*` as the only wildcard; it matches any run of characters, slashes included.
//! A route matches when any pattern matches its name, its path (with or without the leading
//! slash), or `"METHOD path"` for any of its methods.

use crate::error::{ConfigError, ConfigResult};
use crate::model::Stage;
use crate::route::Route;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled set of route patterns.
#[derive(Debug, Clone)]
pub struct RoutePatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl RoutePatterns {
    pub fn new(patterns: &[String]) -> ConfigResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(&escape_pattern(pattern)).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| ConfigError::InvalidPattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, route: &Route) -> bool {
        candidates(route).iter().any(|candidate| self.set.is_match(candidate))
    }
}

/// Escape every glob metacharacter except `*`, collapsing runs of `*`.
fn escape_pattern(pattern: &str) -> String {
    let mut collapsed = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
        .split('*')
        .map(globset::escape)
        .collect::<Vec<_>>()
        .join("*")
}

fn candidates(route: &Route) -> Vec<String> {
    let without_slash = route.path_without_slash();
    let with_slash = format!("/{}", without_slash);

    let mut candidates = Vec::with_capacity(3 + route.methods.len() * 2);
    if let Some(name) = &route.name {
        candidates.push(name.clone());
    }
    candidates.push(without_slash.to_string());
    candidates.push(with_slash.clone());
    for method in &route.methods {
        candidates.push(format!("{} {}", method, without_slash));
        candidates.push(format!("{} {}", method, with_slash));
    }
    candidates
}

/// Which routes a strategy applies to.
#[derive(Debug, Clone)]
pub enum RouteFilter {
    All,
    Only(RoutePatterns),
    Except(RoutePatterns),
}

impl RouteFilter {
    /// Build the filter for one strategy; `only` and `except` are mutually exclusive.
    pub fn new(
        stage: Stage,
        adapter: &str,
        only: &[String],
        except: &[String],
    ) -> ConfigResult<Self> {
        match (only.is_empty(), except.is_empty()) {
            (false, false) => Err(ConfigError::ConflictingFilters {
                stage,
                adapter: adapter.to_string(),
            }),
            (false, true) => RoutePatterns::new(only).map(RouteFilter::Only),
            (true, false) => RoutePatterns::new(except).map(RouteFilter::Except),
            (true, true) => Ok(RouteFilter::All),
        }
    }

    pub fn allows(&self, route: &Route) -> bool {
        match self {
            RouteFilter::All => true,
            RouteFilter::Only(patterns) => patterns.matches(route),
            RouteFilter::Except(patterns) => !patterns.matches(route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> RoutePatterns {
        let owned: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        RoutePatterns::new(&owned).unwrap()
    }

    fn route(methods: &[&str], uri: &str, name: Option<&str>) -> Route {
        let mut route = Route::new(methods, uri, "handler");
        route.name = name.map(str::to_string);
        route
    }

    #[test]
    fn test_method_and_path_patterns() {
        let get_any = patterns(&["GET *"]);
        assert!(get_any.matches(&route(&["GET"], "users/{id}", None)));
        assert!(!get_any.matches(&route(&["POST"], "users", None)));
        assert!(get_any.matches(&route(&["POST", "GET"], "users", None)));
    }

    #[test]
    fn test_leading_slash_is_optional() {
        let p = patterns(&["/users/*"]);
        assert!(p.matches(&route(&["GET"], "users/{id}", None)));
        let p = patterns(&["users/*"]);
        assert!(p.matches(&route(&["GET"], "/users/{id}", None)));
    }

    #[test]
    fn test_braces_are_literal() {
        let p = patterns(&["GET /users/{id}"]);
        assert!(p.matches(&route(&["GET"], "users/{id}", None)));
        assert!(!p.matches(&route(&["GET"], "users/id", None)));
    }

    #[test]
    fn test_star_spans_slashes_and_repeats() {
        let p = patterns(&["api/**/export"]);
        assert!(p.matches(&route(&["GET"], "api/v1/reports/export", None)));
    }

    #[test]
    fn test_route_name_pattern() {
        let p = patterns(&["admin.*"]);
        assert!(p.matches(&route(&["GET"], "dashboard", Some("admin.dashboard"))));
        assert!(!p.matches(&route(&["GET"], "dashboard", Some("public.dashboard"))));
    }

    #[test]
    fn test_filter_conflict() {
        let only = vec!["GET *".to_string()];
        let except = vec!["POST *".to_string()];
        let err = RouteFilter::new(Stage::Responses, "calls", &only, &except).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFilters { stage: Stage::Responses, .. }));
    }

    #[test]
    fn test_filter_allows() {
        let only = vec!["GET *".to_string()];
        let filter = RouteFilter::new(Stage::Headers, "a", &only, &[]).unwrap();
        assert!(filter.allows(&route(&["GET"], "users", None)));
        assert!(!filter.allows(&route(&["DELETE"], "users", None)));

        let filter = RouteFilter::new(Stage::Headers, "a", &[], &only).unwrap();
        assert!(!filter.allows(&route(&["GET"], "users", None)));
        assert!(filter.allows(&route(&["DELETE"], "users", None)));

        let filter = RouteFilter::new(Stage::Headers, "a", &[], &[]).unwrap();
        assert!(filter.allows(&route(&["DELETE"], "users", None)));
    }
}
