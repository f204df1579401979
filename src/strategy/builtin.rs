use crate::config::RunContext;
use crate::model::{EndpointDraft, Parameter, ParameterMap, Stage};
use crate::route::Route;
use crate::strategy::{SectionValue, Strategy};
use anyhow::Result;

/// Returns the section data configured on the route itself.
pub struct RouteSettingsStrategy;

impl Strategy for RouteSettingsStrategy {
    fn invoke(
        &self,
        stage: Stage,
        _draft: &EndpointDraft,
        route: &Route,
        _ctx: &RunContext,
    ) -> Result<Option<SectionValue>> {
        let settings = &route.settings;
        let value = match stage {
            Stage::Metadata => settings.metadata.clone().map(SectionValue::Metadata),
            Stage::Headers => settings.headers.clone().map(SectionValue::Headers),
            Stage::UrlParameters => settings.url_parameters.clone().map(SectionValue::Parameters),
            Stage::QueryParameters => {
                settings.query_parameters.clone().map(SectionValue::Parameters)
            }
            Stage::BodyParameters => settings.body_parameters.clone().map(SectionValue::Parameters),
            Stage::Responses => settings.responses.clone().map(SectionValue::Responses),
            Stage::ResponseFields => {
                settings.response_fields.clone().map(SectionValue::ResponseFields)
            }
        };
        Ok(value)
    }
}

/// Derives url parameters from the placeholders of the URI template.
///
/// Supports `{id}`, optional `{id?}` and `:id` segments.
pub struct UriParametersStrategy;

impl Strategy for UriParametersStrategy {
    fn invoke(
        &self,
        stage: Stage,
        _draft: &EndpointDraft,
        route: &Route,
        _ctx: &RunContext,
    ) -> Result<Option<SectionValue>> {
        if stage != Stage::UrlParameters {
            return Ok(None);
        }
        let params = uri_parameters(&route.uri);
        if params.is_empty() {
            return Ok(None);
        }
        Ok(Some(SectionValue::Parameters(params)))
    }
}

/// Extract the placeholders of a URI template, in order.
pub fn uri_parameters(uri: &str) -> ParameterMap {
    let mut params = ParameterMap::new();

    for segment in uri.split('/') {
        if let Some(name) = segment.strip_prefix(':') {
            if !name.is_empty() {
                params.insert(name.to_string(), placeholder(name, true));
            }
            continue;
        }

        let mut rest = segment;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let inner = &rest[start + 1..start + len];
            let (name, required) = match inner.strip_suffix('?') {
                Some(name) => (name, false),
                None => (inner, true),
            };
            if !name.is_empty() {
                params.insert(name.to_string(), placeholder(name, required));
            }
            rest = &rest[start + len + 1..];
        }
    }

    params
}

fn placeholder(name: &str, required: bool) -> Parameter {
    let param_type = if name == "id" || name.ends_with("_id") {
        "integer"
    } else {
        "string"
    };
    Parameter {
        description: format!("The {}.", name.replace('_', " ")),
        required,
        ..Parameter::new(name, param_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::MetadataPatch;
    use crate::route::RouteSettings;

    fn run(strategy: &dyn Strategy, stage: Stage, route: &Route) -> Option<SectionValue> {
        let ctx = RunContext::new(Config::default());
        let draft = EndpointDraft::new(&route.methods, &route.uri);
        strategy.invoke(stage, &draft, route, &ctx).unwrap()
    }

    #[test]
    fn test_uri_parameters_braces() {
        let params = uri_parameters("users/{user_id}/posts/{slug?}");
        let names: Vec<_> = params.keys().cloned().collect();
        assert_eq!(names, vec!["user_id", "slug"]);
        assert!(params["user_id"].required);
        assert_eq!(params["user_id"].param_type, "integer");
        assert!(!params["slug"].required);
        assert_eq!(params["slug"].param_type, "string");
        assert_eq!(params["user_id"].description, "The user id.");
    }

    #[test]
    fn test_uri_parameters_colon_style() {
        let params = uri_parameters("/users/:id/files/:name");
        assert_eq!(params.len(), 2);
        assert!(params["id"].required);
        assert_eq!(params["name"].param_type, "string");
    }

    #[test]
    fn test_uri_parameters_none() {
        assert!(uri_parameters("health").is_empty());
        assert!(uri_parameters("broken/{oops").is_empty());
    }

    #[test]
    fn test_uri_strategy_only_serves_url_parameters() {
        let route = Route::new(&["GET"], "users/{id}", "show");
        assert!(run(&UriParametersStrategy, Stage::QueryParameters, &route).is_none());
        assert!(matches!(
            run(&UriParametersStrategy, Stage::UrlParameters, &route),
            Some(SectionValue::Parameters(p)) if p.contains_key("id")
        ));
    }

    #[test]
    fn test_route_settings_strategy() {
        let mut route = Route::new(&["GET"], "users", "index");
        route.settings = RouteSettings {
            metadata: Some(MetadataPatch {
                group_name: Some("Users".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        match run(&RouteSettingsStrategy, Stage::Metadata, &route) {
            Some(SectionValue::Metadata(patch)) => {
                assert_eq!(patch.group_name.as_deref(), Some("Users"))
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(run(&RouteSettingsStrategy, Stage::Headers, &route).is_none());
    }
}
