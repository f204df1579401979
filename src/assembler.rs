use crate::config::{AuthConfig, AuthLocation, RunContext};
use crate::error::RouteError;
use crate::model::{Endpoint, EndpointDraft, Parameter, Stage};
use crate::route::Route;
use crate::strategy::StrategyPipeline;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value;

/// Builds one [`Endpoint`] per route by running every stage of the pipeline.
pub struct EndpointAssembler<'a> {
    pipeline: &'a StrategyPipeline,
    ctx: &'a RunContext,
}

/// Result of assembling a batch of routes.
#[derive(Debug, Default)]
pub struct AssemblyOutcome {
    /// Endpoints in route order
    pub endpoints: Vec<Endpoint>,
    /// Routes left out on purpose (invalid or hidden)
    pub skipped: Vec<String>,
    /// Routes whose extraction failed
    pub failed: Vec<String>,
}

impl<'a> EndpointAssembler<'a> {
    pub fn new(pipeline: &'a StrategyPipeline, ctx: &'a RunContext) -> Self {
        Self { pipeline, ctx }
    }

    /// Assemble a single route.
    ///
    /// # Errors
    ///
    /// * [`RouteError::InvalidRoute`] when the route has no methods or its handler cannot be
    ///   resolved
    /// * [`RouteError::HiddenRoute`] when the route or its handler is excluded from documentation
    /// * [`RouteError::Extraction`] when an adapter fails during any stage
    pub fn assemble(&self, route: &Route) -> Result<Endpoint, RouteError> {
        self.validate(route)?;

        let mut draft = EndpointDraft::new(&route.methods, &route.uri);
        for stage in Stage::EXTRACTION_ORDER {
            let value = self
                .pipeline
                .run(stage, &draft, route, self.ctx)
                .map_err(|source| RouteError::Extraction {
                    route: route.representation(),
                    stage,
                    source,
                })?;
            value.apply_to(stage, &mut draft);

            if stage == Stage::Metadata && draft.current().metadata.group_name.is_empty() {
                draft.metadata_mut().group_name = self.ctx.config.default_group.clone();
            }
        }

        if !draft.authenticated_was_set() {
            draft.metadata_mut().authenticated = self.ctx.config.auth.default;
        }
        apply_auth(&mut draft, &self.ctx.config.auth);

        Ok(draft.finish())
    }

    fn validate(&self, route: &Route) -> Result<(), RouteError> {
        let invalid = |reason: &str| RouteError::InvalidRoute {
            route: route.representation(),
            reason: reason.to_string(),
        };
        let hidden = || RouteError::HiddenRoute {
            route: route.representation(),
        };

        if route.methods.is_empty() {
            return Err(invalid("no HTTP methods"));
        }
        if route.hidden {
            return Err(hidden());
        }

        // Without a resolver there is no source to check handlers against.
        let Some(resolver) = &self.ctx.resolver else {
            return Ok(());
        };
        let Some(handler) = route.handler.as_deref() else {
            return Err(invalid("no handler"));
        };
        if !resolver.resolves(handler) {
            return Err(invalid(&format!("handler `{}` not found", handler)));
        }
        if resolver.is_hidden(handler) {
            return Err(hidden());
        }
        Ok(())
    }

    /// Assemble every route, in parallel. Failures are logged and collected; the batch itself
    /// never fails.
    pub fn assemble_all(&self, routes: &[Route]) -> AssemblyOutcome {
        let results: Vec<(&Route, Result<Endpoint, RouteError>)> = routes
            .par_iter()
            .map(|route| {
                info!("Processing route: {}", route.representation());
                (route, self.assemble(route))
            })
            .collect();

        let mut outcome = AssemblyOutcome::default();
        for (route, result) in results {
            match result {
                Ok(endpoint) => {
                    debug!("Processed route: {}", route.representation());
                    outcome.endpoints.push(endpoint);
                }
                Err(e) if e.is_skip() => {
                    warn!("{}", e);
                    outcome.skipped.push(e.to_string());
                }
                Err(e) => {
                    warn!("{}", e);
                    outcome.failed.push(e.to_string());
                }
            }
        }
        outcome
    }
}

/// Add the configured credential to an authenticated endpoint.
fn apply_auth(draft: &mut EndpointDraft, auth: &AuthConfig) {
    if !auth.enabled || !draft.current().metadata.authenticated {
        return;
    }

    match auth.location {
        AuthLocation::Bearer => {
            draft
                .headers_mut()
                .insert("Authorization".to_string(), format!("Bearer {}", auth.placeholder));
        }
        AuthLocation::Basic => {
            draft
                .headers_mut()
                .insert("Authorization".to_string(), format!("Basic {}", auth.placeholder));
        }
        AuthLocation::Header => {
            draft
                .headers_mut()
                .insert(auth.name.clone(), auth.placeholder.clone());
        }
        AuthLocation::Query | AuthLocation::Body => {
            let stage = if auth.location == AuthLocation::Query {
                Stage::QueryParameters
            } else {
                Stage::BodyParameters
            };
            let param = Parameter {
                description: "Authentication key.".to_string(),
                required: true,
                example: Some(Value::String(auth.placeholder.clone())),
                ..Parameter::new(auth.name.clone(), "string")
            };
            if let Some(params) = draft.parameters_mut(stage) {
                params.insert(auth.name.clone(), param);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::MetadataPatch;
    use crate::route::{HandlerResolver, RouteSettings};
    use crate::strategy::{AdapterCatalog, SectionValue, Strategy};
    use anyhow::{anyhow, Result};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    struct KnownHandlers;

    impl HandlerResolver for KnownHandlers {
        fn resolves(&self, handler: &str) -> bool {
            handler != "missing"
        }

        fn is_hidden(&self, handler: &str) -> bool {
            handler == "secret"
        }
    }

    /// Records the responses visible when the response-field stage runs.
    struct EchoResponses;

    impl Strategy for EchoResponses {
        fn invoke(
            &self,
            stage: Stage,
            draft: &EndpointDraft,
            _route: &Route,
            _ctx: &RunContext,
        ) -> Result<Option<SectionValue>> {
            match stage {
                Stage::Responses => Ok(Some(SectionValue::Responses(vec![crate::model::Response {
                    status: 200,
                    content: Some("{}".to_string()),
                    ..Default::default()
                }]))),
                Stage::ResponseFields => {
                    let mut fields = indexmap::IndexMap::new();
                    let seen = draft.current().responses.len().to_string();
                    fields.insert(
                        seen.clone(),
                        crate::model::ResponseField {
                            name: seen,
                            ..Default::default()
                        },
                    );
                    Ok(Some(SectionValue::ResponseFields(fields)))
                }
                _ => Ok(None),
            }
        }
    }

    struct Exploding;

    impl Strategy for Exploding {
        fn invoke(
            &self,
            stage: Stage,
            _: &EndpointDraft,
            _: &Route,
            _: &RunContext,
        ) -> Result<Option<SectionValue>> {
            if stage == Stage::BodyParameters {
                Err(anyhow!("cannot read body"))
            } else {
                Ok(None)
            }
        }
    }

    fn pipeline(config: &Config) -> StrategyPipeline {
        let mut catalog = AdapterCatalog::with_builtins(None);
        catalog.register("echo", Arc::new(EchoResponses));
        catalog.register("exploding", Arc::new(Exploding));
        StrategyPipeline::from_config(&config.strategies, &catalog).unwrap()
    }

    fn grouped(route: Route, group: &str) -> Route {
        let mut route = route;
        route.settings = RouteSettings {
            metadata: Some(MetadataPatch {
                group_name: Some(group.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        route
    }

    #[test]
    fn test_assemble_runs_all_stages() {
        let config = Config::default();
        let pipeline = pipeline(&config);
        let ctx = RunContext::new(config);
        let assembler = EndpointAssembler::new(&pipeline, &ctx);

        let route = grouped(Route::new(&["GET", "HEAD"], "users/{id}", "show"), "Users");
        let endpoint = assembler.assemble(&route).unwrap();

        assert_eq!(endpoint.http_methods, vec!["GET".to_string()]);
        assert_eq!(endpoint.metadata.group_name, "Users");
        assert!(endpoint.url_parameters.contains_key("id"));
        assert_eq!(endpoint.headers["Accept"], "application/json");
        assert_eq!(endpoint.clean_url_parameters.get("id"), Some(&Value::Null));
    }

    #[test]
    fn test_later_stages_see_earlier_sections() {
        let config =
            Config::from_yaml("strategies:\n  responses: [echo]\n  response_fields: [echo]\n")
                .unwrap();
        let pipeline = pipeline(&config);
        let ctx = RunContext::new(config);
        let endpoint = EndpointAssembler::new(&pipeline, &ctx)
            .assemble(&Route::new(&["GET"], "ping", "ping"))
            .unwrap();
        assert!(endpoint.response_fields.contains_key("1"));
    }

    #[test]
    fn test_missing_group_gets_default() {
        let config = Config::default();
        let pipeline = pipeline(&config);
        let ctx = RunContext::new(config);
        let endpoint = EndpointAssembler::new(&pipeline, &ctx)
            .assemble(&Route::new(&["GET"], "ping", "ping"))
            .unwrap();
        assert_eq!(endpoint.metadata.group_name, "Endpoints");
    }

    #[test]
    fn test_invalid_and_hidden_routes() {
        let config = Config::default();
        let pipeline = pipeline(&config);
        let ctx = RunContext::new(config).with_resolver(Arc::new(KnownHandlers));
        let assembler = EndpointAssembler::new(&pipeline, &ctx);

        let err = assembler.assemble(&Route::new(&["GET"], "a", "missing")).unwrap_err();
        assert!(matches!(err, RouteError::InvalidRoute { .. }));
        assert!(err.to_string().contains("[GET] a"));

        let err = assembler.assemble(&Route::new(&["GET"], "b", "secret")).unwrap_err();
        assert!(matches!(err, RouteError::HiddenRoute { .. }));

        let mut hidden = Route::new(&["GET"], "c", "ok");
        hidden.hidden = true;
        assert!(matches!(assembler.assemble(&hidden), Err(RouteError::HiddenRoute { .. })));

        let mut no_handler = Route::new(&["GET"], "d", "ok");
        no_handler.handler = None;
        assert!(matches!(assembler.assemble(&no_handler), Err(RouteError::InvalidRoute { .. })));

        assert!(assembler.assemble(&Route::new(&[], "e", "ok")).unwrap_err().is_skip());
    }

    #[test]
    fn test_assemble_all_keeps_order_and_collects_failures() {
        let config = Config::from_yaml(
            "strategies:\n  body_parameters:\n    - adapter: exploding\n      only: [\"POST *\"]\n",
        )
        .unwrap();
        let pipeline = pipeline(&config);
        let ctx = RunContext::new(config).with_resolver(Arc::new(KnownHandlers));
        let assembler = EndpointAssembler::new(&pipeline, &ctx);

        let routes: Vec<Route> = (0..20)
            .map(|i| Route::new(&["GET"], &format!("items/{}", i), "index"))
            .chain([
                Route::new(&["POST"], "items", "store"),
                Route::new(&["GET"], "hidden", "secret"),
            ])
            .collect();
        let outcome = assembler.assemble_all(&routes);

        let uris: Vec<&str> = outcome.endpoints.iter().map(|e| e.uri.as_str()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("items/{}", i)).collect();
        assert_eq!(uris, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].contains("[POST] items"));
        assert!(outcome.failed[0].contains("cannot read body"));
    }

    #[test]
    fn test_auth_applied_to_authenticated_endpoints() {
        let mut config = Config::default();
        config.auth.enabled = true;
        config.auth.default = true;
        let pipeline = pipeline(&config);
        let ctx = RunContext::new(config);

        let endpoint = EndpointAssembler::new(&pipeline, &ctx)
            .assemble(&Route::new(&["GET"], "me", "me"))
            .unwrap();
        assert!(endpoint.metadata.authenticated);
        assert_eq!(endpoint.headers["Authorization"], "Bearer {YOUR_AUTH_KEY}");

        let mut public = Route::new(&["GET"], "status", "status");
        public.settings.metadata = Some(MetadataPatch {
            authenticated: Some(false),
            ..Default::default()
        });
        let endpoint = EndpointAssembler::new(&pipeline, &ctx).assemble(&public).unwrap();
        assert!(!endpoint.metadata.authenticated);
        assert!(!endpoint.headers.contains_key("Authorization"));
    }

    #[test]
    fn test_query_auth_adds_parameter() {
        let mut draft = EndpointDraft::new(&["GET".to_string()], "me");
        draft.metadata_mut().authenticated = true;
        let auth = AuthConfig {
            enabled: true,
            location: AuthLocation::Query,
            name: "api_key".to_string(),
            ..Default::default()
        };
        apply_auth(&mut draft, &auth);

        let endpoint = draft.finish();
        assert_eq!(endpoint.query_parameters["api_key"].example, Some(json!("{YOUR_AUTH_KEY}")));
        assert_eq!(endpoint.clean_query_parameters["api_key"], json!("{YOUR_AUTH_KEY}"));
    }
}
