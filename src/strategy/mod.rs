//! Per-stage extraction pipeline.
//!
//! Each stage runs an ordered list of adapters ([`Strategy`] implementations). An adapter may
//! be limited to some routes with `only`/`except` patterns. Outputs are merged left to right,
//! so a specific adapter listed after a generic one wins on conflicting keys. Static overrides
//! from the configuration are merged last, for every route.
//!
//! # Example
//!
//! ```no_run
//! use routedoc::config::{Config, RunContext};
//! use routedoc::model::{EndpointDraft, Stage};
//! use routedoc::route::Route;
//! use routedoc::strategy::{AdapterCatalog, StrategyPipeline};
//!
//! let ctx = RunContext::new(Config::default());
//! let catalog = AdapterCatalog::with_builtins(None);
//! let pipeline = StrategyPipeline::from_config(&ctx.config.strategies, &catalog).unwrap();
//! let route = Route::new(&["GET"], "users/{id}", "show_user");
//! let draft = EndpointDraft::new(&route.methods, &route.uri);
//! let params = pipeline.run(Stage::UrlParameters, &draft, &route, &ctx).unwrap();
//! ```

pub mod builtin;
pub mod doc_comments;
pub mod matcher;

use crate::config::{RunContext, StrategyEntry};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{EndpointDraft, MetadataPatch, ParameterMap, Response, ResponseField, Stage};
use crate::parser::DocIndex;
use crate::route::Route;
use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::{debug, warn};
use matcher::RouteFilter;
use std::collections::HashMap;
use std::sync::Arc;

/// A single extraction rule for one or more stages.
///
/// Returning `Ok(None)` means the adapter has nothing to say about this route. Errors abort
/// the current route only.
pub trait Strategy: Send + Sync {
    fn invoke(
        &self,
        stage: Stage,
        draft: &EndpointDraft,
        route: &Route,
        ctx: &RunContext,
    ) -> Result<Option<SectionValue>>;
}

/// Data produced for one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionValue {
    Metadata(MetadataPatch),
    Headers(IndexMap<String, String>),
    Parameters(ParameterMap),
    Responses(Vec<Response>),
    ResponseFields(IndexMap<String, ResponseField>),
}

impl SectionValue {
    /// The neutral value for a stage.
    pub fn empty(stage: Stage) -> Self {
        match stage {
            Stage::Metadata => SectionValue::Metadata(MetadataPatch::default()),
            Stage::Headers => SectionValue::Headers(IndexMap::new()),
            Stage::UrlParameters | Stage::QueryParameters | Stage::BodyParameters => {
                SectionValue::Parameters(ParameterMap::new())
            }
            Stage::Responses => SectionValue::Responses(Vec::new()),
            Stage::ResponseFields => SectionValue::ResponseFields(IndexMap::new()),
        }
    }

    /// Whether this kind of value belongs to `stage`.
    pub fn fits(&self, stage: Stage) -> bool {
        matches!(
            (self, stage),
            (SectionValue::Metadata(_), Stage::Metadata)
                | (SectionValue::Headers(_), Stage::Headers)
                | (SectionValue::Parameters(_), Stage::UrlParameters)
                | (SectionValue::Parameters(_), Stage::QueryParameters)
                | (SectionValue::Parameters(_), Stage::BodyParameters)
                | (SectionValue::Responses(_), Stage::Responses)
                | (SectionValue::ResponseFields(_), Stage::ResponseFields)
        )
    }

    /// Parse configured static overrides for a stage.
    pub fn from_overrides(stage: Stage, value: serde_yaml::Value) -> ConfigResult<Self> {
        let invalid = |e: serde_yaml::Error| ConfigError::InvalidOverride {
            stage,
            message: e.to_string(),
        };
        let section = match stage {
            Stage::Metadata => {
                SectionValue::Metadata(serde_yaml::from_value(value).map_err(invalid)?)
            }
            Stage::Headers => {
                SectionValue::Headers(serde_yaml::from_value(value).map_err(invalid)?)
            }
            Stage::UrlParameters | Stage::QueryParameters | Stage::BodyParameters => {
                SectionValue::Parameters(serde_yaml::from_value(value).map_err(invalid)?)
            }
            Stage::Responses => {
                SectionValue::Responses(serde_yaml::from_value(value).map_err(invalid)?)
            }
            Stage::ResponseFields => {
                SectionValue::ResponseFields(serde_yaml::from_value(value).map_err(invalid)?)
            }
        };
        Ok(section.normalized())
    }

    /// Fill missing parameter/field names from their keys.
    pub fn normalized(mut self) -> Self {
        match &mut self {
            SectionValue::Parameters(params) => {
                for (key, param) in params.iter_mut() {
                    if param.name.is_empty() {
                        param.name = key.clone();
                    }
                }
            }
            SectionValue::ResponseFields(fields) => {
                for (key, field) in fields.iter_mut() {
                    if field.name.is_empty() {
                        field.name = key.clone();
                    }
                }
            }
            _ => {}
        }
        self
    }

    /// Merge `other` into `self`. Maps merge shallowly with `other` winning; responses append.
    pub fn merge(&mut self, other: SectionValue) -> Result<()> {
        match (self, other.normalized()) {
            (SectionValue::Metadata(acc), SectionValue::Metadata(patch)) => acc.merge(patch),
            (SectionValue::Headers(acc), SectionValue::Headers(headers)) => acc.extend(headers),
            (SectionValue::Parameters(acc), SectionValue::Parameters(params)) => acc.extend(params),
            (SectionValue::Responses(acc), SectionValue::Responses(responses)) => {
                acc.extend(responses)
            }
            (SectionValue::ResponseFields(acc), SectionValue::ResponseFields(fields)) => {
                acc.extend(fields)
            }
            (acc, other) => bail!(
                "cannot merge {} output into {} section",
                other.kind(),
                acc.kind()
            ),
        }
        Ok(())
    }

    /// Write the value into the matching section of a draft.
    pub fn apply_to(self, stage: Stage, draft: &mut EndpointDraft) {
        match self {
            SectionValue::Metadata(patch) => draft.apply_metadata(patch),
            SectionValue::Headers(headers) => draft.headers_mut().extend(headers),
            SectionValue::Parameters(params) => {
                if let Some(target) = draft.parameters_mut(stage) {
                    target.extend(params);
                }
            }
            SectionValue::Responses(responses) => draft.responses_mut().extend(responses),
            SectionValue::ResponseFields(fields) => draft.response_fields_mut().extend(fields),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SectionValue::Metadata(_) => "metadata",
            SectionValue::Headers(_) => "headers",
            SectionValue::Parameters(_) => "parameters",
            SectionValue::Responses(_) => "responses",
            SectionValue::ResponseFields(_) => "response fields",
        }
    }
}

/// Adapters available to the configuration, by identifier.
#[derive(Clone, Default)]
pub struct AdapterCatalog {
    adapters: HashMap<String, Arc<dyn Strategy>>,
}

impl AdapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the bundled adapters. `doc_comments` is inert without a doc index.
    pub fn with_builtins(docs: Option<Arc<DocIndex>>) -> Self {
        let mut catalog = Self::new();
        catalog.register("route_settings", Arc::new(builtin::RouteSettingsStrategy));
        catalog.register("uri_parameters", Arc::new(builtin::UriParametersStrategy));
        catalog.register("doc_comments", Arc::new(doc_comments::DocCommentStrategy::new(docs)));
        catalog
    }

    pub fn register(&mut self, id: &str, adapter: Arc<dyn Strategy>) {
        self.adapters.insert(id.to_string(), adapter);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Strategy>> {
        self.adapters.get(id).cloned()
    }
}

/// A resolved strategy descriptor.
#[derive(Clone)]
pub struct ConfiguredStrategy {
    pub adapter_id: String,
    adapter: Arc<dyn Strategy>,
    filter: RouteFilter,
}

#[derive(Clone, Default)]
struct StagePlan {
    strategies: Vec<ConfiguredStrategy>,
    overrides: Vec<SectionValue>,
}

/// Typed registry of adapters per stage, resolved once at startup.
#[derive(Clone, Default)]
pub struct StrategyPipeline {
    stages: HashMap<Stage, StagePlan>,
}

impl StrategyPipeline {
    /// Resolve every configured entry. Fails on the first contradiction.
    pub fn from_config(
        strategies: &IndexMap<Stage, Vec<StrategyEntry>>,
        catalog: &AdapterCatalog,
    ) -> ConfigResult<Self> {
        let mut stages = HashMap::new();

        for (&stage, entries) in strategies {
            let mut plan = StagePlan::default();
            for entry in entries {
                let (adapter, only, except, overrides) = match entry {
                    StrategyEntry::Named(adapter) => (Some(adapter), &[][..], &[][..], None),
                    StrategyEntry::Detailed(descriptor) => (
                        descriptor.adapter.as_ref(),
                        &descriptor.only[..],
                        &descriptor.except[..],
                        descriptor.overrides.as_ref(),
                    ),
                };

                if adapter.is_none() && overrides.is_none() {
                    return Err(ConfigError::EmptyDescriptor { stage });
                }

                if let Some(id) = adapter {
                    let filter = RouteFilter::new(stage, id, only, except)?;
                    let resolved = catalog.get(id).ok_or_else(|| ConfigError::UnknownAdapter {
                        stage,
                        adapter: id.clone(),
                    })?;
                    plan.strategies.push(ConfiguredStrategy {
                        adapter_id: id.clone(),
                        adapter: resolved,
                        filter,
                    });
                } else if !only.is_empty() || !except.is_empty() {
                    warn!("`only`/`except` have no effect on overrides for stage `{}`", stage);
                }

                if let Some(value) = overrides {
                    plan.overrides.push(SectionValue::from_overrides(stage, value.clone())?);
                }
            }
            debug!(
                "Stage `{}`: {} strategies, {} override sets",
                stage,
                plan.strategies.len(),
                plan.overrides.len()
            );
            stages.insert(stage, plan);
        }

        Ok(Self { stages })
    }

    /// Identifiers of the adapters configured for a stage, in run order.
    pub fn adapters_for(&self, stage: Stage) -> Vec<&str> {
        self.stages
            .get(&stage)
            .map(|plan| plan.strategies.iter().map(|s| s.adapter_id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Run every adapter configured for `stage` against one route and merge their outputs.
    pub fn run(
        &self,
        stage: Stage,
        draft: &EndpointDraft,
        route: &Route,
        ctx: &RunContext,
    ) -> Result<SectionValue> {
        let mut value = SectionValue::empty(stage);
        let Some(plan) = self.stages.get(&stage) else {
            return Ok(value);
        };

        for strategy in &plan.strategies {
            if !strategy.filter.allows(route) {
                debug!(
                    "Skipping `{}` for {} ({})",
                    strategy.adapter_id,
                    route.representation(),
                    stage
                );
                continue;
            }
            if let Some(output) = strategy.adapter.invoke(stage, draft, route, ctx)? {
                if !output.fits(stage) {
                    bail!(
                        "adapter `{}` returned {} for stage `{}`",
                        strategy.adapter_id,
                        output.kind(),
                        stage
                    );
                }
                value.merge(output)?;
            }
        }

        for overrides in &plan.overrides {
            value.merge(overrides.clone())?;
        }

        Ok(value)
    }
}
