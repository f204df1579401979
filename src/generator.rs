use crate::assembler::EndpointAssembler;
use crate::config::{Config, RunContext};
use crate::error::ConfigResult;
use crate::model::{Endpoint, Group};
use crate::ordering::order_groups;
use crate::parser::DocIndex;
use crate::reconcile::{
    group_endpoints, PriorSnapshot, ReconcileOutcome, Reconciled, ReconciliationEngine,
};
use crate::route::Route;
use crate::snapshot::{CustomFile, SnapshotStore};
use crate::strategy::{AdapterCatalog, StrategyPipeline};
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// How a run ended. Runs that hit a configuration error never produce a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    /// Routes that produced an endpoint
    pub processed: usize,
    /// Routes left out as invalid or hidden
    pub skipped: usize,
    /// Routes whose extraction failed
    pub failed: usize,
    /// Endpoints whose hand-edited sections were kept
    pub preserved: usize,
    pub warnings: Vec<String>,
}

/// Ordered groups plus the report of the run that produced them.
#[derive(Debug)]
pub struct RunOutput {
    pub groups: Vec<Group>,
    pub report: RunReport,
}

/// Runs extraction, reconciliation, persistence and ordering for one output directory.
pub struct DocGenerator {
    ctx: RunContext,
    pipeline: StrategyPipeline,
    store: SnapshotStore,
}

impl DocGenerator {
    /// Resolve the configured strategies against `catalog`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::error::ConfigError) for any contradiction in the
    /// strategy configuration. Nothing has been read or written at that point.
    pub fn new(ctx: RunContext, catalog: &AdapterCatalog) -> ConfigResult<Self> {
        let pipeline = StrategyPipeline::from_config(&ctx.config.strategies, catalog)?;
        let store = SnapshotStore::from_context(&ctx);
        Ok(Self {
            ctx,
            pipeline,
            store,
        })
    }

    /// Generator with the bundled adapters. When `project` is given, handlers are resolved
    /// against its sources and their doc comments feed the `doc_comments` adapter.
    pub fn for_project(config: Config, project: Option<&Path>) -> Result<Self> {
        let mut ctx = RunContext::new(config);
        let docs = match project {
            Some(root) => {
                info!("Indexing handler sources under {}", root.display());
                let index = Arc::new(DocIndex::from_project(root)?);
                info!("Found {} handler candidates", index.len());
                ctx = ctx.with_resolver(index.clone());
                Some(index)
            }
            None => None,
        };
        let catalog = AdapterCatalog::with_builtins(docs);
        Ok(Self::new(ctx, &catalog)?)
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Generate documentation for `routes`.
    ///
    /// With `force`, or when the configuration disables preservation, the previous snapshots
    /// are not read and every endpoint is treated as new.
    ///
    /// # Errors
    ///
    /// Fails only on snapshot I/O. Individual routes that cannot be processed are reported in
    /// the [`RunReport`].
    pub fn run(&self, routes: &[Route], force: bool) -> Result<RunOutput> {
        // Step 1: previous snapshots
        let prior = if force || !self.ctx.config.preserve_user_changes {
            info!("Discarding previous snapshots, user edits are not preserved");
            PriorSnapshot::default()
        } else {
            self.store.read_prior()?
        };

        // Step 2: extraction
        info!("Extracting {} routes...", routes.len());
        let assembled = EndpointAssembler::new(&self.pipeline, &self.ctx).assemble_all(routes);
        let processed = assembled.endpoints.len();

        // Step 3: reconciliation
        let engine = ReconciliationEngine::new(&prior);
        let reconciled: Vec<Reconciled> = assembled
            .endpoints
            .into_iter()
            .map(|endpoint| engine.reconcile(endpoint))
            .collect();
        let preserved = reconciled
            .iter()
            .filter(|r| matches!(r.outcome, ReconcileOutcome::UserEdited(_)))
            .count();
        debug!(
            "{} new endpoints, {} with preserved edits",
            reconciled.iter().filter(|r| r.outcome == ReconcileOutcome::New).count(),
            preserved
        );

        // Step 4: persistence
        let mut groups = group_endpoints(reconciled);
        self.store.write(&groups)?;
        if self.store.write_example_custom()? {
            debug!("Wrote example custom endpoints file");
        }

        // Step 5: user-authored endpoints and final order
        let custom = self.store.read_custom()?;
        merge_custom(&mut groups, custom, &self.ctx.config.default_group);
        let groups = order_groups(groups, &self.ctx.config.groups.order);

        let warnings: Vec<String> = assembled
            .skipped
            .iter()
            .chain(&assembled.failed)
            .cloned()
            .collect();
        let status = if warnings.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithWarnings
        };
        let report = RunReport {
            status,
            processed,
            skipped: assembled.skipped.len(),
            failed: assembled.failed.len(),
            preserved,
            warnings,
        };

        info!(
            "Processed {} routes ({} skipped, {} failed), {} groups",
            report.processed,
            report.skipped,
            report.failed,
            groups.len()
        );
        if report.status == RunStatus::CompletedWithWarnings {
            warn!("Completed with {} warnings", report.warnings.len());
        }

        Ok(RunOutput { groups, report })
    }
}

/// Add user-authored endpoints to the group of the same name, creating groups as needed.
fn merge_custom(groups: &mut Vec<Group>, custom: Vec<CustomFile>, default_group: &str) {
    for file in custom {
        for mut endpoint in file.endpoints {
            if endpoint.metadata.group_name.is_empty() {
                endpoint.metadata.group_name = default_group.to_string();
            }
            push_into_group(groups, endpoint);
        }
    }
}

fn push_into_group(groups: &mut Vec<Group>, endpoint: Endpoint) {
    let name = &endpoint.metadata.group_name;
    match groups.iter_mut().find(|group| &group.name == name) {
        Some(group) => group.endpoints.push(endpoint),
        None => groups.push(Group {
            name: name.clone(),
            description: endpoint.metadata.group_description.clone(),
            endpoints: vec![endpoint],
        }),
    }
}
