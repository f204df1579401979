//! Three-way merge of freshly extracted endpoints with the previous run's snapshots.
//!
//! The cache snapshot is what the tool wrote last time; the latest snapshot is the same tree
//! after the user had a chance to edit it. A section that differs between the two was edited
//! by hand, so its latest value replaces the fresh one. Every other section takes the fresh
//! value, which lets code changes flow through.

use crate::model::{Endpoint, Group, Stage};
use crate::ordering::natural_cmp;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;

/// Both persisted trees of the previous run. Empty on a first run.
#[derive(Debug, Clone, Default)]
pub struct PriorSnapshot {
    pub cache: Vec<Group>,
    pub latest: Vec<Group>,
}

impl PriorSnapshot {
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty() && self.latest.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// No usable baseline, the fresh endpoint is used as is
    New,
    /// No hand edits, fresh values kept
    Unchanged,
    /// These sections were restored from the latest snapshot
    UserEdited(Vec<Stage>),
}

/// A fresh endpoint after reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub endpoint: Endpoint,
    /// Position of the endpoint within its group in the latest snapshot
    pub index: Option<usize>,
    pub outcome: ReconcileOutcome,
}

/// Identity lookup over a [`PriorSnapshot`], built once per run.
pub struct ReconciliationEngine<'a> {
    cache: HashMap<String, &'a Endpoint>,
    latest: HashMap<String, (&'a Endpoint, usize)>,
}

/// Key for `(uri, http_methods)`.
fn identity(endpoint: &Endpoint) -> String {
    format!("{} {}", endpoint.http_methods.join("|"), endpoint.uri)
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(prior: &'a PriorSnapshot) -> Self {
        let mut cache = HashMap::new();
        for endpoint in prior.cache.iter().flat_map(|group| &group.endpoints) {
            cache.entry(identity(endpoint)).or_insert(endpoint);
        }

        let mut latest = HashMap::new();
        for group in &prior.latest {
            for (index, endpoint) in group.endpoints.iter().enumerate() {
                latest.entry(identity(endpoint)).or_insert((endpoint, index));
            }
        }

        Self { cache, latest }
    }

    /// Merge one fresh endpoint with its previous versions.
    pub fn reconcile(&self, mut fresh: Endpoint) -> Reconciled {
        let key = identity(&fresh);

        let Some(cached) = self.cache.get(&key) else {
            return Reconciled {
                endpoint: fresh,
                index: None,
                outcome: ReconcileOutcome::New,
            };
        };
        let Some(&(latest, index)) = self.latest.get(&key) else {
            debug!("{} is cached but missing from the latest snapshot, treating as new", key);
            return Reconciled {
                endpoint: fresh,
                index: None,
                outcome: ReconcileOutcome::New,
            };
        };

        let edited: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|&stage| !cached.section_eq(latest, stage))
            .collect();

        if edited.is_empty() {
            return Reconciled {
                endpoint: fresh,
                index: Some(index),
                outcome: ReconcileOutcome::Unchanged,
            };
        }

        for &stage in &edited {
            debug!("Restoring edited {} of {}", stage, key);
            fresh.restore_section(latest, stage);
        }
        fresh.refresh_clean_parameters();

        Reconciled {
            endpoint: fresh,
            index: Some(index),
            outcome: ReconcileOutcome::UserEdited(edited),
        }
    }
}

/// Group reconciled endpoints by group name.
///
/// Within a group endpoints keep their previous position; new endpoints follow in discovery
/// order. The group description is the first non-empty one among its endpoints. Groups are
/// returned in natural name order, which fixes their file numbering.
pub fn group_endpoints(reconciled: Vec<Reconciled>) -> Vec<Group> {
    let mut buckets: IndexMap<String, Vec<Reconciled>> = IndexMap::new();
    for item in reconciled {
        buckets
            .entry(item.endpoint.metadata.group_name.clone())
            .or_default()
            .push(item);
    }

    let mut groups: Vec<Group> = buckets
        .into_iter()
        .map(|(name, mut items)| {
            items.sort_by_key(|item| item.index.unwrap_or(usize::MAX));
            let description = items
                .iter()
                .map(|item| item.endpoint.metadata.group_description.as_str())
                .find(|d| !d.is_empty())
                .unwrap_or_default()
                .to_string();
            Group {
                name,
                description,
                endpoints: items.into_iter().map(|item| item.endpoint).collect(),
            }
        })
        .collect();

    groups.sort_by(|a, b| natural_cmp(&a.name, &b.name));
    groups
}
