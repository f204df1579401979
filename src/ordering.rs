//! Deterministic ordering of groups, subgroups and endpoints.
//!
//! Users steer the order with a partial [`OrderSpec`]:
//!
//! ```yaml
//! - Authentication          # a group, placed first
//! - Users:                  # a group with its own second-level order
//!     - GET /users          # an endpoint, by method and path
//!     - Profile:            # a subgroup, with a third-level order
//!         - PUT /users/me
//! - "*"                     # every group not named anywhere else
//! - Admin                   # placed after the wildcard bucket
//! ```
//!
//! Anything the order does not mention falls back to natural order (groups) or keeps its
//! original relative position (endpoints). Names that match nothing are ignored.

use crate::model::{Endpoint, Group};
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::cmp::Ordering;

/// Token standing for "every item not listed elsewhere".
pub const WILDCARD: &str = "*";

/// A possibly nested, possibly partial ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSpec {
    entries: Vec<OrderEntry>,
}

/// A single item of an [`OrderSpec`] level.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEntry {
    pub name: String,
    /// Order of the item's children, when given as `name: [...]`
    pub nested: Option<OrderSpec>,
}

impl OrderSpec {
    pub fn new(entries: Vec<OrderEntry>) -> Self {
        Self { entries }
    }

    /// Build from bare names only.
    pub fn flat<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| OrderEntry {
                    name: name.as_ref().to_string(),
                    nested: None,
                })
                .collect(),
        )
    }

    /// Interpret a YAML value: a sequence mixing scalars and `name: nested` maps, a map of
    /// `name: nested`, a single scalar, or null.
    pub fn from_value(value: &Value) -> Self {
        let mut entries = Vec::new();
        match value {
            Value::Null => {}
            Value::Sequence(items) => {
                for item in items {
                    match item {
                        Value::Mapping(map) => push_mapping(&mut entries, map),
                        Value::Sequence(_) => {
                            debug!("Ignoring nested list without a name in order spec");
                        }
                        other => {
                            if let Some(name) = scalar_name(other) {
                                entries.push(OrderEntry { name, nested: None });
                            }
                        }
                    }
                }
            }
            Value::Mapping(map) => push_mapping(&mut entries, map),
            other => {
                if let Some(name) = scalar_name(other) {
                    entries.push(OrderEntry { name, nested: None });
                }
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    /// The names at this level, ignoring nested content.
    pub fn top_level_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Index of `name` at this level.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Nested order given for `name`, if any.
    pub fn nested(&self, name: &str) -> Option<&OrderSpec> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.nested.is_some())
            .and_then(|e| e.nested.as_ref())
    }
}

fn push_mapping(entries: &mut Vec<OrderEntry>, map: &serde_yaml::Mapping) {
    for (key, nested) in map {
        if let Some(name) = scalar_name(key) {
            entries.push(OrderEntry {
                name,
                nested: Some(OrderSpec::from_value(nested)),
            });
        }
    }
}

/// Scalars that do not look like names (numbers, booleans) are used literally.
fn scalar_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_name(&tagged.value),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for OrderSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(OrderSpec::from_value(&value))
    }
}

/// Compare strings the way humans sort them: digit runs compare by numeric value, so
/// `Group 2` sorts before `Group 10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let run_a = take_digits(&mut left);
                let run_b = take_digits(&mut right);
                let ordering = compare_digit_runs(&run_a, &run_b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Sort key of a name relative to an order list.
///
/// Listed names come first, by position; unlisted names follow in natural order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderKey<'a> {
    Listed(usize),
    Unlisted(NaturalKey<'a>),
}

/// A string ordered by [`natural_cmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalKey<'a>(pub &'a str);

impl Ord for NaturalKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(self.0, other.0)
    }
}

impl PartialOrd for NaturalKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An order list usable as a sort-key extractor.
#[derive(Debug, Clone)]
pub struct OrderIndex<'s> {
    names: Vec<&'s str>,
}

impl<'s> OrderIndex<'s> {
    pub fn new(names: Vec<&'s str>) -> Self {
        Self { names }
    }

    pub fn key_for<'n>(&self, name: &'n str) -> OrderKey<'n> {
        match self.names.iter().position(|n| *n == name) {
            Some(index) => OrderKey::Listed(index),
            None => OrderKey::Unlisted(NaturalKey(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name)
    }
}

/// Order groups by the top level of `spec`, then order each group's endpoints by the
/// group's nested spec.
pub fn order_groups(groups: Vec<Group>, spec: &OrderSpec) -> Vec<Group> {
    let names = spec.top_level_names();
    log_unmatched(&names, groups.iter().map(|g| g.name.as_str()), "group");

    let mut ordered = match names.iter().position(|n| *n == WILDCARD) {
        Some(position) => {
            let promoted = OrderIndex::new(names[..position].to_vec());
            let demoted = OrderIndex::new(
                names[position + 1..]
                    .iter()
                    .copied()
                    .filter(|n| *n != WILDCARD)
                    .collect(),
            );

            let mut promoted_bucket = Vec::new();
            let mut wildcard_bucket = Vec::new();
            let mut demoted_bucket = Vec::new();
            for group in groups {
                if promoted.contains(&group.name) {
                    promoted_bucket.push(group);
                } else if demoted.contains(&group.name) {
                    demoted_bucket.push(group);
                } else {
                    wildcard_bucket.push(group);
                }
            }

            promoted_bucket
                .sort_by(|a, b| promoted.key_for(&a.name).cmp(&promoted.key_for(&b.name)));
            wildcard_bucket.sort_by(|a, b| demoted.key_for(&a.name).cmp(&demoted.key_for(&b.name)));
            demoted_bucket.sort_by(|a, b| demoted.key_for(&a.name).cmp(&demoted.key_for(&b.name)));

            promoted_bucket
                .into_iter()
                .chain(wildcard_bucket)
                .chain(demoted_bucket)
                .collect()
        }
        None => {
            let index = OrderIndex::new(names);
            let mut groups = groups;
            groups.sort_by(|a, b| index.key_for(&a.name).cmp(&index.key_for(&b.name)));
            groups
        }
    };

    for group in &mut ordered {
        if let Some(nested) = spec.nested(&group.name) {
            let endpoints = std::mem::take(&mut group.endpoints);
            group.endpoints = order_endpoints(endpoints, nested);
        }
    }

    ordered
}

/// Sort key of an endpoint within its group.
///
/// `within` places endpoints inside their subgroup's block; endpoints the sub-order does not
/// list get `usize::MAX` and follow the listed ones. They never sort ahead of a listed entry,
/// whatever its position in the sub-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EndpointKey {
    Positioned { index: usize, within: usize },
    Unbounded,
}

/// Key of `endpoint` under a second-level `spec`.
pub fn endpoint_key(endpoint: &Endpoint, spec: &OrderSpec) -> EndpointKey {
    let identifier = endpoint.order_identifier();
    if let Some(index) = spec.position(&identifier) {
        return EndpointKey::Positioned { index, within: 0 };
    }

    let subgroup = endpoint.metadata.subgroup.as_str();
    if !subgroup.is_empty() {
        if let Some(index) = spec.position(subgroup) {
            let within = spec
                .nested(subgroup)
                .and_then(|sub| sub.position(&identifier))
                .unwrap_or(usize::MAX);
            return EndpointKey::Positioned { index, within };
        }
    }

    EndpointKey::Unbounded
}

/// Order endpoints (and, through them, subgroups) by a second-level spec.
///
/// The sort is stable: endpoints with equal keys keep their incoming order.
pub fn order_endpoints(mut endpoints: Vec<Endpoint>, spec: &OrderSpec) -> Vec<Endpoint> {
    endpoints.sort_by_cached_key(|endpoint| endpoint_key(endpoint, spec));
    endpoints
}

fn log_unmatched<'a>(names: &[&str], actual: impl Iterator<Item = &'a str>, kind: &str) {
    let actual: Vec<&str> = actual.collect();
    for name in names {
        if *name != WILDCARD && !actual.contains(name) {
            debug!("Order spec names {} `{}`, which does not exist; ignoring", kind, name);
        }
    }
}
