//! Endpoint and group records shared by extraction, reconciliation, persistence and ordering.
//!
//! An [`Endpoint`] is split into seven named sections (see [`Stage`]). Extraction fills them one
//! stage at a time through an [`EndpointDraft`]; reconciliation compares and restores them as
//! whole units.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Parameters keyed by name, in declaration order.
pub type ParameterMap = IndexMap<String, Parameter>;

/// Example values of a parameter map with nested names expanded.
pub type CleanParameters = IndexMap<String, Value>;

/// One field category of endpoint data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Headers,
    UrlParameters,
    QueryParameters,
    BodyParameters,
    Responses,
    ResponseFields,
}

impl Stage {
    /// Sections in persisted/reconciliation order.
    pub const ALL: [Stage; 7] = [
        Stage::Metadata,
        Stage::Headers,
        Stage::UrlParameters,
        Stage::QueryParameters,
        Stage::BodyParameters,
        Stage::Responses,
        Stage::ResponseFields,
    ];

    /// Order in which stages run during extraction. Later stages may read earlier sections.
    pub const EXTRACTION_ORDER: [Stage; 7] = [
        Stage::Metadata,
        Stage::UrlParameters,
        Stage::QueryParameters,
        Stage::Headers,
        Stage::BodyParameters,
        Stage::Responses,
        Stage::ResponseFields,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::Headers => "headers",
            Stage::UrlParameters => "url_parameters",
            Stage::QueryParameters => "query_parameters",
            Stage::BodyParameters => "body_parameters",
            Stage::Responses => "responses",
            Stage::ResponseFields => "response_fields",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive block of an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub group_name: String,
    pub group_description: String,
    pub subgroup: String,
    pub subgroup_description: String,
    pub title: String,
    pub description: String,
    pub authenticated: bool,
}

/// Partial metadata produced by a single adapter.
///
/// `None` means "no opinion". An empty string never replaces a value an earlier adapter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataPatch {
    pub group_name: Option<String>,
    pub group_description: Option<String>,
    pub subgroup: Option<String>,
    pub subgroup_description: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub authenticated: Option<bool>,
}

impl MetadataPatch {
    /// Layer `other` on top of `self`.
    pub fn merge(&mut self, other: MetadataPatch) {
        fn layer(slot: &mut Option<String>, incoming: Option<String>) {
            if let Some(value) = incoming {
                if !value.is_empty() || slot.is_none() {
                    *slot = Some(value);
                }
            }
        }

        layer(&mut self.group_name, other.group_name);
        layer(&mut self.group_description, other.group_description);
        layer(&mut self.subgroup, other.subgroup);
        layer(&mut self.subgroup_description, other.subgroup_description);
        layer(&mut self.title, other.title);
        layer(&mut self.description, other.description);
        if other.authenticated.is_some() {
            self.authenticated = other.authenticated;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == MetadataPatch::default()
    }

    fn apply_to(self, metadata: &mut Metadata) {
        fn set(slot: &mut String, incoming: Option<String>) {
            if let Some(value) = incoming {
                if !value.is_empty() || slot.is_empty() {
                    *slot = value;
                }
            }
        }

        set(&mut metadata.group_name, self.group_name);
        set(&mut metadata.group_description, self.group_description);
        set(&mut metadata.subgroup, self.subgroup);
        set(&mut metadata.subgroup_description, self.subgroup_description);
        set(&mut metadata.title, self.title);
        set(&mut metadata.description, self.description);
        if let Some(authenticated) = self.authenticated {
            metadata.authenticated = authenticated;
        }
    }
}

/// A url, query or body parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    pub required: bool,
    pub example: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    pub nullable: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            ..Default::default()
        }
    }
}

/// A sample response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub status: u16,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    pub description: Option<String>,
}

/// Documentation for one field of a response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
    pub required: bool,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
}

/// A fully assembled endpoint.
///
/// The `clean_*` maps are derived from the parameter maps for renderers and are never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub http_methods: Vec<String>,
    pub uri: String,
    pub metadata: Metadata,
    pub headers: IndexMap<String, String>,
    pub url_parameters: ParameterMap,
    pub query_parameters: ParameterMap,
    pub body_parameters: ParameterMap,
    pub responses: Vec<Response>,
    pub response_fields: IndexMap<String, ResponseField>,
    #[serde(skip)]
    pub clean_url_parameters: CleanParameters,
    #[serde(skip)]
    pub clean_query_parameters: CleanParameters,
    #[serde(skip)]
    pub clean_body_parameters: CleanParameters,
}

impl Endpoint {
    /// Stable identifier: first method plus the uri with every non-alphanumeric character
    /// replaced by `-`.
    pub fn endpoint_id(&self) -> String {
        let method = self.http_methods.first().map(String::as_str).unwrap_or("");
        let uri: String = self
            .uri
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{}{}", method, uri)
    }

    /// Identifier used in order specs, e.g. `GET /users/{id}`.
    pub fn order_identifier(&self) -> String {
        let method = self.http_methods.first().map(String::as_str).unwrap_or("");
        format!("{} /{}", method, self.uri.trim_start_matches('/'))
    }

    /// Whether `other` describes the same route (same uri and method list).
    pub fn same_identity(&self, other: &Endpoint) -> bool {
        self.uri == other.uri && self.http_methods == other.http_methods
    }

    /// Deep equality of a single section.
    pub fn section_eq(&self, other: &Endpoint, stage: Stage) -> bool {
        match stage {
            Stage::Metadata => self.metadata == other.metadata,
            Stage::Headers => self.headers == other.headers,
            Stage::UrlParameters => self.url_parameters == other.url_parameters,
            Stage::QueryParameters => self.query_parameters == other.query_parameters,
            Stage::BodyParameters => self.body_parameters == other.body_parameters,
            Stage::Responses => self.responses == other.responses,
            Stage::ResponseFields => self.response_fields == other.response_fields,
        }
    }

    /// Overwrite one section with the value held by `source`.
    pub fn restore_section(&mut self, source: &Endpoint, stage: Stage) {
        match stage {
            Stage::Metadata => self.metadata = source.metadata.clone(),
            Stage::Headers => self.headers = source.headers.clone(),
            Stage::UrlParameters => self.url_parameters = source.url_parameters.clone(),
            Stage::QueryParameters => self.query_parameters = source.query_parameters.clone(),
            Stage::BodyParameters => self.body_parameters = source.body_parameters.clone(),
            Stage::Responses => self.responses = source.responses.clone(),
            Stage::ResponseFields => self.response_fields = source.response_fields.clone(),
        }
    }

    /// Recompute the example-only parameter maps.
    pub fn refresh_clean_parameters(&mut self) {
        self.clean_url_parameters = clean_parameters(&self.url_parameters);
        self.clean_query_parameters = clean_parameters(&self.query_parameters);
        self.clean_body_parameters = clean_parameters(&self.body_parameters);
    }
}

/// A named group of endpoints, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub name: String,
    pub description: String,
    pub endpoints: Vec<Endpoint>,
}

/// An endpoint being built stage by stage.
///
/// Adapters only ever see a shared reference; the assembler owns the draft and applies each
/// stage's merged output before running the next stage.
#[derive(Debug, Clone)]
pub struct EndpointDraft {
    endpoint: Endpoint,
    authenticated_set: bool,
}

impl EndpointDraft {
    /// Start a draft for a route. `HEAD` is dropped when other methods are present.
    pub fn new(methods: &[String], uri: &str) -> Self {
        let mut http_methods: Vec<String> = methods.iter().map(|m| m.to_uppercase()).collect();
        if http_methods.len() > 1 {
            http_methods.retain(|m| m != "HEAD");
        }

        Self {
            endpoint: Endpoint {
                http_methods,
                uri: uri.to_string(),
                ..Default::default()
            },
            authenticated_set: false,
        }
    }

    /// The endpoint as built so far.
    pub fn current(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn authenticated_was_set(&self) -> bool {
        self.authenticated_set
    }

    pub fn apply_metadata(&mut self, patch: MetadataPatch) {
        if patch.authenticated.is_some() {
            self.authenticated_set = true;
        }
        patch.apply_to(&mut self.endpoint.metadata);
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.endpoint.metadata
    }

    pub fn headers_mut(&mut self) -> &mut IndexMap<String, String> {
        &mut self.endpoint.headers
    }

    /// Mutable access to the parameter map backing a parameter stage.
    pub fn parameters_mut(&mut self, stage: Stage) -> Option<&mut ParameterMap> {
        match stage {
            Stage::UrlParameters => Some(&mut self.endpoint.url_parameters),
            Stage::QueryParameters => Some(&mut self.endpoint.query_parameters),
            Stage::BodyParameters => Some(&mut self.endpoint.body_parameters),
            _ => None,
        }
    }

    pub fn responses_mut(&mut self) -> &mut Vec<Response> {
        &mut self.endpoint.responses
    }

    pub fn response_fields_mut(&mut self) -> &mut IndexMap<String, ResponseField> {
        &mut self.endpoint.response_fields
    }

    /// Freeze the draft, deriving the clean parameter maps.
    pub fn finish(self) -> Endpoint {
        let mut endpoint = self.endpoint;
        endpoint.refresh_clean_parameters();
        endpoint
    }
}

/// Build the example-only view of a parameter map.
///
/// Optional parameters without an example are left out. Dotted names expand into nested
/// objects; a `[]` suffix or a `*` segment marks an array whose single element is described.
pub fn clean_parameters(parameters: &ParameterMap) -> CleanParameters {
    let mut clean = CleanParameters::new();

    for (name, parameter) in parameters {
        if parameter.example.is_none() && !parameter.required {
            continue;
        }
        let example = parameter.example.clone().unwrap_or(Value::Null);

        if name.contains('.') || name.ends_with("[]") {
            let segments = split_parameter_name(name);
            insert_nested(&mut clean, &segments, example);
        } else if !matches!(clean.get(name), Some(Value::Object(_)) | Some(Value::Array(_))) {
            clean.insert(name.clone(), example);
        }
    }

    clean
}

#[derive(Debug, PartialEq)]
enum Segment {
    Key(String),
    Item,
}

fn split_parameter_name(name: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in name.split('.') {
        if part == "*" {
            segments.push(Segment::Item);
            continue;
        }
        let mut key = part;
        let mut items = 0;
        while let Some(stripped) = key.strip_suffix("[]") {
            key = stripped;
            items += 1;
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }
        for _ in 0..items {
            segments.push(Segment::Item);
        }
    }
    segments
}

fn insert_nested(root: &mut CleanParameters, segments: &[Segment], example: Value) {
    let Some((Segment::Key(first), rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        // A parent declared after its children must not wipe them.
        if !matches!(root.get(first), Some(Value::Object(_)) | Some(Value::Array(_))) {
            root.insert(first.clone(), example);
        }
        return;
    }
    let slot = root.entry(first.clone()).or_insert(Value::Null);
    insert_into_value(slot, rest, example);
}

fn insert_into_value(slot: &mut Value, segments: &[Segment], example: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        if !matches!(slot, Value::Object(_) | Value::Array(_)) {
            *slot = example;
        }
        return;
    };

    match segment {
        Segment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(map) = slot {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                insert_into_value(child, rest, example);
            }
        }
        Segment::Item => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                if items.is_empty() {
                    items.push(Value::Null);
                }
                insert_into_value(&mut items[0], rest, example);
            }
        }
    }
}
