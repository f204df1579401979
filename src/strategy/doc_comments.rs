//! Extraction from handler doc comments.
//!
//! ```text
//! /// Show a user
//! ///
//! /// Returns the full profile.
//! ///
//! /// @group Users
//! /// @authenticated
//! /// @urlParam id integer required The user ID. Example: 4
//! /// @queryParam include string Relations to load. Enum: posts, roles. Example: posts
//! /// @header X-Tenant acme
//! /// @response 200 {"id": 4, "name": "Ada"}
//! /// @responseField name The display name.
//! ```
//!
//! The first paragraph is the title and the remaining untagged text the description.
//! Response fields without a type take the type of the matching key in the first
//! successful JSON response extracted earlier.

use crate::config::RunContext;
use crate::model::{
    Endpoint, EndpointDraft, MetadataPatch, Parameter, ParameterMap, Response, ResponseField, Stage,
};
use crate::parser::DocIndex;
use crate::route::Route;
use crate::strategy::{SectionValue, Strategy};
use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::sync::Arc;

/// A doc comment split into free text and `@tags`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocBlock {
    pub title: String,
    pub description: String,
    pub tags: Vec<DocTag>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocTag {
    /// Tag name without the `@`
    pub name: String,
    /// Everything after the name, continuation lines joined with `\n`
    pub content: String,
}

/// Split doc lines into title, description and tags.
pub fn parse_doc_block(lines: &[String]) -> DocBlock {
    let mut paragraphs: Vec<Vec<&str>> = vec![Vec::new()];
    let mut tags: Vec<DocTag> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if let Some(tag) = trimmed.strip_prefix('@') {
            let (name, content) = match tag.split_once(char::is_whitespace) {
                Some((name, content)) => (name, content.trim()),
                None => (tag, ""),
            };
            tags.push(DocTag {
                name: name.to_string(),
                content: content.to_string(),
            });
        } else if let Some(tag) = tags.last_mut() {
            if !trimmed.is_empty() {
                if !tag.content.is_empty() {
                    tag.content.push('\n');
                }
                tag.content.push_str(trimmed);
            }
        } else if trimmed.is_empty() {
            if paragraphs.last().is_some_and(|p| !p.is_empty()) {
                paragraphs.push(Vec::new());
            }
        } else if let Some(paragraph) = paragraphs.last_mut() {
            paragraph.push(trimmed);
        }
    }

    let mut paragraphs = paragraphs.into_iter().filter(|p| !p.is_empty());
    let title = paragraphs.next().map(|p| p.join(" ")).unwrap_or_default();
    let description = paragraphs
        .map(|p| p.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n");

    DocBlock {
        title,
        description,
        tags,
    }
}

impl DocBlock {
    fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DocTag> + 'a {
        self.tags.iter().filter(move |tag| tag.name == name)
    }

    fn has_tag(&self, name: &str) -> bool {
        self.tags_named(name).next().is_some()
    }

    /// Output for one stage, or `None` when the block says nothing about it.
    pub fn section(&self, stage: Stage, current: &Endpoint) -> Result<Option<SectionValue>> {
        let value = match stage {
            Stage::Metadata => {
                let patch = self.metadata();
                (!patch.is_empty()).then_some(SectionValue::Metadata(patch))
            }
            Stage::UrlParameters => self.parameters("urlParam")?,
            Stage::QueryParameters => self.parameters("queryParam")?,
            Stage::BodyParameters => self.parameters("bodyParam")?,
            Stage::Headers => {
                let mut headers = IndexMap::new();
                for tag in self.tags_named("header") {
                    let Some((name, value)) = tag.content.split_once(char::is_whitespace) else {
                        bail!("@header needs a name and a value, got `{}`", tag.content);
                    };
                    headers.insert(name.to_string(), value.trim().to_string());
                }
                (!headers.is_empty()).then_some(SectionValue::Headers(headers))
            }
            Stage::Responses => {
                let responses: Vec<Response> =
                    self.tags_named("response").map(|tag| parse_response(&tag.content)).collect();
                (!responses.is_empty()).then_some(SectionValue::Responses(responses))
            }
            Stage::ResponseFields => {
                let mut fields = IndexMap::new();
                for tag in self.tags_named("responseField") {
                    let mut field = parse_response_field(&tag.content)?;
                    if field.field_type.is_empty() {
                        field.field_type = infer_field_type(&field.name, &current.responses);
                    }
                    fields.insert(field.name.clone(), field);
                }
                (!fields.is_empty()).then_some(SectionValue::ResponseFields(fields))
            }
        };
        Ok(value)
    }

    fn metadata(&self) -> MetadataPatch {
        let mut patch = MetadataPatch::default();
        if !self.title.is_empty() {
            patch.title = Some(self.title.clone());
        }
        if !self.description.is_empty() {
            patch.description = Some(self.description.clone());
        }
        if let Some(tag) = self.tags_named("group").next() {
            let (name, rest) = split_first_line(&tag.content);
            patch.group_name = Some(name.to_string());
            if !rest.is_empty() {
                patch.group_description = Some(rest.to_string());
            }
        }
        if let Some(tag) = self.tags_named("subgroup").next() {
            let (name, rest) = split_first_line(&tag.content);
            patch.subgroup = Some(name.to_string());
            if !rest.is_empty() {
                patch.subgroup_description = Some(rest.to_string());
            }
        }
        if let Some(tag) = self.tags_named("subgroupDescription").next() {
            patch.subgroup_description = Some(tag.content.clone());
        }
        if self.has_tag("authenticated") {
            patch.authenticated = Some(true);
        } else if self.has_tag("unauthenticated") {
            patch.authenticated = Some(false);
        }
        patch
    }

    fn parameters(&self, tag_name: &str) -> Result<Option<SectionValue>> {
        let mut params = ParameterMap::new();
        for tag in self.tags_named(tag_name) {
            let Some(param) = parse_parameter(&tag.content) else {
                bail!("@{} without a parameter name", tag_name);
            };
            params.insert(param.name.clone(), param);
        }
        Ok((!params.is_empty()).then_some(SectionValue::Parameters(params)))
    }
}

fn split_first_line(content: &str) -> (&str, &str) {
    match content.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest.trim()),
        None => (content.trim(), ""),
    }
}

/// Normalise a type word, or `None` if the word is not a type.
fn normalize_type(word: &str) -> Option<String> {
    let (base, suffix) = match word.strip_suffix("[]") {
        Some(base) => (base, "[]"),
        None => (word, ""),
    };
    let base = match base.to_ascii_lowercase().as_str() {
        "string" | "str" => "string",
        "integer" | "int" => "integer",
        "number" | "float" | "double" => "number",
        "boolean" | "bool" => "boolean",
        "object" => "object",
        "array" => "array",
        "file" => "file",
        _ => return None,
    };
    Some(format!("{}{}", base, suffix))
}

/// Parse a JSON literal, falling back to the raw text.
fn literal(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() || text == "No-example" {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(text.to_string())),
    }
}

/// `name [type] [required] [nullable] description [Enum: a, b] [Example: value]`
fn parse_parameter(content: &str) -> Option<Parameter> {
    let mut words = content.split_whitespace().peekable();
    let name = words.next()?;
    let mut param = Parameter::new(name, "string");

    if let Some(param_type) = words.peek().and_then(|w| normalize_type(w)) {
        param.param_type = param_type;
        words.next();
    }
    while let Some(word) = words.peek() {
        match *word {
            "required" => param.required = true,
            "optional" => param.required = false,
            "nullable" => param.nullable = true,
            _ => break,
        }
        words.next();
    }

    let mut description = words.collect::<Vec<_>>().join(" ");
    if let Some(index) = description.rfind("Example:") {
        param.example = literal(&description[index + "Example:".len()..]);
        description.truncate(index);
    }
    if let Some(index) = description.rfind("Enum:") {
        let values = description[index + "Enum:".len()..].trim().trim_end_matches('.');
        param.enum_values = values.split(',').filter_map(literal).collect();
        description.truncate(index);
    }
    param.description = description.trim().to_string();
    Some(param)
}

/// `[status] [scenario="..."] content`
fn parse_response(content: &str) -> Response {
    let mut rest = content.trim();
    let mut response = Response {
        status: 200,
        ..Default::default()
    };

    let first = rest.split_whitespace().next().unwrap_or("");
    if first.len() == 3 {
        if let Ok(status) = first.parse::<u16>() {
            response.status = status;
            rest = rest[first.len()..].trim_start();
        }
    }
    if let Some(after) = rest.strip_prefix("scenario=\"") {
        if let Some(end) = after.find('"') {
            response.description = Some(after[..end].to_string());
            rest = after[end + 1..].trim_start();
        }
    }
    if !rest.is_empty() {
        response.content = Some(rest.to_string());
    }
    response
}

/// `name [type] [required] description [Enum: a, b]`
fn parse_response_field(content: &str) -> Result<ResponseField> {
    let mut words = content.split_whitespace().peekable();
    let Some(name) = words.next() else {
        bail!("@responseField without a field name");
    };
    let mut field = ResponseField {
        name: name.to_string(),
        ..Default::default()
    };
    if let Some(field_type) = words.peek().and_then(|w| normalize_type(w)) {
        field.field_type = field_type;
        words.next();
    }
    if words.peek() == Some(&"required") {
        field.required = true;
        words.next();
    }

    let mut description = words.collect::<Vec<_>>().join(" ");
    if let Some(index) = description.rfind("Enum:") {
        let values = description[index + "Enum:".len()..].trim().trim_end_matches('.');
        field.enum_values = values.split(',').filter_map(literal).collect();
        description.truncate(index);
    }
    field.description = description.trim().to_string();
    Ok(field)
}

/// Type of `name` (dotted path) in the first successful JSON response, or `""`.
pub fn infer_field_type(name: &str, responses: &[Response]) -> String {
    let segments: Vec<&str> = name.split('.').filter(|s| *s != "*" && *s != "[]").collect();

    for response in responses.iter().filter(|r| (200..300).contains(&r.status)) {
        let Some(content) = &response.content else {
            continue;
        };
        let Ok(body) = serde_json::from_str::<Value>(content) else {
            continue;
        };
        let found = lookup(&body, &segments)
            .or_else(|| body.get("data").and_then(|d| lookup(d, &segments)));
        if let Some(value) = found {
            return json_type(value).to_string();
        }
    }
    String::new()
}

fn lookup<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    let mut current = value;
    for segment in segments {
        while let Value::Array(items) = current {
            current = items.first()?;
        }
        current = current.get(segment.trim_end_matches("[]"))?;
    }
    Some(current)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads the handler's doc comment from a [`DocIndex`].
pub struct DocCommentStrategy {
    docs: Option<Arc<DocIndex>>,
}

impl DocCommentStrategy {
    pub fn new(docs: Option<Arc<DocIndex>>) -> Self {
        Self { docs }
    }
}

impl Strategy for DocCommentStrategy {
    fn invoke(
        &self,
        stage: Stage,
        draft: &EndpointDraft,
        route: &Route,
        _ctx: &RunContext,
    ) -> Result<Option<SectionValue>> {
        let (Some(docs), Some(handler)) = (&self.docs, &route.handler) else {
            return Ok(None);
        };
        let Some(doc) = docs.lookup(handler) else {
            debug!("No doc comment found for handler {}", handler);
            return Ok(None);
        };
        parse_doc_block(&doc.doc).section(stage, draft.current())
    }
}
