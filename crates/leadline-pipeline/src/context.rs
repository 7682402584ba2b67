//! Template resolver for step-to-step data flow.
//!
//! Renders `{{ expression }}` templates in step instructions, fallbacks and
//! delivery payloads against the run argument and the outputs of earlier
//! steps.
//!
//! # Template Syntax
//!
//! - `{{ args[0] }}` or `{{ input }}`: the run argument
//! - `{{ parent.output }}`: output of the immediately preceding step
//! - `{{ step_id.output }}`: output of an earlier step by id
//! - `{{ steps[2].output }}`: output of an earlier step by position
//! - `{{ memory.web_scrape }}`: latest off-prompt payload stored by a tool
//! - `{{ args[0] | email_domain | domain_stem }}`: filters, applied left to right
//!
//! Whitespace inside the braces is ignored. An unclosed `{{` is left as text.

use std::collections::HashMap;
use std::fmt;

use leadline_agent::{ToolMemory, payload_to_text};
use serde_json::Value;

use crate::error::UnresolvedReferenceError;
use crate::run::RecordedOutput;

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// What an expression points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Argument,
    Parent,
    Step(String),
    Position(usize),
    Memory(String),
}

/// Text transformation applied after a reference resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// `a@b.com` → `b.com`
    EmailDomain,
    /// `www.acme.co.uk` → `acme`
    DomainStem,
    Trim,
    Lower,
}

impl Filter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "email_domain" => Some(Self::EmailDomain),
            "domain_stem" => Some(Self::DomainStem),
            "trim" => Some(Self::Trim),
            "lower" => Some(Self::Lower),
            _ => None,
        }
    }

    fn apply(self, text: &str) -> String {
        match self {
            Self::EmailDomain => {
                let text = text.trim();
                text.rsplit_once('@')
                    .map_or(text, |(_, domain)| domain)
                    .to_string()
            }
            Self::DomainStem => {
                let host = text.trim();
                let host = host
                    .split_once("://")
                    .map_or(host, |(_, rest)| rest)
                    .split(['/', ':'])
                    .next()
                    .unwrap_or_default();
                let host = host.strip_prefix("www.").unwrap_or(host);
                host.split('.').next().unwrap_or_default().to_string()
            }
            Self::Trim => text.trim().to_string(),
            Self::Lower => text.to_lowercase(),
        }
    }
}

/// A parsed `{{ ... }}` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Inner text as written, trimmed.
    pub source: String,
    pub reference: Reference,
    pub filters: Vec<Filter>,
}

impl Expression {
    /// Parse the text between the braces.
    pub fn parse(source: &str) -> Result<Self, UnresolvedReferenceError> {
        let source = source.trim();
        let mut parts = source.split('|').map(str::trim);
        let path = parts.next().unwrap_or_default();

        let reference = parse_reference(path).ok_or_else(|| {
            UnresolvedReferenceError::new(
                source,
                format!(
                    "'{}' is not a reference; use args[0], input, parent.output, \
                     <step_id>.output, steps[N].output or memory.<tool>",
                    path
                ),
            )
        })?;

        let filters = parts
            .map(|name| {
                Filter::parse(name).ok_or_else(|| {
                    UnresolvedReferenceError::new(source, format!("unknown filter '{}'", name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: source.to_string(),
            reference,
            filters,
        })
    }
}

fn parse_reference(path: &str) -> Option<Reference> {
    let segments = parse_path_segments(path);
    match segments.as_slice() {
        [only] if only.name == "input" && only.index.is_none() => Some(Reference::Argument),
        [only] if only.name == "args" && only.index == Some(0) => Some(Reference::Argument),
        [root, field]
            if root.name == "parent"
                && root.index.is_none()
                && field.name == "output"
                && field.index.is_none() =>
        {
            Some(Reference::Parent)
        }
        [root, field] if root.name == "steps" && field.name == "output" && field.index.is_none() => {
            root.index.map(Reference::Position)
        }
        [root, tool] if root.name == "memory" && root.index.is_none() && tool.index.is_none() => {
            (!tool.name.is_empty()).then(|| Reference::Memory(tool.name.clone()))
        }
        [root, field]
            if field.name == "output"
                && field.index.is_none()
                && root.index.is_none()
                && is_identifier(&root.name) =>
        {
            Some(Reference::Step(root.name.clone()))
        }
        _ => None,
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expr(Expression),
}

/// A parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    /// Parse a template, rejecting malformed expressions and unknown filters.
    pub fn parse(source: &str) -> Result<Self, UnresolvedReferenceError> {
        let mut parts = Vec::new();
        let mut remaining = source;

        while let Some(start) = remaining.find("{{") {
            let Some(end) = remaining[start..].find("}}") else {
                break; // Unclosed `{{` stays literal
            };
            let inner = &remaining[start + 2..start + end];
            let full_end = start + end + 2;

            if inner.trim().is_empty() {
                parts.push(Part::Literal(remaining[..full_end].to_string()));
            } else {
                if start > 0 {
                    parts.push(Part::Literal(remaining[..start].to_string()));
                }
                parts.push(Part::Expr(Expression::parse(inner)?));
            }
            remaining = &remaining[full_end..];
        }
        if !remaining.is_empty() {
            parts.push(Part::Literal(remaining.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every expression in the template, in order of appearance.
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.parts.iter().filter_map(|p| match p {
            Part::Expr(e) => Some(e),
            Part::Literal(_) => None,
        })
    }

    /// Check that every reference points strictly before `position`.
    ///
    /// `step_ids` maps every step id in the pipeline to its position.
    pub fn check_scope(
        &self,
        position: usize,
        step_ids: &HashMap<String, usize>,
    ) -> Result<(), UnresolvedReferenceError> {
        for expr in self.expressions() {
            match &expr.reference {
                Reference::Argument | Reference::Memory(_) => {}
                Reference::Parent if position == 0 => {
                    return Err(UnresolvedReferenceError::new(
                        &expr.source,
                        "the first step has no parent",
                    ));
                }
                Reference::Parent => {}
                Reference::Position(n) if *n >= position => {
                    return Err(UnresolvedReferenceError::new(
                        &expr.source,
                        format!("step {} does not run before step {}", n, position),
                    ));
                }
                Reference::Position(_) => {}
                Reference::Step(id) => match step_ids.get(id) {
                    None => {
                        return Err(UnresolvedReferenceError::new(
                            &expr.source,
                            format!("no step has id '{}'", id),
                        ));
                    }
                    Some(&at) if at >= position => {
                        return Err(UnresolvedReferenceError::new(
                            &expr.source,
                            format!("step '{}' does not run before step {}", id, position),
                        ));
                    }
                    Some(_) => {}
                },
            }
        }
        Ok(())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse every string leaf of a JSON payload template.
pub fn parse_value_templates(value: &Value) -> Result<Vec<Template>, UnresolvedReferenceError> {
    let mut templates = Vec::new();
    collect_templates(value, &mut templates)?;
    Ok(templates)
}

fn collect_templates(
    value: &Value,
    out: &mut Vec<Template>,
) -> Result<(), UnresolvedReferenceError> {
    match value {
        Value::String(s) => out.push(Template::parse(s)?),
        Value::Object(map) => {
            for v in map.values() {
                collect_templates(v, out)?;
            }
        }
        Value::Array(arr) => {
            for v in arr {
                collect_templates(v, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves templates against the state of a run at one step.
///
/// The outputs slice holds exactly the steps that ran before the current
/// one, so anything not found in it is out of scope.
pub struct ContextResolver<'a> {
    argument: &'a str,
    outputs: &'a [RecordedOutput],
    memory: Option<&'a ToolMemory>,
}

impl<'a> ContextResolver<'a> {
    pub fn new(argument: &'a str, outputs: &'a [RecordedOutput]) -> Self {
        Self {
            argument,
            outputs,
            memory: None,
        }
    }

    /// Make `{{ memory.<tool> }}` references resolvable.
    pub fn with_memory(mut self, memory: &'a ToolMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Render a parsed template.
    pub fn render(&self, template: &Template) -> Result<String, UnresolvedReferenceError> {
        let mut rendered = String::with_capacity(template.source.len());
        for part in &template.parts {
            match part {
                Part::Literal(text) => rendered.push_str(text),
                Part::Expr(expr) => rendered.push_str(&self.resolve(expr)?),
            }
        }
        Ok(rendered)
    }

    /// Parse and render a template string.
    pub fn render_str(&self, template: &str) -> Result<String, UnresolvedReferenceError> {
        self.render(&Template::parse(template)?)
    }

    /// Render every string leaf in a JSON value tree.
    ///
    /// Non-string leaves are returned unchanged.
    pub fn render_value(&self, value: &Value) -> Result<Value, UnresolvedReferenceError> {
        match value {
            Value::String(s) => Ok(Value::String(self.render_str(s)?)),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::new();
                for (k, v) in map {
                    resolved.insert(k.clone(), self.render_value(v)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(arr) => {
                let resolved: Result<Vec<Value>, _> =
                    arr.iter().map(|v| self.render_value(v)).collect();
                Ok(Value::Array(resolved?))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve one expression to text, filters applied.
    pub fn resolve(&self, expr: &Expression) -> Result<String, UnresolvedReferenceError> {
        let mut text = match &expr.reference {
            Reference::Argument => self.argument.to_string(),
            Reference::Parent => self
                .outputs
                .last()
                .map(|r| r.output.render().to_string())
                .ok_or_else(|| {
                    UnresolvedReferenceError::new(&expr.source, "the first step has no parent")
                })?,
            Reference::Position(n) => self
                .outputs
                .get(*n)
                .map(|r| r.output.render().to_string())
                .ok_or_else(|| {
                    UnresolvedReferenceError::new(
                        &expr.source,
                        format!(
                            "step {} does not run before step {}",
                            n,
                            self.outputs.len()
                        ),
                    )
                })?,
            Reference::Step(id) => self
                .outputs
                .iter()
                .find(|r| r.step_id.as_deref() == Some(id.as_str()))
                .map(|r| r.output.render().to_string())
                .ok_or_else(|| {
                    UnresolvedReferenceError::new(
                        &expr.source,
                        format!("no earlier step has id '{}'", id),
                    )
                })?,
            Reference::Memory(tool) => self
                .memory
                .and_then(|m| m.latest(tool))
                .map(|payload| payload_to_text(&payload))
                .ok_or_else(|| {
                    UnresolvedReferenceError::new(
                        &expr.source,
                        format!("'{}' has stored nothing in this run", tool),
                    )
                })?,
        };

        for filter in &expr.filters {
            text = filter.apply(&text);
        }
        Ok(text)
    }
}

/// Render a template string against an argument and prior outputs.
pub fn render(
    template: &str,
    argument: &str,
    prior_outputs: &[RecordedOutput],
) -> Result<String, UnresolvedReferenceError> {
    ContextResolver::new(argument, prior_outputs).render_str(template)
}

// ---------------------------------------------------------------------------
// Path parsing
// ---------------------------------------------------------------------------

/// A segment of a dot-separated path, optionally with an array index.
#[derive(Debug)]
struct PathSegment {
    name: String,
    index: Option<usize>,
}

/// Parse a dot-separated path into segments, handling array indices.
///
/// `"steps[1].output"` → `[("steps", Some(1)), ("output", None)]`
fn parse_path_segments(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .map(|part| {
            if let Some(bracket_start) = part.find('[')
                && let Some(bracket_end) = part.find(']')
                && bracket_end > bracket_start
            {
                let name = part[..bracket_start].trim().to_string();
                let index = part[bracket_start + 1..bracket_end].trim().parse::<usize>().ok();
                return PathSegment { name, index };
            }
            PathSegment {
                name: part.trim().to_string(),
                index: None,
            }
        })
        .collect()
}
