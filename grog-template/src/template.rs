//! Compiled template representation.

use std::fmt;

/// A dotted field path such as `model.author.name`. The empty path is `@`,
/// the current cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn cursor() -> Self {
        FieldPath { segments: Vec::new() }
    }

    pub fn new(segments: Vec<String>) -> Self {
        FieldPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_cursor(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cursor() {
            f.write_str("@")
        } else {
            f.write_str(&self.segments.join("."))
        }
    }
}

/// One positional parameter of a named query invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Literal(String),
    /// `$path` — resolved against the render data.
    Field(FieldPath),
}

/// Where a field directive gets its values from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Paths(Vec<FieldPath>),
    Query { name: String, params: Vec<QueryParam> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub source: FieldSource,
    /// Empty for the default formatter.
    pub formatter: String,
    /// Everything after the formatter name, handed over verbatim.
    pub args: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub path: FieldPath,
    pub body: Vec<Node>,
    pub or_body: Option<Vec<Node>>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatedSection {
    pub path: FieldPath,
    pub body: Vec<Node>,
    pub alternates: Option<Vec<Node>>,
    pub or_body: Option<Vec<Node>>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    Field(Field),
    Section(Section),
    Repeated(RepeatedSection),
    Include { name: String, line: usize },
}

/// An immutable, compiled template. Shared behind `Arc` by the engine cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    name: String,
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    pub(crate) fn new(name: impl Into<String>, nodes: Vec<Node>) -> Self {
        CompiledTemplate { name: name.into(), nodes }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}
