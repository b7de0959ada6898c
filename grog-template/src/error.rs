//! Error types for grog-template.

use std::path::PathBuf;

use thiserror::Error;

/// A template failed to compile. Nothing is installed in the cache.
#[derive(Debug, Error)]
#[error("{template}:{line}: {kind}")]
pub struct ParseError {
    /// Name of the template being compiled.
    pub template: String,
    /// 1-based line of the offending directive.
    pub line: usize,
    pub kind: ParseErrorKind,
}

/// What was wrong with the template text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unterminated directive (missing {right:?})")]
    UnterminatedDirective { right: String },

    #[error("newline inside directive")]
    NewlineInDirective,

    #[error("empty directive")]
    EmptyDirective,

    #[error("invalid field name {0:?}")]
    InvalidFieldName(String),

    #[error("unknown directive {0:?}")]
    UnknownDirective(String),

    #[error("{0} requires a field path")]
    MissingPath(&'static str),

    #[error(".include requires a template name")]
    MissingIncludeName,

    #[error("{0} outside of a section")]
    Unexpected(&'static str),

    #[error("duplicate .or in section {0:?}")]
    DuplicateOr(String),

    #[error(".alternates with is only allowed in a repeated section, before .or ({0:?})")]
    MisplacedAlternates(String),

    #[error("section {0:?} is never closed with .end")]
    UnclosedSection(String),

    #[error("unknown formatter {0:?}")]
    UnknownFormatter(String),

    #[error("template text is not valid UTF-8")]
    InvalidUtf8,
}

/// A template source could not be produced by the [`SourceProvider`](crate::SourceProvider).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("template {0:?} not found")]
    NotFound(String),

    /// The name cannot be mapped to a source (e.g. escapes the asset root).
    #[error("invalid template name {0:?}")]
    InvalidName(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// A formatter rejected its argument text or its input values.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid arguments: {0}")]
    Args(String),

    #[error("invalid value: {0}")]
    Value(String),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    pub fn args(msg: impl Into<String>) -> Self {
        FormatError::Args(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        FormatError::Value(msg.into())
    }
}

/// A named query failed to produce rows.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        QueryError { message: message.into() }
    }
}

/// All errors that can arise from rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template (or an included one) does not compile.
    #[error("template parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("cannot load template {name:?}: {source}")]
    Source {
        name: String,
        #[source]
        source: SourceError,
    },

    /// A formatter failed at render time. The template itself is well formed.
    #[error("{template}:{line}: formatter {formatter:?} failed: {source}")]
    Formatter {
        template: String,
        line: usize,
        formatter: String,
        #[source]
        source: FormatError,
    },

    #[error("{template}:{line}: unknown named query {name:?}")]
    UnknownQuery {
        template: String,
        line: usize,
        name: String,
    },

    #[error("named query {name:?} failed: {source}")]
    Query {
        name: String,
        #[source]
        source: QueryError,
    },

    #[error("{template}:{line}: repeated section {path:?} is not a sequence")]
    NotASequence {
        template: String,
        line: usize,
        path: String,
    },

    #[error("include depth exceeded {max_depth} while including {name:?}")]
    IncludeDepth { name: String, max_depth: usize },

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rendered output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
