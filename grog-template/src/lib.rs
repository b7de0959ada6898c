//! # grog-template
//!
//! The template engine behind the grog blog: a small directive language,
//! a compiled-template cache, and a registry of named formatters.
//!
//! ## Usage
//!
//! ```rust
//! use grog_template::{Engine, FormatterRegistry, MemorySource, NamedQueries, TemplateData, Value};
//!
//! let source = MemorySource::new()
//!     .with("post", "<h1>{model.title|html}</h1>{.section model.tags}tagged{.end}");
//! let engine = Engine::new(source, FormatterRegistry::new());
//!
//! let model: Value = serde_json::json!({ "title": "Fish & chips", "tags": [] }).into();
//! let queries = NamedQueries::new();
//! let mut data = TemplateData::new(model, &queries);
//!
//! let html = engine.render_to_string("post", &mut data).unwrap();
//! assert_eq!(html, "<h1>Fish &amp; chips</h1>");
//! ```

pub mod data;
pub mod engine;
pub mod error;
mod exec;
pub mod format;
pub mod pagination;
pub mod parser;
pub mod source;
pub mod template;
pub mod value;

pub use data::{Cookie, NamedQueries, RequestState, Row, TemplateData, Transport, MODEL_KEY};
pub use engine::{Engine, EngineConfig};
pub use error::{FormatError, ParseError, ParseErrorKind, QueryError, RenderError, SourceError};
pub use format::{FormatterFn, FormatterRegistry};
pub use parser::{compile, Delimiters};
pub use source::{DirSource, MemorySource, SourceProvider};
pub use template::CompiledTemplate;
pub use value::{Elemlist, Value};
