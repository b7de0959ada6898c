//! Template execution: walks a [`CompiledTemplate`] against a
//! [`TemplateData`] and writes to a sink.

use std::io::Write;

use crate::data::TemplateData;
use crate::engine::Engine;
use crate::error::{FormatError, ParseError, ParseErrorKind, RenderError};
use crate::template::{
    CompiledTemplate, Field, FieldPath, FieldSource, Node, QueryParam, RepeatedSection, Section,
};
use crate::value::{Elemlist, Value};

/// Execute `template`, resolving `.include`s through `engine`.
pub(crate) fn execute(
    engine: &Engine,
    template: &CompiledTemplate,
    data: &mut TemplateData<'_>,
    w: &mut dyn Write,
) -> Result<(), RenderError> {
    let mut exec = Executor {
        engine,
        cursors: Vec::new(),
        depth: 0,
    };
    exec.run(template.name(), template.nodes(), data, w)
}

struct Executor<'e> {
    engine: &'e Engine,
    /// Section values, innermost last.
    cursors: Vec<Value>,
    /// Current `.include` nesting.
    depth: usize,
}

impl Executor<'_> {
    fn run(
        &mut self,
        tpl: &str,
        nodes: &[Node],
        data: &mut TemplateData<'_>,
        w: &mut dyn Write,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Literal(text) => w.write_all(text.as_bytes())?,
                Node::Field(field) => self.field(tpl, field, data, w)?,
                Node::Section(section) => self.section(tpl, section, data, w)?,
                Node::Repeated(repeated) => self.repeated(tpl, repeated, data, w)?,
                Node::Include { name, .. } => self.include(name, data, w)?,
            }
        }
        Ok(())
    }

    /// Resolve a path: the first segment is looked up in the cursors from the
    /// innermost out, then in the top-level data; the rest must follow from
    /// whatever matched.
    fn resolve(&self, path: &FieldPath, data: &TemplateData<'_>) -> Option<Value> {
        let Some((first, rest)) = path.segments().split_first() else {
            return Some(match self.cursors.last() {
                Some(cursor) => cursor.clone(),
                None => data.to_value(),
            });
        };
        let head = self
            .cursors
            .iter()
            .rev()
            .find_map(|cursor| cursor.lookup(first))
            .or_else(|| data.get(first))?;
        head.lookup_path(rest).cloned()
    }

    fn field(
        &mut self,
        tpl: &str,
        field: &Field,
        data: &mut TemplateData<'_>,
        w: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let values = match &field.source {
            FieldSource::Paths(paths) => {
                let resolved: Option<Vec<Value>> =
                    paths.iter().map(|p| self.resolve(p, data)).collect();
                match resolved {
                    Some(values) => values,
                    None => {
                        tracing::trace!(template = tpl, line = field.line, "unresolved field");
                        return Ok(());
                    }
                }
            }
            FieldSource::Query { name, params } => {
                vec![self.run_query(tpl, field.line, name, params, data)?]
            }
        };

        let formatter = self
            .engine
            .formatters()
            .get(&field.formatter)
            .ok_or_else(|| ParseError {
                template: tpl.to_string(),
                line: field.line,
                kind: ParseErrorKind::UnknownFormatter(field.formatter.clone()),
            })?;
        formatter(w, &field.args, data, &values).map_err(|e| match e {
            FormatError::Io(io) => RenderError::Io(io),
            other => RenderError::Formatter {
                template: tpl.to_string(),
                line: field.line,
                formatter: display_name(&field.formatter).to_string(),
                source: other,
            },
        })
    }

    fn run_query(
        &self,
        tpl: &str,
        line: usize,
        name: &str,
        params: &[QueryParam],
        data: &TemplateData<'_>,
    ) -> Result<Value, RenderError> {
        let params: Vec<Value> = params
            .iter()
            .map(|param| match param {
                QueryParam::Literal(text) => Value::from(text.as_str()),
                QueryParam::Field(path) => self.resolve(path, data).unwrap_or_default(),
            })
            .collect();
        let rows = match data.query(name, &params) {
            Some(result) => result.map_err(|source| RenderError::Query {
                name: name.to_string(),
                source,
            })?,
            None => {
                return Err(RenderError::UnknownQuery {
                    template: tpl.to_string(),
                    line,
                    name: name.to_string(),
                })
            }
        };
        tracing::debug!(query = name, rows = rows.len(), "named query");
        Ok(Value::List(rows.into_iter().collect::<Elemlist>()))
    }

    fn section(
        &mut self,
        tpl: &str,
        section: &Section,
        data: &mut TemplateData<'_>,
        w: &mut dyn Write,
    ) -> Result<(), RenderError> {
        match self.resolve(&section.path, data) {
            Some(value) if value.is_truthy() => self.with_cursor(value, |exec| {
                exec.run(tpl, &section.body, data, w)
            }),
            _ => match &section.or_body {
                Some(or_body) => self.run(tpl, or_body, data, w),
                None => Ok(()),
            },
        }
    }

    fn repeated(
        &mut self,
        tpl: &str,
        repeated: &RepeatedSection,
        data: &mut TemplateData<'_>,
        w: &mut dyn Write,
    ) -> Result<(), RenderError> {
        match self.resolve(&repeated.path, data) {
            Some(Value::List(items)) if !items.is_empty() => {
                for (i, item) in items.into_iter().enumerate() {
                    if i > 0 {
                        if let Some(alternates) = &repeated.alternates {
                            self.run(tpl, alternates, data, w)?;
                        }
                    }
                    self.with_cursor(item, |exec| exec.run(tpl, &repeated.body, data, w))?;
                }
                Ok(())
            }
            Some(value) if value.is_truthy() => Err(RenderError::NotASequence {
                template: tpl.to_string(),
                line: repeated.line,
                path: repeated.path.to_string(),
            }),
            _ => match &repeated.or_body {
                Some(or_body) => self.run(tpl, or_body, data, w),
                None => Ok(()),
            },
        }
    }

    fn include(
        &mut self,
        name: &str,
        data: &mut TemplateData<'_>,
        w: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let max_depth = self.engine.config().max_include_depth;
        if self.depth >= max_depth {
            return Err(RenderError::IncludeDepth {
                name: name.to_string(),
                max_depth,
            });
        }
        let included = self.engine.load(name)?;
        self.depth += 1;
        let result = self.run(included.name(), included.nodes(), data, w);
        self.depth -= 1;
        result
    }

    fn with_cursor<F>(&mut self, cursor: Value, f: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        self.cursors.push(cursor);
        let result = f(self);
        self.cursors.pop();
        result
    }
}

fn display_name(formatter: &str) -> &str {
    if formatter.is_empty() {
        crate::format::DEFAULT_FORMATTER
    } else {
        formatter
    }
}
