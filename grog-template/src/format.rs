//! Formatter registry and the built-in formatters.
//!
//! A formatter receives the output sink, the raw argument text that followed
//! its name in the directive, the render's [`TemplateData`] and the resolved
//! values. Each formatter parses its own argument text; one that cannot must
//! return [`FormatError::Args`] rather than guess.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::data::TemplateData;
use crate::error::FormatError;
use crate::pagination::pagination_formatter;
use crate::value::Value;

/// Signature every formatter implements.
pub type FormatterFn =
    dyn Fn(&mut dyn Write, &str, &mut TemplateData<'_>, &[Value]) -> Result<(), FormatError>
        + Send
        + Sync;

/// Name of the formatter used when a directive names none and no `""` entry
/// has been registered.
pub const DEFAULT_FORMATTER: &str = "str";

/// Mapping from formatter name to formatter.
///
/// Built once at configuration time and handed to the engine; the engine
/// never mutates it.
#[derive(Clone)]
pub struct FormatterRegistry {
    entries: HashMap<String, Arc<FormatterFn>>,
}

impl FormatterRegistry {
    /// A registry holding the built-in formatters.
    pub fn new() -> Self {
        let mut registry = FormatterRegistry {
            entries: HashMap::new(),
        };
        registry.register("str", string_formatter);
        registry.register("int", int_formatter);
        registry.register("html", html_formatter);
        registry.register("url", url_formatter);
        registry.register("trunc", trunc_formatter);
        registry.register("pagination", pagination_formatter);
        registry
    }

    /// Register (or shadow) a formatter. Registering under `""` replaces the
    /// default formatter.
    pub fn register<F>(&mut self, name: impl Into<String>, formatter: F) -> &mut Self
    where
        F: Fn(&mut dyn Write, &str, &mut TemplateData<'_>, &[Value]) -> Result<(), FormatError>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(name.into(), Arc::new(formatter));
        self
    }

    /// Builder form of [`FormatterRegistry::register`].
    pub fn with<F>(mut self, name: impl Into<String>, formatter: F) -> Self
    where
        F: Fn(&mut dyn Write, &str, &mut TemplateData<'_>, &[Value]) -> Result<(), FormatError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, formatter);
        self
    }

    /// Look up a formatter; `""` resolves to the default formatter.
    pub fn get(&self, name: &str) -> Option<Arc<FormatterFn>> {
        match self.entries.get(name) {
            Some(f) => Some(Arc::clone(f)),
            None if name.is_empty() => self.entries.get(DEFAULT_FORMATTER).map(Arc::clone),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterRegistry")
            .field("names", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Split formatter arguments on spaces, keeping `"quoted strings"` (quotes
/// included) together as one argument.
pub fn split_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quote = false;
    let mut start = None;
    for (i, c) in args.char_indices() {
        if c == '"' {
            in_quote = !in_quote;
        }
        if c == ' ' && !in_quote {
            if let Some(s) = start.take() {
                out.push(&args[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(&args[s..]);
    }
    out
}

/// Strip one leading and one trailing double quote, if present.
pub fn unquote(arg: &str) -> &str {
    let arg = arg.strip_prefix('"').unwrap_or(arg);
    arg.strip_suffix('"').unwrap_or(arg)
}

/// Natural string form of the values, joined by single spaces.
pub fn display_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The bytes the `str` formatter would write.
fn value_bytes(values: &[Value]) -> Vec<u8> {
    match values {
        [Value::Bytes(b)] => b.clone(),
        _ => display_values(values).into_bytes(),
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// `str`: natural string form; a lone byte value is written raw.
pub fn string_formatter(
    w: &mut dyn Write,
    _args: &str,
    _data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    if let [Value::Bytes(b)] = values {
        w.write_all(b)?;
        return Ok(());
    }
    w.write_all(display_values(values).as_bytes())?;
    Ok(())
}

/// `int`: integer form. A lone empty string writes nothing, which keeps
/// "absent" distinguishable from zero.
pub fn int_formatter(
    w: &mut dyn Write,
    args: &str,
    data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    let [value] = values else {
        return string_formatter(w, args, data, values);
    };
    let n = match value {
        Value::Null => return Ok(()),
        Value::Str(s) if s.is_empty() => return Ok(()),
        Value::Int(i) => *i,
        Value::Float(x) => x.trunc() as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Str(s) => parse_int(s)?,
        Value::Bytes(b) => parse_int(&String::from_utf8_lossy(b))?,
        other => {
            return Err(FormatError::value(format!(
                "cannot format a {} as an integer",
                other.kind()
            )))
        }
    };
    write!(w, "{n}")?;
    Ok(())
}

fn parse_int(s: &str) -> Result<i64, FormatError> {
    let s = s.trim();
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|x| x.trunc() as i64))
        .map_err(|_| FormatError::value(format!("{s:?} is not a number")))
}

/// Write `s` with `"`, `'`, `&`, `<` and `>` replaced by HTML entities.
pub fn html_escape(w: &mut dyn Write, s: &[u8]) -> std::io::Result<()> {
    let mut last = 0;
    for (i, c) in s.iter().enumerate() {
        let esc: &[u8] = match c {
            b'"' => b"&#34;",
            b'\'' => b"&#39;",
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            _ => continue,
        };
        w.write_all(&s[last..i])?;
        w.write_all(esc)?;
        last = i + 1;
    }
    w.write_all(&s[last..])
}

/// `html`: escape for inclusion in HTML text or attributes.
pub fn html_formatter(
    w: &mut dyn Write,
    _args: &str,
    _data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    html_escape(w, &value_bytes(values))?;
    Ok(())
}

/// `url`: percent-encode for a URL query parameter. Surrounding `[` `]`
/// (the string form of a list) and whitespace are dropped first.
pub fn url_formatter(
    w: &mut dyn Write,
    _args: &str,
    _data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    let bytes = value_bytes(values);
    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim_matches(|c| c == '[' || c == ']').trim();
    for chunk in url::form_urlencoded::byte_serialize(trimmed.as_bytes()) {
        w.write_all(chunk.as_bytes())?;
    }
    Ok(())
}

/// `trunc length ["ellipsis"]`: cut strings longer than `length` bytes and
/// append the ellipsis. Values that are not text pass through unchanged.
pub fn trunc_formatter(
    w: &mut dyn Write,
    args: &str,
    data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    let params = split_args(args);
    let Some(length) = params.first() else {
        return Err(FormatError::args("trunc requires a length"));
    };
    let length: usize = length
        .parse()
        .map_err(|_| FormatError::args(format!("trunc length {length:?} is not a number")))?;
    let ellipsis = params.get(1).map_or("", |e| unquote(e));

    match values.first() {
        Some(Value::Str(s)) if s.len() > length => {
            let mut cut = length;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            w.write_all(s[..cut].as_bytes())?;
            w.write_all(ellipsis.as_bytes())?;
        }
        Some(Value::Bytes(b)) if b.len() > length => {
            w.write_all(&b[..length])?;
            w.write_all(ellipsis.as_bytes())?;
        }
        Some(_) => string_formatter(w, args, data, values)?,
        None => {}
    }
    Ok(())
}
