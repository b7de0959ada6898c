//! Template values — the tagged variant every piece of render data is bound as.
//!
//! Data reaches templates from many places (the stored model, named query rows,
//! values published by formatters), so instead of reflecting over arbitrary
//! types the engine works on [`Value`], which knows how to resolve a path
//! segment, how truthy it is, and what its natural string form looks like.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

static NULL: Value = Value::Null;

/// A value that can be bound into template data.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Raw bytes, written untouched by the `str` formatter.
    Bytes(Vec<u8>),
    List(Elemlist),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Resolve one path segment: a key for maps, an index for lists.
    pub fn lookup(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(segment),
            Value::List(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        }
    }

    /// Resolve a sequence of segments, stopping at the first miss.
    pub fn lookup_path<'a, S: AsRef<str>>(&'a self, segments: &[S]) -> Option<&'a Value> {
        segments
            .iter()
            .try_fold(self, |value, segment| value.lookup(segment.as_ref()))
    }

    /// Truthiness used by `.section`: absent, empty and zero values are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(list) => !list.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Short type name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Elemlist> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::List(list) => {
                f.write_str("[")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{key}={item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Elemlist::from(items))
    }
}

impl From<Elemlist> for Value {
    fn from(list: Elemlist) -> Self {
        Value::List(list)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// A named query row.
impl From<BTreeMap<String, String>> for Value {
    fn from(row: BTreeMap<String, String>) -> Self {
        Value::Map(row.into_iter().map(|(k, v)| (k, Value::Str(v))).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Elemlist
// ---------------------------------------------------------------------------

/// Ordered, heterogeneous sequence used as the material of a repeated section.
///
/// Reads past the end are not errors: [`Elemlist::at`] hands back `Null`, so
/// loops must be bounded by [`Elemlist::len`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Elemlist {
    elements: Vec<Value>,
}

impl Elemlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: impl Into<Value>) {
        self.elements.push(item.into());
    }

    /// The element at `index`, or `Null` when out of range.
    pub fn at(&self, index: usize) -> &Value {
        self.elements.get(index).unwrap_or(&NULL)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elements.iter()
    }

    /// Copy of the elements in `range`, clamped to the list bounds.
    pub fn slice(&self, range: Range<usize>) -> Elemlist {
        let end = range.end.min(self.elements.len());
        let start = range.start.min(end);
        Elemlist {
            elements: self.elements[start..end].to_vec(),
        }
    }
}

impl From<Vec<Value>> for Elemlist {
    fn from(elements: Vec<Value>) -> Self {
        Elemlist { elements }
    }
}

impl<V: Into<Value>> FromIterator<V> for Elemlist {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Elemlist {
            elements: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Elemlist {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl IntoIterator for Elemlist {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}
