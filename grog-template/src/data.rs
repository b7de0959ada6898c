//! Per-render data context — root data, named queries and request state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::QueryError;
use crate::value::Value;

/// Top-level key the root data value is bound under.
pub const MODEL_KEY: &str = "model";

/// One result row of a named query: column name → column text.
pub type Row = BTreeMap<String, String>;

static NULL: Value = Value::Null;

/// A parameterized, pre-registered query.
pub type NamedQueryFn = dyn Fn(&[Value]) -> Result<Vec<Row>, QueryError> + Send + Sync;

// ---------------------------------------------------------------------------
// NamedQueries
// ---------------------------------------------------------------------------

/// Read-only table of named queries exposed to templates as `{query:name …}`.
#[derive(Clone, Default)]
pub struct NamedQueries {
    queries: HashMap<String, Arc<NamedQueryFn>>,
}

impl NamedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, query: F)
    where
        F: Fn(&[Value]) -> Result<Vec<Row>, QueryError> + Send + Sync + 'static,
    {
        self.queries.insert(name.into(), Arc::new(query));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NamedQueryFn>> {
        self.queries.get(name)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl fmt::Debug for NamedQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.queries.keys().collect();
        names.sort();
        f.debug_struct("NamedQueries").field("names", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A cookie to be sent with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    /// Seconds; `Some(0)` or negative deletes the cookie.
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            http_only: false,
            secure: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }
}

/// Renders the value of a `Set-Cookie` header.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.max(0))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// The hosting layer's request/response pair, as seen by a render.
pub trait Transport {
    /// A query-string or form parameter of the inbound request.
    fn request_param(&self, name: &str) -> Option<String>;

    /// A cookie sent with the inbound request.
    fn cookie(&self, name: &str) -> Option<String>;

    /// Attach a cookie to the outbound response.
    fn set_cookie(&mut self, cookie: Cookie);
}

/// In-memory [`Transport`]: parsed request parameters and cookies plus the
/// cookies a render asked to set.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    set_cookies: Vec<Cookie>,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string. For repeated
    /// keys the first value wins.
    pub fn from_query(query: &str) -> Self {
        let mut state = Self::default();
        state.add_query(query);
        state
    }

    pub fn add_query(&mut self, query: &str) {
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Parse a `Cookie:` request header value (`a=1; b=2`).
    pub fn add_cookie_header(&mut self, header: &str) {
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    /// Cookies set during rendering, in order.
    pub fn set_cookies(&self) -> &[Cookie] {
        &self.set_cookies
    }
}

impl Transport for RequestState {
    fn request_param(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn set_cookie(&mut self, cookie: Cookie) {
        self.set_cookies.retain(|c| c.name != cookie.name);
        self.set_cookies.push(cookie);
    }
}

// ---------------------------------------------------------------------------
// TemplateData
// ---------------------------------------------------------------------------

/// Everything a single render sees: the top-level data map (root value under
/// [`MODEL_KEY`], plus anything formatters publish), the named queries and,
/// when rendering for a request, the transport.
///
/// Request-scoped: build one per render and drop it afterwards.
pub struct TemplateData<'t> {
    data: BTreeMap<String, Value>,
    queries: &'t NamedQueries,
    transport: Option<&'t mut dyn Transport>,
}

impl<'t> TemplateData<'t> {
    pub fn new(model: impl Into<Value>, queries: &'t NamedQueries) -> Self {
        let mut data = BTreeMap::new();
        data.insert(MODEL_KEY.to_string(), model.into());
        TemplateData {
            data,
            queries,
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: &'t mut dyn Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn model(&self) -> &Value {
        self.data.get(MODEL_KEY).unwrap_or(&NULL)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// The whole top-level map as a value (what `{@}` sees outside sections).
    pub fn to_value(&self) -> Value {
        Value::Map(self.data.clone())
    }

    pub fn queries(&self) -> &NamedQueries {
        self.queries
    }

    /// Run a named query. `None` if no query by that name is registered.
    pub fn query(&self, name: &str, params: &[Value]) -> Option<Result<Vec<Row>, QueryError>> {
        self.queries.get(name).map(|q| q(params))
    }

    pub fn request_param(&self, name: &str) -> Option<String> {
        self.transport.as_ref().and_then(|t| t.request_param(name))
    }

    /// Read a cookie from the inbound request.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.transport.as_ref().and_then(|t| t.cookie(name))
    }

    /// Set a cookie on the outbound response. Returns `false` when the render
    /// has no transport to carry it.
    pub fn set_cookie(&mut self, cookie: Cookie) -> bool {
        match self.transport.as_mut() {
            Some(transport) => {
                transport.set_cookie(cookie);
                true
            }
            None => {
                tracing::warn!(cookie = %cookie.name, "set_cookie without a transport; dropped");
                false
            }
        }
    }
}

impl fmt::Debug for TemplateData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateData")
            .field("data", &self.data)
            .field("queries", self.queries)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}
