use std::io::{self, Write};

use grog_template::{
    Cookie, Delimiters, Engine, EngineConfig, FormatError, FormatterRegistry, MemorySource,
    NamedQueries, QueryError, RenderError, RequestState, Row, TemplateData, Value,
};
use serde_json::json;

fn engine_with(templates: &[(&str, &str)]) -> Engine {
    engine_with_config(templates, EngineConfig::default())
}

fn engine_with_config(templates: &[(&str, &str)], config: EngineConfig) -> Engine {
    let source = MemorySource::new();
    for (name, text) in templates {
        source.insert(*name, *text);
    }
    Engine::with_config(source, FormatterRegistry::new(), config)
}

fn render(engine: &Engine, name: &str, model: serde_json::Value) -> Result<String, RenderError> {
    let queries = NamedQueries::new();
    let mut data = TemplateData::new(Value::from(model), &queries);
    engine.render_to_string(name, &mut data)
}

fn blog_queries() -> NamedQueries {
    let mut queries = NamedQueries::new();
    queries.insert("recent-posts", |_: &[Value]| {
        Ok((1..=10)
            .map(|i| Row::from([("title".to_string(), format!("p{i}"))]))
            .collect())
    });
    queries.insert("by-tag", |params: &[Value]| {
        Ok(params
            .iter()
            .map(|p| Row::from([("param".to_string(), format!("<{p}>"))]))
            .collect())
    });
    queries.insert("broken", |_: &[Value]| Err(QueryError::new("database is gone")));
    queries
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

#[test]
fn fields_render_with_default_formatter() {
    let engine = engine_with(&[("hello", "Hello, {model.name}! You have {model.count} posts.")]);
    let out = render(&engine, "hello", json!({"name": "Ada", "count": 3})).unwrap();
    assert_eq!(out, "Hello, Ada! You have 3 posts.");
}

#[test]
fn missing_fields_render_empty_and_execution_continues() {
    let engine = engine_with(&[("t", "[{model.nope}][{model.name.deeper}][{nothing|html}]{model.name}")]);
    let out = render(&engine, "t", json!({"name": "Ada"})).unwrap();
    assert_eq!(out, "[][][]Ada");
}

#[test]
fn multiple_paths_are_handed_to_the_formatter_together() {
    let engine = engine_with(&[("t", "{model.first model.last}|{model.first model.missing}|")]);
    let out = render(&engine, "t", json!({"first": "Grace", "last": "Hopper"})).unwrap();
    assert_eq!(out, "Grace Hopper||");
}

#[test]
fn list_index_segments_resolve() {
    let engine = engine_with(&[("t", "{model.tags.1}")]);
    let out = render(&engine, "t", json!({"tags": ["a", "b", "c"]})).unwrap();
    assert_eq!(out, "b");
}

#[test]
fn literal_text_passes_through_untouched() {
    let text = "  <p>\n\ttabs and  spaces </p>\r\n";
    let engine = engine_with(&[("t", text)]);
    assert_eq!(render(&engine, "t", json!(null)).unwrap(), text);
}

#[test]
fn meta_directives_escape_delimiters() {
    let engine = engine_with(&[("t", "{.meta-left}model{.meta-right}{.space}{.tab}{# ignored}x")]);
    assert_eq!(render(&engine, "t", json!(null)).unwrap(), "{model} \tx");
}

#[test]
fn custom_delimiters_leave_braces_alone() {
    let config = EngineConfig {
        delimiters: Delimiters::new("{{", "}}").unwrap(),
        ..EngineConfig::default()
    };
    let engine = engine_with_config(&[("t", "function f() { return {{model.x|html}}; }")], config);
    let out = render(&engine, "t", json!({"x": "a<b"})).unwrap();
    assert_eq!(out, "function f() { return a&lt;b; }");
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[test]
fn section_pushes_cursor_or_falls_back() {
    let engine = engine_with(&[(
        "t",
        "{.section model.author}by {name}{.or}anonymous{.end}",
    )]);
    let out = render(&engine, "t", json!({"author": {"name": "Ada"}})).unwrap();
    assert_eq!(out, "by Ada");
    let out = render(&engine, "t", json!({"author": {}})).unwrap();
    assert_eq!(out, "anonymous");
    let out = render(&engine, "t", json!({})).unwrap();
    assert_eq!(out, "anonymous");
}

#[test]
fn repeated_section_alternates_between_elements_only() {
    let engine = engine_with(&[(
        "t",
        "{.repeated section model.tags}{@}{.alternates with}, {.or}untagged{.end}",
    )]);
    assert_eq!(
        render(&engine, "t", json!({"tags": ["rust", "web", "blog"]})).unwrap(),
        "rust, web, blog"
    );
    assert_eq!(render(&engine, "t", json!({"tags": ["solo"]})).unwrap(), "solo");
    assert_eq!(render(&engine, "t", json!({"tags": []})).unwrap(), "untagged");
    assert_eq!(render(&engine, "t", json!({})).unwrap(), "untagged");
}

#[test]
fn inner_lookups_fall_back_to_outer_cursors() {
    let engine = engine_with(&[(
        "t",
        "{.section model}{.repeated section posts}{title} @ {blog}{.alternates with}; {.end}{.end}",
    )]);
    let out = render(
        &engine,
        "t",
        json!({"blog": "grog", "posts": [{"title": "one"}, {"title": "two", "blog": "other"}]}),
    )
    .unwrap();
    assert_eq!(out, "one @ grog; two @ other");
}

#[test]
fn repeated_section_over_a_scalar_is_an_error() {
    let engine = engine_with(&[("t", "line one\n{.repeated section model.title}{@}{.end}")]);
    match render(&engine, "t", json!({"title": "not a list"})) {
        Err(RenderError::NotASequence { template, line, path }) => {
            assert_eq!(template, "t");
            assert_eq!(line, 2);
            assert_eq!(path, "model.title");
        }
        other => panic!("expected NotASequence, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Includes
// ---------------------------------------------------------------------------

#[test]
fn include_shares_the_cursor() {
    let engine = engine_with(&[
        ("page", "<ul>{.repeated section model.posts}{.include item}{.end}</ul>"),
        ("item", "<li>{title|html}</li>"),
    ]);
    let out = render(&engine, "page", json!({"posts": [{"title": "a&b"}, {"title": "c"}]})).unwrap();
    assert_eq!(out, "<ul><li>a&amp;b</li><li>c</li></ul>");
    assert!(engine.is_cached("item"));
}

#[test]
fn recursive_include_hits_the_depth_limit() {
    let config = EngineConfig {
        max_include_depth: 3,
        ..EngineConfig::default()
    };
    let engine = engine_with_config(&[("loop", "x{.include loop}")], config);
    match render(&engine, "loop", json!(null)) {
        Err(RenderError::IncludeDepth { name, max_depth }) => {
            assert_eq!(name, "loop");
            assert_eq!(max_depth, 3);
        }
        other => panic!("expected IncludeDepth, got {other:?}"),
    }
}

#[test]
fn missing_include_is_a_source_error() {
    let engine = engine_with(&[("t", "{.include nowhere}")]);
    assert!(matches!(
        render(&engine, "t", json!(null)),
        Err(RenderError::Source { name, .. }) if name == "nowhere"
    ));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn formatter_failure_is_distinct_from_parse_failure() {
    let engine = engine_with(&[
        ("bad-args", "ok\n{model.x|trunc many}"),
        ("bad-syntax", "{.section model}"),
    ]);
    match render(&engine, "bad-args", json!({"x": "hello"})) {
        Err(RenderError::Formatter { template, line, formatter, source }) => {
            assert_eq!(template, "bad-args");
            assert_eq!(line, 2);
            assert_eq!(formatter, "trunc");
            assert!(matches!(source, FormatError::Args(_)));
        }
        other => panic!("expected Formatter error, got {other:?}"),
    }
    assert!(matches!(
        render(&engine, "bad-syntax", json!(null)),
        Err(RenderError::Parse(_))
    ));
    assert!(!engine.is_cached("bad-syntax"));
}

#[test]
fn unknown_formatter_fails_at_compile_time() {
    let engine = engine_with(&[("t", "{model.x|shout}")]);
    let err = engine.compile("t").unwrap_err();
    assert!(
        err.to_string().contains("unknown formatter \"shout\""),
        "unexpected message: {err}"
    );
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn sink_failures_surface_as_io_errors() {
    let engine = engine_with(&[("t", "literal {model.x|html}")]);
    let queries = NamedQueries::new();
    let mut data = TemplateData::new(Value::from(json!({"x": "y"})), &queries);
    let err = engine.render("t", &mut data, &mut BrokenSink).unwrap_err();
    assert!(matches!(err, RenderError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
}

// ---------------------------------------------------------------------------
// Named queries and pagination
// ---------------------------------------------------------------------------

const BLOG_INDEX: &str = "{query:recent-posts|pagination posts 3}\
{.repeated section posts-page}{title}{.alternates with},{.end}\
|{.section posts-prev-page}prev={@}{.end}\
|{.section posts-next-page}next={@}{.end}\
|{posts-total-pages}";

#[test]
fn pagination_follows_the_request_parameter() {
    let engine = engine_with(&[("index", BLOG_INDEX)]);
    let queries = blog_queries();
    let cases = [
        (None, "p1,p2,p3||next=2|4"),
        (Some("2"), "p4,p5,p6|prev=1|next=3|4"),
        (Some("4"), "p10|prev=3||4"),
        (Some("0"), "p1,p2,p3||next=2|4"),
        (Some("junk"), "p1,p2,p3||next=2|4"),
        (Some("7"), "|prev=6||4"),
    ];
    for (page, expected) in cases {
        let mut request = match page {
            Some(p) => RequestState::new().with_param("posts-page", p),
            None => RequestState::new(),
        };
        let mut data = TemplateData::new(Value::Null, &queries).with_transport(&mut request);
        let out = engine.render_to_string("index", &mut data).unwrap();
        assert_eq!(out, expected, "page {page:?}");
    }
}

#[test]
fn query_params_accept_literals_and_paths() {
    let engine = engine_with(&[(
        "t",
        "{query:by-tag rust $model.tag $model.missing|pagination tags 10}\
{.repeated section tags-page}{param}{.end}",
    )]);
    let out = render(&engine, "t", json!({"tag": "web"})).unwrap();
    assert_eq!(out, "<rust><web><>");
}

#[test]
fn unknown_and_failing_queries_are_render_errors() {
    let engine = engine_with(&[("unknown", "{query:nope}"), ("failing", "{query:broken}")]);
    let queries = blog_queries();

    let mut data = TemplateData::new(Value::Null, &queries);
    assert!(matches!(
        engine.render_to_string("unknown", &mut data),
        Err(RenderError::UnknownQuery { name, line: 1, .. }) if name == "nope"
    ));

    let mut data = TemplateData::new(Value::Null, &queries);
    match engine.render_to_string("failing", &mut data) {
        Err(RenderError::Query { name, source }) => {
            assert_eq!(name, "broken");
            assert_eq!(source.message, "database is gone");
        }
        other => panic!("expected Query error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Caller formatters and cookies
// ---------------------------------------------------------------------------

#[test]
fn caller_formatters_can_use_the_transport() {
    let formatters = FormatterRegistry::new().with(
        "remember",
        |w: &mut dyn Write, args: &str, data: &mut TemplateData<'_>, values: &[Value]| {
            let previous = data.cookie(args).unwrap_or_default();
            let current = values.first().map(Value::to_string).unwrap_or_default();
            data.set_cookie(Cookie::new(args, current.clone()).with_path("/"));
            write!(w, "{previous}->{current}")?;
            Ok::<(), FormatError>(())
        },
    );
    let source = MemorySource::new().with("t", "{model.theme|remember theme}");
    let engine = Engine::new(source, formatters);

    let queries = NamedQueries::new();
    let mut request = RequestState::new().with_cookie("theme", "light");
    {
        let mut data = TemplateData::new(Value::from(json!({"theme": "dark"})), &queries)
            .with_transport(&mut request);
        assert_eq!(engine.render_to_string("t", &mut data).unwrap(), "light->dark");
    }
    let cookies: Vec<String> = request.set_cookies().iter().map(Cookie::to_string).collect();
    assert_eq!(cookies, ["theme=dark; Path=/"]);
}

#[test]
fn default_formatter_slot_can_be_replaced() {
    let formatters = FormatterRegistry::new().with("", grog_template::format::html_formatter);
    let engine = Engine::new(MemorySource::new().with("t", "{model}|{model|str}"), formatters);
    let queries = NamedQueries::new();
    let mut data = TemplateData::new("<b>", &queries);
    assert_eq!(engine.render_to_string("t", &mut data).unwrap(), "&lt;b&gt;|<b>");
}
