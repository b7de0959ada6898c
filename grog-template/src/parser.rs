//! Template parser — turns raw template text into a [`CompiledTemplate`].
//!
//! # Syntax
//!
//! | Directive                                   | Meaning                               |
//! |---------------------------------------------|---------------------------------------|
//! | `{path}` / `{a b \| fmt args}`              | field, optionally through a formatter |
//! | `{@}`                                       | the current cursor                    |
//! | `{query:name p $path \| fmt args}`          | rows from a named query               |
//! | `{.section p}` … `{.or}` … `{.end}`         | section                               |
//! | `{.repeated section p}` … `{.alternates with}` … `{.or}` … `{.end}` | repeated section |
//! | `{.include name}`                           | render another template in place      |
//! | `{# comment}`                               | nothing                               |
//! | `{.meta-left}` `{.meta-right}` `{.space}` `{.tab}` | literal delimiter / space / tab |
//!
//! Delimiters are configurable; a directive never spans a line. Text outside
//! directives is copied byte for byte.

use serde::Deserialize;

use crate::error::{ParseError, ParseErrorKind};
use crate::format::FormatterRegistry;
use crate::template::{
    CompiledTemplate, Field, FieldPath, FieldSource, Node, QueryParam, RepeatedSection, Section,
};

const QUERY_PREFIX: &str = "query:";

// ---------------------------------------------------------------------------
// Delimiters
// ---------------------------------------------------------------------------

/// Directive open/close markers. Both are guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDelimiters")]
pub struct Delimiters {
    left: String,
    right: String,
}

#[derive(Deserialize)]
struct RawDelimiters {
    left: String,
    right: String,
}

impl TryFrom<RawDelimiters> for Delimiters {
    type Error = String;

    fn try_from(raw: RawDelimiters) -> Result<Self, Self::Error> {
        Delimiters::new(raw.left, raw.right)
            .ok_or_else(|| "delimiters must be non-empty".to_string())
    }
}

impl Delimiters {
    /// `None` if either marker is empty.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Option<Self> {
        let (left, right) = (left.into(), right.into());
        if left.is_empty() || right.is_empty() {
            return None;
        }
        Some(Delimiters { left, right })
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            left: "{".to_string(),
            right: "}".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Compile `text` into a template named `name`.
///
/// Formatter names are checked against `formatters` here, so a template that
/// references an unregistered formatter never reaches the cache.
pub fn compile(
    name: &str,
    text: &str,
    formatters: &FormatterRegistry,
    delimiters: &Delimiters,
) -> Result<CompiledTemplate, ParseError> {
    let mut parser = Parser {
        name,
        formatters,
        delimiters,
        tokens: Vec::new().into_iter(),
    };
    parser.tokens = parser.tokenize(text)?.into_iter();

    let (nodes, stop) = parser.parse_block()?;
    if let Some(stop) = stop {
        let (line, what) = match stop {
            Stop::Or(line) => (line, ".or"),
            Stop::Alternates(line) => (line, ".alternates with"),
            Stop::End(line) => (line, ".end"),
        };
        return Err(parser.error(line, ParseErrorKind::Unexpected(what)));
    }
    Ok(CompiledTemplate::new(name, nodes))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

enum Token<'a> {
    Text(&'a str),
    Directive { body: &'a str, line: usize },
}

/// A directive that closes (part of) the enclosing block.
enum Stop {
    Or(usize),
    Alternates(usize),
    End(usize),
}

enum Directive {
    Node(Node),
    Literal(String),
    Comment,
    Stop(Stop),
}

struct Parser<'a> {
    name: &'a str,
    formatters: &'a FormatterRegistry,
    delimiters: &'a Delimiters,
    tokens: std::vec::IntoIter<Token<'a>>,
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            template: self.name.to_string(),
            line,
            kind,
        }
    }

    fn tokenize(&self, text: &'a str) -> Result<Vec<Token<'a>>, ParseError> {
        let left = self.delimiters.left();
        let right = self.delimiters.right();

        let mut tokens = Vec::new();
        let mut rest = text;
        let mut line = 1;
        while let Some(start) = rest.find(left) {
            let before = &rest[..start];
            if !before.is_empty() {
                tokens.push(Token::Text(before));
            }
            line += before.matches('\n').count();

            let after = &rest[start + left.len()..];
            let Some(end) = after.find(right) else {
                return Err(self.error(
                    line,
                    ParseErrorKind::UnterminatedDirective {
                        right: right.to_string(),
                    },
                ));
            };
            let body = &after[..end];
            if body.contains('\n') {
                return Err(self.error(line, ParseErrorKind::NewlineInDirective));
            }
            tokens.push(Token::Directive { body, line });
            rest = &after[end + right.len()..];
        }
        if !rest.is_empty() {
            tokens.push(Token::Text(rest));
        }
        Ok(tokens)
    }

    /// Parse nodes until the input runs out or a `.or` / `.alternates with` /
    /// `.end` is met. The stop directive is returned to the caller.
    fn parse_block(&mut self) -> Result<(Vec<Node>, Option<Stop>), ParseError> {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => push_literal(&mut nodes, text),
                Token::Directive { body, line } => match self.directive(body, line)? {
                    Directive::Node(node) => nodes.push(node),
                    Directive::Literal(text) => push_literal(&mut nodes, &text),
                    Directive::Comment => {}
                    Directive::Stop(stop) => return Ok((nodes, Some(stop))),
                },
            }
        }
        Ok((nodes, None))
    }

    fn directive(&mut self, body: &str, line: usize) -> Result<Directive, ParseError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(self.error(line, ParseErrorKind::EmptyDirective));
        }
        if body.starts_with('#') {
            return Ok(Directive::Comment);
        }
        if !body.starts_with('.') {
            return self.field(body, line).map(Directive::Node);
        }

        let (keyword, rest) = split_first_word(body);
        let directive = match keyword {
            ".section" => {
                let path = self.section_path(rest, ".section", line)?;
                Directive::Node(self.section(path, line)?)
            }
            ".repeated" => {
                let (word, rest) = split_first_word(rest);
                if word != "section" {
                    return Err(self.error(line, ParseErrorKind::UnknownDirective(body.to_string())));
                }
                let path = self.section_path(rest, ".repeated section", line)?;
                Directive::Node(self.repeated_section(path, line)?)
            }
            ".alternates" if rest == "with" => Directive::Stop(Stop::Alternates(line)),
            ".or" if rest.is_empty() => Directive::Stop(Stop::Or(line)),
            ".end" if rest.is_empty() => Directive::Stop(Stop::End(line)),
            ".meta-left" if rest.is_empty() => Directive::Literal(self.delimiters.left().to_string()),
            ".meta-right" if rest.is_empty() => {
                Directive::Literal(self.delimiters.right().to_string())
            }
            ".space" if rest.is_empty() => Directive::Literal(" ".to_string()),
            ".tab" if rest.is_empty() => Directive::Literal("\t".to_string()),
            ".include" => {
                if rest.is_empty() {
                    return Err(self.error(line, ParseErrorKind::MissingIncludeName));
                }
                Directive::Node(Node::Include {
                    name: rest.to_string(),
                    line,
                })
            }
            _ => return Err(self.error(line, ParseErrorKind::UnknownDirective(body.to_string()))),
        };
        Ok(directive)
    }

    fn section(&mut self, path: FieldPath, line: usize) -> Result<Node, ParseError> {
        let label = path.to_string();
        let (body, stop) = self.parse_block()?;
        if let Some(Stop::Alternates(at)) = stop {
            return Err(self.error(at, ParseErrorKind::MisplacedAlternates(label)));
        }
        let or_body = self.finish_or(stop, &label, line)?;
        Ok(Node::Section(Section {
            path,
            body,
            or_body,
            line,
        }))
    }

    fn repeated_section(&mut self, path: FieldPath, line: usize) -> Result<Node, ParseError> {
        let label = path.to_string();
        let (body, mut stop) = self.parse_block()?;
        let mut alternates = None;
        if let Some(Stop::Alternates(_)) = stop {
            let (alt, next) = self.parse_block()?;
            alternates = Some(alt);
            stop = next;
        }
        let or_body = self.finish_or(stop, &label, line)?;
        Ok(Node::Repeated(RepeatedSection {
            path,
            body,
            alternates,
            or_body,
            line,
        }))
    }

    /// Handle whatever stopped a section body: `.end` closes it, `.or`
    /// introduces the alternative body which must itself be closed by `.end`.
    fn finish_or(
        &mut self,
        stop: Option<Stop>,
        label: &str,
        line: usize,
    ) -> Result<Option<Vec<Node>>, ParseError> {
        match stop {
            Some(Stop::End(_)) => Ok(None),
            Some(Stop::Or(_)) => {
                let (or_body, next) = self.parse_block()?;
                match next {
                    Some(Stop::End(_)) => Ok(Some(or_body)),
                    Some(Stop::Or(at)) => {
                        Err(self.error(at, ParseErrorKind::DuplicateOr(label.to_string())))
                    }
                    Some(Stop::Alternates(at)) => {
                        Err(self.error(at, ParseErrorKind::MisplacedAlternates(label.to_string())))
                    }
                    None => Err(self.error(line, ParseErrorKind::UnclosedSection(label.to_string()))),
                }
            }
            Some(Stop::Alternates(at)) => {
                Err(self.error(at, ParseErrorKind::MisplacedAlternates(label.to_string())))
            }
            None => Err(self.error(line, ParseErrorKind::UnclosedSection(label.to_string()))),
        }
    }

    fn section_path(
        &self,
        text: &str,
        directive: &'static str,
        line: usize,
    ) -> Result<FieldPath, ParseError> {
        if text.is_empty() {
            return Err(self.error(line, ParseErrorKind::MissingPath(directive)));
        }
        self.path(text, line)
    }

    fn field(&self, body: &str, line: usize) -> Result<Node, ParseError> {
        let (lhs, formatter, args) = match body.split_once('|') {
            Some((lhs, rhs)) => {
                let (formatter, args) = split_first_word(rhs.trim_start());
                (lhs.trim(), formatter, args)
            }
            None => (body, "", ""),
        };
        if lhs.is_empty() {
            return Err(self.error(line, ParseErrorKind::EmptyDirective));
        }
        if !self.formatters.contains(formatter) {
            return Err(self.error(line, ParseErrorKind::UnknownFormatter(formatter.to_string())));
        }

        let mut words = lhs.split_whitespace();
        let source = match words.next() {
            Some(first) if first.starts_with(QUERY_PREFIX) => {
                let name = &first[QUERY_PREFIX.len()..];
                if name.is_empty() {
                    return Err(self.error(line, ParseErrorKind::InvalidFieldName(first.to_string())));
                }
                let params = words
                    .map(|word| match word.strip_prefix('$') {
                        Some(path) => self.path(path, line).map(QueryParam::Field),
                        None => Ok(QueryParam::Literal(word.to_string())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                FieldSource::Query {
                    name: name.to_string(),
                    params,
                }
            }
            _ => FieldSource::Paths(
                lhs.split_whitespace()
                    .map(|word| self.path(word, line))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(Node::Field(Field {
            source,
            formatter: formatter.to_string(),
            args: args.to_string(),
            line,
        }))
    }

    fn path(&self, text: &str, line: usize) -> Result<FieldPath, ParseError> {
        if text == "@" {
            return Ok(FieldPath::cursor());
        }
        let valid = text.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
        if !valid {
            return Err(self.error(line, ParseErrorKind::InvalidFieldName(text.to_string())));
        }
        Ok(FieldPath::new(text.split('.').map(str::to_string).collect()))
    }
}

fn split_first_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn push_literal(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Literal(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Literal(text.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
