//! Formatters the blog registers on top of the built-ins.

use std::io::Write;

use chrono::{DateTime, Utc};

use grog_template::format::string_formatter;
use grog_template::{FormatError, FormatterRegistry, TemplateData, Value};

pub fn registry() -> FormatterRegistry {
    FormatterRegistry::new().with("shortdate", shortdate_formatter)
}

/// `shortdate`: `November 14 2023` from a unix timestamp (number or numeric
/// string) or an RFC 3339 string. Anything else is written as-is.
pub fn shortdate_formatter(
    w: &mut dyn Write,
    args: &str,
    data: &mut TemplateData<'_>,
    values: &[Value],
) -> Result<(), FormatError> {
    match values.first().and_then(timestamp) {
        Some(at) => {
            write!(w, "{}", at.format("%B %-d %Y"))?;
            Ok(())
        }
        None => string_formatter(w, args, data, values),
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0),
        Value::Str(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(secs) => DateTime::from_timestamp(secs, 0),
                Err(_) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|at| at.with_timezone(&Utc)),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grog_template::NamedQueries;

    fn shortdate(value: Value) -> String {
        let queries = NamedQueries::new();
        let mut data = TemplateData::new(Value::Null, &queries);
        let mut out: Vec<u8> = Vec::new();
        shortdate_formatter(&mut out, "", &mut data, &[value]).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn formats_unix_seconds() {
        assert_eq!(shortdate(Value::Int(1_700_000_000)), "November 14 2023");
        assert_eq!(shortdate(Value::from("1700000000")), "November 14 2023");
    }

    #[test]
    fn formats_rfc3339() {
        assert_eq!(shortdate(Value::from("2024-02-05T10:00:00+00:00")), "February 5 2024");
    }

    #[test]
    fn passes_other_values_through() {
        assert_eq!(shortdate(Value::from("someday")), "someday");
        assert_eq!(shortdate(Value::Bool(true)), "true");
    }

    #[test]
    fn registered_alongside_builtins() {
        let registry = registry();
        assert!(registry.contains("shortdate"));
        assert!(registry.contains("html"));
    }
}
