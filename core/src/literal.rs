//! Rendering values as SQL source text.
//!
//! These helpers build SQL by textual substitution. They are meant for
//! statement positions where SQLite does not accept bound parameters (pragma
//! arguments, `attach` paths, schema names) and for trusted input only; they
//! are not a replacement for parameterized queries.
//!
//! # Example
//!
//! ```
//! use dba_core::{Value, as_identifier, as_sql, interpolate};
//!
//! assert_eq!(as_identifier(r#"a"b"#), r#""a""b""#);
//! assert_eq!(as_sql(&Value::from("it's")).unwrap(), "'it''s'");
//!
//! let sql = interpolate("select $x, ${y};", &[("x", Value::from(5)), ("y", Value::Null)]).unwrap();
//! assert_eq!(sql, "select 5, null;");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{CoreError, Result};
use crate::value::Value;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\w+)|\{([^}]+)\})").expect("static regex must compile")
});

/// Wraps `text` in double quotes, doubling embedded double quotes.
///
/// No other escaping is done; the caller is responsible for the
/// legality of the identifier.
pub fn as_identifier(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Doubles every single quote in `text`.
pub fn escape_text(text: &str) -> String {
    text.replace('\'', "''")
}

/// Encodes a list as JSON text.
pub fn list_as_json(items: &[Value]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// Renders a value as an SQL literal.
///
/// # Errors
///
/// Returns [`CoreError::UnrepresentableValue`] for [`Value::Undefined`],
/// [`Value::Blob`] and non-finite floats.
pub fn as_sql(value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(format!("'{}'", escape_text(s))),
        Value::List(items) => Ok(format!("'{}'", escape_text(&list_as_json(items)?))),
        Value::Integer(n) => Ok(n.to_string()),
        Value::Float(x) if x.is_finite() => Ok(x.to_string()),
        Value::Boolean(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Undefined => Err(CoreError::UnrepresentableValue {
            kind: "'undefined'",
            repr: "undefined".to_string(),
        }),
        other => Err(CoreError::UnrepresentableValue {
            kind: other.kind(),
            repr: format!("{other:?}"),
        }),
    }
}

/// Lookup of placeholder values by name.
pub trait Bindings {
    /// Returns the value bound to `name`, if any.
    fn binding(&self, name: &str) -> Option<&Value>;
}

impl Bindings for HashMap<String, Value> {
    fn binding(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Bindings for BTreeMap<String, Value> {
    fn binding(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Bindings for [(&str, Value)] {
    fn binding(&self, name: &str) -> Option<&Value> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}

impl<const N: usize> Bindings for [(&str, Value); N] {
    fn binding(&self, name: &str) -> Option<&Value> {
        self.as_slice().binding(name)
    }
}

/// Replaces `$name` and `${name}` placeholders with rendered literals.
///
/// A placeholder without a binding is rendered as [`Value::Undefined`] and
/// therefore fails.
///
/// # Errors
///
/// Returns [`CoreError::InterpolationError`] naming the placeholder when its
/// value cannot be rendered.
pub fn interpolate<B: Bindings + ?Sized>(sql: &str, bindings: &B) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(sql) {
        let Some(whole) = caps.get(0) else { continue };
        let name = placeholder_name(&caps);
        let value = bindings.binding(name).unwrap_or(&Value::Undefined);
        let literal = as_sql(value).map_err(|e| CoreError::InterpolationError {
            placeholder: name.to_string(),
            message: e.to_string(),
        })?;
        out.push_str(&sql[last..whole.start()]);
        out.push_str(&literal);
        last = whole.end();
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

fn placeholder_name<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}
