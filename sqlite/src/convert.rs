//! Conversion between [`Value`] / [`Row`] and SQLite's own value types.
//!
//! Also defines [`Params`], the parameter list accepted by every statement
//! method, and the helpers that bind it to a prepared statement.

use std::sync::Arc;

use dba_core::{CoreError, Row, Value, list_as_json};
use rusqlite::ToSql;
use rusqlite::params_from_iter;
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::error::{DbaError, Result};

/// Prefixes SQLite accepts for named parameters.
const NAMED_PREFIXES: [char; 3] = [':', '@', '$'];

/// Statement parameters.
///
/// # Examples
///
/// ```
/// use dba_sqlite::{Params, Value};
///
/// let none = Params::from(());
/// let positional = Params::from([1_i64, 2]);
/// let named = Params::named([("id", Value::from(1)), (":name", Value::from("a"))]);
/// assert!(matches!(none, Params::None));
/// assert!(matches!(positional, Params::Positional(ref v) if v.len() == 2));
/// assert!(matches!(named, Params::Named(ref v) if v[0].0 == "id"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Positional parameters, bound to `?` / `?NNN` in order.
    Positional(Vec<Value>),
    /// Named parameters. Names may omit the `:`, `@` or `$` prefix.
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Builds named parameters from `(name, value)` pairs.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Params::Named(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Params {
    fn from(values: [V; N]) -> Self {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(pairs: Vec<(String, Value)>) -> Self {
        Params::Named(pairs)
    }
}

/// Converts a [`Value`] into an engine value for binding.
///
/// Booleans bind as `0` / `1` and lists as their JSON text.
pub(crate) fn to_sql_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(n) => SqlValue::Integer(*n),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
        Value::List(items) => SqlValue::Text(list_as_json(items)?),
        Value::Undefined => {
            return Err(CoreError::UnrepresentableValue {
                kind: "'undefined'",
                repr: "undefined".to_string(),
            }
            .into());
        }
    })
}

/// Converts an engine value read from a result row.
///
/// Text that is not valid UTF-8 comes back as [`Value::Blob`] with the raw
/// bytes.
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(t) => match std::str::from_utf8(t) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Blob(t.to_vec()),
        },
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Copies an engine row into an owned [`Row`].
pub(crate) fn row_from_sqlite(row: &rusqlite::Row<'_>, columns: &Arc<[String]>) -> Result<Row> {
    let values = (0..columns.len())
        .map(|i| row.get_ref(i).map(from_value_ref))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Row::new(Arc::clone(columns), values))
}

/// Resolves a user-supplied parameter name to the name used in the SQL text.
fn resolve_name(stmt: &rusqlite::Statement<'_>, name: &str) -> Result<String> {
    if name.starts_with(NAMED_PREFIXES) {
        return match stmt.parameter_index(name)? {
            Some(_) => Ok(name.to_string()),
            None => Err(DbaError::UnknownParameter(name.to_string())),
        };
    }
    for prefix in NAMED_PREFIXES {
        let candidate = format!("{prefix}{name}");
        if stmt.parameter_index(&candidate)?.is_some() {
            return Ok(candidate);
        }
    }
    Err(DbaError::UnknownParameter(name.to_string()))
}

fn named_values(
    stmt: &rusqlite::Statement<'_>,
    pairs: &[(String, Value)],
) -> Result<Vec<(String, SqlValue)>> {
    pairs
        .iter()
        .map(|(name, value)| Ok((resolve_name(stmt, name)?, to_sql_value(value)?)))
        .collect()
}

fn positional_values(values: &[Value]) -> Result<Vec<SqlValue>> {
    values.iter().map(to_sql_value).collect()
}

/// Binds `params` and executes a statement that produces no rows.
pub(crate) fn execute_with(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> Result<usize> {
    let changes = match params {
        Params::None => stmt.execute([])?,
        Params::Positional(values) => {
            let values = positional_values(values)?;
            stmt.execute(params_from_iter(values.iter()))?
        }
        Params::Named(pairs) => {
            let bound = named_values(stmt, pairs)?;
            let refs: Vec<(&str, &dyn ToSql)> = bound
                .iter()
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();
            stmt.execute(refs.as_slice())?
        }
    };
    Ok(changes)
}

/// Binds `params` and starts stepping a row-producing statement.
pub(crate) fn query_with<'s>(
    stmt: &'s mut rusqlite::Statement<'_>,
    params: &Params,
) -> Result<rusqlite::Rows<'s>> {
    let rows = match params {
        Params::None => stmt.query([])?,
        Params::Positional(values) => {
            let values = positional_values(values)?;
            stmt.query(params_from_iter(values.iter()))?
        }
        Params::Named(pairs) => {
            let bound = named_values(stmt, pairs)?;
            let refs: Vec<(&str, &dyn ToSql)> = bound
                .iter()
                .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
                .collect();
            stmt.query(refs.as_slice())?
        }
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_to_sql_value_mapping() {
        assert_eq!(to_sql_value(&Value::Boolean(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(
            to_sql_value(&Value::List(vec![1.into(), "a".into()])).unwrap(),
            SqlValue::Text(r#"[1,"a"]"#.to_string())
        );
        assert!(matches!(
            to_sql_value(&Value::Undefined),
            Err(DbaError::ValueError(CoreError::UnrepresentableValue { .. }))
        ));
    }

    #[test]
    fn test_from_value_ref_mapping() {
        assert_eq!(from_value_ref(ValueRef::Null), Value::Null);
        assert_eq!(from_value_ref(ValueRef::Integer(7)), Value::Integer(7));
        assert_eq!(from_value_ref(ValueRef::Real(0.5)), Value::Float(0.5));
        assert_eq!(from_value_ref(ValueRef::Text(b"abc")), Value::Text("abc".into()));
        assert_eq!(from_value_ref(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
    }

    #[test]
    fn test_invalid_utf8_text_reads_as_blob() {
        assert_eq!(
            from_value_ref(ValueRef::Text(&[0xff, b'a'])),
            Value::Blob(vec![0xff, b'a'])
        );

        let conn = Connection::open_in_memory().unwrap();
        let value = conn
            .query_row("select cast(x'ff61' as text);", [], |row| {
                row.get_ref(0).map(from_value_ref)
            })
            .unwrap();
        assert_eq!(value, Value::Blob(vec![0xff, 0x61]));
    }

    #[test]
    fn test_named_parameter_resolution() {
        let conn = Connection::open_in_memory().unwrap();
        let stmt = conn.prepare("select :a, @b, $c").unwrap();
        assert_eq!(resolve_name(&stmt, "a").unwrap(), ":a");
        assert_eq!(resolve_name(&stmt, "b").unwrap(), "@b");
        assert_eq!(resolve_name(&stmt, "c").unwrap(), "$c");
        assert_eq!(resolve_name(&stmt, ":a").unwrap(), ":a");
        assert!(matches!(
            resolve_name(&stmt, "zzz"),
            Err(DbaError::UnknownParameter(_))
        ));
    }

    #[test]
    fn test_query_with_binds_positional_and_named() {
        let conn = Connection::open_in_memory().unwrap();

        let mut stmt = conn.prepare("select ?1 + ?2").unwrap();
        let mut rows = query_with(&mut stmt, &Params::from([2_i64, 3])).unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 5);
        drop(rows);

        let mut stmt = conn.prepare("select :x || :y").unwrap();
        let params = Params::named([("x", "a"), ("y", "b")]);
        let mut rows = query_with(&mut stmt, &params).unwrap();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, String>(0).unwrap(), "ab");
    }
}
