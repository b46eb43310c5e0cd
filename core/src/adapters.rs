//! Result shape adapters over row sequences.
//!
//! Every adapter accepts anything that iterates over `Result<T, E>` items,
//! which covers a live database cursor as well as a plain vector of rows.
//! Errors yielded by the source are returned as-is; adapter failures are
//! converted into `E` through `From<CoreError>`.
//!
//! Lazy adapters ([`limit`], [`first_values`]) pull from the source only as
//! far as their consumer asks them to.

use crate::error::CoreError;
use crate::value::{Row, Value};

/// Returns the first item, or `None` for an empty source.
pub fn first_row<T, E, I>(rows: I) -> Result<Option<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    rows.into_iter().next().transpose()
}

/// Returns the first item.
///
/// # Errors
///
/// Fails with [`CoreError::EmptyResult`] when the source yields nothing.
pub fn single_row<T, E, I>(rows: I) -> Result<T, E>
where
    I: IntoIterator<Item = Result<T, E>>,
    E: From<CoreError>,
{
    first_row(rows)?.ok_or_else(|| CoreError::EmptyResult.into())
}

/// Returns the value of the first column of the first row, if any.
pub fn first_value<E, I>(rows: I) -> Result<Option<Value>, E>
where
    I: IntoIterator<Item = Result<Row, E>>,
{
    Ok(first_row(rows)?.and_then(|row| row.into_values().into_iter().next()))
}

/// Returns the value of the first column of the first row.
///
/// # Errors
///
/// Fails with [`CoreError::EmptyResult`] when the source yields no rows.
pub fn single_value<E, I>(rows: I) -> Result<Value, E>
where
    I: IntoIterator<Item = Result<Row, E>>,
    E: From<CoreError>,
{
    let row = single_row(rows)?;
    row.into_values()
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::EmptyResult.into())
}

/// Collects the first-column value of every row.
pub fn all_first_values<E, I>(rows: I) -> Result<Vec<Value>, E>
where
    I: IntoIterator<Item = Result<Row, E>>,
{
    first_values(rows).collect()
}

/// Lazily maps every row to its first-column value.
///
/// Rows without columns are skipped.
pub fn first_values<E, I>(rows: I) -> impl Iterator<Item = Result<Value, E>>
where
    I: IntoIterator<Item = Result<Row, E>>,
{
    rows.into_iter().filter_map(|row| match row {
        Ok(row) => row.into_values().into_iter().next().map(Ok),
        Err(e) => Some(Err(e)),
    })
}

/// Truncates a sequence to at most `n` items.
///
/// Once `n` items have been yielded the source is not advanced again.
pub fn limit<I: IntoIterator>(n: usize, rows: I) -> std::iter::Take<I::IntoIter> {
    rows.into_iter().take(n)
}

/// Materializes a sequence, stopping at the first error.
pub fn list<T, E, I>(rows: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    rows.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn rows(n: i64) -> Vec<Result<Row, CoreError>> {
        (1..=n)
            .map(|i| Ok(Row::from_pairs([("id", Value::from(i)), ("v", Value::from(i * 10))])))
            .collect()
    }

    #[test]
    fn test_first_row_empty_is_none() {
        assert!(first_row(rows(0)).unwrap().is_none());
        let row = first_row(rows(2)).unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_single_row() {
        assert!(matches!(single_row(rows(0)), Err(CoreError::EmptyResult)));
        let row = single_row(rows(1)).unwrap();
        assert_eq!(row.get("v"), Some(&Value::Integer(10)));
    }

    #[test]
    fn test_values() {
        assert_eq!(first_value(rows(0)).unwrap(), None);
        assert_eq!(first_value(rows(3)).unwrap(), Some(Value::Integer(1)));
        assert!(matches!(single_value(rows(0)), Err(CoreError::EmptyResult)));
        assert_eq!(single_value(rows(2)).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_first_values() {
        let values = all_first_values(rows(3)).unwrap();
        assert_eq!(values, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);

        let mut lazy = first_values(rows(3));
        assert_eq!(lazy.next().unwrap().unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_limit_does_not_overpull() {
        let pulled = Cell::new(0);
        let source = (0..10).map(|i| {
            pulled.set(pulled.get() + 1);
            i
        });
        let taken: Vec<_> = limit(3, source).collect();
        assert_eq!(taken, vec![0, 1, 2]);
        assert_eq!(pulled.get(), 3);
    }

    #[test]
    fn test_source_errors_propagate() {
        let source: Vec<Result<Row, CoreError>> = vec![Err(CoreError::HollerithError("boom".into()))];
        assert!(matches!(list(source), Err(CoreError::HollerithError(_))));
    }

    #[test]
    fn test_list_materializes_in_order() {
        let all = list(rows(3)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].get("id"), Some(&Value::Integer(3)));
    }
}
