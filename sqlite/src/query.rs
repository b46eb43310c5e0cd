//! Statement cache, prepared statement handles and lazy row cursors.
//!
//! The cache is keyed by the exact SQL text: two statements that differ
//! only in whitespace are cached separately. Compiled statements live in
//! rusqlite's prepared-statement cache, whose capacity is grown so that no
//! statement is evicted while the connection lives. Next to each entry the
//! cache keeps a small cursor state machine:
//!
//! ```text
//! Idle --iterate--> Open --drained--> Exhausted --iterate--> Open
//!                    |
//!                    +--dropped / engine error--> Idle
//! ```
//!
//! Preparing or iterating an SQL text whose cursor is still `Open` fails
//! with [`DbaError::StatementBusy`] instead of silently resetting the
//! running cursor.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use dba_core::Row;
use rusqlite::{CachedStatement, Connection};

use crate::convert::{self, Params};
use crate::error::{DbaError, Result};

/// Capacity the engine-side statement cache starts with.
pub(crate) const INITIAL_STATEMENT_CAPACITY: usize = 64;

/// State of the lazy cursor belonging to one SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No cursor is running.
    Idle,
    /// A cursor has been handed out and not yet drained or dropped.
    Open,
    /// The last cursor was drained to the end.
    Exhausted,
}

/// Summary of a statement that produces no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Number of rows inserted, updated or deleted.
    pub changes: usize,
    /// Rowid of the most recent successful insert on the connection.
    pub last_insert_rowid: i64,
}

#[derive(Debug)]
struct CacheEntry {
    reader: bool,
    state: CursorState,
}

/// Per-connection statement registry.
#[derive(Debug)]
pub(crate) struct StatementCache {
    entries: RefCell<HashMap<String, CacheEntry>>,
    capacity: Cell<usize>,
}

impl StatementCache {
    pub(crate) fn new(conn: &Connection) -> Self {
        conn.set_prepared_statement_cache_capacity(INITIAL_STATEMENT_CAPACITY);
        Self {
            entries: RefCell::new(HashMap::new()),
            capacity: Cell::new(INITIAL_STATEMENT_CAPACITY),
        }
    }

    /// Returns the cached handle for `sql`, compiling it on first use.
    pub(crate) fn prepare<'conn>(
        &'conn self,
        conn: &'conn Connection,
        sql: &str,
    ) -> Result<Statement<'conn>> {
        self.ensure_not_open(sql)?;
        let inner = conn.prepare_cached(sql)?;
        let reader = inner.column_count() > 0;

        let mut entries = self.entries.borrow_mut();
        if !entries.contains_key(sql) {
            entries.insert(
                sql.to_string(),
                CacheEntry {
                    reader,
                    state: CursorState::Idle,
                },
            );
            if entries.len() > self.capacity.get() {
                let capacity = entries.len().next_power_of_two();
                conn.set_prepared_statement_cache_capacity(capacity);
                self.capacity.set(capacity);
            }
        }
        drop(entries);

        Ok(Statement {
            inner,
            conn,
            cache: self,
            sql: sql.to_string(),
            reader,
        })
    }

    pub(crate) fn state(&self, sql: &str) -> Option<CursorState> {
        self.entries.borrow().get(sql).map(|entry| entry.state)
    }

    #[cfg(test)]
    pub(crate) fn is_reader(&self, sql: &str) -> Option<bool> {
        self.entries.borrow().get(sql).map(|entry| entry.reader)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    fn set_state(&self, sql: &str, state: CursorState) {
        if let Some(entry) = self.entries.borrow_mut().get_mut(sql) {
            entry.state = state;
        }
    }

    fn ensure_not_open(&self, sql: &str) -> Result<()> {
        if self.state(sql) == Some(CursorState::Open) {
            return Err(DbaError::StatementBusy(sql.to_string()));
        }
        Ok(())
    }
}

/// A compiled statement handed out by the statement cache.
///
/// The compiled statement goes back to the cache when the handle is
/// dropped.
pub struct Statement<'conn> {
    inner: CachedStatement<'conn>,
    conn: &'conn Connection,
    cache: &'conn StatementCache,
    sql: String,
    reader: bool,
}

impl<'conn> Statement<'conn> {
    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns `true` if the statement produces rows.
    pub fn reader(&self) -> bool {
        self.reader
    }

    /// Names of the result columns in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.inner
            .column_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Executes a statement that produces no rows.
    pub fn run(&mut self, params: impl Into<Params>) -> Result<RunSummary> {
        let changes = convert::execute_with(&mut self.inner, &params.into())?;
        Ok(RunSummary {
            changes,
            last_insert_rowid: self.conn.last_insert_rowid(),
        })
    }

    /// Executes the statement and collects every row.
    pub fn all(&mut self, params: impl Into<Params>) -> Result<Vec<Row>> {
        self.iterate(params)?.collect()
    }

    /// Executes the statement and returns a lazy cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbaError::StatementBusy`] if another cursor over the same
    /// SQL text is still open.
    pub fn iterate(&mut self, params: impl Into<Params>) -> Result<Rows<'_>> {
        self.cache.ensure_not_open(&self.sql)?;
        let columns: Arc<[String]> = self.column_names().into();
        let params = params.into();

        let Self {
            inner, cache, sql, ..
        } = self;
        let cache: &StatementCache = *cache;
        let rows = convert::query_with(inner, &params)?;
        cache.set_state(sql, CursorState::Open);

        Ok(Rows {
            inner: rows,
            columns,
            cache,
            sql: sql.as_str(),
            done: false,
        })
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("reader", &self.reader)
            .finish()
    }
}

/// Lazy cursor over the rows of a statement.
///
/// Rows are pulled from the engine one at a time as the iterator is
/// advanced. Dropping the cursor before the end abandons it.
pub struct Rows<'stmt> {
    inner: rusqlite::Rows<'stmt>,
    columns: Arc<[String]>,
    cache: &'stmt StatementCache,
    sql: &'stmt str,
    done: bool,
}

impl Rows<'_> {
    /// Names of the result columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn close(&mut self, state: CursorState) {
        if !self.done {
            self.done = true;
            self.cache.set_state(self.sql, state);
        }
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let failure = match self.inner.next() {
            Ok(Some(row)) => return Some(convert::row_from_sqlite(row, &self.columns)),
            Ok(None) => None,
            Err(e) => Some(e),
        };
        match failure {
            None => {
                self.close(CursorState::Exhausted);
                None
            }
            Some(e) => {
                self.close(CursorState::Idle);
                Some(Err(e.into()))
            }
        }
    }
}

impl Drop for Rows<'_> {
    fn drop(&mut self) {
        self.close(CursorState::Idle);
    }
}

/// Whether a statement belongs to a stored procedure body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Statement of a procedure; results are always materialized.
    Procedure,
    /// Statement of a plain query.
    Query,
}

/// Result of [`Dba::run_or_query`](crate::Dba::run_or_query).
#[derive(Debug)]
pub enum Outcome<'conn> {
    /// The statement produced no rows and was run.
    Summary(RunSummary),
    /// The statement produced rows and they were fully consumed.
    Rows(Vec<Row>),
    /// The terminal statement of a query; its rows are pulled on demand.
    Pending(PendingQuery<'conn>),
}

/// A prepared, row-producing statement together with its parameters.
#[derive(Debug)]
pub struct PendingQuery<'conn> {
    pub(crate) statement: Statement<'conn>,
    pub(crate) params: Params,
}

impl PendingQuery<'_> {
    /// The SQL text of the pending statement.
    pub fn sql(&self) -> &str {
        self.statement.sql()
    }

    /// Starts the lazy cursor.
    pub fn iterate(&mut self) -> Result<Rows<'_>> {
        self.statement.iterate(self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dba_core::Value;

    fn setup() -> (Connection, StatementCache) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "create table t ( n integer ); insert into t values ( 1 ), ( 2 ), ( 3 );",
        )
        .unwrap();
        let cache = StatementCache::new(&conn);
        (conn, cache)
    }

    #[test]
    fn test_entries_are_keyed_by_exact_text() {
        let (conn, cache) = setup();
        cache.prepare(&conn, "select n from t").unwrap();
        cache.prepare(&conn, "select n from t").unwrap();
        cache.prepare(&conn, "select  n from t").unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.is_reader("select n from t"), Some(true));
    }

    #[test]
    fn test_reader_flag() {
        let (conn, cache) = setup();
        assert!(cache.prepare(&conn, "select 1").unwrap().reader());
        assert!(!cache.prepare(&conn, "delete from t").unwrap().reader());
    }

    #[test]
    fn test_cursor_state_machine() {
        let (conn, cache) = setup();
        let sql = "select n from t order by n";
        let mut stmt = cache.prepare(&conn, sql).unwrap();
        assert_eq!(cache.state(sql), Some(CursorState::Idle));

        let mut rows = stmt.iterate(()).unwrap();
        assert_eq!(cache.state(sql), Some(CursorState::Open));
        assert_eq!(
            rows.next().unwrap().unwrap().first_value(),
            Some(&Value::Integer(1))
        );
        drop(rows);
        assert_eq!(cache.state(sql), Some(CursorState::Idle));

        let all: Vec<Row> = stmt.iterate(()).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(cache.state(sql), Some(CursorState::Exhausted));
    }

    #[test]
    fn test_reuse_while_open_fails_fast() {
        let (conn, cache) = setup();
        let sql = "select n from t";
        let mut first = cache.prepare(&conn, sql).unwrap();
        let mut second = cache.prepare(&conn, sql).unwrap();

        let rows = first.iterate(()).unwrap();
        assert!(matches!(
            cache.prepare(&conn, sql),
            Err(DbaError::StatementBusy(_))
        ));
        assert!(matches!(second.iterate(()), Err(DbaError::StatementBusy(_))));
        drop(rows);

        assert_eq!(second.all(()).unwrap().len(), 3);
    }

    #[test]
    fn test_run_reports_changes_and_rowid() {
        let (conn, cache) = setup();
        let mut stmt = cache.prepare(&conn, "insert into t values ( ? )").unwrap();
        let summary = stmt.run([42_i64]).unwrap();
        assert_eq!(summary.changes, 1);
        assert_eq!(summary.last_insert_rowid, 4);
    }

    #[test]
    fn test_capacity_grows_past_initial() {
        let (conn, cache) = setup();
        for i in 0..(INITIAL_STATEMENT_CAPACITY + 10) {
            cache.prepare(&conn, &format!("select {i}")).unwrap();
        }
        assert_eq!(cache.len(), INITIAL_STATEMENT_CAPACITY + 10);
        assert!(cache.capacity.get() >= cache.len());
    }
}
