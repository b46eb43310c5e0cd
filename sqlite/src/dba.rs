//! The [`Dba`] connection wrapper: querying and engine passthroughs.
//!
//! Schema reporting and modification live in `schema`, schema copying in
//! `copy`; both extend [`Dba`] with further `impl` blocks.

use std::path::Path;

use dba_core::{Row, as_identifier, as_sql};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::config::DbaConfig;
use crate::convert::Params;
use crate::error::{DbaError, Result};
use crate::query::{
    CursorState, EntryKind, Outcome, PendingQuery, Rows, RunSummary, Statement, StatementCache,
};

/// Mode of a WAL checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointMode {
    /// Checkpoint as many frames as possible without waiting.
    #[default]
    Passive,
    /// Wait for writers, then checkpoint everything.
    Full,
    /// Like `Full`, then wait for readers so the log restarts.
    Restart,
    /// Like `Restart`, then truncate the log file.
    Truncate,
}

impl CheckpointMode {
    fn as_str(self) -> &'static str {
        match self {
            CheckpointMode::Passive => "passive",
            CheckpointMode::Full => "full",
            CheckpointMode::Restart => "restart",
            CheckpointMode::Truncate => "truncate",
        }
    }
}

/// A SQLite connection with a statement cache and schema utilities.
///
/// The connection and its cache are owned exclusively by one `Dba`; every
/// operation runs synchronously on the calling thread.
///
/// # Examples
///
/// ```
/// use dba_sqlite::{Dba, Value, single_value};
///
/// let dba = Dba::open_in_memory().unwrap();
/// dba.execute("create table t ( id integer primary key, v text );").unwrap();
/// dba.run("insert into t ( v ) values ( ? );", ["a"]).unwrap();
///
/// let v = dba.query("select v from t;", (), |rows| single_value(rows)).unwrap();
/// assert_eq!(v, Value::Text("a".into()));
/// ```
pub struct Dba {
    conn: Connection,
    cfg: DbaConfig,
    statements: StatementCache,
}

impl Dba {
    /// Opens the database named by `cfg.path`, or an in-memory database.
    pub fn open(cfg: DbaConfig) -> Result<Self> {
        let conn = match &cfg.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Ok(Self::from_connection(conn, cfg))
    }

    /// Opens a private in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(DbaConfig::default())
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection, cfg: DbaConfig) -> Self {
        let statements = StatementCache::new(&conn);
        Self {
            conn,
            cfg,
            statements,
        }
    }

    /// The configuration this wrapper was created with.
    pub fn config(&self) -> &DbaConfig {
        &self.cfg
    }

    /// The underlying connection, for engine features not wrapped here.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn echo(&self, label: &str, sql: &str) {
        if self.cfg.echo {
            info!(target: "dba::echo", label, "{sql}");
        }
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.cfg.debug
    }

    // ---------------------------------------------------------------------
    // Querying
    // ---------------------------------------------------------------------

    /// Returns the cached statement handle for `sql`.
    ///
    /// # Errors
    ///
    /// Returns [`DbaError::StatementBusy`] while a cursor over the same SQL
    /// text is open, or the engine error if `sql` does not compile.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        self.echo("prepare", sql);
        self.statements.prepare(&self.conn, sql)
    }

    /// Runs a row-producing statement and hands its lazy cursor to `f`.
    ///
    /// The cursor cannot outlive the call; whatever `f` does not consume is
    /// abandoned when `f` returns.
    pub fn query<T, F>(&self, sql: &str, params: impl Into<Params>, f: F) -> Result<T>
    where
        F: FnOnce(Rows<'_>) -> Result<T>,
    {
        self.echo("query", sql);
        let mut statement = self.statements.prepare(&self.conn, sql)?;
        let rows = statement.iterate(params)?;
        f(rows)
    }

    /// Runs a row-producing statement and collects all rows.
    pub fn all(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        self.echo("all", sql);
        self.statements.prepare(&self.conn, sql)?.all(params)
    }

    /// Runs a statement that produces no rows.
    pub fn run(&self, sql: &str, params: impl Into<Params>) -> Result<RunSummary> {
        self.echo("run", sql);
        self.statements.prepare(&self.conn, sql)?.run(params)
    }

    /// Executes arbitrary, possibly multi-statement SQL without caching.
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.echo("execute", sql);
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Runs one statement of a batch, choosing how to deliver its result.
    ///
    /// Statements that produce no rows are run. Row-producing statements are
    /// fully materialized when they belong to a procedure or are not the last
    /// statement of the batch, since later statements must not start while a
    /// cursor is still open. Only the terminal statement of a query is
    /// returned as [`Outcome::Pending`] for lazy iteration.
    pub fn run_or_query(
        &self,
        kind: EntryKind,
        is_last: bool,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Outcome<'_>> {
        self.echo("run_or_query", sql);
        let mut statement = self.statements.prepare(&self.conn, sql)?;
        let params = params.into();

        if !statement.reader() {
            return Ok(Outcome::Summary(statement.run(params)?));
        }
        if kind == EntryKind::Procedure || !is_last {
            return Ok(Outcome::Rows(statement.all(params)?));
        }
        Ok(Outcome::Pending(PendingQuery { statement, params }))
    }

    /// Cursor state of the cached statement for `sql`, if it was prepared.
    pub fn statement_state(&self, sql: &str) -> Option<CursorState> {
        self.statements.state(sql)
    }

    /// Number of distinct SQL texts in the statement cache.
    pub fn cached_statement_count(&self) -> usize {
        self.statements.len()
    }

    // ---------------------------------------------------------------------
    // Engine passthroughs
    // ---------------------------------------------------------------------

    /// Runs `pragma <text>` and returns its rows (none for setter pragmas).
    pub fn pragma(&self, text: &str) -> Result<Vec<Row>> {
        let sql = format!("pragma {text}");
        self.echo("pragma", &sql);
        let mut statement = self.statements.prepare(&self.conn, &sql)?;
        if statement.reader() {
            statement.all(())
        } else {
            statement.run(())?;
            Ok(Vec::new())
        }
    }

    /// Returns whether foreign key enforcement is on.
    pub fn get_foreign_key_state(&self) -> Result<bool> {
        let rows = self.pragma("foreign_keys;")?;
        rows.first()
            .and_then(Row::first_value)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| DbaError::ConversionError("pragma foreign_keys returned no state".into()))
    }

    /// Turns foreign key enforcement on or off for the connection.
    ///
    /// Has no effect inside an open transaction.
    pub fn set_foreign_key_state(&self, on: bool) -> Result<()> {
        self.pragma(if on {
            "foreign_keys = on;"
        } else {
            "foreign_keys = off;"
        })?;
        Ok(())
    }

    /// Executes the SQL text of a file.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<()> {
        let sql = std::fs::read_to_string(path)?;
        self.execute(&sql)
    }

    /// Runs a WAL checkpoint and returns the `busy`, `log` and
    /// `checkpointed` counters.
    pub fn checkpoint(&self, mode: CheckpointMode) -> Result<Vec<Row>> {
        self.pragma(&format!("wal_checkpoint({});", mode.as_str()))
    }

    /// Writes a compacted copy of `schema` to a new database file.
    pub fn backup(&self, schema: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let path = path
            .to_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DbaError::InvalidPath(path.display().to_string()))?;
        self.execute(&format!(
            "vacuum {} into {};",
            as_identifier(schema),
            as_sql(&path.into())?
        ))
    }

    /// Starts a transaction on the shared connection.
    ///
    /// The transaction rolls back when dropped without
    /// [`commit`](Transaction::commit).
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        debug!("starting transaction");
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Closes the connection, finalizing all cached statements.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| DbaError::from(e))
    }
}

impl std::fmt::Debug for Dba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dba")
            .field("cfg", &self.cfg)
            .field("cached_statements", &self.statements.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dba_core::{CoreError, Value, first_row, limit, list, single_row};

    fn setup() -> Dba {
        let dba = Dba::open_in_memory().unwrap();
        dba.execute(
            "create table t ( id integer primary key, v text );
             insert into t ( v ) values ( 'a' ), ( 'b' ), ( 'c' );",
        )
        .unwrap();
        dba
    }

    #[test]
    fn test_query_is_lazy_and_limited() {
        let dba = setup();
        let sql = "select v from t order by id;";
        let taken = dba
            .query(sql, (), |rows| list(limit(2, rows)))
            .unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[1].get_str("v"), Some("b"));
        // abandoned before the end
        assert_eq!(dba.statement_state(sql), Some(CursorState::Idle));
    }

    #[test]
    fn test_single_row_on_empty_result() {
        let dba = setup();
        let err = dba
            .query("select * from t where id > 100;", (), |rows| single_row(rows))
            .unwrap_err();
        assert!(matches!(err, DbaError::ValueError(CoreError::EmptyResult)));

        let row = dba
            .query("select * from t where id = ?;", [1_i64], |rows| single_row(rows))
            .unwrap();
        assert_eq!(row.get_str("v"), Some("a"));
    }

    #[test]
    fn test_nested_query_on_same_text_is_busy() {
        let dba = setup();
        let sql = "select id from t;";
        let first = dba.query(sql, (), |rows| first_row(rows)).unwrap();
        assert!(first.is_some());

        let nested = dba.query(sql, (), |mut rows| {
            let _ = rows.next();
            dba.query(sql, (), |inner| list(inner))
        });
        assert!(matches!(nested, Err(DbaError::StatementBusy(_))));
    }

    #[test]
    fn test_run_and_all() {
        let dba = setup();
        let summary = dba
            .run("insert into t ( v ) values ( :v );", Params::named([("v", "d")]))
            .unwrap();
        assert_eq!(summary.changes, 1);
        assert_eq!(summary.last_insert_rowid, 4);

        let rows = dba.all("select v from t order by id;", ()).unwrap();
        let values: Vec<_> = rows.iter().filter_map(|r| r.get_str("v")).collect();
        assert_eq!(values, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_run_or_query_decisions() {
        let dba = setup();

        let outcome = dba
            .run_or_query(EntryKind::Query, false, "delete from t where id = 3;", ())
            .unwrap();
        assert!(matches!(outcome, Outcome::Summary(RunSummary { changes: 1, .. })));

        let outcome = dba
            .run_or_query(EntryKind::Query, false, "select * from t;", ())
            .unwrap();
        assert!(matches!(outcome, Outcome::Rows(ref rows) if rows.len() == 2));

        let outcome = dba
            .run_or_query(EntryKind::Procedure, true, "select * from t;", ())
            .unwrap();
        assert!(matches!(outcome, Outcome::Rows(_)));

        let outcome = dba
            .run_or_query(EntryKind::Query, true, "select v from t order by id;", ())
            .unwrap();
        match outcome {
            Outcome::Pending(mut pending) => {
                assert_eq!(pending.sql(), "select v from t order by id;");
                let rows = list(pending.iterate().unwrap()).unwrap();
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected pending outcome, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_key_state_toggle() {
        let dba = setup();
        dba.set_foreign_key_state(true).unwrap();
        assert!(dba.get_foreign_key_state().unwrap());
        dba.set_foreign_key_state(false).unwrap();
        assert!(!dba.get_foreign_key_state().unwrap());
    }

    #[test]
    fn test_undefined_parameter_is_rejected() {
        let dba = setup();
        let err = dba
            .run("insert into t ( v ) values ( ? );", [Value::Undefined])
            .unwrap_err();
        assert!(matches!(
            err,
            DbaError::ValueError(CoreError::UnrepresentableValue { .. })
        ));
    }

    #[test]
    fn test_read_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("init.sql");
        std::fs::write(&script, "create table u ( x ); insert into u values ( 1 );").unwrap();

        let dba = setup();
        dba.read(&script).unwrap();

        let copy = dir.path().join("copy.db");
        dba.backup("main", &copy).unwrap();

        let other = Dba::open(DbaConfig::with_path(&copy)).unwrap();
        let rows = other.all("select x from u;", ()).unwrap();
        assert_eq!(rows[0].first_value(), Some(&Value::Integer(1)));
        other.close().unwrap();
    }

    #[test]
    fn test_checkpoint_on_memory_db() {
        let dba = setup();
        let rows = dba.checkpoint(CheckpointMode::Passive).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
    }
}
