//! Convenience layer over SQLite.
//!
//! [`Dba`] wraps a [`rusqlite::Connection`] and adds a statement cache keyed
//! by exact SQL text, lazy row cursors with result shape adapters, schema
//! reporting across attached databases, and copying or clearing of whole
//! schemas.
//!
//! # Architecture
//!
//! - **`dba`**: the [`Dba`] wrapper, querying and engine passthroughs
//! - **`query`**: statement cache, statement handles and cursors
//! - **`convert`**: parameter binding and row conversion
//! - **`schema`**: catalog, object walking, clear, attach/detach
//! - **`copy`**: schema copy engine
//! - **`functions`**: user SQL functions, aggregates and extension loading
//! - **`config`**: YAML-loadable [`DbaConfig`]
//!
//! Engine-independent pieces (values, literals, adapters, the sort-key
//! codec) live in `dba-core` and are re-exported here.
//!
//! # Quick start
//!
//! ```
//! use dba_sqlite::{Dba, ObjectOrder, Value, list, limit};
//!
//! let dba = Dba::open_in_memory().unwrap();
//! dba.execute("create table t ( id integer primary key, v text );
//!              insert into t ( v ) values ( 'a' ), ( 'b' ), ( 'c' );").unwrap();
//!
//! // Pull only the first two rows from the cursor.
//! let rows = dba
//!     .query("select v from t order by id;", (), |rows| list(limit(2, rows)))
//!     .unwrap();
//! assert_eq!(rows.len(), 2);
//!
//! // Clone the schema into an in-memory database and check it.
//! dba.attach(":memory:", "tmp").unwrap();
//! dba.copy_schema("main", "tmp").unwrap();
//! let objects = dba.walk_objects("tmp", ObjectOrder::Natural).unwrap();
//! assert_eq!(objects[0].name, "t");
//!
//! let count = dba.query("select count(*) from tmp.t;", (), |rows| dba_sqlite::single_value(rows)).unwrap();
//! assert_eq!(count, Value::Integer(3));
//! ```
//!
//! # Logging
//!
//! Events are emitted through `tracing`. With [`DbaConfig::echo`] set, every
//! statement is logged at `INFO` under the target `dba::echo`; schema copy
//! and clear log their progress at `DEBUG`.

mod config;
mod convert;
mod copy;
mod dba;
mod error;
mod functions;
mod query;
mod schema;

pub use config::DbaConfig;
pub use convert::Params;
pub use copy::CopyReport;
pub use dba::{CheckpointMode, Dba};
pub use error::{DbaError, Result};
pub use query::{CursorState, EntryKind, Outcome, PendingQuery, Rows, RunSummary, Statement};
pub use schema::{DbObject, FieldInfo, ObjectOrder, ObjectType, SchemaInfo};

pub use dba_core::{
    CoreError, Row, Value, all_first_values, as_hollerith, as_identifier, as_sql, escape_text,
    first_row, first_value, first_values, from_hollerith, interpolate, limit, list, single_row,
    single_value,
};
