//! Copying the structure and data of one schema into another.
//!
//! Creation statements are retargeted by rewriting their leading
//! `CREATE [UNIQUE] <TYPE> [IF NOT EXISTS]` clause; the rest of the
//! statement is kept byte for byte. Statements whose clause cannot be found
//! fail with [`DbaError::RewriteFailed`] rather than being skipped.

use std::sync::LazyLock;

use dba_core::as_identifier;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::dba::Dba;
use crate::error::{DbaError, Result};
use crate::schema::{DbObject, ObjectOrder, ObjectType, SEQUENCE_TABLE};

static CREATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*create\s+(unique\s+)?(table|index|view)\s+(if\s+not\s+exists\s+)?")
        .expect("static regex must compile")
});

/// Rewrites the creation statement of a `kind` object so that it creates
/// the object in the schema `to_schema_x` (an already quoted identifier).
///
/// # Errors
///
/// Returns [`DbaError::RewriteFailed`] if `sql` does not start with a
/// `CREATE` clause for `kind`.
pub(crate) fn retarget_create_sql(sql: &str, kind: ObjectType, to_schema_x: &str) -> Result<String> {
    let caps = CREATE_RE
        .captures(sql)
        .ok_or_else(|| DbaError::RewriteFailed(sql.to_string()))?;
    if !caps[2].eq_ignore_ascii_case(kind.as_str()) {
        return Err(DbaError::RewriteFailed(sql.to_string()));
    }

    let unique = if caps.get(1).is_some() { "unique " } else { "" };
    let if_not_exists = if caps.get(3).is_some() {
        "if not exists "
    } else {
        ""
    };
    let rest = &sql[caps.get(0).map_or(0, |m| m.end())..];
    Ok(format!(
        "create {unique}{kind} {if_not_exists}{to_schema_x}.{rest}"
    ))
}

/// Summary of a [`Dba::copy_schema`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CopyReport {
    /// Tables, views and indexes created in the destination.
    pub objects_created: usize,
    /// Rows inserted into destination tables.
    pub rows_copied: usize,
}

fn describe(objects: &[DbObject]) -> String {
    objects
        .iter()
        .map(|o| format!("({}){}", o.kind, o.name))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Dba {
    /// Copies every table, view and index of `from_schema`, including table
    /// contents, into `to_schema`.
    ///
    /// Relations are created before indexes, and no data is copied until all
    /// objects exist. Foreign key enforcement is off while copying and is
    /// switched on afterwards, whatever its prior state, also when the copy
    /// fails. On success the destination is then checked for violations.
    ///
    /// The copy is not transactional: on failure, objects created so far stay
    /// in the destination.
    ///
    /// # Errors
    ///
    /// - [`DbaError::UnknownSchema`] if either schema is not attached.
    /// - [`DbaError::UnsupportedObjectType`] if the source holds a trigger.
    /// - [`DbaError::RewriteFailed`] if a creation statement has an
    ///   unexpected shape.
    /// - [`DbaError::ForeignKeyViolation`] if the copied data violates a
    ///   foreign key.
    ///
    /// # Examples
    ///
    /// ```
    /// use dba_sqlite::Dba;
    ///
    /// let dba = Dba::open_in_memory().unwrap();
    /// dba.execute("create table t ( id integer primary key, v text );
    ///              insert into t ( v ) values ( 'a' ), ( 'b' );").unwrap();
    /// dba.attach(":memory:", "tmp").unwrap();
    ///
    /// let report = dba.copy_schema("main", "tmp").unwrap();
    /// assert_eq!(report.objects_created, 1);
    /// assert_eq!(report.rows_copied, 2);
    /// ```
    pub fn copy_schema(&self, from_schema: &str, to_schema: &str) -> Result<CopyReport> {
        let schemas = self.list_schema_names()?;
        for schema in [from_schema, to_schema] {
            if !schemas.iter().any(|name| name == schema) {
                return Err(DbaError::UnknownSchema(schema.to_string()));
            }
        }
        let to_x = as_identifier(to_schema);

        let mut objects: Vec<DbObject> = self
            .walk_objects(from_schema, ObjectOrder::Natural)?
            .into_iter()
            .filter(|o| o.sql.as_deref().is_some_and(|sql| !sql.is_empty()))
            .filter(|o| o.name != SEQUENCE_TABLE)
            .collect();
        if let Some(o) = objects.iter().find(|o| o.kind == ObjectType::Trigger) {
            return Err(DbaError::UnsupportedObjectType {
                kind: o.kind.to_string(),
                name: o.name.clone(),
            });
        }
        objects.sort_by_key(|o| o.kind.creation_rank());

        self.pragma(&format!("{to_x}.foreign_keys = off;"))?;
        let copied = self.copy_objects(&objects, from_schema, to_schema);
        let restored = self.pragma(&format!("{to_x}.foreign_keys = on;"));
        let report = copied?;
        restored?;
        self.check_foreign_keys(to_schema)?;

        debug!(
            from = from_schema,
            to = to_schema,
            objects = report.objects_created,
            rows = report.rows_copied,
            "copied schema"
        );
        Ok(report)
    }

    fn copy_objects(
        &self,
        objects: &[DbObject],
        from_schema: &str,
        to_schema: &str,
    ) -> Result<CopyReport> {
        let from_x = as_identifier(from_schema);
        let to_x = as_identifier(to_schema);

        let mut report = CopyReport::default();
        let mut inserts = Vec::new();
        for object in objects {
            debug!(kind = %object.kind, name = %object.name, "copying DB object");
            let sql = object.sql.as_deref().unwrap_or_default();
            self.execute(&retarget_create_sql(sql, object.kind, &to_x)?)?;
            report.objects_created += 1;

            if object.kind == ObjectType::Table {
                let name_x = as_identifier(&object.name);
                inserts.push(format!(
                    "insert into {to_x}.{name_x} select * from {from_x}.{name_x};"
                ));
            }
        }

        if self.debug_enabled() {
            let source = self.walk_objects(from_schema, ObjectOrder::Natural)?;
            let target = self.walk_objects(to_schema, ObjectOrder::Natural)?;
            debug!(schema = from_schema, "objects: {}", describe(&source));
            debug!(schema = to_schema, "objects: {}", describe(&target));
        }

        for insert in &inserts {
            report.rows_copied += self.run(insert, ())?.changes;
        }
        Ok(report)
    }

    fn check_foreign_keys(&self, schema: &str) -> Result<()> {
        let violations = self.pragma(&format!("{}.foreign_key_check;", as_identifier(schema)))?;
        if violations.is_empty() {
            return Ok(());
        }
        let mut tables: Vec<String> = Vec::new();
        for table in violations.iter().filter_map(|row| row.get_str("table")) {
            if !tables.iter().any(|t| t == table) {
                tables.push(table.to_string());
            }
        }
        Err(DbaError::ForeignKeyViolation {
            schema: schema.to_string(),
            count: violations.len(),
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retarget_table() {
        let sql = "CREATE TABLE t ( id integer primary key )";
        assert_eq!(
            retarget_create_sql(sql, ObjectType::Table, "\"tmp\"").unwrap(),
            "create table \"tmp\".t ( id integer primary key )"
        );
    }

    #[test]
    fn test_retarget_keeps_unique_and_if_not_exists() {
        let sql = "create unique index if not exists ix on t ( v )";
        assert_eq!(
            retarget_create_sql(sql, ObjectType::Index, "\"b\"").unwrap(),
            "create unique index if not exists \"b\".ix on t ( v )"
        );
    }

    #[test]
    fn test_retarget_is_case_insensitive() {
        let sql = "  Create\n  View v as select 1";
        assert_eq!(
            retarget_create_sql(sql, ObjectType::View, "\"x\"").unwrap(),
            "create view \"x\".v as select 1"
        );
    }

    #[test]
    fn test_retarget_failures() {
        assert!(matches!(
            retarget_create_sql("select 1", ObjectType::Table, "\"x\""),
            Err(DbaError::RewriteFailed(_))
        ));
        assert!(matches!(
            retarget_create_sql("create view v as select 1", ObjectType::Table, "\"x\""),
            Err(DbaError::RewriteFailed(_))
        ));
        assert!(matches!(
            retarget_create_sql("create trigger tr after insert on t begin select 1; end", ObjectType::Trigger, "\"x\""),
            Err(DbaError::RewriteFailed(_))
        ));
    }

    #[test]
    fn test_copy_creates_relations_before_indexes() {
        let dba = Dba::open_in_memory().unwrap();
        dba.execute(
            "create table a ( id integer primary key, v text );
             create index a_v on a ( v );
             create view av as select v from a;
             insert into a ( v ) values ( 'x' ), ( 'y' ), ( 'z' );",
        )
        .unwrap();
        dba.attach(":memory:", "tmp").unwrap();

        let report = dba.copy_schema("main", "tmp").unwrap();
        assert_eq!(
            report,
            CopyReport {
                objects_created: 3,
                rows_copied: 3
            }
        );
        assert_eq!(dba.type_of("a_v", "tmp").unwrap(), Some(ObjectType::Index));
        assert_eq!(dba.type_of("av", "tmp").unwrap(), Some(ObjectType::View));
    }

    #[test]
    fn test_copy_empty_schema_is_noop() {
        let dba = Dba::open_in_memory().unwrap();
        dba.attach(":memory:", "tmp").unwrap();
        assert_eq!(dba.copy_schema("main", "tmp").unwrap(), CopyReport::default());
    }

    #[test]
    fn test_copy_rejects_unknown_schemas() {
        let dba = Dba::open_in_memory().unwrap();
        assert!(matches!(
            dba.copy_schema("main", "nowhere"),
            Err(DbaError::UnknownSchema(ref s)) if s == "nowhere"
        ));
        assert!(matches!(
            dba.copy_schema("nowhere", "main"),
            Err(DbaError::UnknownSchema(ref s)) if s == "nowhere"
        ));
    }

    #[test]
    fn test_failed_copy_switches_foreign_keys_back_on() {
        let dba = Dba::open_in_memory().unwrap();
        dba.execute("create table a ( id integer primary key );").unwrap();
        dba.attach(":memory:", "tmp").unwrap();
        dba.execute("create table tmp.a ( id integer primary key );").unwrap();

        dba.set_foreign_key_state(false).unwrap();
        assert!(dba.copy_schema("main", "tmp").is_err());
        assert!(dba.get_foreign_key_state().unwrap());
    }
}
