//! Schema reporting and modification.
//!
//! Lists attached schemas and the objects (tables, views, indexes, triggers)
//! they contain, reports columns and foreign key dependencies, and drops or
//! attaches whole schemas.
//!
//! # Object order
//!
//! [`ObjectOrder::Natural`] lists objects by ascending `(type, name)`,
//! [`ObjectOrder::Drop`] by descending `(type, name)`. Drop order visits views
//! and tables before indexes. An index that backs a `PRIMARY KEY` or `UNIQUE`
//! constraint cannot be dropped on its own; it disappears together with its
//! table, which drop order always removes first.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use dba_core::{Row, Value, as_identifier, as_sql, interpolate};
use serde::Serialize;
use tracing::debug;

use crate::dba::Dba;
use crate::error::{DbaError, Result};

/// Name of the engine table that tracks `AUTOINCREMENT` counters.
pub(crate) const SEQUENCE_TABLE: &str = "sqlite_sequence";

/// Type of a catalog object.
///
/// Variants are declared in the engine's alphabetical type order, so the
/// derived `Ord` matches `order by type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Index,
    Table,
    Trigger,
    View,
}

impl ObjectType {
    /// The type name as stored in the catalog.
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Index => "index",
            ObjectType::Table => "table",
            ObjectType::Trigger => "trigger",
            ObjectType::View => "view",
        }
    }

    /// Position in creation order: relations first, then indexes.
    pub(crate) fn creation_rank(self) -> u8 {
        match self {
            ObjectType::Table => 0,
            ObjectType::View => 1,
            ObjectType::Index => 2,
            ObjectType::Trigger => 3,
        }
    }
}

impl FromStr for ObjectType {
    type Err = DbaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "index" => Ok(ObjectType::Index),
            "table" => Ok(ObjectType::Table),
            "trigger" => Ok(ObjectType::Trigger),
            "view" => Ok(ObjectType::View),
            other => Err(DbaError::ConversionError(format!(
                "unknown object type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbObject {
    #[serde(rename = "type")]
    pub kind: ObjectType,
    pub name: String,
    /// Creation statement; `None` for implicit objects such as the indexes
    /// behind `PRIMARY KEY` and `UNIQUE` constraints.
    pub sql: Option<String>,
}

impl DbObject {
    fn from_row(row: &Row) -> Result<Self> {
        let kind = row
            .get_str("type")
            .ok_or_else(|| DbaError::ConversionError("catalog row without type".into()))?
            .parse()?;
        let name = row
            .get_str("name")
            .ok_or_else(|| DbaError::ConversionError("catalog row without name".into()))?
            .to_string();
        let sql = row.get_str("sql").map(String::from);
        Ok(Self { kind, name, sql })
    }
}

/// Order in which [`Dba::walk_objects`] lists objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectOrder {
    /// Ascending by type, then name.
    #[default]
    Natural,
    /// Descending by type, then name.
    Drop,
}

impl ObjectOrder {
    fn direction(self) -> &'static str {
        match self {
            ObjectOrder::Natural => "asc",
            ObjectOrder::Drop => "desc",
        }
    }
}

impl FromStr for ObjectOrder {
    type Err = DbaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "natural" => Ok(ObjectOrder::Natural),
            "drop" => Ok(ObjectOrder::Drop),
            other => Err(DbaError::InvalidOrdering(other.to_string())),
        }
    }
}

/// An attached schema as reported by `pragma database_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaInfo {
    pub seq: i64,
    pub name: String,
    /// Backing file; empty for in-memory and temporary schemas.
    pub file: String,
}

/// One column of a table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub schema: String,
    pub relation_name: String,
    pub field_name: String,
}

fn text(row: &Row, column: &str) -> Result<String> {
    row.get_str(column)
        .map(String::from)
        .ok_or_else(|| DbaError::ConversionError(format!("expected text in column '{column}'")))
}

impl Dba {
    // ---------------------------------------------------------------------
    // Reporting
    // ---------------------------------------------------------------------

    /// All objects of the `main` schema, by descending type, then name.
    pub fn catalog(&self) -> Result<Vec<DbObject>> {
        self.all(
            "select type, name, sql from sqlite_master order by type desc, name;",
            (),
        )?
        .iter()
        .map(DbObject::from_row)
        .collect()
    }

    /// Objects of one attached schema in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`DbaError::InvalidSchema`] if `schema` is not attached.
    pub fn walk_objects(&self, schema: &str, order: ObjectOrder) -> Result<Vec<DbObject>> {
        self.require_attached(schema)?;
        let direction = order.direction();
        let sql = format!(
            "select type, name, sql from {}.sqlite_master order by type {direction}, name {direction};",
            as_identifier(schema)
        );
        self.all(&sql, ())?.iter().map(DbObject::from_row).collect()
    }

    /// All attached schemas, ordered by name.
    pub fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        self.all("select * from pragma_database_list order by name;", ())?
            .iter()
            .map(|row| {
                Ok(SchemaInfo {
                    seq: row.get("seq").and_then(Value::as_i64).unwrap_or_default(),
                    name: text(row, "name")?,
                    file: row.get_str("file").unwrap_or_default().to_string(),
                })
            })
            .collect()
    }

    /// Names of all attached schemas, ordered by name.
    pub fn list_schema_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_schemas()?
            .into_iter()
            .map(|info| info.name)
            .collect())
    }

    /// Type of the object called `name` in `schema`, if it exists.
    pub fn type_of(&self, name: &str, schema: &str) -> Result<Option<ObjectType>> {
        self.require_attached(schema)?;
        let sql = format!(
            "select type from {}.sqlite_master where name = ?;",
            as_identifier(schema)
        );
        match self.all(&sql, [name])?.first() {
            Some(row) => Ok(Some(text(row, "type")?.parse()?)),
            None => Ok(None),
        }
    }

    /// Every column of every table and view in `schema`.
    pub fn list_fields(&self, schema: &str) -> Result<Vec<FieldInfo>> {
        self.require_attached(schema)?;
        let schema_lit = as_sql(&Value::from(schema))?;
        let sql = format!(
            "select
  {schema_lit} as schema,
  m.name as relation_name,
  p.name as field_name
from {schema_x}.sqlite_master as m
join pragma_table_info( m.name, {schema_lit} ) as p
where m.type in ( 'table', 'view' )
order by m.name, p.cid;",
            schema_x = as_identifier(schema),
        );
        self.all(&sql, ())?
            .iter()
            .map(|row| {
                Ok(FieldInfo {
                    schema: text(row, "schema")?,
                    relation_name: text(row, "relation_name")?,
                    field_name: text(row, "field_name")?,
                })
            })
            .collect()
    }

    /// Declared type of every column of `table` in `main`.
    ///
    /// Types are returned as the engine reports them: standard names such as
    /// `INTEGER` or `TEXT` in upper case, other declarations as written, and
    /// an empty string for untyped columns.
    ///
    /// The table name is rendered as a literal since the pragma does not
    /// accept bound parameters.
    pub fn column_types(&self, table: &str) -> Result<BTreeMap<String, String>> {
        let sql = interpolate("pragma table_info( $table );", &[("table", Value::from(table))])?;
        self.all(&sql, ())?
            .iter()
            .map(|row| Ok((text(row, "name")?, text(row, "type")?)))
            .collect()
    }

    /// Tables referenced by the foreign keys of `table` in `schema`.
    ///
    /// Each referenced table is listed once, in constraint order.
    pub fn dependencies_of(&self, table: &str, schema: &str) -> Result<Vec<String>> {
        self.require_attached(schema)?;
        let sql = format!(
            "pragma {}.foreign_key_list( {} );",
            as_identifier(schema),
            as_identifier(table)
        );
        let mut tables: Vec<String> = Vec::new();
        for row in self.all(&sql, ())? {
            let name = text(&row, "table")?;
            if !tables.contains(&name) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    // ---------------------------------------------------------------------
    // Modification
    // ---------------------------------------------------------------------

    /// Drops every object in `schema` and returns how many were listed.
    ///
    /// Foreign key enforcement is switched off while dropping and restored
    /// to its previous state afterwards, also when a drop fails. The
    /// `sqlite_sequence` table cannot be dropped and is neither dropped nor
    /// counted.
    pub fn clear(&self, schema: &str) -> Result<usize> {
        self.require_attached(schema)?;
        let fk_state = self.get_foreign_key_state()?;
        self.set_foreign_key_state(false)?;

        let result = self.drop_objects(schema);
        let restored = self.set_foreign_key_state(fk_state);
        let count = result?;
        restored?;

        debug!(schema, count, "cleared schema");
        Ok(count)
    }

    fn drop_objects(&self, schema: &str) -> Result<usize> {
        let schema_x = as_identifier(schema);
        let mut count = 0;
        for object in self.walk_objects(schema, ObjectOrder::Drop)? {
            if object.name == SEQUENCE_TABLE {
                continue;
            }
            debug!(schema, kind = %object.kind, name = %object.name, "dropping DB object");
            self.execute(&format!(
                "drop {} if exists {schema_x}.{};",
                object.kind,
                as_identifier(&object.name)
            ))?;
            count += 1;
        }
        Ok(count)
    }

    /// Attaches the database at `path` as `schema`.
    ///
    /// `":memory:"` attaches a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbaError::InvalidPath`] for an empty or non-UTF-8 path and
    /// [`DbaError::InvalidSchema`] for an empty schema name.
    pub fn attach(&self, path: impl AsRef<Path>, schema: &str) -> Result<()> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DbaError::InvalidPath(path.display().to_string()))?;
        if schema.is_empty() {
            return Err(DbaError::InvalidSchema(schema.to_string()));
        }
        self.execute(&format!(
            "attach {} as {};",
            as_sql(&Value::from(path_str))?,
            as_identifier(schema)
        ))
    }

    /// Detaches `schema`.
    pub fn detach(&self, schema: &str) -> Result<()> {
        self.require_attached(schema)?;
        self.execute(&format!("detach {};", as_identifier(schema)))
    }

    fn require_attached(&self, schema: &str) -> Result<()> {
        if self.list_schema_names()?.iter().any(|name| name == schema) {
            Ok(())
        } else {
            Err(DbaError::InvalidSchema(schema.to_string()))
        }
    }
}
