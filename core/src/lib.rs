//! Engine-independent building blocks of the dba SQLite toolkit.
//!
//! This crate holds everything that does not need a live connection:
//!
//! - [`Value`] and [`Row`]: the dynamic value model shared by parameters,
//!   result rows and literals.
//! - Literal rendering ([`as_sql`], [`escape_text`], [`as_identifier`],
//!   [`interpolate`]) for statement positions that cannot take bound
//!   parameters.
//! - Result adapters ([`first_row`], [`single_value`], [`limit`], ...) that
//!   reshape a row sequence into the result the caller wants.
//! - A sortable key codec ([`as_hollerith`], [`from_hollerith`]).
//!
//! # Example
//!
//! ```
//! use dba_core::*;
//!
//! let rows: Vec<std::result::Result<Row, CoreError>> = vec![
//!     Ok(Row::from_pairs([("n", 42_i64)])),
//!     Ok(Row::from_pairs([("n", 43_i64)])),
//! ];
//! assert_eq!(single_value(rows).unwrap(), Value::Integer(42));
//!
//! let sql = interpolate("select * from t where name = $name;", &[("name", Value::from("o'hara"))]).unwrap();
//! assert_eq!(sql, "select * from t where name = 'o''hara';");
//! ```

mod adapters;
mod error;
mod hollerith;
mod literal;
mod value;

pub use adapters::{
    all_first_values, first_row, first_value, first_values, limit, list, single_row, single_value,
};
pub use error::{CoreError, Result};
pub use hollerith::{MAX_DEPTH, as_hollerith, from_hollerith};
pub use literal::{Bindings, as_identifier, as_sql, escape_text, interpolate, list_as_json};
pub use value::{Row, Value};
