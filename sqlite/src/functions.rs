//! User-defined SQL functions, aggregates and native extensions.
//!
//! Callbacks see their arguments as [`Value`]s and return a [`Value`]; an
//! error returned from a callback fails the statement that invoked it.

use std::panic::{RefUnwindSafe, UnwindSafe};
use std::path::Path;

use dba_core::Value;
use rusqlite::LoadExtensionGuard;
use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::Value as SqlValue;
use tracing::debug;

use crate::convert::{from_value_ref, to_sql_value};
use crate::dba::Dba;
use crate::error::{DbaError, Result};

fn arguments(ctx: &Context<'_>) -> Vec<Value> {
    (0..ctx.len()).map(|i| from_value_ref(ctx.get_raw(i))).collect()
}

fn user_error(err: DbaError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(err))
}

fn flags(deterministic: bool) -> FunctionFlags {
    if deterministic {
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC
    } else {
        FunctionFlags::SQLITE_UTF8
    }
}

struct UserAggregate<I, S, F> {
    init: I,
    step: S,
    finalize: F,
}

impl<A, I, S, F> Aggregate<A, SqlValue> for UserAggregate<I, S, F>
where
    A: RefUnwindSafe + UnwindSafe,
    I: Fn() -> A,
    S: Fn(&mut A, &[Value]) -> Result<()>,
    F: Fn(A) -> Result<Value>,
{
    fn init(&self, _: &mut Context<'_>) -> rusqlite::Result<A> {
        Ok((self.init)())
    }

    fn step(&self, ctx: &mut Context<'_>, acc: &mut A) -> rusqlite::Result<()> {
        (self.step)(acc, &arguments(ctx)).map_err(user_error)
    }

    fn finalize(&self, _: &mut Context<'_>, acc: Option<A>) -> rusqlite::Result<SqlValue> {
        // no rows were stepped
        let acc = acc.unwrap_or_else(|| (self.init)());
        (self.finalize)(acc)
            .and_then(|value| to_sql_value(&value))
            .map_err(user_error)
    }
}

impl Dba {
    /// Registers the scalar SQL function `name` taking `n_args` arguments
    /// (`-1` for any number).
    ///
    /// Mark the function `deterministic` when equal arguments always give
    /// equal results, so the engine may use it in indexes and factor it out
    /// of loops.
    ///
    /// # Examples
    ///
    /// ```
    /// use dba_sqlite::{Dba, Value, single_value};
    ///
    /// let dba = Dba::open_in_memory().unwrap();
    /// dba.function("shout", 1, true, |args| {
    ///     Ok(args[0].as_str().map_or(Value::Null, |s| Value::from(s.to_uppercase())))
    /// })
    /// .unwrap();
    ///
    /// let v = dba.query("select shout( 'hi' );", (), |rows| single_value(rows)).unwrap();
    /// assert_eq!(v, Value::from("HI"));
    /// ```
    pub fn function<F>(&self, name: &str, n_args: i32, deterministic: bool, f: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + UnwindSafe + 'static,
    {
        self.connection().create_scalar_function(
            name,
            n_args,
            flags(deterministic),
            move |ctx: &Context<'_>| {
                f(&arguments(ctx))
                    .and_then(|value| to_sql_value(&value))
                    .map_err(user_error)
            },
        )?;
        debug!(name, n_args, "registered function");
        Ok(())
    }

    /// Registers the aggregate SQL function `name` taking `n_args` arguments.
    ///
    /// Each group starts from `init()`, feeds every row to `step` and ends
    /// with `finalize`. A group without rows finalizes a fresh `init()`.
    pub fn aggregate<A, I, S, F>(
        &self,
        name: &str,
        n_args: i32,
        init: I,
        step: S,
        finalize: F,
    ) -> Result<()>
    where
        A: RefUnwindSafe + UnwindSafe + 'static,
        I: Fn() -> A + Send + 'static,
        S: Fn(&mut A, &[Value]) -> Result<()> + Send + 'static,
        F: Fn(A) -> Result<Value> + Send + 'static,
    {
        self.connection().create_aggregate_function(
            name,
            n_args,
            FunctionFlags::SQLITE_UTF8,
            UserAggregate {
                init,
                step,
                finalize,
            },
        )?;
        debug!(name, n_args, "registered aggregate");
        Ok(())
    }

    /// Loads the native SQLite extension at `path`, calling `entry_point`
    /// or the engine's default entry point.
    ///
    /// Extension loading is enabled only for the duration of this call.
    ///
    /// # Safety
    ///
    /// The library runs arbitrary native code inside this process. It must
    /// be a valid SQLite extension from a trusted source.
    pub unsafe fn load_extension(
        &self,
        path: impl AsRef<Path>,
        entry_point: Option<&str>,
    ) -> Result<()> {
        let path = path.as_ref();
        unsafe {
            let _guard = LoadExtensionGuard::new(self.connection())?;
            self.connection().load_extension(path, entry_point)?;
        }
        debug!(path = %path.display(), "loaded extension");
        Ok(())
    }
}
