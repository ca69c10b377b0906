//! SQLite driver
//!
//! Implements [`DbConnection`] for `rusqlite::Connection` and provides a
//! small blocking connection pool that acts as the engine's [`DataSource`].
//!
//! SQLite has no numeric type codes; declared type names are mapped onto the
//! generic type registry, first by exact name, then by SQLite's affinity
//! rules. Names that match neither report type code OTHER and are skipped by
//! the catalog.

use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ColumnMeta, DataSource, DbConnection, RowCursor, Statement};
use crate::catalog::SqlType;
use crate::error::{Error, Result};
use crate::row::Value;

/// Product name reported for dialect resolution
pub const PRODUCT_NAME: &str = "SQLite";

/// JDBC type code for types outside the registry
const TYPE_OTHER: i32 = 1111;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(SqliteValue::Integer(*b as i64)),
            Value::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::Owned(SqliteValue::Text(d.format("%Y-%m-%d").to_string())),
            Value::Time(t) => {
                ToSqlOutput::Owned(SqliteValue::Text(t.format("%H:%M:%S%.f").to_string()))
            }
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqliteValue::Text(
                ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

/// Map a declared column type to `(type code, size, decimal digits)`
pub fn declared_type_info(declared: &str) -> (i32, i32, i32) {
    let declared = declared.trim().to_uppercase();
    let (base, args) = match declared.split_once('(') {
        Some((base, rest)) => (base.trim(), rest.trim_end_matches(')')),
        None => (declared.as_str(), ""),
    };
    let mut numbers = args.split(',').map(|n| n.trim().parse::<i32>().unwrap_or(0));
    let size = numbers.next().unwrap_or(0);
    let digits = numbers.next().unwrap_or(0);

    let code = exact_type(base)
        .or_else(|| affinity_type(base))
        .map_or(TYPE_OTHER, |t| t.code());
    (code, size, digits)
}

fn exact_type(base: &str) -> Option<SqlType> {
    if let Some(t) = SqlType::ALL.iter().find(|t| t.name() == base) {
        return Some(*t);
    }
    let alias = match base {
        "INT" | "INT4" | "MEDIUMINT" => SqlType::Integer,
        "INT2" => SqlType::SmallInt,
        "INT8" | "UNSIGNED BIG INT" => SqlType::BigInt,
        "DOUBLE PRECISION" => SqlType::Double,
        "TEXT" | "NVARCHAR" | "VARYING CHARACTER" | "CHARACTER VARYING" => SqlType::Varchar,
        "CHARACTER" | "NCHAR" | "NATIVE CHARACTER" => SqlType::Char,
        "DATETIME" => SqlType::Timestamp,
        "BOOL" => SqlType::Boolean,
        _ => return None,
    };
    Some(alias)
}

/// SQLite's column affinity rules, in their documented precedence
fn affinity_type(base: &str) -> Option<SqlType> {
    if base.contains("INT") {
        Some(SqlType::BigInt)
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        Some(SqlType::Varchar)
    } else if base.is_empty() || base.contains("BLOB") {
        Some(SqlType::Blob)
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        Some(SqlType::Double)
    } else {
        None
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Cursor over the rows of an executing SQLite statement
struct SqliteCursor<'s> {
    columns: Vec<String>,
    rows: rusqlite::Rows<'s>,
}

impl RowCursor for SqliteCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let width = self.columns.len();
        match self.rows.next()? {
            Some(row) => {
                let values = (0..width)
                    .map(|i| row.get_ref(i).map(value_from_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(Some(values))
            }
            None => Ok(None),
        }
    }
}

impl DbConnection for Connection {
    fn product_name(&self) -> Result<String> {
        Ok(PRODUCT_NAME.to_string())
    }

    fn table_names(&self, schema: Option<&str>) -> Result<Vec<String>> {
        let master = match schema {
            Some(s) if is_identifier(s) => format!("{}.sqlite_master", s),
            Some(s) => {
                return Err(Error::InvalidArgument(format!("invalid schema name '{}'", s)))
            }
            None => "sqlite_master".to_string(),
        };
        let sql = format!(
            "SELECT name FROM {} WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            master
        );
        let mut stmt = self.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let mut stmt = self.prepare(
            "SELECT name, type, \"notnull\", pk, hidden FROM pragma_table_xinfo(?1) ORDER BY cid",
        )?;
        let raw = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    row.get::<_, i64>(2)? != 0,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if raw.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        // Only a lone INTEGER key declared AUTOINCREMENT draws from a sequence
        let key_count = raw.iter().filter(|c| c.3 > 0).count();
        let autoincrement_table = self
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get::<_, Option<String>>(0),
            )?
            .map_or(false, |sql| sql.to_uppercase().contains("AUTOINCREMENT"));

        let columns = raw
            .into_iter()
            // hidden = 1 marks virtual-table columns
            .filter(|(_, _, _, _, hidden)| *hidden != 1)
            .map(|(name, type_name, not_null, pk, hidden)| {
                let (type_code, size, decimal_digits) = declared_type_info(&type_name);
                ColumnMeta {
                    name,
                    type_code,
                    size,
                    decimal_digits,
                    nullable: !not_null,
                    auto_increment: autoincrement_table
                        && key_count == 1
                        && pk > 0
                        && type_name.eq_ignore_ascii_case("INTEGER"),
                    auto_generated: hidden == 2 || hidden == 3,
                    type_name,
                }
            })
            .collect();
        Ok(columns)
    }

    fn primary_keys(&self, table: &str) -> Result<Vec<(String, u16)>> {
        let mut stmt =
            self.prepare("SELECT name, pk FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")?;
        let keys = stmt
            .query_map([table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u16>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn execute(&self, statement: &Statement) -> Result<usize> {
        let affected = Connection::execute(
            self,
            &statement.sql,
            params_from_iter(statement.params.iter()),
        )?;
        Ok(affected)
    }

    fn query(
        &self,
        statement: &Statement,
        consume: &mut dyn FnMut(&mut dyn RowCursor) -> Result<()>,
    ) -> Result<()> {
        let mut stmt = self.prepare(&statement.sql)?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let rows = stmt.query(params_from_iter(statement.params.iter()))?;
        let mut cursor = SqliteCursor { columns, rows };
        consume(&mut cursor)
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Database file path or SQLite URI
    pub path: String,
    /// Maximum number of open connections.
    pub max_connections: usize,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,
}

impl PoolConfig {
    /// Configuration for a database file
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Configuration for a named in-memory database shared by the pool's
    /// connections. It lives as long as the pool.
    pub fn memory(name: &str) -> Self {
        Self::new(format!("file:{}?mode=memory&cache=shared", name))
    }

    /// Sets the maximum connections.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::InvalidConfig("database path is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct PoolState {
    idle: Vec<Connection>,
    /// Connections currently open, idle or handed out
    open: usize,
}

/// Blocking pool of SQLite connections
#[derive(Debug)]
pub struct SqlitePool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl SqlitePool {
    /// Open a pool; one connection is opened eagerly to validate the path.
    pub fn open(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let pool = Self {
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
            }),
            available: Condvar::new(),
        };
        let first = pool.connect()?;
        {
            let mut state = pool.lock()?;
            state.idle.push(first);
            state.open = 1;
        }
        Ok(pool)
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of open connections (idle or in use)
    pub fn open_connections(&self) -> usize {
        self.lock().map(|s| s.open).unwrap_or(0)
    }

    /// Number of idle connections
    pub fn idle_connections(&self) -> usize {
        self.lock().map(|s| s.idle.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("connection pool lock poisoned".to_string()))
    }

    fn connect(&self) -> Result<Connection> {
        debug!(path = %self.config.path, "opening SQLite connection");
        let conn = Connection::open(&self.config.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        Ok(conn)
    }

    fn acquire(&self) -> Result<PooledConnection<'_>> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        let mut state = self.lock()?;

        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection::new(self, conn));
            }

            if state.open < self.config.max_connections {
                state.open += 1;
                drop(state);
                return match self.connect() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn)),
                    Err(e) => {
                        self.lock()?.open -= 1;
                        Err(e)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::PoolTimeout(
                    u64::try_from(self.config.acquire_timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .map_err(|_| Error::Internal("connection pool lock poisoned".to_string()))?;
            state = guard;
        }
    }
}

impl DataSource for SqlitePool {
    fn with_connection<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn DbConnection) -> Result<R>,
    {
        let pooled = self.acquire()?;
        match pooled.conn.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::Internal("pooled connection already released".to_string())),
        }
    }
}

/// A connection checked out of the pool; returned on drop
struct PooledConnection<'p> {
    pool: &'p SqlitePool,
    conn: Option<Connection>,
}

impl<'p> PooledConnection<'p> {
    fn new(pool: &'p SqlitePool, conn: Connection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut state) = self.pool.state.lock() {
                state.idle.push(conn);
                self.pool.available.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn memory_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_declared_type_info() {
        assert_eq!(declared_type_info("INTEGER"), (4, 0, 0));
        assert_eq!(declared_type_info("varchar(40)"), (12, 40, 0));
        assert_eq!(declared_type_info("DECIMAL(10, 2)"), (3, 10, 2));
        assert_eq!(declared_type_info("TEXT"), (12, 0, 0));
        assert_eq!(declared_type_info("DATETIME"), (93, 0, 0));
        // affinity fallbacks
        assert_eq!(declared_type_info("UNSIGNED SMALL INT"), (-5, 0, 0));
        assert_eq!(declared_type_info(""), (2004, 0, 0));
        assert_eq!(declared_type_info("GEOMETRY"), (TYPE_OTHER, 0, 0));
    }

    #[test]
    fn test_canonical_names_round_trip() {
        for t in SqlType::ALL {
            assert_eq!(declared_type_info(t.name()).0, t.code(), "{}", t);
        }
    }

    #[test]
    fn test_metadata() {
        let conn = memory_conn();
        conn.execute_batch(
            "CREATE TABLE item (a INTEGER NOT NULL, b VARCHAR(10), c DATE, \
             PRIMARY KEY (b, a));
             CREATE TABLE seq (id INTEGER PRIMARY KEY AUTOINCREMENT, x TEXT);",
        )
        .unwrap();

        assert_eq!(conn.product_name().unwrap(), "SQLite");
        assert_eq!(conn.table_names(None).unwrap(), vec!["item", "seq"]);
        assert_eq!(conn.table_names(Some("main")).unwrap().len(), 2);
        assert!(conn.table_names(Some("main; DROP")).is_err());

        let columns = conn.columns("item").unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].type_code, SqlType::Integer.code());
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].size, 10);
        assert!(!columns[0].auto_increment);

        assert_eq!(
            conn.primary_keys("item").unwrap(),
            vec![("b".to_string(), 1), ("a".to_string(), 2)]
        );

        let seq = conn.columns("seq").unwrap();
        assert!(seq[0].auto_increment);
        assert!(!seq[1].auto_increment);

        assert!(matches!(
            conn.columns("missing"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_execute_and_query() {
        let conn = memory_conn();
        conn.execute_batch("CREATE TABLE t (id INTEGER, d DATE, f BOOLEAN)")
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();
        let inserted = DbConnection::execute(
            &conn,
            &Statement::new(
                "INSERT INTO t (id, d, f) VALUES (?, ?, ?)",
                vec![Value::Integer(1), Value::Date(date), Value::Boolean(true)],
            ),
        )
        .unwrap();
        assert_eq!(inserted, 1);

        let mut seen = Vec::new();
        let select = Statement::new("SELECT * FROM t", vec![]);
        DbConnection::query(&conn, &select, &mut |cursor| {
            assert_eq!(cursor.columns(), ["id", "d", "f"]);
            while let Some(row) = cursor.next_row()? {
                seen.push(row);
            }
            Ok(())
        })
        .unwrap();

        // raw storage classes; the engine restores declared types
        assert_eq!(
            seen,
            vec![vec![
                Value::Integer(1),
                Value::Text("2022-12-31".to_string()),
                Value::Integer(1)
            ]]
        );
    }

    #[test]
    fn test_pool_reuses_connections() {
        let pool = SqlitePool::open(PoolConfig::memory("pool_reuse").max_connections(2)).unwrap();
        pool.with_connection(|conn| {
            conn.execute(&Statement::new("CREATE TABLE t (x INTEGER)", vec![]))
        })
        .unwrap();
        // the shared in-memory database survives between checkouts
        let names = pool.with_connection(|conn| conn.table_names(None)).unwrap();
        assert_eq!(names, vec!["t"]);
        assert_eq!(pool.open_connections(), 1);
        assert_eq!(pool.idle_connections(), 1);
    }

    #[test]
    fn test_pool_releases_on_error() {
        let pool = SqlitePool::open(PoolConfig::memory("pool_error").max_connections(1)).unwrap();
        let result: Result<()> = pool.with_connection(|conn| {
            conn.execute(&Statement::new("NOT SQL", vec![]))?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(pool.idle_connections(), 1);
    }

    #[test]
    fn test_pool_times_out_when_exhausted() {
        let pool = SqlitePool::open(
            PoolConfig::memory("pool_timeout")
                .max_connections(1)
                .acquire_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        let nested = pool.with_connection(|_| pool.with_connection(|_| Ok(())));
        assert!(matches!(nested, Err(Error::PoolTimeout(20))));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            SqlitePool::open(PoolConfig::new("x.db").max_connections(0)),
            Err(Error::InvalidConfig(_))
        ));
    }
}
