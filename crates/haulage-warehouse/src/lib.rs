//! # Haulage Warehouse
//!
//! DuckDB-backed destination for the haulage pipelines.
//!
//! Datasets map to DuckDB schemas and tables are declared up front through
//! [`TableSchema`]. Loads run in a single transaction together with their
//! ledger entry in `_haulage_loads` and, for incremental resources, the new
//! cursor value in `_haulage_state`.
//!
//! ```rust,no_run
//! use haulage_warehouse::{QueryGuardrails, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let result = warehouse.execute_query(
//!         "SELECT pipeline_name, row_count FROM _haulage_loads",
//!         QueryGuardrails::default(),
//!     )?;
//!     println!("{} loads", result.row_count);
//!     Ok(())
//! }
//! ```

pub mod duckdb;
pub mod migrations;
pub mod query;
pub mod schema;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params_from_iter, Connection, ToSql};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use self::duckdb::{DuckDbConnectionManager, PooledConnection};
pub use query::{QueryGuardrails, QueryResult, SqlColumn};
pub use schema::{TableSchema, WriteDisposition};

/// One record headed for a destination table, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Query was rejected due to policy violation.
    #[error("query rejected: {0}")]
    QueryRejected(String),

    /// Query execution timed out.
    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// A table declaration or row batch does not fit the declared layout.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("connection pool lock poisoned")]
    PoolPoisoned,
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept for reuse.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Place the database at `<home>/warehouse.duckdb`.
    pub fn at_home(home: impl Into<PathBuf>) -> Self {
        Self {
            db_path: home.into().join("warehouse.duckdb"),
            max_pool_size: 4,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::at_home(resolve_haulage_home())
    }
}

/// Identifies one persisted cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey {
    pub pipeline: String,
    pub resource: String,
    pub field: String,
}

impl CursorKey {
    pub fn new(
        pipeline: impl Into<String>,
        resource: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            resource: resource.into(),
            field: field.into(),
        }
    }
}

/// A cursor value to persist atomically with a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorUpdate {
    pub key: CursorKey,
    pub value: String,
}

/// A persisted cursor as listed by [`Warehouse::cursors`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CursorRecord {
    pub pipeline: String,
    pub resource: String,
    pub cursor_field: String,
    pub value: String,
    pub updated_at: String,
}

/// A batch of rows for one table.
#[derive(Debug, Clone)]
pub struct LoadRequest<'a> {
    pub pipeline: &'a str,
    pub schema: &'a TableSchema,
    pub rows: &'a [Row],
    pub cursor: Option<CursorUpdate>,
}

/// Outcome of a committed load.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadInfo {
    pub load_id: String,
    pub pipeline: String,
    pub dataset: String,
    pub table: String,
    pub disposition: WriteDisposition,
    pub rows_loaded: usize,
}

/// A sink that applies load batches and keeps cursor state between runs.
pub trait Destination: Send + Sync {
    /// Apply `request` according to the schema's write disposition.
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadInfo, WarehouseError>;

    /// Read a previously persisted cursor value.
    fn read_cursor(&self, key: &CursorKey) -> Result<Option<String>, WarehouseError>;
}

/// The `DuckDB` destination.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse, creating its directory and bookkeeping tables.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Run a read-only inspection query with guardrails.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        let connection = self.manager.acquire()?;
        query::execute_read_only(&connection, sql, guardrails)
    }

    /// List every persisted cursor.
    pub fn cursors(&self) -> Result<Vec<CursorRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT pipeline_name, resource, cursor_field, value, CAST(updated_at AS VARCHAR) \
             FROM _haulage_state ORDER BY pipeline_name, resource, cursor_field",
        )?;
        let records = statement
            .query_map([], |row| {
                Ok(CursorRecord {
                    pipeline: row.get(0)?,
                    resource: row.get(1)?,
                    cursor_field: row.get(2)?,
                    value: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn ensure_table(connection: &Connection, schema: &TableSchema) -> Result<(), WarehouseError> {
        connection.execute_batch(&schema.create_sql())?;
        Ok(())
    }
}

impl Destination for Warehouse {
    fn load(&self, request: &LoadRequest<'_>) -> Result<LoadInfo, WarehouseError> {
        let schema = request.schema;
        let rows = match schema.write_disposition() {
            WriteDisposition::Merge => dedupe_by_key(schema, request.rows)?,
            WriteDisposition::Replace => request.rows.iter().collect(),
        };

        let connection = self.manager.acquire()?;
        Self::ensure_table(&connection, schema)?;

        let load_id = Uuid::new_v4().to_string();
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<LoadInfo, WarehouseError> {
            if schema.write_disposition() == WriteDisposition::Replace {
                let removed =
                    connection.execute(&format!("DELETE FROM {}", schema.qualified_name()), [])?;
                debug!(table = schema.name(), removed, "cleared table for replace");
            }

            let insert = schema.insert_sql();
            let mut statement = connection.prepare(&insert)?;
            for row in &rows {
                let cells = row_cells(schema, row);
                statement.execute(params_from_iter(cells))?;
            }

            let row_count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
            let (dataset, table) = (schema.dataset(), schema.name());
            let disposition = schema.write_disposition().as_str();
            let params: [&dyn ToSql; 6] = [
                &load_id,
                &request.pipeline,
                &dataset,
                &table,
                &disposition,
                &row_count,
            ];
            connection.execute(
                "INSERT INTO _haulage_loads \
                 (load_id, pipeline_name, dataset, table_name, write_disposition, row_count, loaded_at) \
                 VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;

            if let Some(cursor) = &request.cursor {
                write_cursor(&connection, cursor)?;
            }

            Ok(LoadInfo {
                load_id: load_id.clone(),
                pipeline: request.pipeline.to_owned(),
                dataset: schema.dataset().to_owned(),
                table: schema.name().to_owned(),
                disposition: schema.write_disposition(),
                rows_loaded: rows.len(),
            })
        })();

        let info = finalize_transaction(&connection, result)?;
        info!(
            pipeline = %info.pipeline,
            table = %info.table,
            disposition = %info.disposition,
            rows = info.rows_loaded,
            load_id = %info.load_id,
            "load committed"
        );
        Ok(info)
    }

    fn read_cursor(&self, key: &CursorKey) -> Result<Option<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT value FROM _haulage_state \
             WHERE pipeline_name = ? AND resource = ? AND cursor_field = ?",
        )?;
        let params: [&dyn ToSql; 3] = [&key.pipeline, &key.resource, &key.field];
        let mut rows = statement.query(params.as_slice())?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

fn write_cursor(connection: &Connection, cursor: &CursorUpdate) -> Result<(), WarehouseError> {
    let params: [&dyn ToSql; 4] = [
        &cursor.key.pipeline,
        &cursor.key.resource,
        &cursor.key.field,
        &cursor.value,
    ];
    connection.execute(
        "INSERT OR REPLACE INTO _haulage_state \
         (pipeline_name, resource, cursor_field, value, updated_at) \
         VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)",
        params.as_slice(),
    )?;
    Ok(())
}

/// Keep the last row per primary key so one batch never upserts a key twice.
fn dedupe_by_key<'a>(schema: &TableSchema, rows: &'a [Row]) -> Result<Vec<&'a Row>, WarehouseError> {
    if schema.primary_key().is_empty() {
        return Ok(rows.iter().collect());
    }

    let mut positions: BTreeMap<Vec<String>, usize> = BTreeMap::new();
    let mut kept: Vec<Option<&Row>> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut key = Vec::with_capacity(schema.primary_key().len());
        for column in schema.primary_key() {
            match row.get(column).and_then(cell_text) {
                Some(value) => key.push(value),
                None => {
                    return Err(WarehouseError::InvalidSchema(format!(
                        "row is missing primary key column '{column}' for '{}'",
                        schema.name()
                    )))
                }
            }
        }

        if let Some(previous) = positions.insert(key, kept.len()) {
            kept[previous] = None;
        }
        kept.push(Some(row));
    }

    Ok(kept.into_iter().flatten().collect())
}

fn row_cells(schema: &TableSchema, row: &Row) -> Vec<Option<String>> {
    schema
        .columns()
        .iter()
        .map(|column| row.get(column).and_then(cell_text))
        .collect()
}

/// Scalars keep their text form; arrays and objects become JSON text.
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_haulage_home() -> PathBuf {
    if let Some(path) = env::var_os("HAULAGE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".haulage");
    }

    PathBuf::from(".haulage")
}
