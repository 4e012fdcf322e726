use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_pipeline_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS _haulage_loads (
    load_id TEXT PRIMARY KEY,
    pipeline_name TEXT NOT NULL,
    dataset TEXT NOT NULL,
    table_name TEXT NOT NULL,
    write_disposition TEXT NOT NULL,
    row_count BIGINT NOT NULL,
    loaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS _haulage_state (
    pipeline_name TEXT NOT NULL,
    resource TEXT NOT NULL,
    cursor_field TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(pipeline_name, resource, cursor_field)
);
"#,
    },
    Migration {
        version: "0002_load_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_haulage_loads_pipeline_ts ON _haulage_loads(pipeline_name, loaded_at);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS _haulage_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM _haulage_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO _haulage_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
