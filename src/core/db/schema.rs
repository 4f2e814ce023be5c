//! Versioned schema declarations and the upgrade runner.
//!
//! The version of a database lives in `PRAGMA user_version`. Opening a store
//! applies every declared migration newer than that value inside a single
//! transaction, so a failed upgrade leaves the file exactly as it was.

use sqlx::{Connection, SqliteConnection};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::core::db::error::{Result, StoreError};

/// One idempotent unit of work inside a migration.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// A single DDL statement. Must be written with `IF NOT EXISTS`.
    Sql(&'static str),
    /// `ALTER TABLE .. ADD COLUMN`, skipped when the column is already there.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    /// Stamps the current time (ms since epoch) into rows where `column` is NULL.
    BackfillTimestamp {
        table: &'static str,
        column: &'static str,
    },
    /// Gives rows where `column` is NULL their index in an id-ordered
    /// enumeration of the whole table.
    BackfillSequence {
        table: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub steps: &'static [Step],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "projects, screens and apis",
        steps: &[
            Step::Sql(
                "CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT
                )",
            ),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_projects_name ON projects (name)"),
            Step::Sql(
                "CREATE TABLE IF NOT EXISTS screens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    image_url TEXT NOT NULL,
                    description TEXT
                )",
            ),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_screens_project_id ON screens (project_id)"),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_screens_name ON screens (name)"),
            Step::Sql(
                "CREATE TABLE IF NOT EXISTS apis (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    screen_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('query', 'mutation')),
                    code TEXT NOT NULL,
                    description TEXT,
                    position_x REAL,
                    position_y REAL
                )",
            ),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_apis_screen_id ON apis (screen_id)"),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_apis_name ON apis (name)"),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_apis_kind ON apis (kind)"),
        ],
    },
    Migration {
        version: 2,
        description: "creation timestamps and manual ordering",
        steps: &[
            Step::AddColumn {
                table: "projects",
                column: "created_at",
                definition: "INTEGER",
            },
            Step::AddColumn {
                table: "screens",
                column: "sort_order",
                definition: "INTEGER",
            },
            Step::AddColumn {
                table: "apis",
                column: "sort_order",
                definition: "INTEGER",
            },
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects (created_at)"),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_screens_sort_order ON screens (sort_order)"),
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_apis_sort_order ON apis (sort_order)"),
            Step::BackfillTimestamp {
                table: "projects",
                column: "created_at",
            },
            Step::BackfillSequence {
                table: "screens",
                column: "sort_order",
            },
            Step::BackfillSequence {
                table: "apis",
                column: "sort_order",
            },
        ],
    },
];

/// The ordered set of migrations a store is opened against.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    migrations: &'static [Migration],
}

impl Schema {
    pub const LATEST: Schema = Schema {
        migrations: MIGRATIONS,
    };

    /// A custom migration list. Versions must be strictly ascending.
    pub fn new(migrations: &'static [Migration]) -> Self {
        debug_assert!(
            migrations.windows(2).all(|w| w[0].version < w[1].version),
            "migration versions must be strictly ascending"
        );
        Schema { migrations }
    }

    /// The built-in schema as it was at `version`.
    pub fn up_to(version: u32) -> Self {
        let count = MIGRATIONS
            .iter()
            .take_while(|m| m.version <= version)
            .count();
        Schema {
            migrations: &MIGRATIONS[..count],
        }
    }

    pub fn version(&self) -> u32 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    pub fn migrations(&self) -> &'static [Migration] {
        self.migrations
    }

    pub fn migration(&self, version: u32) -> Option<&'static Migration> {
        self.migrations.iter().find(|m| m.version == version)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::LATEST
    }
}

pub(crate) async fn user_version(conn: &mut SqliteConnection) -> sqlx::Result<u32> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await?;
    Ok(version as u32)
}

async fn set_user_version(conn: &mut SqliteConnection, version: u32) -> sqlx::Result<()> {
    let sql = format!("PRAGMA user_version = {version}");
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

/// Brings the database up to `schema`, returning the resulting version.
pub(crate) async fn migrate(conn: &mut SqliteConnection, schema: &Schema) -> Result<u32> {
    let found = user_version(conn).await?;
    let supported = schema.version();
    if found > supported {
        return Err(StoreError::SchemaTooNew { found, supported });
    }
    if found == supported {
        debug!(version = found, "schema up to date");
        return Ok(found);
    }

    let mut tx = conn.begin().await?;
    for migration in schema.migrations.iter().filter(|m| m.version > found) {
        let wrap = |source| StoreError::Migration {
            version: migration.version,
            source,
        };
        apply_migration(&mut tx, migration).await.map_err(wrap)?;
        set_user_version(&mut tx, migration.version)
            .await
            .map_err(wrap)?;
        info!(
            version = migration.version,
            description = migration.description,
            "applied schema migration"
        );
    }
    tx.commit().await.map_err(|source| StoreError::Migration {
        version: supported,
        source,
    })?;
    Ok(supported)
}

/// Runs every step of `migration`. Safe to repeat on already upgraded data.
pub(crate) async fn apply_migration(
    conn: &mut SqliteConnection,
    migration: &Migration,
) -> sqlx::Result<()> {
    for step in migration.steps {
        apply_step(conn, step).await?;
    }
    Ok(())
}

async fn apply_step(conn: &mut SqliteConnection, step: &Step) -> sqlx::Result<()> {
    match *step {
        Step::Sql(sql) => {
            sqlx::query(sql).execute(&mut *conn).await?;
        }
        Step::AddColumn {
            table,
            column,
            definition,
        } => {
            let existing: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info($1) WHERE name = $2")
                    .bind(table)
                    .bind(column)
                    .fetch_one(&mut *conn)
                    .await?;
            if existing == 0 {
                let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
                sqlx::query(&sql).execute(&mut *conn).await?;
            }
        }
        Step::BackfillTimestamp { table, column } => {
            let sql = format!("UPDATE {table} SET {column} = $1 WHERE {column} IS NULL");
            let touched = sqlx::query(&sql)
                .bind(now_millis())
                .execute(&mut *conn)
                .await?
                .rows_affected();
            if touched > 0 {
                warn!(table, column, rows = touched, "backfilled timestamps on legacy rows");
            }
        }
        Step::BackfillSequence { table, column } => {
            let select = format!("SELECT id FROM {table} ORDER BY id ASC");
            let ids: Vec<i64> = sqlx::query_scalar(&select).fetch_all(&mut *conn).await?;
            let update = format!("UPDATE {table} SET {column} = $1 WHERE id = $2 AND {column} IS NULL");
            let mut touched = 0;
            for (index, id) in ids.into_iter().enumerate() {
                touched += sqlx::query(&update)
                    .bind(index as i64)
                    .bind(id)
                    .execute(&mut *conn)
                    .await?
                    .rows_affected();
            }
            if touched > 0 {
                warn!(table, column, rows = touched, "backfilled ordering on legacy rows");
            }
        }
    }
    Ok(())
}

pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
