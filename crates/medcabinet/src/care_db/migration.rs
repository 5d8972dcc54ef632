//! Database migration system

use rusqlite::{Connection, Result};
use tracing::{error, info, warn};

use crate::care_db::schema::DatabaseStats;

/// Manages database schema migrations
pub struct MigrationManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Initialize database with current schema
    pub fn initialize_database(&mut self) -> Result<()> {
        info!("Initializing care database schema...");

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        let current_version = self.get_current_version()?;
        info!("Current database schema version: {}", current_version);

        self.apply_migrations(current_version)?;

        Ok(())
    }

    fn apply_migrations(&mut self, current_version: i32) -> Result<()> {
        for (version, migration_sql) in get_migrations() {
            if version > current_version {
                info!("Applying migration {}...", version);

                let tx = self.conn.transaction()?;

                if let Err(e) = tx.execute_batch(migration_sql) {
                    error!("Failed to apply migration {}: {}", version, e);
                    return Err(e);
                }

                tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
                tx.commit()?;

                info!("Migration {} applied successfully", version);
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self) -> Result<i32> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .or_else(|_| Ok(0))
    }
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, include_str!("migrations/001_initial.sql"))]
}

/// Row counts per table, read-only
pub fn get_database_stats(conn: &Connection) -> Result<DatabaseStats> {
    fn get_table_count(conn: &Connection, table_name: &str) -> Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table_name), [], |row| row.get(0))
            .or_else(|e| {
                warn!("Failed to get count from table {}: {}", table_name, e);
                Ok(0)
            })
    }

    Ok(DatabaseStats {
        total_patients: get_table_count(conn, "patients")?,
        total_medications: get_table_count(conn, "medications")?,
        total_schedules: get_table_count(conn, "schedules")?,
        total_sessions: get_table_count(conn, "sessions")?,
        total_intakes: get_table_count(conn, "session_intakes")?,
    })
}
