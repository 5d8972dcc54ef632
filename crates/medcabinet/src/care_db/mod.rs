//! Care database module - SQLite-backed storage for patients, cabinets,
//! medications, schedules and intake sessions.
pub mod schema;
pub mod migration;
pub mod patient_store;
pub mod medication_store;
pub mod cabinet_store;
pub mod schedule_store;
pub mod session_store;
pub use schema::*;
pub use migration::MigrationManager;
pub use patient_store::PatientStore;
pub use medication_store::MedicationStore;
pub use cabinet_store::CabinetStore;
pub use schedule_store::ScheduleStore;
pub use session_store::SessionStore;
use std::path::Path;
use std::sync::Arc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{CareError, CareResult};

pub type ConnectionPool = Arc<Pool<SqliteConnectionManager>>;

/// Handle over the connection pool plus one store per aggregate
pub struct CareDatabase {
    pub patients: PatientStore,
    pub medications: MedicationStore,
    pub cabinets: CabinetStore,
    pub schedules: ScheduleStore,
    pub sessions: SessionStore,
    pool: ConnectionPool,
}

/// Write transaction on an owned pooled connection.
///
/// Holds the SQLite write lock until it finishes, so keep it off `.await`
/// points. Dropping an unfinished transaction, including one whose COMMIT
/// failed, rolls it back.
pub struct Transaction {
    conn: PooledConnection<SqliteConnectionManager>,
    finished: bool,
}

impl Transaction {
    pub fn commit(mut self) -> CareResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> CareResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        self.finished = true;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
                warn!("Failed to roll back abandoned transaction: {}", e);
            }
        }
    }
}

fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}

impl CareDatabase {
    pub fn new(db_path: &Path, pool_size: u32) -> anyhow::Result<Self> {
        info!("Opening care database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(|conn| {
                init_connection(conn)?;
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;",
                )
            });
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            let mut migrator = MigrationManager::new(&mut conn);
            migrator.initialize_database()?;
        }
        info!("Care database initialized successfully");
        Ok(Self::from_pool(Arc::new(pool)))
    }

    fn from_pool(pool: ConnectionPool) -> Self {
        Self {
            patients: PatientStore::new(Arc::clone(&pool)),
            medications: MedicationStore::new(Arc::clone(&pool)),
            cabinets: CabinetStore::new(Arc::clone(&pool)),
            schedules: ScheduleStore::new(Arc::clone(&pool)),
            sessions: SessionStore::new(Arc::clone(&pool)),
            pool,
        }
    }

    pub fn begin_transaction(&self) -> CareResult<Transaction> {
        let conn = self.pool.get()?;
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        Ok(Transaction {
            conn,
            finished: false,
        })
    }

    /// Runs `f` inside one transaction; commits on `Ok`, rolls back on `Err`.
    pub fn with_transaction<T, F>(&self, f: F) -> CareResult<T>
    where
        F: FnOnce(&Connection) -> CareResult<T>,
    {
        let tx = self.begin_transaction()?;
        match f(tx.connection()) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed after error '{}': {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Pooled connection for ad-hoc reads
    pub fn get_connection(&self) -> CareResult<PooledConnection<SqliteConnectionManager>> {
        get_conn(&self.pool)
    }

    pub fn get_stats(&self) -> CareResult<DatabaseStats> {
        let conn = self.pool.get()?;
        Ok(migration::get_database_stats(&conn)?)
    }
}

impl Drop for CareDatabase {
    fn drop(&mut self) {
        if let Ok(conn) = self.pool.get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}

pub(crate) fn get_conn(pool: &ConnectionPool) -> CareResult<PooledConnection<SqliteConnectionManager>> {
    pool.get().map_err(CareError::from)
}
