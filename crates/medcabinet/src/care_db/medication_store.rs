//! Medication and NDC storage.
//!
//! Rows are keyed by the catalog's external id (medications) and by the code
//! itself (NDCs). An upsert overwrites every non-key column, so repeated
//! writes of the same catalog snapshot converge to one row each.
use crate::care_db::schema::*;
use crate::care_db::{get_conn, ConnectionPool};
use crate::error::{CareError, CareResult};
use crate::lookup::MedicationSummary;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

pub struct MedicationStore {
    pool: ConnectionPool,
}

impl MedicationStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the medication and all of its NDC codes.
    pub fn upsert_with_conn(&self, conn: &Connection, summary: &MedicationSummary) -> CareResult<Medication> {
        let now = Utc::now();

        conn.execute(
            "INSERT INTO medications (external_id, brand_name, generic_name, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(external_id) DO UPDATE SET
                 brand_name = excluded.brand_name,
                 generic_name = excluded.generic_name,
                 updated_at = excluded.updated_at",
            params![
                &summary.external_id,
                &summary.brand_name,
                &summary.generic_name,
                now.to_rfc3339(),
            ],
        )?;

        let medication = self
            .get_by_external_id_with_conn(conn, &summary.external_id)?
            .ok_or_else(|| CareError::Database(format!("medication {} vanished after upsert", summary.external_id)))?;

        for code in &summary.ndc_codes {
            conn.execute(
                "INSERT INTO ndcs (code, medication_id) VALUES (?1, ?2)
                 ON CONFLICT(code) DO UPDATE SET medication_id = excluded.medication_id",
                params![code, medication.id],
            )?;
        }

        debug!(
            "Upserted medication {} ({}) with {} NDC code(s)",
            medication.id,
            medication.external_id,
            summary.ndc_codes.len()
        );
        Ok(medication)
    }

    pub fn get_by_external_id(&self, external_id: &str) -> CareResult<Option<Medication>> {
        let conn = get_conn(&self.pool)?;
        self.get_by_external_id_with_conn(&conn, external_id)
    }

    pub fn get_by_external_id_with_conn(&self, conn: &Connection, external_id: &str) -> CareResult<Option<Medication>> {
        let raw = conn
            .query_row(
                "SELECT id, external_id, brand_name, generic_name, updated_at
                 FROM medications WHERE external_id = ?1",
                [external_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match raw {
            Some((id, external_id, brand_name, generic_name, updated_at)) => Ok(Some(Medication {
                id,
                external_id,
                brand_name,
                generic_name,
                updated_at: parse_timestamp(&updated_at)?,
            })),
            None => Ok(None),
        }
    }

    pub fn exists_with_conn(&self, conn: &Connection, medication_id: i64) -> CareResult<bool> {
        Ok(conn
            .query_row("SELECT 1 FROM medications WHERE id = ?1", [medication_id], |_| Ok(()))
            .optional()?
            .is_some())
    }

    pub fn get_ndc_codes(&self, medication_id: i64) -> CareResult<Vec<String>> {
        let conn = get_conn(&self.pool)?;
        self.get_ndc_codes_with_conn(&conn, medication_id)
    }

    pub fn get_ndc_codes_with_conn(&self, conn: &Connection, medication_id: i64) -> CareResult<Vec<String>> {
        ndc_codes_for(conn, medication_id)
    }

    pub fn count_medications(&self) -> CareResult<i64> {
        let conn = get_conn(&self.pool)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM medications", [], |row| row.get(0))?)
    }

    pub fn count_ndcs(&self) -> CareResult<i64> {
        let conn = get_conn(&self.pool)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM ndcs", [], |row| row.get(0))?)
    }
}

pub(crate) fn ndc_codes_for(conn: &Connection, medication_id: i64) -> CareResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT code FROM ndcs WHERE medication_id = ?1 ORDER BY code")?;
    let codes = stmt
        .query_map([medication_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{summary, temp_database};

    #[test]
    fn test_upsert_overwrites_names_and_keeps_one_row() {
        let (_dir, db) = temp_database();
        let first = summary("ext-1", "Tylenol", "acetaminophen", &["0001-0001"]);
        let mut second = first.clone();
        second.brand_name = "Tylenol Extra".into();

        let a = db.with_transaction(|conn| db.medications.upsert_with_conn(conn, &first)).unwrap();
        let b = db.with_transaction(|conn| db.medications.upsert_with_conn(conn, &second)).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(db.medications.count_medications().unwrap(), 1);
        assert_eq!(db.medications.count_ndcs().unwrap(), 1);
        let stored = db.medications.get_by_external_id("ext-1").unwrap().unwrap();
        assert_eq!(stored.brand_name, "Tylenol Extra");
    }

    #[test]
    fn test_ndc_code_moves_to_latest_owner() {
        let (_dir, db) = temp_database();
        let first = summary("ext-1", "Advil", "ibuprofen", &["0002-0002"]);
        let second = summary("ext-2", "Motrin", "ibuprofen", &["0002-0002"]);

        db.with_transaction(|conn| db.medications.upsert_with_conn(conn, &first)).unwrap();
        let motrin = db.with_transaction(|conn| db.medications.upsert_with_conn(conn, &second)).unwrap();

        assert_eq!(db.medications.count_ndcs().unwrap(), 1);
        assert_eq!(db.medications.get_ndc_codes(motrin.id).unwrap(), vec!["0002-0002".to_string()]);
    }
}
