//! Caretaker and patient records.
//!
//! Both are seeded administratively; the request paths only read them,
//! mainly to resolve the caretaker to alert for a patient.
use crate::care_db::schema::*;
use crate::care_db::{get_conn, ConnectionPool};
use crate::error::{CareError, CareResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

pub struct PatientStore {
    pool: ConnectionPool,
}

impl PatientStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn create_caretaker_with_conn(
        &self,
        conn: &Connection,
        name: &str,
        email: &str,
    ) -> CareResult<Caretaker> {
        conn.execute(
            "INSERT INTO caretakers (name, email) VALUES (?1, ?2)",
            params![name, email],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created caretaker {}", id);
        Ok(Caretaker {
            id,
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    pub fn create_patient_with_conn(
        &self,
        conn: &Connection,
        first_name: &str,
        last_name: &str,
        date_of_birth: Option<&str>,
        caretaker_id: i64,
    ) -> CareResult<Patient> {
        conn.execute(
            "INSERT INTO patients (first_name, last_name, date_of_birth, caretaker_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![first_name, last_name, date_of_birth, caretaker_id],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created patient {} for caretaker {}", id, caretaker_id);
        Ok(Patient {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            date_of_birth: date_of_birth.map(str::to_string),
            caretaker_id,
        })
    }

    pub fn get_patient(&self, patient_id: i64) -> CareResult<Option<Patient>> {
        let conn = get_conn(&self.pool)?;
        self.get_patient_with_conn(&conn, patient_id)
    }

    pub fn get_patient_with_conn(&self, conn: &Connection, patient_id: i64) -> CareResult<Option<Patient>> {
        Ok(conn
            .query_row(
                "SELECT id, first_name, last_name, date_of_birth, caretaker_id
                 FROM patients WHERE id = ?1",
                [patient_id],
                row_to_patient,
            )
            .optional()?)
    }

    /// Patient joined with its caretaker. `NotFound` when either side is missing.
    pub fn get_patient_with_caretaker(
        &self,
        conn: &Connection,
        patient_id: i64,
    ) -> CareResult<(Patient, Caretaker)> {
        let patient = self
            .get_patient_with_conn(conn, patient_id)?
            .ok_or_else(|| CareError::NotFound(format!("patient {}", patient_id)))?;

        let caretaker = conn
            .query_row(
                "SELECT id, name, email FROM caretakers WHERE id = ?1",
                [patient.caretaker_id],
                |row| {
                    Ok(Caretaker {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| CareError::NotFound(format!("caretaker of patient {}", patient_id)))?;

        Ok((patient, caretaker))
    }

    pub fn get_caretaker_patients(&self, caretaker_id: i64) -> CareResult<Vec<Patient>> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT id, first_name, last_name, date_of_birth, caretaker_id
             FROM patients WHERE caretaker_id = ?1 ORDER BY id",
        )?;
        let patients = stmt
            .query_map([caretaker_id], row_to_patient)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(patients)
    }

    pub fn count_caretakers(&self) -> CareResult<i64> {
        let conn = get_conn(&self.pool)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM caretakers", [], |row| row.get(0))?)
    }
}

fn row_to_patient(row: &Row) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        caretaker_id: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_database;

    #[test]
    fn test_patient_with_caretaker_roundtrip() {
        let (_dir, db) = temp_database();
        let (caretaker, patient) = db
            .with_transaction(|conn| {
                let caretaker = db.patients.create_caretaker_with_conn(conn, "Ana", "ana@example.com")?;
                let patient = db
                    .patients
                    .create_patient_with_conn(conn, "Bo", "Li", Some("1941-03-02"), caretaker.id)?;
                Ok((caretaker, patient))
            })
            .unwrap();

        let conn = db.get_connection().unwrap();
        let (found_patient, found_caretaker) =
            db.patients.get_patient_with_caretaker(&conn, patient.id).unwrap();
        assert_eq!(found_patient, patient);
        assert_eq!(found_caretaker, caretaker);

        let listed = db.patients.get_caretaker_patients(caretaker.id).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_missing_patient_is_not_found() {
        let (_dir, db) = temp_database();
        let conn = db.get_connection().unwrap();
        let err = db.patients.get_patient_with_caretaker(&conn, 42).unwrap_err();
        assert!(matches!(err, CareError::NotFound(_)));
        assert!(db.patients.get_patient(42).unwrap().is_none());
    }
}
