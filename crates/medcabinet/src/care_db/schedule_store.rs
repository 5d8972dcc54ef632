//! Planned-dose storage
use crate::care_db::schema::*;
use crate::care_db::{get_conn, ConnectionPool};
use crate::error::CareResult;
use chrono::Utc;
use rusqlite::{params, Connection};

pub struct ScheduleStore {
    pool: ConnectionPool,
}

impl ScheduleStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn insert_with_conn(&self, conn: &Connection, patient_id: i64, item: &NewSchedule) -> CareResult<Schedule> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO schedules (patient_id, medication_id, day, time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![patient_id, item.medication_id, &item.day, &item.time, now.to_rfc3339()],
        )?;

        Ok(Schedule {
            id: conn.last_insert_rowid(),
            patient_id,
            medication_id: item.medication_id,
            day: item.day.clone(),
            time: item.time.clone(),
            created_at: now,
        })
    }

    /// All schedules of a patient joined with medication names, in insertion order
    pub fn get_patient_schedules(&self, patient_id: i64) -> CareResult<Vec<PatientScheduleRow>> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.patient_id, s.medication_id, s.day, s.time, s.created_at,
                    m.brand_name, m.generic_name
             FROM schedules s
             JOIN medications m ON m.id = s.medication_id
             JOIN patients p ON p.id = s.patient_id
             WHERE s.patient_id = ?1
             ORDER BY s.id",
        )?;

        let mut rows = stmt.query([patient_id])?;
        let mut schedules = Vec::new();

        while let Some(row) = rows.next()? {
            let created_at: String = row.get(5)?;
            schedules.push(PatientScheduleRow {
                schedule: Schedule {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    medication_id: row.get(2)?,
                    day: row.get(3)?,
                    time: row.get(4)?,
                    created_at: parse_timestamp(&created_at)?,
                },
                brand_name: row.get(6)?,
                generic_name: row.get(7)?,
            });
        }

        Ok(schedules)
    }

    pub fn count_patient_schedules(&self, patient_id: i64) -> CareResult<i64> {
        let conn = get_conn(&self.pool)?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM schedules WHERE patient_id = ?1",
            [patient_id],
            |row| row.get(0),
        )?)
    }
}
