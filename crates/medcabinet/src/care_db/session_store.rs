//! Session and intake storage
use crate::care_db::schema::*;
use crate::care_db::{get_conn, ConnectionPool};
use crate::error::CareResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

pub struct SessionStore {
    pool: ConnectionPool,
}

impl SessionStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn insert_session_with_conn(
        &self,
        conn: &Connection,
        patient_id: i64,
        cabinet_id: i64,
        payload: &NewSession,
    ) -> CareResult<Session> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO sessions (patient_id, cabinet_id, started_at, ended_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                patient_id,
                cabinet_id,
                payload.started_at.map(|t| t.to_rfc3339()),
                payload.ended_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Session {
            id: conn.last_insert_rowid(),
            patient_id,
            cabinet_id,
            started_at: payload.started_at,
            ended_at: payload.ended_at,
            created_at: now,
        })
    }

    pub fn insert_intake_with_conn(
        &self,
        conn: &Connection,
        session_id: i64,
        item: &NewIntake,
    ) -> CareResult<SessionIntake> {
        conn.execute(
            "INSERT INTO session_intakes
             (session_id, medication_id, start_time, ingest_time, end_time, ingested)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                item.medication_id,
                item.start_time.to_rfc3339(),
                item.ingest_time.map(|t| t.to_rfc3339()),
                item.end_time.to_rfc3339(),
                item.ingested,
            ],
        )?;

        Ok(SessionIntake {
            id: conn.last_insert_rowid(),
            session_id,
            medication_id: item.medication_id,
            start_time: item.start_time,
            ingest_time: item.ingest_time,
            end_time: item.end_time,
            ingested: item.ingested,
        })
    }

    pub fn get_session_intakes(&self, session_id: i64) -> CareResult<Vec<SessionIntake>> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, medication_id, start_time, ingest_time, end_time, ingested
             FROM session_intakes WHERE session_id = ?1 ORDER BY id",
        )?;
        let mut rows = stmt.query([session_id])?;
        let mut intakes = Vec::new();
        while let Some(row) = rows.next()? {
            intakes.push(row_to_intake(row)?);
        }
        Ok(intakes)
    }

    /// Every intake recorded for the patient, across sessions, with medication names
    pub fn get_patient_intakes(&self, patient_id: i64) -> CareResult<Vec<IntakeRow>> {
        let conn = get_conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.session_id, i.medication_id, i.start_time, i.ingest_time,
                    i.end_time, i.ingested, m.brand_name, m.generic_name
             FROM session_intakes i
             JOIN sessions s ON s.id = i.session_id
             JOIN medications m ON m.id = i.medication_id
             WHERE s.patient_id = ?1
             ORDER BY i.id",
        )?;
        let mut rows = stmt.query([patient_id])?;
        let mut intakes = Vec::new();
        while let Some(row) = rows.next()? {
            intakes.push(IntakeRow {
                intake: row_to_intake(row)?,
                brand_name: row.get(7)?,
                generic_name: row.get(8)?,
            });
        }
        Ok(intakes)
    }

    pub fn count_sessions(&self) -> CareResult<i64> {
        let conn = get_conn(&self.pool)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    pub fn count_intakes(&self) -> CareResult<i64> {
        let conn = get_conn(&self.pool)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM session_intakes", [], |row| row.get(0))?)
    }
}

fn row_to_intake(row: &rusqlite::Row) -> CareResult<SessionIntake> {
    let start_time: String = row.get(3)?;
    let ingest_time: Option<String> = row.get(4)?;
    let end_time: String = row.get(5)?;
    let start_time: DateTime<Utc> = parse_timestamp(&start_time)?;

    Ok(SessionIntake {
        id: row.get(0)?,
        session_id: row.get(1)?,
        medication_id: row.get(2)?,
        start_time,
        ingest_time: parse_optional_timestamp(ingest_time)?,
        end_time: parse_timestamp(&end_time)?,
        ingested: row.get(6)?,
    })
}
