//! Cabinets and their boxes
use crate::care_db::schema::*;
use crate::care_db::medication_store::ndc_codes_for;
use crate::care_db::{get_conn, ConnectionPool};
use crate::error::CareResult;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

pub struct CabinetStore {
    pool: ConnectionPool,
}

impl CabinetStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn create_cabinet_with_conn(&self, conn: &Connection, patient_id: i64) -> CareResult<Cabinet> {
        conn.execute("INSERT INTO cabinets (patient_id) VALUES (?1)", [patient_id])?;
        let id = conn.last_insert_rowid();
        debug!("Created cabinet {} for patient {}", id, patient_id);
        Ok(Cabinet { id, patient_id })
    }

    pub fn get_cabinet_with_conn(&self, conn: &Connection, cabinet_id: i64) -> CareResult<Option<Cabinet>> {
        Ok(conn
            .query_row(
                "SELECT id, patient_id FROM cabinets WHERE id = ?1",
                [cabinet_id],
                row_to_cabinet,
            )
            .optional()?)
    }

    /// Insert the box or overwrite its position and quantity
    pub fn upsert_box_with_conn(
        &self,
        conn: &Connection,
        cabinet_id: i64,
        medication_id: i64,
        box_number: i32,
        quantity: i32,
    ) -> CareResult<CabinetBox> {
        conn.execute(
            "INSERT INTO cabinet_boxes (cabinet_id, medication_id, box, quantity)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cabinet_id, medication_id) DO UPDATE SET
                 box = excluded.box,
                 quantity = excluded.quantity",
            params![cabinet_id, medication_id, box_number, quantity],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM cabinet_boxes WHERE cabinet_id = ?1 AND medication_id = ?2",
            params![cabinet_id, medication_id],
            |row| row.get(0),
        )?;

        Ok(CabinetBox {
            id,
            cabinet_id,
            medication_id,
            box_number,
            quantity,
        })
    }

    /// Boxes of the patient's cabinet with medication and NDC codes attached.
    /// `None` when the patient has no cabinet.
    pub fn get_patient_boxes(&self, patient_id: i64) -> CareResult<Option<Vec<CabinetBoxRow>>> {
        let conn = get_conn(&self.pool)?;

        let cabinet_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM cabinets WHERE patient_id = ?1",
                [patient_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(cabinet_id) = cabinet_id else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT b.id, b.cabinet_id, b.medication_id, b.box, b.quantity,
                    m.id, m.external_id, m.brand_name, m.generic_name, m.updated_at
             FROM cabinet_boxes b
             LEFT JOIN medications m ON m.id = b.medication_id
             WHERE b.cabinet_id = ?1
             ORDER BY b.box, b.id",
        )?;
        let mut rows = stmt.query([cabinet_id])?;
        let mut boxes = Vec::new();

        while let Some(row) = rows.next()? {
            let cabinet_box = CabinetBox {
                id: row.get(0)?,
                cabinet_id: row.get(1)?,
                medication_id: row.get(2)?,
                box_number: row.get(3)?,
                quantity: row.get(4)?,
            };

            let medication = match row.get::<_, Option<i64>>(5)? {
                Some(id) => {
                    let updated_at: String = row.get(9)?;
                    Some(Medication {
                        id,
                        external_id: row.get(6)?,
                        brand_name: row.get(7)?,
                        generic_name: row.get(8)?,
                        updated_at: parse_timestamp(&updated_at)?,
                    })
                }
                None => None,
            };

            let ndc_codes = match &medication {
                Some(m) => ndc_codes_for(&conn, m.id)?,
                None => Vec::new(),
            };

            boxes.push(CabinetBoxRow {
                cabinet_box,
                medication,
                ndc_codes,
            });
        }

        Ok(Some(boxes))
    }
}

fn row_to_cabinet(row: &Row) -> rusqlite::Result<Cabinet> {
    Ok(Cabinet {
        id: row.get(0)?,
        patient_id: row.get(1)?,
    })
}
