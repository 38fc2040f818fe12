use crate::db::{fmt_ts, parse_ts};
use crate::domain::role_agent::RoleAgent;
use crate::domain::zone::Zone;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

const ROLE_AGENT_COLUMNS: &str = "role_agent_id, external_da_code, full_name, phone, zone, status, \
     compliance_score, last_event_id, synced_at";

// ==========================================
// RoleAgentRepository - Role-side DA mirror
// ==========================================
pub struct RoleAgentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoleAgentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_da_code(&self, da_code: &str) -> RepositoryResult<Option<RoleAgent>> {
        let conn = self.get_conn()?;
        Self::find_by_da_code_tx(&conn, da_code)
    }

    pub fn find_by_da_code_tx(conn: &Connection, da_code: &str) -> RepositoryResult<Option<RoleAgent>> {
        let sql = format!(
            "SELECT {} FROM role_delivery_agents WHERE external_da_code = ?1",
            ROLE_AGENT_COLUMNS
        );
        Ok(conn.query_row(&sql, params![da_code], map_role_agent_row).optional()?)
    }

    /// Insert or refresh the mirror keyed by `external_da_code`.
    ///
    /// Returns true when a new mirror row was created.
    pub fn upsert_tx(tx: &Transaction<'_>, agent: &RoleAgent) -> RepositoryResult<bool> {
        let existed = Self::find_by_da_code_tx(tx, &agent.external_da_code)?.is_some();

        tx.execute(
            r#"
            INSERT INTO role_delivery_agents (
                role_agent_id, external_da_code, full_name, phone, zone, status,
                compliance_score, last_event_id, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(external_da_code) DO UPDATE SET
                full_name = excluded.full_name,
                phone = excluded.phone,
                zone = excluded.zone,
                status = excluded.status,
                compliance_score = excluded.compliance_score,
                last_event_id = excluded.last_event_id,
                synced_at = excluded.synced_at
            "#,
            params![
                agent.role_agent_id,
                agent.external_da_code,
                agent.full_name,
                agent.phone,
                agent.zone.as_str(),
                agent.status,
                agent.compliance_score,
                agent.last_event_id,
                fmt_ts(&agent.synced_at),
            ],
        )?;

        Ok(!existed)
    }

    /// Compliance write; a missing mirror is not an error (agent sync may lag)
    pub fn update_score_status_tx(
        tx: &Transaction<'_>,
        da_code: &str,
        score: i32,
        role_status: &str,
        event_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let rows = tx.execute(
            r#"
            UPDATE role_delivery_agents
            SET compliance_score = ?2, status = ?3, last_event_id = ?4, synced_at = ?5
            WHERE external_da_code = ?1
            "#,
            params![da_code, score, role_status, event_id, fmt_ts(&now)],
        )?;
        Ok(rows > 0)
    }
}

fn map_role_agent_row(row: &Row<'_>) -> rusqlite::Result<RoleAgent> {
    let zone: String = row.get(4)?;
    let synced_at: String = row.get(8)?;
    Ok(RoleAgent {
        role_agent_id: row.get(0)?,
        external_da_code: row.get(1)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        zone: Zone::parse(&zone),
        status: row.get(5)?,
        compliance_score: row.get(6)?,
        last_event_id: row.get(7)?,
        synced_at: parse_ts(&synced_at, 8)?,
    })
}
