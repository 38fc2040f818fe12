// ==========================================
// VitalVida Sync Pipeline - delivery agent repository
// ==========================================
// Table: vv_delivery_agents
// Rule: data mapping only, no business logic
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_ts};
use crate::domain::agent::DeliveryAgent;
use crate::domain::types::AgentStatus;
use crate::domain::zone::Zone;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

const AGENT_COLUMNS: &str = "agent_id, da_code, full_name, phone, location, zone, rating, \
     compliance_score, status, created_at, updated_at";

pub struct AgentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AgentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // Writes
    // ==========================================

    pub fn insert(&self, agent: &DeliveryAgent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vv_delivery_agents (
                agent_id, da_code, full_name, phone, location, zone, rating,
                compliance_score, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                agent.agent_id,
                agent.da_code,
                agent.full_name,
                agent.phone,
                agent.location,
                agent.zone.as_str(),
                agent.rating,
                agent.compliance_score,
                agent.status.as_str(),
                fmt_ts(&agent.created_at),
                fmt_ts(&agent.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Overwrite the editable fields of an existing agent
    pub fn update(&self, agent: &DeliveryAgent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE vv_delivery_agents
            SET full_name = ?2, phone = ?3, location = ?4, zone = ?5, rating = ?6,
                compliance_score = ?7, status = ?8, updated_at = ?9
            WHERE agent_id = ?1
            "#,
            params![
                agent.agent_id,
                agent.full_name,
                agent.phone,
                agent.location,
                agent.zone.as_str(),
                agent.rating,
                agent.compliance_score,
                agent.status.as_str(),
                fmt_ts(&agent.updated_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("DeliveryAgent", &agent.agent_id));
        }
        Ok(())
    }

    /// Remove a registration whose AgentUpdated event could not be queued
    pub fn delete(&self, agent_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM vv_delivery_agents WHERE agent_id = ?1", params![agent_id])?;
        Ok(())
    }

    /// Score/status write used by compliance enforcement, inside the caller's transaction
    pub fn update_score_status_tx(
        tx: &Transaction<'_>,
        agent_id: &str,
        score: i32,
        status: AgentStatus,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = tx.execute(
            "UPDATE vv_delivery_agents SET compliance_score = ?2, status = ?3, updated_at = ?4 WHERE agent_id = ?1",
            params![agent_id, score, status.as_str(), fmt_ts(&now)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("DeliveryAgent", agent_id));
        }
        Ok(())
    }

    // ==========================================
    // Reads
    // ==========================================

    pub fn find_by_id(&self, agent_id: &str) -> RepositoryResult<Option<DeliveryAgent>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, agent_id)
    }

    pub fn find_by_da_code(&self, da_code: &str) -> RepositoryResult<Option<DeliveryAgent>> {
        let conn = self.get_conn()?;
        Self::find_by_da_code_tx(&conn, da_code)
    }

    /// Lookup on any connection or transaction
    pub fn find_by_id_tx(conn: &Connection, agent_id: &str) -> RepositoryResult<Option<DeliveryAgent>> {
        let sql = format!("SELECT {} FROM vv_delivery_agents WHERE agent_id = ?1", AGENT_COLUMNS);
        Ok(conn.query_row(&sql, params![agent_id], map_agent_row).optional()?)
    }

    pub fn find_by_da_code_tx(conn: &Connection, da_code: &str) -> RepositoryResult<Option<DeliveryAgent>> {
        let sql = format!("SELECT {} FROM vv_delivery_agents WHERE da_code = ?1", AGENT_COLUMNS);
        Ok(conn.query_row(&sql, params![da_code], map_agent_row).optional()?)
    }

    pub fn list_by_zone(&self, zone: Zone) -> RepositoryResult<Vec<DeliveryAgent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM vv_delivery_agents WHERE zone = ?1 ORDER BY da_code",
            AGENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let agents = stmt
            .query_map(params![zone.as_str()], map_agent_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(agents)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<DeliveryAgent>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM vv_delivery_agents ORDER BY da_code", AGENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let agents = stmt
            .query_map([], map_agent_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(agents)
    }
}

fn map_agent_row(row: &Row<'_>) -> rusqlite::Result<DeliveryAgent> {
    let zone: String = row.get(5)?;
    let status: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(DeliveryAgent {
        agent_id: row.get(0)?,
        da_code: row.get(1)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        location: row.get(4)?,
        zone: Zone::parse(&zone),
        rating: row.get(6)?,
        compliance_score: row.get(7)?,
        status: parse_code(&status, 8, AgentStatus::parse)?,
        created_at: parse_ts(&created_at, 9)?,
        updated_at: parse_ts(&updated_at, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_ts, open_in_memory};

    fn repo() -> AgentRepository {
        AgentRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    fn agent(id: &str, code: &str, zone: Zone) -> DeliveryAgent {
        let now = now_ts();
        DeliveryAgent {
            agent_id: id.to_string(),
            da_code: code.to_string(),
            full_name: "Aisha Bello".to_string(),
            phone: "+2348091112233".to_string(),
            location: "Garki Area 11".to_string(),
            zone,
            rating: 4.0,
            compliance_score: 100,
            status: AgentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let repo = repo();
        repo.insert(&agent("a1", "DA-0001", Zone::Abuja)).unwrap();

        let by_code = repo.find_by_da_code("DA-0001").unwrap().unwrap();
        assert_eq!(by_code.agent_id, "a1");
        assert_eq!(by_code.zone, Zone::Abuja);
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_da_code_rejected() {
        let repo = repo();
        repo.insert(&agent("a1", "DA-0001", Zone::Abuja)).unwrap();
        let err = repo.insert(&agent("a2", "DA-0001", Zone::Kano)).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_update_and_list_by_zone() {
        let repo = repo();
        repo.insert(&agent("a1", "DA-0001", Zone::Abuja)).unwrap();
        repo.insert(&agent("a2", "DA-0002", Zone::Kano)).unwrap();

        let mut a = repo.find_by_id("a1").unwrap().unwrap();
        a.zone = Zone::Kano;
        a.status = AgentStatus::OnProbation;
        repo.update(&a).unwrap();

        let kano = repo.list_by_zone(Zone::Kano).unwrap();
        assert_eq!(kano.len(), 2);
        assert_eq!(kano[0].status, AgentStatus::OnProbation);

        let missing = agent("nope", "DA-9999", Zone::Kano);
        assert!(matches!(repo.update(&missing), Err(RepositoryError::NotFound { .. })));
    }
}
