// ==========================================
// VitalVida Sync Pipeline - stock allocation repository
// ==========================================
// Tables: vv_stock_allocations + vv_allocation_items
// ==========================================

use crate::db::{fmt_ts, parse_ts};
use crate::domain::allocation::{AllocationItem, StockAllocation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct AllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Header and item lines in one transaction
    pub fn insert(&self, allocation: &StockAllocation) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO vv_stock_allocations (
                allocation_id, agent_id, da_code, stock_value, total_units, allocated_by, allocated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                allocation.allocation_id,
                allocation.agent_id,
                allocation.da_code,
                allocation.stock_value,
                allocation.total_units,
                allocation.allocated_by,
                fmt_ts(&allocation.allocated_at),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO vv_allocation_items (allocation_id, line_no, product_code, quantity, unit_price) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (idx, item) in allocation.items.iter().enumerate() {
                stmt.execute(params![
                    allocation.allocation_id,
                    idx as i64 + 1,
                    item.product_code,
                    item.quantity,
                    item.unit_price,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Header delete; item lines cascade
    pub fn delete(&self, allocation_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM vv_stock_allocations WHERE allocation_id = ?1",
            params![allocation_id],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, allocation_id: &str) -> RepositoryResult<Option<StockAllocation>> {
        let conn = self.get_conn()?;

        let header = conn
            .query_row(
                r#"
                SELECT allocation_id, agent_id, da_code, stock_value, total_units, allocated_by, allocated_at
                FROM vv_stock_allocations WHERE allocation_id = ?1
                "#,
                params![allocation_id],
                |row| {
                    let allocated_at: String = row.get(6)?;
                    Ok(StockAllocation {
                        allocation_id: row.get(0)?,
                        agent_id: row.get(1)?,
                        da_code: row.get(2)?,
                        items: Vec::new(),
                        stock_value: row.get(3)?,
                        total_units: row.get(4)?,
                        allocated_by: row.get(5)?,
                        allocated_at: parse_ts(&allocated_at, 6)?,
                    })
                },
            )
            .optional()?;

        let Some(mut allocation) = header else {
            return Ok(None);
        };
        allocation.items = load_items(&conn, allocation_id)?;
        Ok(Some(allocation))
    }

    /// Allocation ids for an agent, newest first
    pub fn list_ids_by_da_code(&self, da_code: &str, limit: i64) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT allocation_id FROM vv_stock_allocations WHERE da_code = ?1 \
             ORDER BY allocated_at DESC LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![da_code, limit], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

fn load_items(conn: &Connection, allocation_id: &str) -> RepositoryResult<Vec<AllocationItem>> {
    let mut stmt = conn.prepare(
        "SELECT product_code, quantity, unit_price FROM vv_allocation_items \
         WHERE allocation_id = ?1 ORDER BY line_no",
    )?;
    let items = stmt
        .query_map(params![allocation_id], |row| {
            Ok(AllocationItem {
                product_code: row.get(0)?,
                quantity: row.get(1)?,
                unit_price: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}
