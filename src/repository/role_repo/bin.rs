use crate::db::{fmt_ts, parse_code, parse_opt_ts, parse_ts};
use crate::domain::bin::Bin;
use crate::domain::types::BinStatus;
use crate::domain::zone::Zone;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

const BIN_COLUMNS: &str = "bin_id, external_da_code, zone, capacity_units, current_stock_units, \
     current_stock_value, status, suspension_reason, suspended_at, updated_at";

// ==========================================
// BinRepository - Role stock bins
// ==========================================
pub struct BinRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BinRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== reads =====

    pub fn find_by_da_code(&self, da_code: &str) -> RepositoryResult<Option<Bin>> {
        let conn = self.get_conn()?;
        Self::find_by_da_code_tx(&conn, da_code)
    }

    pub fn find_by_da_code_tx(conn: &Connection, da_code: &str) -> RepositoryResult<Option<Bin>> {
        let sql = format!("SELECT {} FROM role_bins WHERE external_da_code = ?1", BIN_COLUMNS);
        Ok(conn.query_row(&sql, params![da_code], map_bin_row).optional()?)
    }

    pub fn list_by_status(&self, status: BinStatus) -> RepositoryResult<Vec<Bin>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM role_bins WHERE status = ?1 ORDER BY external_da_code",
            BIN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let bins = stmt
            .query_map(params![status.as_str()], map_bin_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bins)
    }

    pub fn movement_exists_tx(conn: &Connection, allocation_id: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM role_bin_movements WHERE allocation_id = ?1",
                params![allocation_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ===== writes (caller's transaction) =====

    pub fn insert_tx(tx: &Transaction<'_>, bin: &Bin) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO role_bins (
                bin_id, external_da_code, zone, capacity_units, current_stock_units,
                current_stock_value, status, suspension_reason, suspended_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                bin.bin_id,
                bin.external_da_code,
                bin.zone.as_str(),
                bin.capacity_units,
                bin.current_stock_units,
                bin.current_stock_value,
                bin.status.as_str(),
                bin.suspension_reason,
                bin.suspended_at.as_ref().map(fmt_ts),
                fmt_ts(&bin.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Suspend (with reason) or reactivate (reason cleared)
    pub fn update_status_tx(
        tx: &Transaction<'_>,
        bin_id: &str,
        status: BinStatus,
        reason: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let suspended_at = match status {
            BinStatus::Active => None,
            _ => Some(fmt_ts(&now)),
        };
        let reason = match status {
            BinStatus::Active => None,
            _ => reason,
        };
        let rows = tx.execute(
            r#"
            UPDATE role_bins
            SET status = ?2, suspension_reason = ?3, suspended_at = ?4, updated_at = ?5
            WHERE bin_id = ?1
            "#,
            params![bin_id, status.as_str(), reason, suspended_at, fmt_ts(&now)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Bin", bin_id));
        }
        Ok(())
    }

    pub fn update_zone_tx(
        tx: &Transaction<'_>,
        bin_id: &str,
        zone: Zone,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        tx.execute(
            "UPDATE role_bins SET zone = ?2, updated_at = ?3 WHERE bin_id = ?1",
            params![bin_id, zone.as_str(), fmt_ts(&now)],
        )?;
        Ok(())
    }

    /// Record the movement and add it to the bin totals.
    ///
    /// Returns false (and changes nothing) when the allocation was already applied.
    pub fn apply_movement_tx(
        tx: &Transaction<'_>,
        bin_id: &str,
        allocation_id: &str,
        units: i64,
        stock_value: f64,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO role_bin_movements (allocation_id, bin_id, units, stock_value, applied_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![allocation_id, bin_id, units, stock_value, fmt_ts(&now)],
        )?;
        if inserted == 0 {
            return Ok(false);
        }

        tx.execute(
            r#"
            UPDATE role_bins
            SET current_stock_units = current_stock_units + ?2,
                current_stock_value = ROUND(current_stock_value + ?3, 2),
                updated_at = ?4
            WHERE bin_id = ?1
            "#,
            params![bin_id, units, stock_value, fmt_ts(&now)],
        )?;
        Ok(true)
    }
}

fn map_bin_row(row: &Row<'_>) -> rusqlite::Result<Bin> {
    let zone: String = row.get(2)?;
    let status: String = row.get(6)?;
    let updated_at: String = row.get(9)?;
    Ok(Bin {
        bin_id: row.get(0)?,
        external_da_code: row.get(1)?,
        zone: Zone::parse(&zone),
        capacity_units: row.get(3)?,
        current_stock_units: row.get(4)?,
        current_stock_value: row.get(5)?,
        status: parse_code(&status, 6, BinStatus::parse)?,
        suspension_reason: row.get(7)?,
        suspended_at: parse_opt_ts(row.get(8)?, 8)?,
        updated_at: parse_ts(&updated_at, 9)?,
    })
}
