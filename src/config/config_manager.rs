// ==========================================
// VitalVida Sync Pipeline - configuration manager
// ==========================================
// Responsibility: load / query / override runtime settings
// Storage: config_kv table (key-value + scope, global scope only)
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::ComplianceActionType;
use crate::domain::zone::Zone;
use crate::queue::retry::RetryPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Open the database at `db_path` with its own connection
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share an existing connection.
    ///
    /// The shared PRAGMAs are re-applied (idempotent).
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }

        Ok(Self { conn })
    }

    fn lock(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// Read a global-scope value
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert a global-scope value
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(key, value, "config value updated");
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Parse a value, falling back to the default (with a warning) when it is malformed
    fn get_parsed<T: FromStr + Copy + std::fmt::Display>(&self, key: &str, default: T) -> ConfigResult<T> {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, default = %default, "malformed config value, using default");
                Ok(default)
            }
        }
    }

    /// Snapshot of all global settings as a JSON object string
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// Restore settings from a snapshot (overwrites existing global keys)
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    // ===== sync reads used while wiring the app =====

    /// Per-listener retry override (`queue.max_attempts.<listener>`,
    /// `queue.backoff_seconds.<listener>`); None when neither key is set
    pub fn get_retry_policy_override(
        &self,
        listener: &str,
        declared: &RetryPolicy,
    ) -> ConfigResult<Option<RetryPolicy>> {
        let attempts_key = format!("{}.{}", config_keys::QUEUE_MAX_ATTEMPTS, listener);
        let backoff_key = format!("{}.{}", config_keys::QUEUE_BACKOFF_SECONDS, listener);

        let attempts = self.get_global_config_value(&attempts_key)?;
        let backoff = self.get_global_config_value(&backoff_key)?;
        if attempts.is_none() && backoff.is_none() {
            return Ok(None);
        }

        let max_attempts = match attempts {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: attempts_key.clone(),
                value: raw.clone(),
                message: e.to_string(),
            })?,
            None => declared.max_attempts,
        };
        let backoff_seconds = match backoff {
            Some(raw) => parse_backoff(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: backoff_key.clone(),
                value: raw.clone(),
                message: "expected comma separated seconds".to_string(),
            })?,
            None => declared.backoff_seconds.clone(),
        };

        Ok(Some(RetryPolicy::new(max_attempts, backoff_seconds)))
    }

    /// Seconds after which a RUNNING job is considered abandoned (default 300)
    pub fn get_stale_running_seconds(&self) -> ConfigResult<i64> {
        self.get_parsed(config_keys::QUEUE_STALE_RUNNING_SECONDS, 300)
    }

    /// Zone keyword overrides (`zone.keywords.<ZONE>` = "kw1,kw2")
    pub fn get_zone_keyword_overrides(&self) -> ConfigResult<HashMap<Zone, Vec<String>>> {
        let mut overrides = HashMap::new();
        for zone in Zone::ROUTABLE {
            let key = format!("{}.{}", config_keys::ZONE_KEYWORDS, zone.as_str());
            if let Some(raw) = self.get_global_config_value(&key)? {
                let keywords: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !keywords.is_empty() {
                    overrides.insert(zone, keywords);
                }
            }
        }
        Ok(overrides)
    }
}

fn parse_backoff(raw: &str) -> Option<Vec<u64>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().ok())
        .collect()
}

// ==========================================
// PipelineConfigReader implementation
// ==========================================
#[async_trait]
impl PipelineConfigReader for ConfigManager {
    async fn get_initial_compliance_score(&self) -> ConfigResult<i32> {
        let score = self.get_parsed(config_keys::COMPLIANCE_INITIAL_SCORE, config_defaults::INITIAL_SCORE)?;
        if !(0..=crate::domain::agent::MAX_COMPLIANCE_SCORE).contains(&score) {
            tracing::warn!(score, "initial compliance score out of [0, 100], using default");
            return Ok(config_defaults::INITIAL_SCORE);
        }
        Ok(score)
    }

    async fn get_probation_threshold(&self) -> ConfigResult<i32> {
        self.get_parsed(
            config_keys::COMPLIANCE_PROBATION_THRESHOLD,
            config_defaults::PROBATION_THRESHOLD,
        )
    }

    async fn get_suspension_threshold(&self) -> ConfigResult<i32> {
        self.get_parsed(
            config_keys::COMPLIANCE_SUSPENSION_THRESHOLD,
            config_defaults::SUSPENSION_THRESHOLD,
        )
    }

    async fn get_compliance_points(&self, action: ComplianceActionType) -> ConfigResult<i32> {
        let key = format!("{}.{}", config_keys::COMPLIANCE_POINTS, action.key());
        self.get_parsed(&key, config_defaults::points(action))
    }

    async fn get_default_bin_capacity(&self) -> ConfigResult<i64> {
        let capacity = self.get_parsed(
            config_keys::BIN_DEFAULT_CAPACITY_UNITS,
            config_defaults::BIN_CAPACITY_UNITS,
        )?;
        if capacity <= 0 {
            tracing::warn!(capacity, "bin capacity must be positive, using default");
            return Ok(config_defaults::BIN_CAPACITY_UNITS);
        }
        Ok(capacity)
    }

    async fn get_near_capacity_ratio(&self) -> ConfigResult<f64> {
        let ratio = self.get_parsed(
            config_keys::BIN_NEAR_CAPACITY_RATIO,
            config_defaults::NEAR_CAPACITY_RATIO,
        )?;
        if ratio <= 0.0 || ratio > 1.0 {
            tracing::warn!(ratio, "near capacity ratio out of (0, 1], using default");
            return Ok(config_defaults::NEAR_CAPACITY_RATIO);
        }
        Ok(ratio)
    }

    async fn get_escalation_threshold(&self) -> ConfigResult<f64> {
        self.get_parsed(
            config_keys::ESCALATION_THRESHOLD_NGN,
            config_defaults::ESCALATION_THRESHOLD_NGN,
        )
    }

    async fn get_escalation_ttl_hours(&self) -> ConfigResult<i64> {
        self.get_parsed(
            config_keys::ESCALATION_TTL_HOURS,
            config_defaults::ESCALATION_TTL_HOURS,
        )
    }

    async fn get_notification_locale(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::NOTIFICATION_LOCALE, "en")
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // compliance
    pub const COMPLIANCE_INITIAL_SCORE: &str = "compliance.initial_score";
    pub const COMPLIANCE_PROBATION_THRESHOLD: &str = "compliance.probation_threshold";
    pub const COMPLIANCE_SUSPENSION_THRESHOLD: &str = "compliance.suspension_threshold";
    pub const COMPLIANCE_POINTS: &str = "compliance.points"; // .<action_type>

    // bins
    pub const BIN_DEFAULT_CAPACITY_UNITS: &str = "bin.default_capacity_units";
    pub const BIN_NEAR_CAPACITY_RATIO: &str = "bin.near_capacity_ratio";

    // escalation
    pub const ESCALATION_THRESHOLD_NGN: &str = "escalation.threshold_ngn";
    pub const ESCALATION_TTL_HOURS: &str = "escalation.ttl_hours";

    // queue
    pub const QUEUE_MAX_ATTEMPTS: &str = "queue.max_attempts"; // .<listener>
    pub const QUEUE_BACKOFF_SECONDS: &str = "queue.backoff_seconds"; // .<listener>
    pub const QUEUE_STALE_RUNNING_SECONDS: &str = "queue.stale_running_seconds";

    // notifications
    pub const NOTIFICATION_LOCALE: &str = "notification.locale";

    // zones
    pub const ZONE_KEYWORDS: &str = "zone.keywords"; // .<ZONE>
}

// ==========================================
// Defaults used when a key is absent
// ==========================================
pub mod config_defaults {
    use crate::domain::types::ComplianceActionType;

    pub const INITIAL_SCORE: i32 = 100;
    pub const PROBATION_THRESHOLD: i32 = 60;
    pub const SUSPENSION_THRESHOLD: i32 = 40;
    pub const BIN_CAPACITY_UNITS: i64 = 500;
    pub const NEAR_CAPACITY_RATIO: f64 = 0.9;
    pub const ESCALATION_THRESHOLD_NGN: f64 = 50_000.0;
    pub const ESCALATION_TTL_HOURS: i64 = 48;

    pub fn points(action: ComplianceActionType) -> i32 {
        match action {
            ComplianceActionType::Warning => -5,
            ComplianceActionType::MinorViolation => -10,
            ComplianceActionType::MajorViolation => -25,
            ComplianceActionType::Suspension => -30,
            ComplianceActionType::Reinstatement => 0,
            ComplianceActionType::Commendation => 5,
            ComplianceActionType::SalaryDeduction => -10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let cfg = manager();
        assert_eq!(cfg.get_initial_compliance_score().await.unwrap(), 100);
        assert_eq!(cfg.get_suspension_threshold().await.unwrap(), 40);
        assert_eq!(
            cfg.get_compliance_points(ComplianceActionType::MajorViolation)
                .await
                .unwrap(),
            -25
        );
        assert_eq!(cfg.get_notification_locale().await.unwrap(), "en");
    }

    #[tokio::test]
    async fn test_override_and_malformed_value() {
        let cfg = manager();
        cfg.set_global_config_value("compliance.points.warning", "-8").unwrap();
        cfg.set_global_config_value(config_keys::BIN_DEFAULT_CAPACITY_UNITS, "lots").unwrap();

        assert_eq!(
            cfg.get_compliance_points(ComplianceActionType::Warning).await.unwrap(),
            -8
        );
        assert_eq!(cfg.get_default_bin_capacity().await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_near_capacity_ratio_out_of_range() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::BIN_NEAR_CAPACITY_RATIO, "1.5").unwrap();
        assert_eq!(cfg.get_near_capacity_ratio().await.unwrap(), 0.9);
    }

    #[tokio::test]
    async fn test_out_of_range_score_and_capacity_fall_back() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::COMPLIANCE_INITIAL_SCORE, "250").unwrap();
        cfg.set_global_config_value(config_keys::BIN_DEFAULT_CAPACITY_UNITS, "-20").unwrap();
        assert_eq!(cfg.get_initial_compliance_score().await.unwrap(), 100);
        assert_eq!(cfg.get_default_bin_capacity().await.unwrap(), 500);

        cfg.set_global_config_value(config_keys::COMPLIANCE_INITIAL_SCORE, "80").unwrap();
        assert_eq!(cfg.get_initial_compliance_score().await.unwrap(), 80);
    }

    #[test]
    fn test_snapshot_restore() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::ESCALATION_TTL_HOURS, "24").unwrap();
        let snapshot = cfg.get_config_snapshot().unwrap();

        cfg.set_global_config_value(config_keys::ESCALATION_TTL_HOURS, "72").unwrap();
        let restored = cfg.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(
            cfg.get_global_config_value(config_keys::ESCALATION_TTL_HOURS).unwrap(),
            Some("24".to_string())
        );
    }

    #[test]
    fn test_retry_policy_override() {
        let cfg = manager();
        let declared = RetryPolicy::new(3, vec![10, 30, 60]);
        assert!(cfg
            .get_retry_policy_override("sync_stock_to_bin_system", &declared)
            .unwrap()
            .is_none());

        cfg.set_global_config_value("queue.backoff_seconds.sync_stock_to_bin_system", "1, 2")
            .unwrap();
        let policy = cfg
            .get_retry_policy_override("sync_stock_to_bin_system", &declared)
            .unwrap()
            .unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_seconds, vec![1, 2]);

        cfg.set_global_config_value("queue.max_attempts.sync_stock_to_bin_system", "x")
            .unwrap();
        assert!(cfg
            .get_retry_policy_override("sync_stock_to_bin_system", &declared)
            .is_err());
    }

    #[test]
    fn test_zone_keyword_overrides() {
        let cfg = manager();
        cfg.set_global_config_value("zone.keywords.KANO", "Sabon Gari, , Nassarawa GRA")
            .unwrap();
        let overrides = cfg.get_zone_keyword_overrides().unwrap();
        assert_eq!(
            overrides.get(&Zone::Kano),
            Some(&vec!["sabon gari".to_string(), "nassarawa gra".to_string()])
        );
        assert!(!overrides.contains_key(&Zone::Abuja));
    }
}
