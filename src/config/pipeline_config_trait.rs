// ==========================================
// VitalVida Sync Pipeline - pipeline config reader trait
// ==========================================
// Listeners and engines read thresholds through this trait so
// tests can swap in a fixed configuration.
// Implemented by ConfigManager (config_kv table).
// ==========================================

use crate::config::error::ConfigResult;
use crate::domain::types::ComplianceActionType;
use async_trait::async_trait;

#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    // ===== compliance =====

    /// Score a newly registered DA starts with (default 100)
    async fn get_initial_compliance_score(&self) -> ConfigResult<i32>;

    /// Below this score an Active DA goes on probation (default 60)
    async fn get_probation_threshold(&self) -> ConfigResult<i32>;

    /// Below this score a DA is suspended (default 40)
    async fn get_suspension_threshold(&self) -> ConfigResult<i32>;

    /// Signed points applied for an action (negative = penalty)
    async fn get_compliance_points(&self, action: ComplianceActionType) -> ConfigResult<i32>;

    // ===== bins =====

    /// Capacity given to a bin created by agent sync (default 500 units)
    async fn get_default_bin_capacity(&self) -> ConfigResult<i64>;

    /// Utilization at or above which a near-capacity alert is sent (default 0.9)
    async fn get_near_capacity_ratio(&self) -> ConfigResult<f64>;

    // ===== escalation =====

    /// Deductions at or above this amount need an escalation (default ₦50,000)
    async fn get_escalation_threshold(&self) -> ConfigResult<f64>;

    /// Hours before an undecided escalation expires (default 48)
    async fn get_escalation_ttl_hours(&self) -> ConfigResult<i64>;

    // ===== notifications =====

    /// Locale for agent-facing texts ("en" or "pcm")
    async fn get_notification_locale(&self) -> ConfigResult<String>;
}
