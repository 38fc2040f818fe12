// ==========================================
// Mock pipeline configuration for integration tests
// ==========================================

use async_trait::async_trait;
use std::collections::HashMap;
use vitalvida_sync::config::{config_defaults, ConfigResult, PipelineConfigReader};
use vitalvida_sync::domain::types::ComplianceActionType;

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub initial_score: i32,
    pub probation_threshold: i32,
    pub suspension_threshold: i32,
    pub points: HashMap<ComplianceActionType, i32>,
    pub bin_capacity: i64,
    pub near_capacity_ratio: f64,
    pub escalation_threshold: f64,
    pub escalation_ttl_hours: i64,
    pub locale: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            initial_score: config_defaults::INITIAL_SCORE,
            probation_threshold: config_defaults::PROBATION_THRESHOLD,
            suspension_threshold: config_defaults::SUSPENSION_THRESHOLD,
            points: HashMap::new(),
            bin_capacity: config_defaults::BIN_CAPACITY_UNITS,
            near_capacity_ratio: config_defaults::NEAR_CAPACITY_RATIO,
            escalation_threshold: config_defaults::ESCALATION_THRESHOLD_NGN,
            escalation_ttl_hours: config_defaults::ESCALATION_TTL_HOURS,
            locale: "en".to_string(),
        }
    }
}

impl MockConfig {
    pub fn with_bin_capacity(capacity: i64) -> Self {
        Self {
            bin_capacity: capacity,
            ..Self::default()
        }
    }

    pub fn pidgin() -> Self {
        Self {
            locale: "pcm".to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PipelineConfigReader for MockConfig {
    async fn get_initial_compliance_score(&self) -> ConfigResult<i32> {
        Ok(self.initial_score)
    }

    async fn get_probation_threshold(&self) -> ConfigResult<i32> {
        Ok(self.probation_threshold)
    }

    async fn get_suspension_threshold(&self) -> ConfigResult<i32> {
        Ok(self.suspension_threshold)
    }

    async fn get_compliance_points(&self, action: ComplianceActionType) -> ConfigResult<i32> {
        Ok(self
            .points
            .get(&action)
            .copied()
            .unwrap_or_else(|| config_defaults::points(action)))
    }

    async fn get_default_bin_capacity(&self) -> ConfigResult<i64> {
        Ok(self.bin_capacity)
    }

    async fn get_near_capacity_ratio(&self) -> ConfigResult<f64> {
        Ok(self.near_capacity_ratio)
    }

    async fn get_escalation_threshold(&self) -> ConfigResult<f64> {
        Ok(self.escalation_threshold)
    }

    async fn get_escalation_ttl_hours(&self) -> ConfigResult<i64> {
        Ok(self.escalation_ttl_hours)
    }

    async fn get_notification_locale(&self) -> ConfigResult<String> {
        Ok(self.locale.clone())
    }
}
