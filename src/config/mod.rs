// ==========================================
// VitalVida Sync Pipeline - configuration layer
// ==========================================
// Responsibility: runtime settings with defaults
// Storage: config_kv table
// ==========================================

pub mod config_manager;
pub mod error;
pub mod pipeline_config_trait;

pub use config_manager::{config_defaults, config_keys, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use pipeline_config_trait::PipelineConfigReader;
