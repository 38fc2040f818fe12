// ==========================================
// VitalVida Sync Pipeline - API layer
// ==========================================
// Responsibility: validated entry points for the admin side;
// each write publishes its domain event after the local commit
// ==========================================

pub mod agent_api;
pub mod compliance_api;
pub mod error;
pub mod escalation_api;
pub mod queue_api;
pub mod stock_api;
pub mod validator;

pub use agent_api::{AgentApi, AgentUpdateResult, RegisterAgentRequest};
pub use compliance_api::{ComplianceApi, RecordActionRequest};
pub use error::{ApiError, ApiResult, ValidationViolation};
pub use escalation_api::EscalationApi;
pub use queue_api::QueueApi;
pub use stock_api::StockApi;
pub use validator::Validator;
