// ==========================================
// VitalVida Sync Pipeline - repository layer
// ==========================================
// Responsibility: data access over rusqlite
// Rule: no business logic; parameterised SQL only
// ==========================================

pub mod action_log_repo;
pub mod agent_repo;
pub mod allocation_repo;
pub mod audit_flag_repo;
pub mod compliance_action_repo;
pub mod deduction_repo;
pub mod error;
pub mod escalation_repo;
pub mod notification_repo;
pub mod processed_event_repo;
pub mod role_repo;

pub use action_log_repo::ActionLogRepository;
pub use agent_repo::AgentRepository;
pub use allocation_repo::AllocationRepository;
pub use audit_flag_repo::AuditFlagRepository;
pub use compliance_action_repo::ComplianceActionRepository;
pub use deduction_repo::DeductionRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use escalation_repo::EscalationRepository;
pub use notification_repo::NotificationRepository;
pub use processed_event_repo::ProcessedEventRepository;
pub use role_repo::{BinRepository, ComplianceRecordRepository, RoleAgentRepository};
