// ==========================================
// VitalVida Sync Pipeline - domain layer
// ==========================================
// Responsibility: entities, value types, enums
// Rule: no data access, no business rules beyond invariants
//       that belong to a single entity
// ==========================================

pub mod action_log;
pub mod agent;
pub mod allocation;
pub mod audit_flag;
pub mod bin;
pub mod compliance;
pub mod deduction;
pub mod escalation;
pub mod notification;
pub mod role_agent;
pub mod types;
pub mod zone;

pub use action_log::{ActionLog, ActionType, ChangeSet, FieldChange};
pub use agent::{AgentChanges, DeliveryAgent, MAX_COMPLIANCE_SCORE};
pub use allocation::{AllocationItem, StockAllocation};
pub use audit_flag::{AuditFlag, AuditFlagType, FlagStatus};
pub use bin::Bin;
pub use compliance::{ComplianceAction, ComplianceRecord};
pub use deduction::{DeductionStatus, SalaryDeduction};
pub use escalation::{Approval, ApproverRole, EscalationRequest, EscalationStatus};
pub use notification::{Channel, Notification, NotificationStatus, RecipientKind};
pub use role_agent::RoleAgent;
pub use types::{AgentStatus, BinStatus, ComplianceActionType, Severity};
pub use zone::Zone;
