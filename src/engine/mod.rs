// ==========================================
// VitalVida Sync Pipeline - engine layer
// ==========================================
// Responsibility: business rules, no SQL, no I/O
// ==========================================

pub mod bin_capacity;
pub mod compliance_scoring;
pub mod status_mapping;
pub mod zone_resolver;

pub use bin_capacity::{BinCapacity, CapacityCheck};
pub use compliance_scoring::{ComplianceScoring, ScoreOutcome};
pub use status_mapping::{agent_status_reason, bin_transition, role_status, BinTransition};
pub use zone_resolver::ZoneResolver;
