// ==========================================
// VitalVida Sync Pipeline - Role system repositories
// ==========================================
// Tables: role_delivery_agents, role_bins, role_bin_movements,
//         role_compliance_records
// Rule: listeners write through the `*_tx` helpers so the
//       mutation and its idempotency marker commit together
// ==========================================

mod agent_mirror;
mod bin;
mod compliance_record;

#[cfg(test)]
mod tests;

pub use agent_mirror::RoleAgentRepository;
pub use bin::BinRepository;
pub use compliance_record::ComplianceRecordRepository;
