// ==========================================
// VitalVida Sync Pipeline - action log repository
// ==========================================
// Table: action_log
// Rule: every pipeline mutation is written here
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
