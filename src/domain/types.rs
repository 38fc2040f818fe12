// ==========================================
// VitalVida Sync Pipeline - shared domain enums
// ==========================================
// All enums are stored as upper-snake strings in SQLite.
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// AgentStatus - delivery agent lifecycle
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    Active,
    OnProbation,
    Suspended,
    Inactive,
    Terminated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "ACTIVE",
            AgentStatus::OnProbation => "ON_PROBATION",
            AgentStatus::Suspended => "SUSPENDED",
            AgentStatus::Inactive => "INACTIVE",
            AgentStatus::Terminated => "TERMINATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(AgentStatus::Active),
            "ON_PROBATION" | "PROBATION" => Some(AgentStatus::OnProbation),
            "SUSPENDED" => Some(AgentStatus::Suspended),
            "INACTIVE" => Some(AgentStatus::Inactive),
            "TERMINATED" => Some(AgentStatus::Terminated),
            _ => None,
        }
    }

    /// Agents in these states may hold stock and receive allocations
    pub fn can_hold_stock(&self) -> bool {
        matches!(self, AgentStatus::Active | AgentStatus::OnProbation)
    }

    /// Compliance scoring never moves an agent out of these states
    pub fn is_offboarded(&self) -> bool {
        matches!(self, AgentStatus::Inactive | AgentStatus::Terminated)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// BinStatus - Role bin state
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinStatus {
    Active,
    Suspended,
    /// Manually locked by operations; the pipeline never unlocks it
    Locked,
}

impl BinStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinStatus::Active => "ACTIVE",
            BinStatus::Suspended => "SUSPENDED",
            BinStatus::Locked => "LOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(BinStatus::Active),
            "SUSPENDED" => Some(BinStatus::Suspended),
            "LOCKED" => Some(BinStatus::Locked),
            _ => None,
        }
    }

    pub fn accepts_stock(&self) -> bool {
        matches!(self, BinStatus::Active)
    }
}

impl fmt::Display for BinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// ComplianceActionType
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceActionType {
    Warning,
    MinorViolation,
    MajorViolation,
    Suspension,
    Reinstatement,
    Commendation,
    SalaryDeduction,
}

impl ComplianceActionType {
    pub const ALL: [ComplianceActionType; 7] = [
        ComplianceActionType::Warning,
        ComplianceActionType::MinorViolation,
        ComplianceActionType::MajorViolation,
        ComplianceActionType::Suspension,
        ComplianceActionType::Reinstatement,
        ComplianceActionType::Commendation,
        ComplianceActionType::SalaryDeduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceActionType::Warning => "WARNING",
            ComplianceActionType::MinorViolation => "MINOR_VIOLATION",
            ComplianceActionType::MajorViolation => "MAJOR_VIOLATION",
            ComplianceActionType::Suspension => "SUSPENSION",
            ComplianceActionType::Reinstatement => "REINSTATEMENT",
            ComplianceActionType::Commendation => "COMMENDATION",
            ComplianceActionType::SalaryDeduction => "SALARY_DEDUCTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        Self::ALL.iter().copied().find(|t| t.as_str() == upper)
    }

    /// Lowercase key used in config (`compliance.points.<key>`) and i18n
    pub fn key(&self) -> String {
        self.as_str().to_lowercase()
    }

    /// Only deductions carry a monetary amount
    pub fn requires_amount(&self) -> bool {
        matches!(self, ComplianceActionType::SalaryDeduction)
    }
}

impl fmt::Display for ComplianceActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Severity - flags, alerts, notifications
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "INFO" => Some(Severity::Info),
            "WARNING" => Some(Severity::Warning),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}
