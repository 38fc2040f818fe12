// ==========================================
// VitalVida Sync Pipeline - status mapping
// ==========================================
// VitalVida AgentStatus -> Role vocabulary, and the bin
// state that should follow an agent status.
// ==========================================

use crate::domain::bin::{Bin, AGENT_STATUS_REASON_PREFIX};
use crate::domain::types::{AgentStatus, BinStatus};

/// Role-side status string for an agent status
pub fn role_status(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Active => "active",
        AgentStatus::OnProbation => "probation",
        AgentStatus::Suspended => "suspended",
        AgentStatus::Inactive | AgentStatus::Terminated => "inactive",
    }
}

/// Suspension reason written on a bin when its agent leaves active duty
pub fn agent_status_reason(status: AgentStatus) -> String {
    format!("{}{}", AGENT_STATUS_REASON_PREFIX, status.as_str())
}

/// What should happen to a bin after its agent moved to `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinTransition {
    Keep,
    Suspend { reason: String },
    Reactivate,
}

/// Bin transition implied by an agent status.
///
/// Locked bins are never touched. A bin suspended for compliance
/// is only reactivated by a reinstatement, not by agent sync.
pub fn bin_transition(bin: &Bin, status: AgentStatus) -> BinTransition {
    if bin.status == BinStatus::Locked {
        return BinTransition::Keep;
    }

    if status.can_hold_stock() {
        if bin.suspended_for_agent_status() {
            BinTransition::Reactivate
        } else {
            BinTransition::Keep
        }
    } else {
        let reason = agent_status_reason(status);
        if bin.status == BinStatus::Suspended {
            // already suspended: only rewrite an agent-status reason
            if bin.suspended_for_agent_status() && bin.suspension_reason.as_deref() != Some(reason.as_str()) {
                BinTransition::Suspend { reason }
            } else {
                BinTransition::Keep
            }
        } else {
            BinTransition::Suspend { reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bin::COMPLIANCE_REASON;
    use crate::domain::zone::Zone;

    fn bin(status: BinStatus, reason: Option<&str>) -> Bin {
        Bin {
            bin_id: "b1".to_string(),
            external_da_code: "DA-0100".to_string(),
            zone: Zone::Enugu,
            capacity_units: 500,
            current_stock_units: 0,
            current_stock_value: 0.0,
            status,
            suspension_reason: reason.map(str::to_string),
            suspended_at: None,
            updated_at: crate::db::now_ts(),
        }
    }

    #[test]
    fn test_role_status() {
        assert_eq!(role_status(AgentStatus::OnProbation), "probation");
        assert_eq!(role_status(AgentStatus::Terminated), "inactive");
    }

    #[test]
    fn test_suspend_active_bin_when_agent_leaves() {
        let t = bin_transition(&bin(BinStatus::Active, None), AgentStatus::Suspended);
        assert_eq!(
            t,
            BinTransition::Suspend {
                reason: "agent_status:SUSPENDED".to_string()
            }
        );
    }

    #[test]
    fn test_reactivate_only_agent_status_suspensions() {
        let by_agent = bin(BinStatus::Suspended, Some("agent_status:INACTIVE"));
        assert_eq!(bin_transition(&by_agent, AgentStatus::Active), BinTransition::Reactivate);

        let by_compliance = bin(BinStatus::Suspended, Some(COMPLIANCE_REASON));
        assert_eq!(bin_transition(&by_compliance, AgentStatus::Active), BinTransition::Keep);
        assert_eq!(bin_transition(&by_compliance, AgentStatus::Terminated), BinTransition::Keep);
    }

    #[test]
    fn test_locked_bin_untouched() {
        let locked = bin(BinStatus::Locked, Some("manual"));
        assert_eq!(bin_transition(&locked, AgentStatus::Terminated), BinTransition::Keep);
        assert_eq!(bin_transition(&locked, AgentStatus::Active), BinTransition::Keep);
    }
}
