// ==========================================
// VitalVida Sync Pipeline - notification templates
// ==========================================
// Template key == notification category, e.g.
// "compliance.suspension", "bin.over_capacity".
// Texts live in locales/*.yml.
// ==========================================

use crate::domain::types::ComplianceActionType;
use crate::i18n;

pub const AGENT_ZONE_CHANGED: &str = "agent.zone_changed";
pub const BIN_ALLOCATION_BLOCKED: &str = "bin.allocation_blocked";
pub const BIN_OVER_CAPACITY: &str = "bin.over_capacity";
pub const BIN_NEAR_CAPACITY: &str = "bin.near_capacity";
pub const COMPLIANCE_SUSPENDED_ALERT: &str = "compliance.suspended_alert";
pub const DEDUCTION_PENDING_APPROVAL: &str = "deduction.pending_approval";
pub const ESCALATION_CREATED: &str = "escalation.created";

/// Render a template in `locale` with `%{name}` arguments
pub fn render(key: &str, locale: &str, args: &[(&str, &str)]) -> String {
    i18n::t_in(locale, key, args)
}

/// Agent-facing text for a compliance action
pub fn compliance_key(action: ComplianceActionType) -> String {
    format!("compliance.{}", action.key())
}

/// 75000.5 -> "75,000.50"
pub fn format_ngn(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ngn() {
        assert_eq!(format_ngn(75_000.5), "75,000.50");
        assert_eq!(format_ngn(999.0), "999.00");
        assert_eq!(format_ngn(1_234_567.891), "1,234,567.89");
        assert_eq!(format_ngn(-50_000.0), "-50,000.00");
    }

    #[test]
    fn test_compliance_key() {
        assert_eq!(
            compliance_key(ComplianceActionType::MajorViolation),
            "compliance.major_violation"
        );
    }

    #[test]
    fn test_render_fills_placeholders() {
        let text = render(
            BIN_OVER_CAPACITY,
            "en",
            &[("da_code", "DA-0042"), ("excess", "20"), ("allocation_id", "alloc-1")],
        );
        assert!(text.contains("DA-0042"));
        assert!(text.contains("20 units"));
        assert!(!text.contains("%{"));
    }
}
