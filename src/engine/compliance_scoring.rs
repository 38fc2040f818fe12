// ==========================================
// VitalVida Sync Pipeline - compliance scoring
// ==========================================
// Input: current score/status + compliance action
// Output: new score (clamped to [0, 100]) + derived status
// Rule: Inactive / Terminated agents are never moved by scoring
// ==========================================

use crate::config::{config_defaults, ConfigResult, PipelineConfigReader};
use crate::domain::agent::MAX_COMPLIANCE_SCORE;
use crate::domain::types::{AgentStatus, ComplianceActionType};
use std::collections::HashMap;

/// Outcome of applying one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub points_delta: i32,
    pub score_before: i32,
    pub score_after: i32,
    pub status_before: AgentStatus,
    pub status_after: AgentStatus,
}

impl ScoreOutcome {
    pub fn status_changed(&self) -> bool {
        self.status_before != self.status_after
    }

    pub fn became_suspended(&self) -> bool {
        self.status_changed() && self.status_after == AgentStatus::Suspended
    }
}

// ==========================================
// ComplianceScoring
// ==========================================
#[derive(Debug, Clone)]
pub struct ComplianceScoring {
    points: HashMap<ComplianceActionType, i32>,
    probation_threshold: i32,
    suspension_threshold: i32,
}

impl ComplianceScoring {
    /// Scoring with the built-in points table and thresholds
    pub fn with_defaults() -> Self {
        let points = ComplianceActionType::ALL
            .iter()
            .map(|t| (*t, config_defaults::points(*t)))
            .collect();
        Self {
            points,
            probation_threshold: config_defaults::PROBATION_THRESHOLD,
            suspension_threshold: config_defaults::SUSPENSION_THRESHOLD,
        }
    }

    /// Load the points table and thresholds from configuration
    pub async fn from_config(config: &dyn PipelineConfigReader) -> ConfigResult<Self> {
        let mut points = HashMap::new();
        for action in ComplianceActionType::ALL {
            points.insert(action, config.get_compliance_points(action).await?);
        }
        Ok(Self {
            points,
            probation_threshold: config.get_probation_threshold().await?,
            suspension_threshold: config.get_suspension_threshold().await?,
        })
    }

    pub fn points_for(&self, action: ComplianceActionType) -> i32 {
        self.points
            .get(&action)
            .copied()
            .unwrap_or_else(|| config_defaults::points(action))
    }

    /// New score after the action, clamped to [0, MAX_COMPLIANCE_SCORE]
    pub fn apply(&self, score: i32, action: ComplianceActionType) -> i32 {
        score
            .saturating_add(self.points_for(action))
            .clamp(0, MAX_COMPLIANCE_SCORE)
    }

    pub fn derive_status(
        &self,
        current: AgentStatus,
        new_score: i32,
        action: ComplianceActionType,
    ) -> AgentStatus {
        if current.is_offboarded() {
            return current;
        }

        match action {
            ComplianceActionType::Suspension => return AgentStatus::Suspended,
            ComplianceActionType::Reinstatement => return AgentStatus::Active,
            _ => {}
        }

        if new_score < self.suspension_threshold {
            return AgentStatus::Suspended;
        }
        if new_score < self.probation_threshold && current == AgentStatus::Active {
            return AgentStatus::OnProbation;
        }
        if current == AgentStatus::OnProbation
            && new_score >= self.probation_threshold
            && action == ComplianceActionType::Commendation
        {
            return AgentStatus::Active;
        }

        current
    }

    /// Score and status in one step.
    ///
    /// Reinstatement restores status only; the score is left where it was.
    pub fn evaluate(
        &self,
        score: i32,
        status: AgentStatus,
        action: ComplianceActionType,
    ) -> ScoreOutcome {
        let score_after = if status.is_offboarded() {
            score
        } else {
            self.apply(score, action)
        };
        ScoreOutcome {
            points_delta: score_after.saturating_sub(score),
            score_before: score,
            score_after,
            status_before: status,
            status_after: self.derive_status(status, score_after, action),
        }
    }
}

impl Default for ComplianceScoring {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComplianceActionType::*;

    #[test]
    fn test_apply_clamps_to_range() {
        let s = ComplianceScoring::with_defaults();
        assert_eq!(s.apply(20, Suspension), 0);
        assert_eq!(s.apply(98, Commendation), 100);
        assert_eq!(s.apply(70, MajorViolation), 45);
        assert_eq!(s.apply(55, Reinstatement), 55);
    }

    #[test]
    fn test_apply_saturates_extreme_configured_points() {
        let mut s = ComplianceScoring::with_defaults();
        s.points.insert(Commendation, i32::MAX);
        s.points.insert(MajorViolation, i32::MIN);
        assert_eq!(s.apply(90, Commendation), 100);
        assert_eq!(s.apply(90, MajorViolation), 0);

        let outcome = s.evaluate(90, AgentStatus::Active, Commendation);
        assert_eq!(outcome.score_after, 100);
        assert_eq!(outcome.status_after, AgentStatus::Active);
    }

    #[test]
    fn test_derive_status_rules() {
        let s = ComplianceScoring::with_defaults();
        assert_eq!(s.derive_status(AgentStatus::Active, 95, Suspension), AgentStatus::Suspended);
        assert_eq!(s.derive_status(AgentStatus::Suspended, 10, Reinstatement), AgentStatus::Active);
        assert_eq!(s.derive_status(AgentStatus::OnProbation, 35, Warning), AgentStatus::Suspended);
        assert_eq!(s.derive_status(AgentStatus::Active, 55, MinorViolation), AgentStatus::OnProbation);
        assert_eq!(s.derive_status(AgentStatus::OnProbation, 65, Commendation), AgentStatus::Active);
        // recovery needs a commendation
        assert_eq!(s.derive_status(AgentStatus::OnProbation, 65, Warning), AgentStatus::OnProbation);
        // a suspended agent is not lifted by points alone
        assert_eq!(s.derive_status(AgentStatus::Suspended, 90, Commendation), AgentStatus::Suspended);
    }

    #[test]
    fn test_offboarded_agents_untouched() {
        let s = ComplianceScoring::with_defaults();
        let outcome = s.evaluate(80, AgentStatus::Terminated, MajorViolation);
        assert_eq!(outcome.score_after, 80);
        assert_eq!(outcome.status_after, AgentStatus::Terminated);
        assert!(!outcome.status_changed());

        assert_eq!(s.derive_status(AgentStatus::Inactive, 80, Reinstatement), AgentStatus::Inactive);
    }

    #[test]
    fn test_evaluate_reports_clamped_delta() {
        let s = ComplianceScoring::with_defaults();
        let outcome = s.evaluate(12, AgentStatus::OnProbation, MajorViolation);
        assert_eq!(outcome.points_delta, -12);
        assert_eq!(outcome.score_after, 0);
        assert!(outcome.became_suspended());
    }
}
