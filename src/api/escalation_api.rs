// ==========================================
// VitalVida Sync Pipeline - escalation API
// ==========================================
// Approval chain for salary deductions at or above the
// escalation threshold.
// amount >  threshold : two approvals, distinct people, distinct roles
// amount <= threshold : one approval
// APPROVED / REJECTED / EXPIRED are terminal; the outcome
// is copied to the linked deduction (APPROVED / CANCELLED).
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::Validator;
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::deduction::DeductionStatus;
use crate::domain::escalation::{
    Approval, ApproverRole, EscalationRequest, EscalationStatus, SUBJECT_SALARY_DEDUCTION,
};
use crate::repository::{ActionLogRepository, DeductionRepository, EscalationRepository, RepositoryError};

pub struct EscalationApi {
    conn: Arc<Mutex<Connection>>,
    escalation_repo: Arc<EscalationRepository>,
}

impl EscalationApi {
    pub fn new(conn: Arc<Mutex<Connection>>, escalation_repo: Arc<EscalationRepository>) -> Self {
        Self {
            conn,
            escalation_repo,
        }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()).into())
    }

    pub fn approve(&self, escalation_id: &str, approver: &str, role: ApproverRole) -> ApiResult<EscalationRequest> {
        self.approve_at(escalation_id, approver, role, now_ts())
    }

    pub fn approve_at(
        &self,
        escalation_id: &str,
        approver: &str,
        role: ApproverRole,
        now: NaiveDateTime,
    ) -> ApiResult<EscalationRequest> {
        let mut v = Validator::new();
        v.require_non_empty("approver", approver);
        v.finish()?;
        let approver = approver.trim();

        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(RepositoryError::from)?;

        let mut request = EscalationRepository::find_by_id_tx(&tx, escalation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("EscalationRequest (id={})", escalation_id)))?;

        if request.is_expired_at(now) {
            Self::close_tx(&tx, &mut request, EscalationStatus::Expired, now, None, "system")?;
            tx.commit().map_err(RepositoryError::from)?;
            return Err(ApiError::InvalidStateTransition {
                from: EscalationStatus::Expired.as_str().to_string(),
                to: EscalationStatus::Approved.as_str().to_string(),
            });
        }
        Self::ensure_open(&request, EscalationStatus::Approved)?;

        if request.has_approved(approver) {
            return Err(ApiError::BusinessRuleViolation(format!(
                "{} has already approved escalation {}",
                approver, escalation_id
            )));
        }
        if request.required_approvals > 1 && request.has_role(role) {
            return Err(ApiError::BusinessRuleViolation(format!(
                "a {} approver has already signed escalation {}; the second approval needs another role",
                role.as_str(),
                escalation_id
            )));
        }

        let approval = Approval {
            approver: approver.to_string(),
            role,
            decided_at: now,
        };
        EscalationRepository::add_approval_tx(&tx, escalation_id, &approval)?;
        request.approvals.push(approval);

        let status = request.status_after_approvals();
        if status == EscalationStatus::Approved {
            Self::close_tx(&tx, &mut request, EscalationStatus::Approved, now, None, approver)?;
        } else {
            EscalationRepository::update_status_tx(&tx, escalation_id, status, None, None)?;
            request.status = status;
            let log = ActionLog::new(ActionType::EscalationDecided, approver)
                .with_detail(format!(
                    "escalation {} approval {}/{} ({})",
                    escalation_id,
                    request.approvals.len(),
                    request.required_approvals,
                    role.as_str()
                ));
            let log = match &request.da_code {
                Some(da) => log.with_da_code(da),
                None => log,
            };
            ActionLogRepository::insert_tx(&tx, &log)?;
        }

        tx.commit().map_err(RepositoryError::from)?;
        info!(
            %escalation_id,
            approver,
            role = role.as_str(),
            status = request.status.as_str(),
            "escalation approval recorded"
        );
        Ok(request)
    }

    pub fn reject(&self, escalation_id: &str, approver: &str, reason: &str) -> ApiResult<EscalationRequest> {
        self.reject_at(escalation_id, approver, reason, now_ts())
    }

    pub fn reject_at(
        &self,
        escalation_id: &str,
        approver: &str,
        reason: &str,
        now: NaiveDateTime,
    ) -> ApiResult<EscalationRequest> {
        let mut v = Validator::new();
        v.require_non_empty("approver", approver);
        v.require_non_empty("reason", reason);
        v.finish()?;

        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(RepositoryError::from)?;

        let mut request = EscalationRepository::find_by_id_tx(&tx, escalation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("EscalationRequest (id={})", escalation_id)))?;

        if request.is_expired_at(now) {
            Self::close_tx(&tx, &mut request, EscalationStatus::Expired, now, None, "system")?;
            tx.commit().map_err(RepositoryError::from)?;
            return Err(ApiError::InvalidStateTransition {
                from: EscalationStatus::Expired.as_str().to_string(),
                to: EscalationStatus::Rejected.as_str().to_string(),
            });
        }
        Self::ensure_open(&request, EscalationStatus::Rejected)?;

        Self::close_tx(
            &tx,
            &mut request,
            EscalationStatus::Rejected,
            now,
            Some(reason.trim()),
            approver.trim(),
        )?;
        tx.commit().map_err(RepositoryError::from)?;

        info!(%escalation_id, approver = approver.trim(), "escalation rejected");
        Ok(request)
    }

    /// Expire every open request past its deadline; returns the expired ids
    pub fn expire_stale(&self, now: NaiveDateTime) -> ApiResult<Vec<String>> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(RepositoryError::from)?;

        let ids = EscalationRepository::list_expired_ids_tx(&tx, now)?;
        for id in &ids {
            if let Some(mut request) = EscalationRepository::find_by_id_tx(&tx, id)? {
                Self::close_tx(&tx, &mut request, EscalationStatus::Expired, now, None, "system")?;
            }
        }
        tx.commit().map_err(RepositoryError::from)?;

        if !ids.is_empty() {
            warn!(expired = ids.len(), "escalations expired without a decision");
        }
        Ok(ids)
    }

    pub fn get(&self, escalation_id: &str) -> ApiResult<EscalationRequest> {
        self.escalation_repo
            .find_by_id(escalation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("EscalationRequest (id={})", escalation_id)))
    }

    /// PENDING and PARTIALLY_APPROVED, oldest first
    pub fn list_pending(&self) -> ApiResult<Vec<EscalationRequest>> {
        Ok(self.escalation_repo.list_pending()?)
    }

    fn ensure_open(request: &EscalationRequest, to: EscalationStatus) -> ApiResult<()> {
        if request.status.is_terminal() {
            return Err(ApiError::InvalidStateTransition {
                from: request.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Move to a terminal status and carry it to the linked deduction
    fn close_tx(
        conn: &Connection,
        request: &mut EscalationRequest,
        status: EscalationStatus,
        now: NaiveDateTime,
        rejection_reason: Option<&str>,
        actor: &str,
    ) -> ApiResult<()> {
        EscalationRepository::update_status_tx(conn, &request.escalation_id, status, Some(now), rejection_reason)?;
        request.status = status;
        request.decided_at = Some(now);
        if let Some(reason) = rejection_reason {
            request.rejection_reason = Some(reason.to_string());
        }

        if request.subject_type == SUBJECT_SALARY_DEDUCTION {
            let deduction_status = match status {
                EscalationStatus::Approved => DeductionStatus::Approved,
                _ => DeductionStatus::Cancelled,
            };
            DeductionRepository::update_status_tx(conn, &request.subject_id, deduction_status, now)?;
        }

        let log = ActionLog::new(ActionType::EscalationDecided, actor).with_detail(format!(
            "escalation {} {} (NGN {:.2})",
            request.escalation_id,
            status.as_str(),
            request.amount
        ));
        let log = match &request.da_code {
            Some(da) => log.with_da_code(da),
            None => log,
        };
        ActionLogRepository::insert_tx(conn, &log)?;
        Ok(())
    }
}
