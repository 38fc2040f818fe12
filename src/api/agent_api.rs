// ==========================================
// VitalVida Sync Pipeline - agent API
// ==========================================
// register / update delivery agents; every real change
// publishes AgentUpdated so the Role side follows.
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{is_valid_da_code, normalize_da_code, Validator};
use crate::config::PipelineConfigReader;
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::agent::{AgentChanges, DeliveryAgent, MAX_COMPLIANCE_SCORE};
use crate::domain::types::AgentStatus;
use crate::domain::zone::Zone;
use crate::engine::zone_resolver::ZoneResolver;
use crate::events::{DomainEvent, EventEnvelope, OptionalEventPublisher};
use crate::repository::{ActionLogRepository, AgentRepository};

/// Fields reported on the AgentUpdated event of a new registration
pub const REGISTERED_FIELDS: [&str; 6] = ["full_name", "phone", "location", "zone", "rating", "status"];

const EVENT_SOURCE: &str = "agent_api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub da_code: String,
    pub full_name: String,
    pub phone: String,
    pub location: String,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUpdateResult {
    pub agent: DeliveryAgent,
    pub changed_fields: Vec<String>,
    /// None when nothing changed (no event published)
    pub event_id: Option<String>,
}

pub struct AgentApi {
    agent_repo: Arc<AgentRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    zone_resolver: Arc<ZoneResolver>,
    config: Arc<dyn PipelineConfigReader>,
    publisher: OptionalEventPublisher,
}

impl AgentApi {
    pub fn new(
        agent_repo: Arc<AgentRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        zone_resolver: Arc<ZoneResolver>,
        config: Arc<dyn PipelineConfigReader>,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            agent_repo,
            action_log_repo,
            zone_resolver,
            config,
            publisher,
        }
    }

    /// Register a new DA (Active, initial compliance score from config)
    pub async fn register_agent(&self, req: RegisterAgentRequest, actor: &str) -> ApiResult<DeliveryAgent> {
        let da_code = normalize_da_code(&req.da_code);

        let mut v = Validator::new();
        v.check(is_valid_da_code(&da_code), "da_code", "letters, digits, '-' or '_' only");
        v.require_non_empty("full_name", &req.full_name);
        let phone = v.phone("phone", &req.phone);
        v.rating("rating", req.rating);
        if is_valid_da_code(&da_code) && self.agent_repo.find_by_da_code(&da_code)?.is_some() {
            v.push("da_code", format!("{} is already registered", da_code));
        }
        v.finish()?;
        let phone = phone.ok_or_else(|| ApiError::InternalError("phone passed validation without a value".into()))?;

        let initial_score = self
            .config
            .get_initial_compliance_score()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?
            .clamp(0, MAX_COMPLIANCE_SCORE);

        let now = now_ts();
        let location = req.location.trim().to_string();
        let agent = DeliveryAgent {
            agent_id: uuid::Uuid::new_v4().to_string(),
            da_code: da_code.clone(),
            full_name: req.full_name.trim().to_string(),
            phone,
            zone: self.zone_resolver.resolve(&location),
            location,
            rating: req.rating,
            compliance_score: initial_score,
            status: AgentStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.agent_repo.insert(&agent)?;

        let changed_fields: Vec<String> = REGISTERED_FIELDS.iter().map(|f| f.to_string()).collect();
        let event_id = match self.publish_update(&agent, changed_fields) {
            Ok(event_id) => event_id,
            Err(e) => {
                // nothing was queued: drop the row so the registration can be retried
                warn!(da_code = %agent.da_code, error = %e, "publish failed, registration undone");
                self.agent_repo.delete(&agent.agent_id)?;
                return Err(e);
            }
        };

        let log = ActionLog::new(ActionType::AgentRegistered, actor)
            .with_event(&event_id)
            .with_da_code(&agent.da_code)
            .with_payload(&agent)
            .with_detail(format!("registered in {}", agent.zone));
        self.action_log_repo.insert(&log)?;

        info!(da_code = %agent.da_code, zone = %agent.zone, %event_id, "agent registered");
        Ok(agent)
    }

    /// Apply changes; publishes AgentUpdated only when a field actually changed
    pub fn update_agent(&self, agent_id: &str, changes: AgentChanges, actor: &str) -> ApiResult<AgentUpdateResult> {
        let mut agent = self.get_agent(agent_id)?;
        let previous = agent.clone();

        let mut v = Validator::new();
        if let Some(name) = &changes.full_name {
            v.require_non_empty("full_name", name);
        }
        let phone = match &changes.phone {
            Some(raw) => v.phone("phone", raw),
            None => None,
        };
        if let Some(rating) = changes.rating {
            v.rating("rating", rating);
        }
        v.finish()?;

        let normalized = AgentChanges {
            full_name: changes.full_name.map(|n| n.trim().to_string()),
            phone,
            location: changes.location.map(|l| l.trim().to_string()),
            rating: changes.rating,
            status: changes.status,
        };

        let changed_fields = agent.apply_changes(&normalized, |loc| self.zone_resolver.resolve(loc));
        if changed_fields.is_empty() {
            debug!(da_code = %agent.da_code, "update carried no changes, nothing published");
            return Ok(AgentUpdateResult {
                agent,
                changed_fields,
                event_id: None,
            });
        }

        agent.updated_at = now_ts();
        self.agent_repo.update(&agent)?;

        let event_id = match self.publish_update(&agent, changed_fields.clone()) {
            Ok(event_id) => event_id,
            Err(e) => {
                warn!(da_code = %agent.da_code, error = %e, "publish failed, update undone");
                self.agent_repo.update(&previous)?;
                return Err(e);
            }
        };
        let log = ActionLog::new(ActionType::AgentUpdated, actor)
            .with_event(&event_id)
            .with_da_code(&agent.da_code)
            .with_payload(&normalized)
            .with_detail(changed_fields.join(", "));
        self.action_log_repo.insert(&log)?;

        info!(da_code = %agent.da_code, changed = ?changed_fields, %event_id, "agent updated");
        Ok(AgentUpdateResult {
            agent,
            changed_fields,
            event_id: Some(event_id),
        })
    }

    pub fn get_agent(&self, agent_id: &str) -> ApiResult<DeliveryAgent> {
        self.agent_repo
            .find_by_id(agent_id)?
            .ok_or_else(|| ApiError::NotFound(format!("DeliveryAgent (id={})", agent_id)))
    }

    pub fn get_agent_by_da_code(&self, da_code: &str) -> ApiResult<DeliveryAgent> {
        let code = normalize_da_code(da_code);
        self.agent_repo
            .find_by_da_code(&code)?
            .ok_or_else(|| ApiError::NotFound(format!("DeliveryAgent (da_code={})", code)))
    }

    pub fn list_by_zone(&self, zone: Zone) -> ApiResult<Vec<DeliveryAgent>> {
        Ok(self.agent_repo.list_by_zone(zone)?)
    }

    fn publish_update(&self, agent: &DeliveryAgent, changed_fields: Vec<String>) -> ApiResult<String> {
        let envelope = EventEnvelope::new(
            DomainEvent::AgentUpdated {
                agent_id: agent.agent_id.clone(),
                da_code: agent.da_code.clone(),
                changed_fields,
            },
            EVENT_SOURCE,
        );
        let event_id = envelope.event_id.clone();
        self.publisher.publish(envelope)?;
        Ok(event_id)
    }
}
