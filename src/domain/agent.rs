// ==========================================
// VitalVida Sync Pipeline - delivery agent (VitalVida side)
// ==========================================

use crate::domain::types::AgentStatus;
use crate::domain::zone::Zone;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Upper bound of the compliance score; the floor is 0
pub const MAX_COMPLIANCE_SCORE: i32 = 100;

// ==========================================
// DeliveryAgent
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAgent {
    pub agent_id: String,
    /// External id shared with the Role system (e.g. "DA-0042")
    pub da_code: String,
    pub full_name: String,
    /// Normalised to +234XXXXXXXXXX
    pub phone: String,
    /// Free text as typed by operations ("Shop 4, Ikeja GRA")
    pub location: String,
    pub zone: Zone,
    /// 0.0 - 5.0
    pub rating: f64,
    /// 0 - 100
    pub compliance_score: i32,
    pub status: AgentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Editable DA fields; `None` means "leave unchanged"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentChanges {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub rating: Option<f64>,
    pub status: Option<AgentStatus>,
}

impl AgentChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.location.is_none()
            && self.rating.is_none()
            && self.status.is_none()
    }
}

impl DeliveryAgent {
    /// Apply the changes in place and return the names of fields that
    /// actually changed (zone is reported when a location edit moves it).
    pub fn apply_changes(&mut self, changes: &AgentChanges, zone_of: impl Fn(&str) -> Zone) -> Vec<String> {
        let mut changed = Vec::new();

        if let Some(name) = &changes.full_name {
            if *name != self.full_name {
                self.full_name = name.clone();
                changed.push("full_name".to_string());
            }
        }
        if let Some(phone) = &changes.phone {
            if *phone != self.phone {
                self.phone = phone.clone();
                changed.push("phone".to_string());
            }
        }
        if let Some(location) = &changes.location {
            if *location != self.location {
                self.location = location.clone();
                changed.push("location".to_string());
                let zone = zone_of(location);
                if zone != self.zone {
                    self.zone = zone;
                    changed.push("zone".to_string());
                }
            }
        }
        if let Some(rating) = changes.rating {
            if (rating - self.rating).abs() > f64::EPSILON {
                self.rating = rating;
                changed.push("rating".to_string());
            }
        }
        if let Some(status) = changes.status {
            if status != self.status {
                self.status = status;
                changed.push("status".to_string());
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeliveryAgent {
        let now = chrono::Utc::now().naive_utc();
        DeliveryAgent {
            agent_id: "a1".to_string(),
            da_code: "DA-0001".to_string(),
            full_name: "Chinedu Okafor".to_string(),
            phone: "+2348031234567".to_string(),
            location: "Yaba".to_string(),
            zone: Zone::LagosMainland,
            rating: 4.2,
            compliance_score: 100,
            status: AgentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_apply_changes_reports_only_real_changes() {
        let mut agent = sample();
        let changes = AgentChanges {
            full_name: Some("Chinedu Okafor".to_string()),
            rating: Some(4.5),
            ..Default::default()
        };
        let changed = agent.apply_changes(&changes, |_| Zone::LagosMainland);
        assert_eq!(changed, vec!["rating".to_string()]);
        assert_eq!(agent.rating, 4.5);
    }

    #[test]
    fn test_location_change_moves_zone() {
        let mut agent = sample();
        let changes = AgentChanges {
            location: Some("Lekki Phase 1".to_string()),
            ..Default::default()
        };
        let changed = agent.apply_changes(&changes, |_| Zone::LagosIsland);
        assert_eq!(changed, vec!["location".to_string(), "zone".to_string()]);
        assert_eq!(agent.zone, Zone::LagosIsland);
    }

    #[test]
    fn test_empty_changes() {
        assert!(AgentChanges::default().is_empty());
    }
}
