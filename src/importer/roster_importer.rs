// ==========================================
// VitalVida Sync Pipeline - DA roster importer
// ==========================================
// Each row goes through AgentApi: new da_code -> register,
// known da_code -> update. Rows with caller errors (4xx class)
// are collected and skipped; anything 500-class aborts.
// ==========================================

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{AgentApi, ApiError, RegisterAgentRequest};
use crate::domain::agent::AgentChanges;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{parse_roster, RawRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub line: usize,
    pub da_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged + self.rejected.len()
    }
}

enum RowOutcome {
    Created,
    Updated,
    Unchanged,
}

pub struct RosterImporter {
    agent_api: Arc<AgentApi>,
}

impl RosterImporter {
    pub fn new(agent_api: Arc<AgentApi>) -> Self {
        Self { agent_api }
    }

    pub async fn import_csv(&self, path: &Path, actor: &str) -> ImportResult<ImportSummary> {
        let rows = parse_roster(path)?;
        let mut summary = ImportSummary::default();

        for row in &rows {
            match self.import_row(row, actor).await {
                Ok(RowOutcome::Created) => summary.created += 1,
                Ok(RowOutcome::Updated) => summary.updated += 1,
                Ok(RowOutcome::Unchanged) => summary.unchanged += 1,
                Err(err) if err.status_code() < 500 => {
                    warn!(line = row.line, da_code = row.get("da_code"), error = %err, "roster row rejected");
                    summary.rejected.push(RejectedRow {
                        line: row.line,
                        da_code: row.get("da_code").to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(source) => {
                    return Err(ImportError::Aborted {
                        row: row.line,
                        source,
                    })
                }
            }
        }

        info!(
            file = %path.display(),
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            rejected = summary.rejected.len(),
            "roster import finished"
        );
        Ok(summary)
    }

    async fn import_row(&self, row: &RawRow, actor: &str) -> Result<RowOutcome, ApiError> {
        let rating = parse_rating(row.get("rating"))?;

        match self.agent_api.get_agent_by_da_code(row.get("da_code")) {
            Ok(existing) => {
                let changes = AgentChanges {
                    full_name: Some(row.get("full_name").to_string()),
                    phone: Some(row.get("phone").to_string()),
                    location: Some(row.get("location").to_string()),
                    rating: Some(rating),
                    status: None,
                };
                let result = self.agent_api.update_agent(&existing.agent_id, changes, actor)?;
                if result.changed_fields.is_empty() {
                    Ok(RowOutcome::Unchanged)
                } else {
                    Ok(RowOutcome::Updated)
                }
            }
            Err(ApiError::NotFound(_)) => {
                let req = RegisterAgentRequest {
                    da_code: row.get("da_code").to_string(),
                    full_name: row.get("full_name").to_string(),
                    phone: row.get("phone").to_string(),
                    location: row.get("location").to_string(),
                    rating,
                };
                self.agent_api.register_agent(req, actor).await?;
                Ok(RowOutcome::Created)
            }
            Err(err) => Err(err),
        }
    }
}

/// Empty rating means 0 (unrated)
fn parse_rating(raw: &str) -> Result<f64, ApiError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .map_err(|_| ApiError::validation("rating", format!("not a number: {}", raw)))
}
