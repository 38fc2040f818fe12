// ==========================================
// VitalVida Sync Pipeline - notifications and alerts
// ==========================================
// An "alert" is a notification to Operations with severity
// Warning or Critical; agents get Info/Warning texts.
// ==========================================

use crate::domain::types::Severity;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Recipient used for the operations desk
pub const OPS_RECIPIENT: &str = "ops";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientKind {
    Agent,
    Operations,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::Agent => "AGENT",
            RecipientKind::Operations => "OPERATIONS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AGENT" => Some(RecipientKind::Agent),
            "OPERATIONS" => Some(RecipientKind::Operations),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Sms,
    WhatsApp,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "SMS",
            Channel::WhatsApp => "WHATSAPP",
            Channel::InApp => "IN_APP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SMS" => Some(Channel::Sms),
            "WHATSAPP" => Some(Channel::WhatsApp),
            "IN_APP" => Some(Channel::InApp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Queued => "QUEUED",
            NotificationStatus::Sent => "SENT",
            NotificationStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(NotificationStatus::Queued),
            "SENT" => Some(NotificationStatus::Sent),
            "FAILED" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub recipient_kind: RecipientKind,
    /// da_code for agents, `OPS_RECIPIENT` for operations
    pub recipient: String,
    pub channel: Channel,
    /// Template key, e.g. "compliance.suspended"
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub status: NotificationStatus,
    pub related_event_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

impl Notification {
    fn new(
        recipient_kind: RecipientKind,
        recipient: &str,
        channel: Channel,
        category: &str,
        severity: Severity,
        message: String,
    ) -> Self {
        Self {
            notification_id: uuid::Uuid::new_v4().to_string(),
            recipient_kind,
            recipient: recipient.to_string(),
            channel,
            category: category.to_string(),
            severity,
            message,
            status: NotificationStatus::Queued,
            related_event_id: None,
            created_at: crate::db::now_ts(),
            sent_at: None,
            error_message: None,
        }
    }

    /// SMS to a delivery agent
    pub fn to_agent(da_code: &str, category: &str, severity: Severity, message: String) -> Self {
        Self::new(RecipientKind::Agent, da_code, Channel::Sms, category, severity, message)
    }

    /// In-app alert for the operations desk
    pub fn ops_alert(category: &str, severity: Severity, message: String) -> Self {
        Self::new(
            RecipientKind::Operations,
            OPS_RECIPIENT,
            Channel::InApp,
            category,
            severity,
            message,
        )
    }

    pub fn with_event(mut self, event_id: &str) -> Self {
        self.related_event_id = Some(event_id.to_string());
        self
    }

    pub fn is_alert(&self) -> bool {
        self.recipient_kind == RecipientKind::Operations && self.severity >= Severity::Warning
    }
}
