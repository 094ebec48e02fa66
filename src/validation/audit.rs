use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AlertCategory, AlertSeverity};

use super::types::ClinicalAlert;

/// One accepted override, ready for the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub alert_id: Uuid,
    pub rule: String,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub drug_ids: Vec<String>,
    pub message: String,
    pub justification: Option<String>,
    pub actor: String,
    pub overridden_at: DateTime<Utc>,
    /// Fingerprint of the knowledge base the alert was produced against.
    pub knowledge_fingerprint: String,
}

impl AuditEntry {
    pub fn record(
        alert: &ClinicalAlert,
        actor: &str,
        overridden_at: DateTime<Utc>,
        knowledge_fingerprint: &str,
    ) -> Self {
        Self {
            alert_id: alert.id,
            rule: alert.rule.clone(),
            category: alert.category,
            severity: alert.severity,
            drug_ids: alert.drug_ids.clone(),
            message: alert.message.clone(),
            justification: alert.override_state.justification().map(str::to_string),
            actor: actor.to_string(),
            overridden_at,
            knowledge_fingerprint: knowledge_fingerprint.to_string(),
        }
    }
}
