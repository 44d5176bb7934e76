use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::evaluation::DEFAULT_PERIOD_ID;

/// The singleton `app_settings` document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_debug: bool,
    /// Reset marker in milliseconds. A new value tells live sessions to start fresh.
    #[serde(default)]
    pub reset_all_peers: Option<i64>,
    #[serde(default)]
    pub evaluation_period_id: Option<String>,
}

impl AppSettings {
    /// Used when the settings document is missing or unreadable.
    pub fn fallback() -> Self {
        Self {
            id: None,
            is_open: true,
            is_debug: false,
            reset_all_peers: None,
            evaluation_period_id: None,
        }
    }

    pub fn period_id(&self) -> &str {
        self.evaluation_period_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_PERIOD_ID)
    }

    /// Two snapshots are the same settings if every field a session reacts to matches.
    pub fn same_signal(&self, other: &AppSettings) -> bool {
        self.is_open == other.is_open
            && self.is_debug == other.is_debug
            && self.reset_all_peers == other.reset_all_peers
            && self.period_id() == other.period_id()
    }
}
