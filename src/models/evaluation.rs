use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Question code → score
pub type Scores = BTreeMap<String, f64>;

/// Default period id when the settings document does not name one
pub const DEFAULT_PERIOD_ID: &str = "default";

/// One evaluation submitted by an evaluator for a peer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub evaluator_id: String,
    #[serde(default)]
    pub evaluator_name: String,
    pub evaluated_peer_id: String,
    #[serde(default)]
    pub evaluated_peer_name: String,
    #[serde(default)]
    pub scores: Scores,
    pub submitted_at: Option<BsonDateTime>,
}

/// Precomputed averages for one (evaluator, peer, period).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummarizedEvaluation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub evaluator_id: String,
    #[serde(default)]
    pub evaluator_name: String,
    pub evaluated_peer_id: String,
    #[serde(default)]
    pub evaluated_peer_name: String,
    #[serde(default = "default_period_id")]
    pub evaluation_period_id: String,
    /// Category name → average
    #[serde(default)]
    pub category_averages: BTreeMap<String, f64>,
    #[serde(default)]
    pub overall_average: f64,
    pub timestamp: Option<BsonDateTime>,
}

fn default_period_id() -> String {
    DEFAULT_PERIOD_ID.to_string()
}

/// Whether an upsert touched an existing summary or created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Inserted,
}
