use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

/// A user document. Users are both evaluators and peers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub name: String,
    /// Login code, stored upper-case
    #[serde(default)]
    pub code: String,
    /// Anything else the admin upload put on the document
    #[serde(flatten)]
    pub extra: Document,
}

impl User {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            code: code.into().to_uppercase(),
            extra: Document::new(),
        }
    }

    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unnamed Peer"
        } else {
            &self.name
        }
    }
}

/// Public view of a user. The login code never leaves the server.
#[derive(Debug, Serialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        UserInfo {
            id: user.id_hex(),
            name: user.name.clone(),
        }
    }
}
