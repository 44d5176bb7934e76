//! Shared pieces of the admin programs in `src/bin`.

use crate::{
    database::MongoDB,
    models::{AppSettings, User},
    store::{APP_SETTINGS_COLLECTION, USERS_COLLECTION},
};
use anyhow::Context;
use futures::stream::StreamExt;
use mongodb::bson::{doc, Bson, Document};
use std::io::{self, BufRead, Write};

/// Documents deleted per page.
pub const DELETE_PAGE_SIZE: i64 = 500;
pub const FINAL_CONFIRMATION_PHRASE: &str = "YES I AM SURE";

/// Loads `.env`, installs the logger and connects to `DATABASE_URL`.
pub async fn connect() -> anyhow::Result<MongoDB> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    MongoDB::new(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to MongoDB: {}", e))
}

// ==================== PROMPTS ====================

/// Yes/no question, default no.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{} (y/N) ", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Asks until the exact phrase is typed. Returns false on end of input.
pub fn confirm_phrase<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    phrase: &str,
) -> io::Result<bool> {
    loop {
        write!(output, "{} ", question)?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        if line.trim_end_matches(['\r', '\n']) == phrase {
            return Ok(true);
        }
        writeln!(output, "Please type \"{}\" to confirm, or Ctrl+C to abort.", phrase)?;
    }
}

/// Which collections a hard reset will clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetPlan {
    pub delete_evaluations: bool,
    pub delete_summaries: bool,
    pub bump_reset_marker: bool,
}

impl ResetPlan {
    pub fn deletes_anything(&self) -> bool {
        self.delete_evaluations || self.delete_summaries
    }
}

/// Runs the hard reset dialogue. The final phrase is only asked when at least
/// one collection was picked; without it nothing is deleted.
pub fn ask_reset_plan<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<ResetPlan> {
    let mut plan = ResetPlan {
        delete_evaluations: confirm(
            input,
            output,
            "Are you ABSOLUTELY sure you want to delete ALL documents from the 'evaluations' collection?",
        )?,
        delete_summaries: confirm(
            input,
            output,
            "Are you ABSOLUTELY sure you want to delete ALL documents from the 'summarized_evaluations' collection?",
        )?,
        bump_reset_marker: false,
    };

    if !plan.deletes_anything() {
        return Ok(plan);
    }

    let confirmed = confirm_phrase(
        input,
        output,
        &format!(
            "This is your final chance. Type '{}' to proceed with the deletion(s) confirmed above:",
            FINAL_CONFIRMATION_PHRASE
        ),
        FINAL_CONFIRMATION_PHRASE,
    )?;
    if !confirmed {
        return Ok(ResetPlan::default());
    }

    plan.bump_reset_marker = confirm(
        input,
        output,
        "Signal live sessions to start fresh by updating the reset marker?",
    )?;
    Ok(plan)
}

// ==================== DATABASE OPERATIONS ====================

/// Deletes every document of `collection_name`, 500 at a time in `_id` order.
pub async fn delete_collection(db: &MongoDB, collection_name: &str) -> anyhow::Result<u64> {
    log::info!("🗑️  Starting deletion for collection: {}", collection_name);
    let collection = db.collection::<Document>(collection_name);
    let mut last_id: Option<Bson> = None;
    let mut total: u64 = 0;

    loop {
        let filter = match &last_id {
            Some(id) => doc! { "_id": { "$gt": id.clone() } },
            None => doc! {},
        };
        let mut cursor = collection
            .find(filter)
            .sort(doc! { "_id": 1 })
            .limit(DELETE_PAGE_SIZE)
            .projection(doc! { "_id": 1 })
            .await?;

        let mut ids: Vec<Bson> = Vec::new();
        while let Some(document) = cursor.next().await {
            if let Some(id) = document?.get("_id") {
                ids.push(id.clone());
            }
        }
        if ids.is_empty() {
            break;
        }

        let page_size = ids.len();
        last_id = ids.last().cloned();
        let deleted = collection
            .delete_many(doc! { "_id": { "$in": ids } })
            .await?
            .deleted_count;
        total += deleted;
        log::info!(
            "   Deleted {} documents from {}. Total deleted: {}",
            deleted,
            collection_name,
            total
        );

        if (page_size as i64) < DELETE_PAGE_SIZE {
            break;
        }
    }

    if total == 0 {
        log::info!("No documents found in {} to delete.", collection_name);
    } else {
        log::info!("✅ Finished deleting {} documents from {}.", total, collection_name);
    }
    Ok(total)
}

/// Writes a new reset marker (now, in milliseconds) to the settings document,
/// creating it if needed.
pub async fn bump_reset_marker(db: &MongoDB) -> anyhow::Result<i64> {
    let marker = chrono::Utc::now().timestamp_millis();
    db.collection::<Document>(APP_SETTINGS_COLLECTION)
        .update_one(doc! {}, doc! { "$set": { "resetAllPeers": marker } })
        .upsert(true)
        .await?;
    log::info!("🔄 Reset marker set to {}", marker);
    Ok(marker)
}

// ==================== USER CHECK ====================

#[derive(Debug, Clone, PartialEq)]
pub struct UserCheckReport {
    pub users: Vec<User>,
    /// The user found for the checked code, with the peers they would see
    pub checked: Option<(User, Vec<User>)>,
}

/// Applies the same peer rule as login: everyone except the user.
pub fn build_user_report(users: Vec<User>, code: &str) -> UserCheckReport {
    let code = code.trim().to_uppercase();
    let checked = users.iter().find(|user| user.code == code).cloned().map(|me| {
        let peers = users
            .iter()
            .filter(|user| user.id != me.id)
            .cloned()
            .collect();
        (me, peers)
    });
    UserCheckReport { users, checked }
}

pub async fn load_users(db: &MongoDB) -> anyhow::Result<Vec<User>> {
    let mut cursor = db.collection::<User>(USERS_COLLECTION).find(doc! {}).await?;
    let mut users = Vec::new();
    while let Some(user) = cursor.next().await {
        match user {
            Ok(user) => users.push(user),
            Err(e) => log::warn!("⚠️  Skipping unreadable user document: {}", e),
        }
    }
    Ok(users)
}

pub async fn load_settings_documents(db: &MongoDB) -> anyhow::Result<Vec<AppSettings>> {
    let mut cursor = db
        .collection::<AppSettings>(APP_SETTINGS_COLLECTION)
        .find(doc! {})
        .await?;
    let mut settings = Vec::new();
    while let Some(document) = cursor.next().await {
        settings.push(document?);
    }
    Ok(settings)
}

/// Field names on a user document besides name and code.
pub fn other_fields(user: &User) -> Vec<String> {
    user.extra
        .keys()
        .filter(|key| key.as_str() != "_id")
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use std::io::Cursor;

    fn run_dialogue(answers: &str) -> (ResetPlan, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let plan = ask_reset_plan(&mut input, &mut output).unwrap();
        (plan, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_declining_both_skips_final_phrase() {
        let (plan, output) = run_dialogue("n\n\n");
        assert_eq!(plan, ResetPlan::default());
        assert!(!output.contains("final chance"));
    }

    #[test]
    fn test_phrase_must_match_exactly() {
        let (plan, output) = run_dialogue("y\nn\nyes\nYES I AM SURE\ny\n");
        assert!(plan.delete_evaluations);
        assert!(!plan.delete_summaries);
        assert!(plan.bump_reset_marker);
        assert!(output.contains("Please type \"YES I AM SURE\""));
    }

    #[test]
    fn test_end_of_input_cancels() {
        let (plan, _) = run_dialogue("y\ny\n");
        assert!(!plan.deletes_anything());
    }

    #[test]
    fn test_user_report_excludes_checked_user() {
        let mut users = vec![User::new("Alice", "ALICE2025"), User::new("Bob", "BOB")];
        for user in users.iter_mut() {
            user.id = Some(ObjectId::new());
        }
        let report = build_user_report(users, "alice2025");
        let (me, peers) = report.checked.unwrap();
        assert_eq!(me.name, "Alice");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].name, "Bob");

        let missing = build_user_report(report.users, "nobody");
        assert!(missing.checked.is_none());
    }
}
