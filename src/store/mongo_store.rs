use super::{
    EvaluationStore, StoreResult, APP_SETTINGS_COLLECTION, EVALUATIONS_COLLECTION,
    QUESTIONS_COLLECTION, SUMMARIZED_EVALUATIONS_COLLECTION, USERS_COLLECTION,
};
use crate::{
    database::MongoDB,
    debug_log,
    models::{
        AppSettings, CategorizedQuestions, Category, Evaluation, Question, SummarizedEvaluation,
        UpsertOutcome, User, CATEGORY_TYPE, QUESTION_TYPE,
    },
    utils::AppError,
};
use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{doc, to_document};
use serde::de::DeserializeOwned;

/// `EvaluationStore` over the MongoDB collections.
#[derive(Clone)]
pub struct MongoStore {
    db: MongoDB,
}

impl MongoStore {
    pub fn new(db: MongoDB) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &MongoDB {
        &self.db
    }
}

/// Drains a cursor, skipping documents that fail to decode.
async fn collect_cursor<T>(mut cursor: mongodb::Cursor<T>, what: &str) -> Vec<T>
where
    T: DeserializeOwned + Send + Sync + Unpin,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("⚠️  Skipping unreadable {} document: {}", what, e),
        }
    }
    items
}

#[async_trait]
impl EvaluationStore for MongoStore {
    async fn find_user_by_code(&self, code: &str) -> StoreResult<Option<User>> {
        let upper = code.to_uppercase();
        debug_log!("mongo_store.find_user_by_code: querying for code {}", upper);

        let user = self
            .db
            .collection::<User>(USERS_COLLECTION)
            .find_one(doc! { "code": &upper })
            .await?;

        debug_log!("mongo_store.find_user_by_code: found = {}", user.is_some());
        Ok(user)
    }

    async fn fetch_categorized_questions(&self) -> StoreResult<CategorizedQuestions> {
        let categories_cursor = self
            .db
            .collection::<Category>(QUESTIONS_COLLECTION)
            .find(doc! { "type": CATEGORY_TYPE })
            .sort(doc! { "code": 1 })
            .await?;
        let categories = collect_cursor(categories_cursor, "category").await;

        let questions_cursor = self
            .db
            .collection::<Question>(QUESTIONS_COLLECTION)
            .find(doc! { "type": QUESTION_TYPE })
            .sort(doc! { "categoryCode": 1, "id": 1 })
            .await?;
        let questions = collect_cursor(questions_cursor, "question").await;

        debug_log!(
            "mongo_store.fetch_categorized_questions: {} categories, {} questions",
            categories.len(),
            questions.len()
        );
        Ok(CategorizedQuestions::organize(categories, questions))
    }

    async fn fetch_peers(&self, current_user_id: &str) -> StoreResult<Vec<User>> {
        let cursor = self
            .db
            .collection::<User>(USERS_COLLECTION)
            .find(doc! {})
            .await?;
        let peers: Vec<User> = collect_cursor(cursor, "user")
            .await
            .into_iter()
            .filter(|user| user.id_hex() != current_user_id)
            .collect();

        debug_log!("mongo_store.fetch_peers: {} peers for {}", peers.len(), current_user_id);
        Ok(peers)
    }

    async fn fetch_user_submissions(&self, evaluator_id: &str) -> StoreResult<Vec<Evaluation>> {
        let cursor = self
            .db
            .collection::<Evaluation>(EVALUATIONS_COLLECTION)
            .find(doc! { "evaluatorId": evaluator_id })
            .await?;
        let submissions = collect_cursor(cursor, "evaluation").await;

        debug_log!(
            "mongo_store.fetch_user_submissions: {} submissions for {}",
            submissions.len(),
            evaluator_id
        );
        Ok(submissions)
    }

    async fn submit_evaluation(&self, evaluation: &Evaluation) -> StoreResult<()> {
        self.db
            .collection::<Evaluation>(EVALUATIONS_COLLECTION)
            .insert_one(evaluation)
            .await?;
        debug_log!(
            "mongo_store.submit_evaluation: {} -> {} stored",
            evaluation.evaluator_id,
            evaluation.evaluated_peer_id
        );
        Ok(())
    }

    async fn save_summarized_evaluation(
        &self,
        summary: &SummarizedEvaluation,
    ) -> StoreResult<UpsertOutcome> {
        let collection =
            self.db.collection::<SummarizedEvaluation>(SUMMARIZED_EVALUATIONS_COLLECTION);

        // Assumes at most one document per key; the first match wins.
        let filter = doc! {
            "evaluatorId": &summary.evaluator_id,
            "evaluatedPeerId": &summary.evaluated_peer_id,
            "evaluationPeriodId": &summary.evaluation_period_id,
        };

        match collection.find_one(filter).await? {
            Some(existing) => {
                let id = existing.id.ok_or_else(|| {
                    AppError::DataIntegrity("Stored summary has no _id".to_string())
                })?;
                let fields = to_document(summary)
                    .map_err(|e| AppError::DataIntegrity(format!("Failed to encode summary: {}", e)))?;
                collection
                    .update_one(doc! { "_id": id }, doc! { "$set": fields })
                    .await?;
                debug_log!("mongo_store.save_summarized_evaluation: updated {}", id.to_hex());
                Ok(UpsertOutcome::Updated)
            }
            None => {
                collection.insert_one(summary).await?;
                debug_log!("mongo_store.save_summarized_evaluation: inserted new summary");
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn fetch_user_summaries(
        &self,
        evaluator_id: &str,
        period_id: &str,
    ) -> StoreResult<Vec<SummarizedEvaluation>> {
        let cursor = self
            .db
            .collection::<SummarizedEvaluation>(SUMMARIZED_EVALUATIONS_COLLECTION)
            .find(doc! { "evaluatorId": evaluator_id, "evaluationPeriodId": period_id })
            .await?;
        Ok(collect_cursor(cursor, "summarized evaluation").await)
    }

    async fn fetch_app_settings(&self) -> StoreResult<Option<AppSettings>> {
        Ok(self
            .db
            .collection::<AppSettings>(APP_SETTINGS_COLLECTION)
            .find_one(doc! {})
            .await?)
    }
}
