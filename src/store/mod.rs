// ==================== REMOTE DATA ACCESS ====================
// Query wrappers over the document store. The service only ever talks to the
// store through `EvaluationStore`; MongoDB backs production, the in-memory
// store backs local runs and tests.

pub mod memory_store;
pub mod mongo_store;

use crate::{
    models::{
        AppSettings, CategorizedQuestions, Evaluation, SummarizedEvaluation, UpsertOutcome, User,
    },
    utils::AppError,
};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory_store::MemoryStore;
pub use mongo_store::MongoStore;

pub const USERS_COLLECTION: &str = "users";
pub const QUESTIONS_COLLECTION: &str = "questions";
pub const EVALUATIONS_COLLECTION: &str = "evaluations";
pub const SUMMARIZED_EVALUATIONS_COLLECTION: &str = "summarized_evaluations";
pub const APP_SETTINGS_COLLECTION: &str = "app_settings";

pub type StoreResult<T> = Result<T, AppError>;

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Looks a user up by login code. The code is compared upper-case.
    async fn find_user_by_code(&self, code: &str) -> StoreResult<Option<User>>;

    async fn fetch_categorized_questions(&self) -> StoreResult<CategorizedQuestions>;

    /// Every user except `current_user_id`.
    async fn fetch_peers(&self, current_user_id: &str) -> StoreResult<Vec<User>>;

    async fn fetch_user_submissions(&self, evaluator_id: &str) -> StoreResult<Vec<Evaluation>>;

    async fn submit_evaluation(&self, evaluation: &Evaluation) -> StoreResult<()>;

    /// Query-then-update-or-insert keyed by (evaluator, peer, period).
    async fn save_summarized_evaluation(
        &self,
        summary: &SummarizedEvaluation,
    ) -> StoreResult<UpsertOutcome>;

    async fn fetch_user_summaries(
        &self,
        evaluator_id: &str,
        period_id: &str,
    ) -> StoreResult<Vec<SummarizedEvaluation>>;

    /// The first settings document, if any.
    async fn fetch_app_settings(&self) -> StoreResult<Option<AppSettings>>;
}

pub type SharedStore = Arc<dyn EvaluationStore>;
