use super::{EvaluationStore, StoreResult};
use crate::{
    models::{
        AppSettings, CategorizedQuestions, Category, Evaluation, Question, SummarizedEvaluation,
        UpsertOutcome, User,
    },
    utils::AppError,
};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    categories: Vec<Category>,
    questions: Vec<Question>,
    evaluations: Vec<Evaluation>,
    summaries: Vec<SummarizedEvaluation>,
    settings: Option<AppSettings>,
}

/// Process-local store with the same query semantics as the MongoDB one.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_count: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user and returns its generated id.
    pub fn add_user(&self, mut user: User) -> String {
        let id = ObjectId::new();
        user.id = Some(id);
        user.code = user.code.to_uppercase();
        self.write().users.push(user);
        id.to_hex()
    }

    pub fn add_category(&self, mut category: Category) -> String {
        let id = ObjectId::new();
        category.doc_id = Some(id);
        self.write().categories.push(category);
        id.to_hex()
    }

    pub fn add_question(&self, mut question: Question) {
        question.doc_id = Some(ObjectId::new());
        self.write().questions.push(question);
    }

    pub fn set_settings(&self, settings: AppSettings) {
        self.write().settings = Some(settings);
    }

    pub fn clear_settings(&self) {
        self.write().settings = None;
    }

    pub fn remove_user(&self, user_id: &str) {
        self.write().users.retain(|user| user.id_hex() != user_id);
    }

    /// Empties the evaluation collections, like the hard reset program does.
    pub fn clear_evaluations(&self) {
        let mut data = self.write();
        data.evaluations.clear();
        data.summaries.clear();
    }

    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.read().evaluations.clone()
    }

    pub fn summaries(&self) -> Vec<SummarizedEvaluation> {
        self.read().summaries.clone()
    }

    /// Number of successful writes of any kind.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Collections> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Collections> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn find_user_by_code(&self, code: &str) -> StoreResult<Option<User>> {
        self.check_read()?;
        let code = code.to_uppercase();
        Ok(self.read().users.iter().find(|user| user.code == code).cloned())
    }

    async fn fetch_categorized_questions(&self) -> StoreResult<CategorizedQuestions> {
        self.check_read()?;
        let data = self.read();
        Ok(CategorizedQuestions::organize(
            data.categories.clone(),
            data.questions.clone(),
        ))
    }

    async fn fetch_peers(&self, current_user_id: &str) -> StoreResult<Vec<User>> {
        self.check_read()?;
        Ok(self
            .read()
            .users
            .iter()
            .filter(|user| user.id_hex() != current_user_id)
            .cloned()
            .collect())
    }

    async fn fetch_user_submissions(&self, evaluator_id: &str) -> StoreResult<Vec<Evaluation>> {
        self.check_read()?;
        Ok(self
            .read()
            .evaluations
            .iter()
            .filter(|evaluation| evaluation.evaluator_id == evaluator_id)
            .cloned()
            .collect())
    }

    async fn submit_evaluation(&self, evaluation: &Evaluation) -> StoreResult<()> {
        self.check_write()?;
        let mut stored = evaluation.clone();
        stored.id = Some(ObjectId::new());
        self.write().evaluations.push(stored);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_summarized_evaluation(
        &self,
        summary: &SummarizedEvaluation,
    ) -> StoreResult<UpsertOutcome> {
        self.check_write()?;
        let mut data = self.write();
        let existing = data.summaries.iter().position(|s| {
            s.evaluator_id == summary.evaluator_id
                && s.evaluated_peer_id == summary.evaluated_peer_id
                && s.evaluation_period_id == summary.evaluation_period_id
        });

        let outcome = match existing {
            Some(index) => {
                let id = data.summaries[index].id;
                data.summaries[index] = summary.clone();
                data.summaries[index].id = id;
                UpsertOutcome::Updated
            }
            None => {
                let mut stored = summary.clone();
                stored.id = Some(ObjectId::new());
                data.summaries.push(stored);
                UpsertOutcome::Inserted
            }
        };
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn fetch_user_summaries(
        &self,
        evaluator_id: &str,
        period_id: &str,
    ) -> StoreResult<Vec<SummarizedEvaluation>> {
        self.check_read()?;
        Ok(self
            .read()
            .summaries
            .iter()
            .filter(|s| s.evaluator_id == evaluator_id && s.evaluation_period_id == period_id)
            .cloned()
            .collect())
    }

    async fn fetch_app_settings(&self) -> StoreResult<Option<AppSettings>> {
        self.check_read()?;
        Ok(self.read().settings.clone())
    }
}
