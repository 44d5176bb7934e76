use crate::{
    debug_log,
    models::{AppSettings, CategorizedQuestions, Evaluation, SummarizedEvaluation, User},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// A message waiting to be shown on the next render.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Everything one logged-in session knows. Mutated only through the setters
/// below so every transition shows up in the debug log.
#[derive(Debug, Clone)]
pub struct SessionState {
    current_user: Option<User>,
    categorized_questions: CategorizedQuestions,
    peers_to_evaluate: Vec<User>,
    evaluated_peer_ids: BTreeSet<String>,
    user_submissions: Vec<Evaluation>,
    user_summaries: Vec<SummarizedEvaluation>,
    is_evaluation_open: bool,
    is_debug_mode: bool,
    evaluation_period_id: String,
    all_evaluations_done: bool,
    session_just_reset_by_admin: bool,
    app_just_transitioned_to_open: bool,
    last_known_reset_marker: Option<i64>,
    just_processed_global_reset: bool,
    pending_peer: Option<User>,
    notice: Option<Notice>,
    last_activity: DateTime<Utc>,
}

impl SessionState {
    /// A fresh session seeded from the settings visible at login. A reset
    /// marker that already exists is taken as processed.
    pub fn new(settings: &AppSettings) -> Self {
        Self {
            current_user: None,
            categorized_questions: CategorizedQuestions::default(),
            peers_to_evaluate: Vec::new(),
            evaluated_peer_ids: BTreeSet::new(),
            user_submissions: Vec::new(),
            user_summaries: Vec::new(),
            is_evaluation_open: settings.is_open,
            is_debug_mode: settings.is_debug,
            evaluation_period_id: settings.period_id().to_string(),
            all_evaluations_done: false,
            session_just_reset_by_admin: false,
            app_just_transitioned_to_open: false,
            last_known_reset_marker: settings.reset_all_peers,
            just_processed_global_reset: false,
            pending_peer: None,
            notice: None,
            last_activity: Utc::now(),
        }
    }

    // ---- getters ----

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.current_user.as_ref().map(User::id_hex).filter(|id| !id.is_empty())
    }

    pub fn categorized_questions(&self) -> &CategorizedQuestions {
        &self.categorized_questions
    }

    pub fn peers_to_evaluate(&self) -> &[User] {
        &self.peers_to_evaluate
    }

    pub fn find_peer(&self, peer_id: &str) -> Option<&User> {
        self.peers_to_evaluate.iter().find(|peer| peer.id_hex() == peer_id)
    }

    pub fn evaluated_peer_ids(&self) -> &BTreeSet<String> {
        &self.evaluated_peer_ids
    }

    pub fn has_evaluated(&self, peer_id: &str) -> bool {
        self.evaluated_peer_ids.contains(peer_id)
    }

    pub fn user_submissions(&self) -> &[Evaluation] {
        &self.user_submissions
    }

    pub fn user_summaries(&self) -> &[SummarizedEvaluation] {
        &self.user_summaries
    }

    pub fn is_evaluation_open(&self) -> bool {
        self.is_evaluation_open
    }

    pub fn is_debug_mode(&self) -> bool {
        self.is_debug_mode
    }

    pub fn evaluation_period_id(&self) -> &str {
        &self.evaluation_period_id
    }

    pub fn all_evaluations_done(&self) -> bool {
        self.all_evaluations_done
    }

    pub fn session_just_reset_by_admin(&self) -> bool {
        self.session_just_reset_by_admin
    }

    pub fn app_just_transitioned_to_open(&self) -> bool {
        self.app_just_transitioned_to_open
    }

    pub fn last_known_reset_marker(&self) -> Option<i64> {
        self.last_known_reset_marker
    }

    pub fn just_processed_global_reset(&self) -> bool {
        self.just_processed_global_reset
    }

    pub fn pending_peer(&self) -> Option<&User> {
        self.pending_peer.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// True when every settings field the session reacts to already matches.
    pub fn is_in_sync_with(&self, settings: &AppSettings) -> bool {
        let marker_seen = match settings.reset_all_peers {
            Some(marker) => self.last_known_reset_marker == Some(marker),
            None => true,
        };
        marker_seen
            && self.is_evaluation_open == settings.is_open
            && self.is_debug_mode == settings.is_debug
            && self.evaluation_period_id == settings.period_id()
    }

    fn user_label(&self) -> String {
        self.current_user
            .as_ref()
            .map(|user| user.name.clone())
            .unwrap_or_else(|| "UnknownUser".to_string())
    }

    // ---- setters ----

    pub fn set_current_user(&mut self, user: Option<User>) {
        debug_log!(
            "State Change: current_user set to: {}",
            user.as_ref().map(|u| u.name.as_str()).unwrap_or("None")
        );
        self.current_user = user;
    }

    pub fn set_categorized_questions(&mut self, questions: CategorizedQuestions) {
        debug_log!(
            "State Change: categorized_questions updated. Categories: {}",
            questions.categories.len()
        );
        self.categorized_questions = questions;
    }

    pub fn set_peers_to_evaluate(&mut self, peers: Vec<User>) {
        debug_log!("State Change: peers_to_evaluate updated. Count: {}", peers.len());
        self.peers_to_evaluate = peers;
    }

    pub fn set_evaluated_peer_ids(&mut self, ids: BTreeSet<String>) {
        debug_log!("State Change: evaluated_peer_ids updated. Size: {}", ids.len());
        self.evaluated_peer_ids = ids;
    }

    pub fn add_evaluated_peer_id(&mut self, peer_id: impl Into<String>) {
        self.evaluated_peer_ids.insert(peer_id.into());
        debug_log!(
            "State Change: evaluated_peer_ids grew. Size: {}",
            self.evaluated_peer_ids.len()
        );
    }

    pub fn set_user_submissions(&mut self, submissions: Vec<Evaluation>) {
        debug_log!("State Change: user_submissions replaced. Count: {}", submissions.len());
        self.user_submissions = submissions;
    }

    /// Drops any earlier local submission for the same peer, then appends.
    pub fn replace_user_submission(&mut self, submission: Evaluation) {
        self.user_submissions
            .retain(|existing| existing.evaluated_peer_id != submission.evaluated_peer_id);
        self.user_submissions.push(submission);
        debug_log!(
            "State Change: user_submission replaced. Count: {}",
            self.user_submissions.len()
        );
    }

    pub fn set_user_summaries(&mut self, summaries: Vec<SummarizedEvaluation>) {
        debug_log!("State Change: user_summaries updated. Count: {}", summaries.len());
        self.user_summaries = summaries;
    }

    pub fn set_is_evaluation_open(&mut self, is_open: bool) {
        debug_log!("State Change: is_evaluation_open set to: {}", is_open);
        self.is_evaluation_open = is_open;
    }

    pub fn set_is_debug_mode(&mut self, is_debug: bool) {
        debug_log!("State Change: is_debug_mode set to: {}", is_debug);
        self.is_debug_mode = is_debug;
    }

    pub fn set_evaluation_period_id(&mut self, period_id: impl Into<String>) {
        let period_id = period_id.into();
        debug_log!("State Change: evaluation_period_id set to: {}", period_id);
        self.evaluation_period_id = period_id;
    }

    pub fn set_all_evaluations_done(&mut self, done: bool) {
        debug_log!(
            "State Change for User '{}': all_evaluations_done set to: {}",
            self.user_label(),
            done
        );
        self.all_evaluations_done = done;
    }

    pub fn set_session_just_reset_by_admin(&mut self, reset: bool) {
        debug_log!("State Change: session_just_reset_by_admin set to: {}", reset);
        self.session_just_reset_by_admin = reset;
    }

    pub fn set_app_just_transitioned_to_open(&mut self, transitioned: bool) {
        debug_log!("State Change: app_just_transitioned_to_open set to: {}", transitioned);
        self.app_just_transitioned_to_open = transitioned;
    }

    pub fn set_last_known_reset_marker(&mut self, marker: Option<i64>) {
        debug_log!("State Change: last_known_reset_marker set to: {:?}", marker);
        self.last_known_reset_marker = marker;
    }

    pub fn set_just_processed_global_reset(&mut self, processed: bool) {
        debug_log!("State Change: just_processed_global_reset set to: {}", processed);
        self.just_processed_global_reset = processed;
    }

    pub fn set_pending_peer(&mut self, peer: Option<User>) {
        debug_log!(
            "State Change: pending_peer set to: {}",
            peer.as_ref().map(|p| p.name.as_str()).unwrap_or("None")
        );
        self.pending_peer = peer;
    }

    pub fn set_notice(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind,
            text: text.into(),
        });
    }

    /// Returns the pending notice and clears it.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Clears the local evaluation progress (evaluated ids, submissions,
    /// summaries, completion) but keeps the user and loaded questions.
    pub fn clear_evaluation_progress(&mut self) {
        self.set_all_evaluations_done(false);
        self.set_evaluated_peer_ids(BTreeSet::new());
        self.set_user_submissions(Vec::new());
        self.set_user_summaries(Vec::new());
    }

    /// Clears everything user-specific. App-wide flags are left alone.
    pub fn reset_user_evaluation_state(&mut self) {
        debug_log!("State Change: reset_user_evaluation_state called.");
        self.set_current_user(None);
        self.set_categorized_questions(CategorizedQuestions::default());
        self.set_peers_to_evaluate(Vec::new());
        self.clear_evaluation_progress();
        self.set_pending_peer(None);
    }
}
