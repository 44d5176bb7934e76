// ==================== EVALUATION RULES ====================
// Login, setup pass, form gate, submission, completion detection.
// Every function works on one locked `SessionState` and the store.

use crate::{
    config::JwtConfig,
    debug_log,
    models::{AppSettings, Evaluation, Scores, SummarizedEvaluation, User, UserInfo},
    services::{
        auth_service,
        scoring::{calculate_peer_averages, PeerAverages},
    },
    session::{NoticeKind, SessionRegistry, SessionState, SharedSession},
    store::EvaluationStore,
    utils::AppError,
};
use mongodb::bson::DateTime as BsonDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const LIKERT_MIN: i64 = 1;
pub const LIKERT_MAX: i64 = 5;

pub const SUBMIT_SUCCESS_MESSAGE: &str = "Evaluation submitted! Your insights are valuable.";
pub const INCOMPLETE_FORM_MESSAGE: &str = "Please answer all questions before submitting.";
pub const LOAD_FAILURE_MESSAGE: &str =
    "Failed to load essential evaluation data. Please refresh the page.";

// ==================== REQUEST/RESPONSE MODELS ====================

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitEvaluationRequest {
    /// Peer being evaluated. Defaults to the peer whose form is open.
    pub peer_id: Option<String>,
    /// Question code → answer. `null` means unanswered.
    #[serde(default)]
    pub scores: BTreeMap<String, Option<i64>>,
}

/// What completion detection did on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompletionChange {
    BecameComplete,
    BecameIncomplete,
    StillComplete,
    StillIncomplete,
    ClosedReset,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SubmitOutcome {
    pub evaluated_peer_id: String,
    pub averages: PeerAverages,
    pub summary_saved: bool,
    pub completion: CompletionChange,
}

pub struct LoginOutcome {
    pub session_id: String,
    pub token: String,
    pub user: UserInfo,
    pub session: SharedSession,
}

// ==================== LOGIN ====================

/// Looks the code up, opens a session and runs the first setup pass.
///
/// A failed setup pass does not fail the login; its message is left on the
/// session for the first render.
pub async fn handle_login(
    store: &dyn EvaluationStore,
    registry: &SessionRegistry,
    jwt: &JwtConfig,
    settings: &AppSettings,
    raw_code: &str,
) -> Result<LoginOutcome, AppError> {
    let code = auth_service::normalize_login_code(raw_code)?;
    debug_log!("evaluation_service.handle_login: starting login with code {}", code);

    let user = store
        .find_user_by_code(&code)
        .await
        .map_err(|e| {
            log::error!("❌ Login lookup failed: {}", e);
            AppError::DatabaseError(format!("Login failed: {}", e.user_message()))
        })?
        .ok_or_else(|| AppError::Unauthorized("Invalid code or user not found.".to_string()))?;

    let mut state = SessionState::new(settings);
    state.set_all_evaluations_done(false);
    state.set_current_user(Some(user.clone()));

    if let Err(e) = setup_evaluation(&mut state, store).await {
        state.set_notice(NoticeKind::Error, e.user_message());
    }

    let session_id = registry.insert(state).await;
    let token = auth_service::generate_jwt(jwt, &user, &session_id)?;
    let session = registry
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound("Session vanished during login".to_string()))?;

    log::info!("✅ Login successful: {}", user.name);
    Ok(LoginOutcome {
        session_id,
        token,
        user: UserInfo::from(&user),
        session,
    })
}

// ==================== SETUP PASS ====================

/// Consumes at most one one-shot flag and reports whether old submissions
/// should be fetched.
fn consume_fetch_decision(state: &mut SessionState) -> bool {
    if state.just_processed_global_reset() {
        debug_log!("setup_evaluation: global reset just processed, not fetching old submissions");
        state.set_just_processed_global_reset(false);
        false
    } else if state.session_just_reset_by_admin() {
        debug_log!("setup_evaluation: session reset by admin, not fetching old submissions");
        state.set_session_just_reset_by_admin(false);
        false
    } else if state.is_evaluation_open() && state.app_just_transitioned_to_open() {
        debug_log!("setup_evaluation: consuming app_just_transitioned_to_open");
        state.set_app_just_transitioned_to_open(false);
        true
    } else {
        true
    }
}

/// Fetches questions, peers and (unless a reset says otherwise) the user's
/// earlier submissions, then runs completion detection.
pub async fn setup_evaluation(
    state: &mut SessionState,
    store: &dyn EvaluationStore,
) -> Result<CompletionChange, AppError> {
    let user_id = match state.current_user_id() {
        Some(id) => id,
        None => {
            log::error!("setup_evaluation: cannot set up without a user profile");
            state.set_all_evaluations_done(false);
            return Err(AppError::Unauthorized(
                "User profile not loaded. Please try logging in again.".to_string(),
            ));
        }
    };

    let should_fetch_submissions = consume_fetch_decision(state);
    debug_log!(
        "setup_evaluation: should_fetch_submissions = {}",
        should_fetch_submissions
    );

    let fetched = async {
        let questions = store.fetch_categorized_questions().await?;
        let peers = store.fetch_peers(&user_id).await?;
        let submissions = if should_fetch_submissions {
            Some(store.fetch_user_submissions(&user_id).await?)
        } else {
            None
        };
        Ok::<_, AppError>((questions, peers, submissions))
    }
    .await;

    match fetched {
        Ok((questions, peers, submissions)) => {
            state.set_categorized_questions(questions);
            state.set_peers_to_evaluate(peers);
            let submissions = submissions.unwrap_or_default();
            let evaluated: BTreeSet<String> = submissions
                .iter()
                .map(|submission| submission.evaluated_peer_id.clone())
                .collect();
            state.set_user_submissions(submissions);
            state.set_evaluated_peer_ids(evaluated);
        }
        Err(e) => {
            log::error!("❌ Error during data fetching in setup_evaluation: {}", e);
            state.set_all_evaluations_done(false);
            state.set_categorized_questions(Default::default());
            state.set_peers_to_evaluate(Vec::new());
            state.set_user_submissions(Vec::new());
            state.set_evaluated_peer_ids(BTreeSet::new());
            state.set_pending_peer(None);
            return Err(AppError::DatabaseError(LOAD_FAILURE_MESSAGE.to_string()));
        }
    }

    // The open form may point at a peer that is gone or already done.
    if let Some(pending_id) = state.pending_peer().map(User::id_hex) {
        if state.find_peer(&pending_id).is_none() || state.has_evaluated(&pending_id) {
            state.set_pending_peer(None);
        }
    }

    Ok(check_completion(state, store).await)
}

// ==================== COMPLETION ====================

/// Complete once every available peer has been evaluated at least once.
pub fn is_complete(evaluated_count: usize, peer_count: usize) -> bool {
    peer_count > 0 && evaluated_count >= peer_count
}

async fn refresh_summaries(state: &mut SessionState, store: &dyn EvaluationStore) {
    let user_id = match state.current_user_id() {
        Some(id) => id,
        None => {
            state.set_user_summaries(Vec::new());
            return;
        }
    };
    let period_id = state.evaluation_period_id().to_string();

    match store.fetch_user_summaries(&user_id, &period_id).await {
        Ok(summaries) => {
            debug_log!("check_completion: fetched {} summaries", summaries.len());
            state.set_user_summaries(summaries);
        }
        Err(e) => {
            log::error!("❌ Error fetching summarized evaluations: {}", e);
            state.set_user_summaries(Vec::new());
        }
    }
}

/// Recomputes the completion flag and keeps the summaries in step with it.
pub async fn check_completion(
    state: &mut SessionState,
    store: &dyn EvaluationStore,
) -> CompletionChange {
    let peer_count = state.peers_to_evaluate().len();
    let evaluated_count = state.evaluated_peer_ids().len();
    let was_complete = state.all_evaluations_done();
    debug_log!(
        "check_completion: peers {} evaluated {} open {}",
        peer_count,
        evaluated_count,
        state.is_evaluation_open()
    );

    if !state.is_evaluation_open() {
        if was_complete {
            state.set_all_evaluations_done(false);
            return CompletionChange::ClosedReset;
        }
        return CompletionChange::StillIncomplete;
    }

    let now_complete = is_complete(evaluated_count, peer_count);
    match (was_complete, now_complete) {
        (false, true) => {
            log::info!("🏁 All evaluations complete for current user");
            state.set_all_evaluations_done(true);
            refresh_summaries(state, store).await;
            CompletionChange::BecameComplete
        }
        (true, false) => {
            state.set_all_evaluations_done(false);
            state.set_user_summaries(Vec::new());
            CompletionChange::BecameIncomplete
        }
        (true, true) => {
            refresh_summaries(state, store).await;
            CompletionChange::StillComplete
        }
        (false, false) => CompletionChange::StillIncomplete,
    }
}

// ==================== FORM ====================

/// Opens the evaluation form for `peer_id`.
pub fn load_evaluation_form(state: &mut SessionState, peer_id: &str) -> Result<User, AppError> {
    let peer = state
        .find_peer(peer_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Peer {} is not available", peer_id)))?;
    debug_log!("load_evaluation_form for peer: {}", peer.name);

    if state.has_evaluated(peer_id) {
        debug_log!("load_evaluation_form: peer already evaluated, not loading form");
        return Err(AppError::Conflict(format!(
            "{} has already been evaluated.",
            peer.display_name()
        )));
    }

    if !state.is_evaluation_open() {
        return Err(AppError::EvaluationClosed(
            "Evaluations are currently closed.".to_string(),
        ));
    }

    if state.categorized_questions().is_empty() {
        log::error!("load_evaluation_form: questions not loaded");
        return Err(AppError::InvalidRequest(
            "Evaluation questions are missing. Please refresh.".to_string(),
        ));
    }

    state.set_pending_peer(Some(peer.clone()));
    Ok(peer)
}

/// Checks that every question in the form has an answer on the 1-5 scale.
pub fn validate_scores(
    state: &SessionState,
    raw: &BTreeMap<String, Option<i64>>,
) -> Result<Scores, AppError> {
    let mut scores = Scores::new();
    for question in state.categorized_questions().questions() {
        match raw.get(&question.code).copied().flatten() {
            Some(value) if (LIKERT_MIN..=LIKERT_MAX).contains(&value) => {
                scores.insert(question.code.clone(), value as f64);
            }
            Some(value) => {
                return Err(AppError::InvalidRequest(format!(
                    "Score for {} must be between {} and {}, got {}.",
                    question.code, LIKERT_MIN, LIKERT_MAX, value
                )));
            }
            None => return Err(AppError::InvalidRequest(INCOMPLETE_FORM_MESSAGE.to_string())),
        }
    }
    Ok(scores)
}

fn integrity_error(field: &str) -> AppError {
    log::error!("UNDEFINED FIELD DETECTED in summary: {}", field);
    AppError::DataIntegrity(format!(
        "Critical error: Data integrity issue (invalid field: {}). Please contact support.",
        field
    ))
}

/// Refuses summaries with missing keys, blank names or non-finite averages.
pub fn validate_summary(summary: &SummarizedEvaluation) -> Result<(), AppError> {
    if summary.evaluator_id.is_empty() {
        return Err(integrity_error("evaluatorId"));
    }
    if summary.evaluator_name.trim().is_empty() {
        return Err(integrity_error("evaluatorName"));
    }
    if summary.evaluated_peer_id.is_empty() {
        return Err(integrity_error("evaluatedPeerId"));
    }
    if summary.evaluated_peer_name.trim().is_empty() {
        return Err(integrity_error("evaluatedPeerName"));
    }
    if summary.evaluation_period_id.is_empty() {
        return Err(integrity_error("evaluationPeriodId"));
    }
    if !summary.overall_average.is_finite() {
        return Err(integrity_error("overallAverage"));
    }
    if let Some((name, _)) = summary
        .category_averages
        .iter()
        .find(|(_, average)| !average.is_finite())
    {
        return Err(integrity_error(&format!("categoryAverages.{}", name)));
    }
    Ok(())
}

// ==================== SUBMISSION ====================

pub async fn submit_evaluation(
    state: &mut SessionState,
    store: &dyn EvaluationStore,
    request: &SubmitEvaluationRequest,
) -> Result<SubmitOutcome, AppError> {
    let evaluator = state.current_user().cloned();
    let peer_id = request
        .peer_id
        .clone()
        .or_else(|| state.pending_peer().map(User::id_hex))
        .filter(|id| !id.is_empty());

    let (evaluator, peer_id) = match (evaluator, peer_id) {
        (Some(evaluator), Some(peer_id)) if evaluator.id.is_some() => (evaluator, peer_id),
        _ => {
            return Err(AppError::InvalidRequest(
                "Error: User or peer information is missing.".to_string(),
            ))
        }
    };

    if !state.is_evaluation_open() {
        return Err(AppError::EvaluationClosed(
            "Evaluations are currently closed.".to_string(),
        ));
    }

    if state.categorized_questions().is_empty() {
        log::error!("submit_evaluation: questions not loaded");
        return Err(AppError::InvalidRequest(
            "Cannot submit: Questions missing. Please refresh.".to_string(),
        ));
    }

    let peer_name = state
        .find_peer(&peer_id)
        .map(|peer| peer.name.clone())
        .ok_or_else(|| AppError::NotFound(format!("Peer {} is not available", peer_id)))?;

    let scores = validate_scores(state, &request.scores)?;
    let evaluator_id = evaluator.id_hex();

    let evaluation = Evaluation {
        id: None,
        evaluator_id: evaluator_id.clone(),
        evaluator_name: evaluator.name.clone(),
        evaluated_peer_id: peer_id.clone(),
        evaluated_peer_name: peer_name.clone(),
        scores: scores.clone(),
        submitted_at: Some(BsonDateTime::now()),
    };

    store.submit_evaluation(&evaluation).await.map_err(|e| {
        log::error!("❌ Error submitting evaluation: {}", e);
        AppError::DatabaseError(format!("Failed to submit evaluation: {}", e.user_message()))
    })?;

    state.add_evaluated_peer_id(peer_id.clone());
    state.replace_user_submission(evaluation);

    let averages = calculate_peer_averages(&peer_id, &scores, state.categorized_questions());
    let summary = SummarizedEvaluation {
        id: None,
        evaluator_id,
        evaluator_name: evaluator.name.clone(),
        evaluated_peer_id: peer_id.clone(),
        evaluated_peer_name: peer_name,
        evaluation_period_id: state.evaluation_period_id().to_string(),
        category_averages: averages.by_category_name(),
        overall_average: averages.overall_average,
        timestamp: Some(BsonDateTime::now()),
    };
    debug_log!("submit_evaluation: summary prepared: {:?}", summary);

    if let Err(e) = validate_summary(&summary) {
        state.set_notice(NoticeKind::Error, e.user_message());
        return Err(e);
    }

    let summary_saved = match store.save_summarized_evaluation(&summary).await {
        Ok(outcome) => {
            debug_log!("submit_evaluation: summary saved ({:?})", outcome);
            true
        }
        Err(e) => {
            log::warn!("⚠️  Summary save was unsuccessful: {}", e);
            false
        }
    };

    state.set_pending_peer(None);
    let completion = check_completion(state, store).await;
    state.set_notice(NoticeKind::Success, SUBMIT_SUCCESS_MESSAGE);

    Ok(SubmitOutcome {
        evaluated_peer_id: peer_id,
        averages,
        summary_saved,
        completion,
    })
}

// ==================== EXTRAS ====================

/// Lets a user who finished go back to the peer list while the period is open.
/// Local submissions are kept.
pub fn request_re_evaluation(state: &mut SessionState) -> Result<(), AppError> {
    if !state.is_evaluation_open() {
        log::warn!("Re-evaluation requested while evaluations are closed");
        return Err(AppError::EvaluationClosed(
            "Evaluations are currently closed.".to_string(),
        ));
    }
    state.set_all_evaluations_done(false);
    Ok(())
}

/// Averages of this session's own submission for `peer_id`.
pub fn peer_averages_from_state(state: &SessionState, peer_id: &str) -> Option<PeerAverages> {
    let submission = state
        .user_submissions()
        .iter()
        .find(|submission| submission.evaluated_peer_id == peer_id)?;
    Some(calculate_peer_averages(
        peer_id,
        &submission.scores,
        state.categorized_questions(),
    ))
}

/// Random 1-5 answers for the open form. Debug mode only.
pub fn random_scores<R: Rng>(
    state: &SessionState,
    rng: &mut R,
) -> Result<BTreeMap<String, i64>, AppError> {
    if !state.is_debug_mode() {
        log::warn!("random_scores called when not in debug mode");
        return Err(AppError::Forbidden("Debug mode is not enabled.".to_string()));
    }
    if state.pending_peer().is_none() {
        return Err(AppError::InvalidRequest("No evaluation form is open.".to_string()));
    }

    Ok(state
        .categorized_questions()
        .questions()
        .map(|question| {
            (
                question.code.clone(),
                rng.gen_range(LIKERT_MIN..=LIKERT_MAX),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Question};
    use crate::store::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    struct Fixture {
        store: MemoryStore,
        alice: String,
        peers: Vec<String>,
    }

    /// Alice plus `peer_count` peers, one category with `question_count` questions.
    fn fixture(peer_count: usize, question_count: usize) -> Fixture {
        let store = MemoryStore::new();
        store.set_settings(AppSettings::fallback());
        store.add_category(Category::new("A", "Mechanics"));
        for i in 1..=question_count {
            store.add_question(Question::new(format!("A{}", i), "A", format!("Question {}", i)));
        }
        let alice = store.add_user(User::new("Alice", "ALICE2025"));
        let peers = (0..peer_count)
            .map(|i| store.add_user(User::new(format!("Peer {}", i), format!("PEER{}", i))))
            .collect();
        Fixture { store, alice, peers }
    }

    async fn logged_in(fx: &Fixture) -> SessionState {
        let mut state = SessionState::new(&AppSettings::fallback());
        let user = fx.store.find_user_by_code("ALICE2025").await.unwrap();
        state.set_current_user(user);
        setup_evaluation(&mut state, &fx.store).await.unwrap();
        state
    }

    fn full_answers(question_count: usize, value: i64) -> BTreeMap<String, Option<i64>> {
        (1..=question_count)
            .map(|i| (format!("A{}", i), Some(value)))
            .collect()
    }

    #[test]
    fn test_is_complete() {
        assert!(!is_complete(0, 3));
        assert!(is_complete(3, 3));
        assert!(!is_complete(3, 4));
        assert!(!is_complete(0, 0));
    }

    #[tokio::test]
    async fn test_completion_follows_peer_list() {
        let fx = fixture(3, 1);
        let mut state = logged_in(&fx).await;
        assert!(!state.all_evaluations_done());

        for peer in &fx.peers {
            state.add_evaluated_peer_id(peer.clone());
        }
        assert_eq!(
            check_completion(&mut state, &fx.store).await,
            CompletionChange::BecameComplete
        );
        assert!(state.all_evaluations_done());

        let mut grown = state.peers_to_evaluate().to_vec();
        grown.push(User::new("Newcomer", "NEW"));
        state.set_peers_to_evaluate(grown);
        assert_eq!(
            check_completion(&mut state, &fx.store).await,
            CompletionChange::BecameIncomplete
        );
        assert!(!state.all_evaluations_done());
        assert!(state.user_summaries().is_empty());
    }

    #[tokio::test]
    async fn test_closed_period_clears_completion() {
        let fx = fixture(1, 1);
        let mut state = logged_in(&fx).await;
        state.add_evaluated_peer_id(fx.peers[0].clone());
        check_completion(&mut state, &fx.store).await;
        assert!(state.all_evaluations_done());

        state.set_is_evaluation_open(false);
        assert_eq!(
            check_completion(&mut state, &fx.store).await,
            CompletionChange::ClosedReset
        );
        assert!(!state.all_evaluations_done());
    }

    #[tokio::test]
    async fn test_login_rejects_empty_and_unknown_codes() {
        let fx = fixture(1, 1);
        let registry = SessionRegistry::new();
        let jwt = JwtConfig::default();
        let settings = AppSettings::fallback();

        let empty = handle_login(&fx.store, &registry, &jwt, &settings, "  ").await;
        assert!(matches!(empty, Err(AppError::InvalidRequest(_))));

        let unknown = handle_login(&fx.store, &registry, &jwt, &settings, "nobody").await;
        assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_opens_session_and_loads_data() {
        let fx = fixture(2, 3);
        let registry = SessionRegistry::new();
        let jwt = JwtConfig::default();

        let outcome =
            handle_login(&fx.store, &registry, &jwt, &AppSettings::fallback(), " alice2025 ")
                .await
                .unwrap();

        assert_eq!(outcome.user.id, fx.alice);
        let claims = auth_service::verify_token(&jwt, &outcome.token).unwrap();
        assert_eq!(claims.sid, outcome.session_id);

        let state = outcome.session.lock().await;
        assert_eq!(state.peers_to_evaluate().len(), 2);
        assert_eq!(state.categorized_questions().total_questions(), 3);
        assert!(state.notice().is_none());
    }

    #[tokio::test]
    async fn test_setup_failure_clears_loaded_data() {
        let fx = fixture(1, 1);
        let mut state = logged_in(&fx).await;
        assert_eq!(state.peers_to_evaluate().len(), 1);

        fx.store.set_fail_reads(true);
        let err = setup_evaluation(&mut state, &fx.store).await.unwrap_err();

        assert_eq!(err.user_message(), LOAD_FAILURE_MESSAGE);
        assert!(state.peers_to_evaluate().is_empty());
        assert!(state.categorized_questions().is_empty());
        assert!(!state.all_evaluations_done());
    }

    #[tokio::test]
    async fn test_setup_without_user_is_rejected() {
        let fx = fixture(1, 1);
        let mut state = SessionState::new(&AppSettings::fallback());
        let err = setup_evaluation(&mut state, &fx.store).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_setup_derives_evaluated_ids_from_submissions() {
        let fx = fixture(2, 2);
        let mut state = logged_in(&fx).await;
        load_evaluation_form(&mut state, &fx.peers[0]).unwrap();
        submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: None,
                scores: full_answers(2, 4),
            },
        )
        .await
        .unwrap();

        let fresh = logged_in(&fx).await;
        assert!(fresh.has_evaluated(&fx.peers[0]));
        assert!(!fresh.has_evaluated(&fx.peers[1]));
        assert_eq!(fresh.user_submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_form_gate() {
        let fx = fixture(2, 1);
        let mut state = logged_in(&fx).await;

        assert!(matches!(
            load_evaluation_form(&mut state, "missing"),
            Err(AppError::NotFound(_))
        ));

        state.add_evaluated_peer_id(fx.peers[0].clone());
        assert!(matches!(
            load_evaluation_form(&mut state, &fx.peers[0]),
            Err(AppError::Conflict(_))
        ));
        assert!(state.pending_peer().is_none());

        let peer = load_evaluation_form(&mut state, &fx.peers[1]).unwrap();
        assert_eq!(peer.id_hex(), fx.peers[1]);
        assert_eq!(state.pending_peer().unwrap().id_hex(), fx.peers[1]);

        state.set_is_evaluation_open(false);
        state.set_pending_peer(None);
        assert!(matches!(
            load_evaluation_form(&mut state, &fx.peers[1]),
            Err(AppError::EvaluationClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_form_gate_without_questions() {
        let fx = fixture(1, 1);
        let store = &fx.store;
        let mut state = logged_in(&fx).await;
        state.set_categorized_questions(Default::default());
        let err = load_evaluation_form(&mut state, &fx.peers[0]).unwrap_err();
        assert_eq!(err.user_message(), "Evaluation questions are missing. Please refresh.");
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_form_is_rejected_without_write() {
        let fx = fixture(1, 5);
        let mut state = logged_in(&fx).await;
        load_evaluation_form(&mut state, &fx.peers[0]).unwrap();

        let mut answers = full_answers(5, 3);
        answers.insert("A4".to_string(), None);

        let err = submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: None,
                scores: answers,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.user_message(), INCOMPLETE_FORM_MESSAGE);
        assert_eq!(fx.store.write_count(), 0);
        assert!(!state.has_evaluated(&fx.peers[0]));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected() {
        let fx = fixture(1, 2);
        let mut state = logged_in(&fx).await;
        let mut answers = full_answers(2, 3);
        answers.insert("A2".to_string(), Some(9));

        let err = submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: Some(fx.peers[0].clone()),
                scores: answers,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_without_peer() {
        let fx = fixture(1, 1);
        let mut state = logged_in(&fx).await;
        let err = submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: None,
                scores: full_answers(1, 3),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.user_message(), "Error: User or peer information is missing.");
    }

    #[tokio::test]
    async fn test_submission_stores_evaluation_and_summary() {
        let fx = fixture(2, 2);
        let mut state = logged_in(&fx).await;
        load_evaluation_form(&mut state, &fx.peers[0]).unwrap();

        let mut answers = full_answers(2, 5);
        answers.insert("A2".to_string(), Some(3));
        let outcome = submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: None,
                scores: answers,
            },
        )
        .await
        .unwrap();

        assert!(outcome.summary_saved);
        assert_eq!(outcome.averages.overall_average, 4.0);
        assert_eq!(outcome.completion, CompletionChange::StillIncomplete);
        assert!(state.has_evaluated(&fx.peers[0]));
        assert!(state.pending_peer().is_none());
        assert_eq!(state.notice().unwrap().text, SUBMIT_SUCCESS_MESSAGE);

        let stored = fx.store.evaluations();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].evaluator_id, fx.alice);
        assert_eq!(stored[0].scores["A1"], 5.0);

        let summaries = fx.store.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].category_averages["Mechanics"], 4.0);
        assert_eq!(summaries[0].evaluation_period_id, "default");
    }

    #[tokio::test]
    async fn test_last_submission_completes_and_loads_summaries() {
        let fx = fixture(2, 1);
        let mut state = logged_in(&fx).await;

        for (i, peer) in fx.peers.iter().enumerate() {
            let outcome = submit_evaluation(
                &mut state,
                &fx.store,
                &SubmitEvaluationRequest {
                    peer_id: Some(peer.clone()),
                    scores: full_answers(1, 2 + i as i64),
                },
            )
            .await
            .unwrap();
            if i == 0 {
                assert_eq!(outcome.completion, CompletionChange::StillIncomplete);
            } else {
                assert_eq!(outcome.completion, CompletionChange::BecameComplete);
            }
        }

        assert!(state.all_evaluations_done());
        assert_eq!(state.user_summaries().len(), 2);
    }

    #[tokio::test]
    async fn test_resubmission_replaces_local_submission() {
        let fx = fixture(2, 1);
        let mut state = logged_in(&fx).await;

        for value in [2, 5] {
            submit_evaluation(
                &mut state,
                &fx.store,
                &SubmitEvaluationRequest {
                    peer_id: Some(fx.peers[0].clone()),
                    scores: full_answers(1, value),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(state.user_submissions().len(), 1);
        assert_eq!(state.user_submissions()[0].scores["A1"], 5.0);
        // The store keeps both writes; only the summary is upserted.
        assert_eq!(fx.store.evaluations().len(), 2);
        assert_eq!(fx.store.summaries().len(), 1);
        assert_eq!(fx.store.summaries()[0].overall_average, 5.0);
    }

    #[tokio::test]
    async fn test_failed_write_aborts_submission() {
        let fx = fixture(1, 1);
        let mut state = logged_in(&fx).await;
        fx.store.set_fail_writes(true);

        let err = submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: Some(fx.peers[0].clone()),
                scores: full_answers(1, 4),
            },
        )
        .await
        .unwrap_err();

        assert!(err.user_message().starts_with("Failed to submit evaluation:"));
        assert!(!state.has_evaluated(&fx.peers[0]));
        assert!(state.user_submissions().is_empty());
    }

    #[tokio::test]
    async fn test_submission_rejected_when_closed() {
        let fx = fixture(1, 1);
        let mut state = logged_in(&fx).await;
        state.set_is_evaluation_open(false);

        let err = submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: Some(fx.peers[0].clone()),
                scores: full_answers(1, 4),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::EvaluationClosed(_)));
        assert_eq!(fx.store.write_count(), 0);
    }

    #[test]
    fn test_validate_summary_rejects_non_finite() {
        let mut summary = SummarizedEvaluation {
            id: None,
            evaluator_id: "a".to_string(),
            evaluator_name: "A".to_string(),
            evaluated_peer_id: "b".to_string(),
            evaluated_peer_name: "B".to_string(),
            evaluation_period_id: "default".to_string(),
            category_averages: BTreeMap::from([("Mechanics".to_string(), 4.0)]),
            overall_average: 4.0,
            timestamp: None,
        };
        assert!(validate_summary(&summary).is_ok());

        summary.category_averages.insert("Broken".to_string(), f64::NAN);
        assert!(matches!(validate_summary(&summary), Err(AppError::DataIntegrity(_))));

        summary.category_averages.remove("Broken");
        summary.evaluated_peer_id.clear();
        assert!(validate_summary(&summary).is_err());
    }

    #[test]
    fn test_validate_summary_rejects_blank_names() {
        let mut summary = SummarizedEvaluation {
            id: None,
            evaluator_id: "a".to_string(),
            evaluator_name: "A".to_string(),
            evaluated_peer_id: "b".to_string(),
            evaluated_peer_name: "  ".to_string(),
            evaluation_period_id: "default".to_string(),
            category_averages: BTreeMap::new(),
            overall_average: 3.0,
            timestamp: None,
        };
        let err = validate_summary(&summary).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Critical error: Data integrity issue (invalid field: evaluatedPeerName). Please contact support."
        );

        summary.evaluated_peer_name = "B".to_string();
        summary.evaluator_name.clear();
        assert!(matches!(validate_summary(&summary), Err(AppError::DataIntegrity(_))));
    }

    #[tokio::test]
    async fn test_re_evaluation_and_peer_stats() {
        let fx = fixture(1, 2);
        let mut state = logged_in(&fx).await;
        submit_evaluation(
            &mut state,
            &fx.store,
            &SubmitEvaluationRequest {
                peer_id: Some(fx.peers[0].clone()),
                scores: full_answers(2, 4),
            },
        )
        .await
        .unwrap();
        assert!(state.all_evaluations_done());

        let stats = peer_averages_from_state(&state, &fx.peers[0]).unwrap();
        assert_eq!(stats.overall_average, 4.0);
        assert!(peer_averages_from_state(&state, "unknown").is_none());

        request_re_evaluation(&mut state).unwrap();
        assert!(!state.all_evaluations_done());
        assert_eq!(state.user_submissions().len(), 1);

        state.set_is_evaluation_open(false);
        assert!(request_re_evaluation(&mut state).is_err());
    }

    #[tokio::test]
    async fn test_random_scores_requires_debug_and_open_form() {
        let fx = fixture(1, 3);
        let mut state = logged_in(&fx).await;
        let mut rng = StdRng::seed_from_u64(7);

        assert!(matches!(random_scores(&state, &mut rng), Err(AppError::Forbidden(_))));

        state.set_is_debug_mode(true);
        assert!(random_scores(&state, &mut rng).is_err());

        load_evaluation_form(&mut state, &fx.peers[0]).unwrap();
        let scores = random_scores(&state, &mut rng).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores.values().all(|v| (LIKERT_MIN..=LIKERT_MAX).contains(v)));
    }
}
