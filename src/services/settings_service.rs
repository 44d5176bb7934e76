// ==================== SETTINGS CHANGES ====================
// Applies a new app settings snapshot to one session.

use crate::{
    debug_log,
    models::AppSettings,
    services::evaluation_service::{self, CompletionChange},
    session::{NoticeKind, SessionState},
    store::EvaluationStore,
};

pub const GLOBAL_RESET_MESSAGE: &str = "Administrator has reset all evaluation data. Your previous evaluations for this session have been cleared.";

/// What a settings snapshot did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    pub reset_processed: bool,
    pub reopened: bool,
    pub closed: bool,
    pub period_changed: bool,
    /// Data must be reloaded before the next render.
    pub needs_setup: bool,
}

/// Updates flags and local progress for a new settings snapshot. Does not
/// touch the store; `handle_settings_change` runs the follow-up setup pass.
pub fn apply_settings_change(state: &mut SessionState, settings: &AppSettings) -> SettingsChange {
    let was_open = state.is_evaluation_open();
    let has_user = state.current_user().is_some();
    let mut change = SettingsChange::default();

    debug_log!(
        "settings_service: new open {} debug {} reset {:?}",
        settings.is_open,
        settings.is_debug,
        settings.reset_all_peers
    );

    if state.is_debug_mode() != settings.is_debug {
        log::info!(
            "🐞 Debug mode has been {}",
            if settings.is_debug { "ENABLED" } else { "DISABLED" }
        );
    }
    state.set_is_evaluation_open(settings.is_open);
    state.set_is_debug_mode(settings.is_debug);

    if state.evaluation_period_id() != settings.period_id() {
        state.set_evaluation_period_id(settings.period_id());
        change.period_changed = true;
        change.needs_setup = has_user;
    }

    if let Some(marker) = settings.reset_all_peers {
        if state.last_known_reset_marker() != Some(marker) {
            log::info!("🔄 Global evaluation reset signal ({}) detected", marker);
            state.clear_evaluation_progress();
            state.set_last_known_reset_marker(Some(marker));
            state.set_just_processed_global_reset(true);
            state.set_pending_peer(None);
            state.set_notice(NoticeKind::Error, GLOBAL_RESET_MESSAGE);
            change.reset_processed = true;
            change.needs_setup = has_user;
            // A reset outranks any open/close transition in the same snapshot.
            return change;
        }
    }

    match (was_open, settings.is_open) {
        (false, true) => {
            debug_log!("settings_service: reopening detected");
            state.set_app_just_transitioned_to_open(true);
            change.reopened = true;
            if has_user {
                state.clear_evaluation_progress();
                state.set_session_just_reset_by_admin(true);
                change.needs_setup = true;
            }
        }
        (true, false) => {
            debug_log!("settings_service: closing detected");
            state.set_pending_peer(None);
            change.closed = true;
            change.needs_setup = has_user;
        }
        _ => {}
    }

    change
}

/// Applies `settings` and reloads the session's data when needed. A failed
/// reload is reported on the session notice.
pub async fn handle_settings_change(
    state: &mut SessionState,
    store: &dyn EvaluationStore,
    settings: &AppSettings,
) -> SettingsChange {
    let change = apply_settings_change(state, settings);

    if change.needs_setup {
        match evaluation_service::setup_evaluation(state, store).await {
            Ok(CompletionChange::BecameComplete) => {
                debug_log!("settings_service: session complete after reload");
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("❌ Reload after settings change failed: {}", e);
                state.set_notice(NoticeKind::Error, e.user_message());
            }
        }
    }

    change
}

/// Brings a session up to `latest` if it missed a settings change, e.g. one
/// published while the session was still being created.
pub async fn reconcile_session(
    state: &mut SessionState,
    store: &dyn EvaluationStore,
    latest: &AppSettings,
) -> Option<SettingsChange> {
    if state.is_in_sync_with(latest) {
        return None;
    }
    log::info!("🔁 Session missed a settings change, applying it now");
    Some(handle_settings_change(state, store, latest).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Question, User};
    use crate::services::evaluation_service::{submit_evaluation, SubmitEvaluationRequest};
    use crate::store::MemoryStore;
    use std::collections::BTreeMap;

    fn seeded_store() -> (MemoryStore, Vec<String>) {
        let store = MemoryStore::new();
        store.add_category(Category::new("A", "Mechanics"));
        store.add_question(Question::new("A1", "A", "Aim"));
        store.add_user(User::new("Alice", "ALICE2025"));
        let peers = vec![
            store.add_user(User::new("Bob", "BOB")),
            store.add_user(User::new("Carol", "CAROL")),
        ];
        (store, peers)
    }

    async fn session(store: &MemoryStore, settings: &AppSettings) -> SessionState {
        let mut state = SessionState::new(settings);
        state.set_current_user(store.find_user_by_code("ALICE2025").await.unwrap());
        evaluation_service::setup_evaluation(&mut state, store).await.unwrap();
        state
    }

    async fn submit(state: &mut SessionState, store: &MemoryStore, peer: &str) {
        submit_evaluation(
            state,
            store,
            &SubmitEvaluationRequest {
                peer_id: Some(peer.to_string()),
                scores: BTreeMap::from([("A1".to_string(), Some(4))]),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_new_reset_marker_starts_fresh() {
        let (store, peers) = seeded_store();
        let settings = AppSettings::fallback();
        let mut state = session(&store, &settings).await;
        submit(&mut state, &store, &peers[0]).await;
        submit(&mut state, &store, &peers[1]).await;
        assert!(state.all_evaluations_done());

        // The store still has the old evaluations; the reset must ignore them.
        let mut reset = settings.clone();
        reset.reset_all_peers = Some(1_700_000_000_000);
        let change = handle_settings_change(&mut state, &store, &reset).await;

        assert!(change.reset_processed);
        assert!(!state.all_evaluations_done());
        assert!(state.evaluated_peer_ids().is_empty());
        assert!(state.user_submissions().is_empty());
        assert_eq!(state.peers_to_evaluate().len(), 2);
        assert_eq!(state.last_known_reset_marker(), Some(1_700_000_000_000));
        assert!(!state.just_processed_global_reset());
        assert_eq!(state.notice().unwrap().text, GLOBAL_RESET_MESSAGE);

        // The same marker again is not a new reset.
        let again = handle_settings_change(&mut state, &store, &reset).await;
        assert!(!again.reset_processed);
    }

    #[tokio::test]
    async fn test_marker_present_at_login_is_not_a_reset() {
        let (store, _) = seeded_store();
        let mut settings = AppSettings::fallback();
        settings.reset_all_peers = Some(99);
        let mut state = session(&store, &settings).await;

        let change = apply_settings_change(&mut state, &settings);
        assert_eq!(change, SettingsChange::default());
    }

    #[tokio::test]
    async fn test_reopen_skips_old_submissions_once() {
        let (store, peers) = seeded_store();
        let open = AppSettings::fallback();
        let mut state = session(&store, &open).await;
        submit(&mut state, &store, &peers[0]).await;

        let mut closed = open.clone();
        closed.is_open = false;
        let change = handle_settings_change(&mut state, &store, &closed).await;
        assert!(change.closed);
        assert!(!state.is_evaluation_open());

        let change = handle_settings_change(&mut state, &store, &open).await;
        assert!(change.reopened);
        assert!(state.evaluated_peer_ids().is_empty());
        assert!(!state.session_just_reset_by_admin());
        // Only one one-shot flag is consumed per setup pass.
        assert!(state.app_just_transitioned_to_open());

        // A later ordinary setup pass fetches submissions again.
        evaluation_service::setup_evaluation(&mut state, &store).await.unwrap();
        assert!(state.has_evaluated(&peers[0]));
    }

    #[tokio::test]
    async fn test_closing_clears_pending_form_and_completion() {
        let (store, peers) = seeded_store();
        let open = AppSettings::fallback();
        let mut state = session(&store, &open).await;
        submit(&mut state, &store, &peers[0]).await;
        submit(&mut state, &store, &peers[1]).await;
        assert!(state.all_evaluations_done());
        state.set_pending_peer(state.peers_to_evaluate().first().cloned());

        let mut closed = open.clone();
        closed.is_open = false;
        handle_settings_change(&mut state, &store, &closed).await;

        assert!(state.pending_peer().is_none());
        assert!(!state.all_evaluations_done());
        assert_eq!(state.user_summaries().len(), 2);
    }

    #[tokio::test]
    async fn test_debug_and_period_follow_settings() {
        let (store, _) = seeded_store();
        let mut settings = AppSettings::fallback();
        let mut state = session(&store, &settings).await;

        settings.is_debug = true;
        settings.evaluation_period_id = Some("2025-Q2".to_string());
        let change = apply_settings_change(&mut state, &settings);

        assert!(state.is_debug_mode());
        assert_eq!(state.evaluation_period_id(), "2025-Q2");
        assert!(change.period_changed);
        assert!(change.needs_setup);
    }

    #[tokio::test]
    async fn test_reset_drops_summaries_before_close() {
        let (store, peers) = seeded_store();
        let open = AppSettings::fallback();
        let mut state = session(&store, &open).await;
        submit(&mut state, &store, &peers[0]).await;
        submit(&mut state, &store, &peers[1]).await;
        assert_eq!(state.user_summaries().len(), 2);

        store.clear_evaluations();
        let mut reset = open.clone();
        reset.reset_all_peers = Some(3);
        handle_settings_change(&mut state, &store, &reset).await;
        assert!(state.user_summaries().is_empty());

        let mut closed = reset.clone();
        closed.is_open = false;
        handle_settings_change(&mut state, &store, &closed).await;
        assert!(state.user_summaries().is_empty());
        assert!(crate::views::DashboardView::build(&state, None).summary.is_none());
    }

    #[tokio::test]
    async fn test_reopen_drops_summaries() {
        let (store, peers) = seeded_store();
        let open = AppSettings::fallback();
        let mut state = session(&store, &open).await;
        submit(&mut state, &store, &peers[0]).await;
        submit(&mut state, &store, &peers[1]).await;

        let mut closed = open.clone();
        closed.is_open = false;
        handle_settings_change(&mut state, &store, &closed).await;
        assert_eq!(state.user_summaries().len(), 2);

        handle_settings_change(&mut state, &store, &open).await;
        assert!(state.user_summaries().is_empty());
        assert!(!state.all_evaluations_done());
    }

    #[tokio::test]
    async fn test_reconcile_catches_missed_close() {
        let (store, peers) = seeded_store();
        let open = AppSettings::fallback();
        let mut state = session(&store, &open).await;

        assert_eq!(reconcile_session(&mut state, &store, &open).await, None);

        let mut closed = open.clone();
        closed.is_open = false;
        let change = reconcile_session(&mut state, &store, &closed).await.unwrap();
        assert!(change.closed);
        assert!(!state.is_evaluation_open());

        let result = submit_evaluation(
            &mut state,
            &store,
            &SubmitEvaluationRequest {
                peer_id: Some(peers[0].clone()),
                scores: BTreeMap::from([("A1".to_string(), Some(4))]),
            },
        )
        .await;
        assert!(result.is_err());
        assert!(store.evaluations().is_empty());
    }

    #[tokio::test]
    async fn test_reset_without_user_needs_no_setup() {
        let mut state = SessionState::new(&AppSettings::fallback());
        let mut settings = AppSettings::fallback();
        settings.reset_all_peers = Some(5);
        let change = apply_settings_change(&mut state, &settings);
        assert!(change.reset_processed);
        assert!(!change.needs_setup);
        assert!(state.just_processed_global_reset());
    }
}
