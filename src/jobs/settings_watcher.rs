// ==================== SETTINGS WATCHER ====================
// Polls the app settings document, publishes changes on a watch channel and
// applies every change to all live sessions. Also prunes idle sessions.

use crate::{
    models::AppSettings,
    services::settings_service,
    session::SessionRegistry,
    store::{EvaluationStore, SharedStore},
    utils::debug,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// Reads the settings once. A missing document means open, not debug, no reset.
/// Returns `None` only when the read itself failed.
pub async fn read_settings(store: &dyn EvaluationStore) -> Option<AppSettings> {
    match store.fetch_app_settings().await {
        Ok(Some(settings)) => Some(settings),
        Ok(None) => {
            log::warn!("⚠️  No app settings document found. Defaulting to open, no debug, no reset signal");
            Some(AppSettings::fallback())
        }
        Err(e) => {
            log::error!("❌ Failed to read app settings: {}", e);
            None
        }
    }
}

/// Settings visible at startup. Falls back to the default snapshot when the
/// read fails.
pub async fn load_initial_settings(store: &dyn EvaluationStore) -> AppSettings {
    let settings = read_settings(store)
        .await
        .unwrap_or_else(AppSettings::fallback);
    debug::set_debug_mode(settings.is_debug);
    settings
}

/// One poll. Publishes the snapshot if it differs from the current one and
/// returns whether it did. A failed read keeps the previous snapshot.
pub async fn poll_once(store: &dyn EvaluationStore, tx: &watch::Sender<AppSettings>) -> bool {
    let settings = match read_settings(store).await {
        Some(settings) => settings,
        None => return false,
    };

    tx.send_if_modified(|current| {
        if current.same_signal(&settings) {
            false
        } else {
            log::info!(
                "⚙️  App settings changed: open={} debug={} reset={:?} period={}",
                settings.is_open,
                settings.is_debug,
                settings.reset_all_peers,
                settings.period_id()
            );
            *current = settings;
            true
        }
    })
}

/// Applies `settings` to every live session, one session at a time.
pub async fn fan_out(
    store: &dyn EvaluationStore,
    registry: &SessionRegistry,
    settings: &AppSettings,
) -> usize {
    debug::set_debug_mode(settings.is_debug);

    let sessions = registry.all().await;
    for session in &sessions {
        let mut state = session.lock().await;
        settings_service::handle_settings_change(&mut state, store, settings).await;
    }
    log::info!("📣 Settings applied to {} session(s)", sessions.len());
    sessions.len()
}

/// Starts the polling loop and the fan-out loop.
pub fn start_settings_watcher(
    store: SharedStore,
    registry: Arc<SessionRegistry>,
    tx: watch::Sender<AppSettings>,
    poll_interval_secs: u64,
    session_ttl: chrono::Duration,
) {
    log::info!(
        "⚙️  Starting settings watcher (polls every {}s)",
        poll_interval_secs
    );

    let mut rx = tx.subscribe();
    let poll_store = store.clone();
    let poll_registry = registry.clone();

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(poll_interval_secs.max(1)));
        loop {
            ticker.tick().await;
            poll_once(poll_store.as_ref(), &tx).await;

            let pruned = poll_registry.prune_idle(session_ttl).await;
            if pruned > 0 {
                log::info!("🧹 Pruned {} idle session(s)", pruned);
            }
        }
    });

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let settings = rx.borrow_and_update().clone();
            fan_out(store.as_ref(), &registry, &settings).await;
        }
        log::warn!("⚠️  Settings channel closed, fan-out stopped");
    });

    log::info!("✅ Settings watcher started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::session::SessionState;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_missing_document_reads_as_open() {
        let store = MemoryStore::new();
        let settings = read_settings(&store).await.unwrap();
        assert!(settings.is_open);
        assert_eq!(settings.reset_all_peers, None);
    }

    #[tokio::test]
    async fn test_poll_publishes_only_changes() {
        let store = MemoryStore::new();
        store.set_settings(AppSettings::fallback());
        let (tx, _rx) = watch::channel(AppSettings::fallback());

        assert!(!poll_once(&store, &tx).await);

        let mut closed = AppSettings::fallback();
        closed.is_open = false;
        store.set_settings(closed);
        assert!(poll_once(&store, &tx).await);
        assert!(!tx.borrow().is_open);

        store.set_fail_reads(true);
        assert!(!poll_once(&store, &tx).await);
        assert!(!tx.borrow().is_open);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_session() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new();
        for name in ["A", "B"] {
            let mut state = SessionState::new(&AppSettings::fallback());
            state.set_current_user(Some(User::new(name, name)));
            registry.insert(state).await;
        }

        let mut settings = AppSettings::fallback();
        settings.is_open = false;
        assert_eq!(fan_out(&store, &registry, &settings).await, 2);

        for session in registry.all().await {
            assert!(!session.lock().await.is_evaluation_open());
        }
    }
}
