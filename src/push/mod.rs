//! Browser push permission and subscription lifecycle.
//!
//! Runs beside the stream as an independent channel: nothing here touches
//! the toast queue directly, callers turn outcomes into popups.

use crate::backend::{BackendClient, PushSubscription};
use crate::error::{PingletError, Popup, Result};
use crate::state::ClientStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// `Notification.permission` as the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Default,
    Granted,
    Denied,
    /// No push support at all (headless host, old browser).
    Unsupported,
}

/// Service worker and `PushManager` operations of the host.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn permission(&self) -> PermissionState;
    /// Pre-prompt shown before the native permission request. `true` when
    /// the user chose to allow.
    async fn show_consent_dialog(&self) -> bool;
    async fn request_permission(&self) -> PermissionState;
    async fn register_worker(&self) -> Result<()>;
    async fn get_subscription(&self) -> Result<Option<PushSubscription>>;
    async fn subscribe(&self) -> Result<PushSubscription>;
    /// Returns `false` when there was nothing to unsubscribe.
    async fn unsubscribe(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushState {
    Unrequested,
    Requesting,
    Granted,
    Denied,
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Already `Subscribed` in this session; nothing was done.
    Unchanged,
    /// The platform already held a subscription.
    Existing,
    /// New subscription registered with the backend. `confirm` is set when
    /// the "enabled" popup should be shown.
    Subscribed { confirm: bool },
    Unsupported,
}

pub fn enabled_popup() -> Popup {
    Popup {
        title: "Notifications enabled".to_string(),
        message: "You will be notified even when this page is closed".to_string(),
        retry_event: None,
    }
}

pub struct PushSubscriptionManager {
    backend: Arc<BackendClient>,
    platform: Arc<dyn PushPlatform>,
    store: Arc<ClientStore>,
    state: Mutex<PushState>,
    /// Serializes lifecycle operations so concurrent calls POST once.
    gate: tokio::sync::Mutex<()>,
}

impl PushSubscriptionManager {
    pub fn new(backend: Arc<BackendClient>, platform: Arc<dyn PushPlatform>, store: Arc<ClientStore>) -> Self {
        Self {
            backend,
            platform,
            store,
            state: Mutex::new(PushState::Unrequested),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> PushState {
        *self.state.lock()
    }

    fn set_state(&self, next: PushState) {
        let mut state = self.state.lock();
        if *state != next {
            tracing::debug!("Push state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Make sure this browser is subscribed, asking for permission when it
    /// was never decided. Safe to call repeatedly.
    pub async fn ensure_subscribed(&self) -> Result<SubscribeOutcome> {
        let _guard = self.gate.lock().await;

        match self.state() {
            PushState::Subscribed => return Ok(SubscribeOutcome::Unchanged),
            PushState::Denied => return Err(PingletError::PermissionDenied),
            _ => {}
        }

        match self.platform.permission() {
            PermissionState::Unsupported => {
                tracing::info!("Push notifications are not supported on this host");
                return Ok(SubscribeOutcome::Unsupported);
            }
            PermissionState::Denied => {
                self.set_state(PushState::Denied);
                return Err(PingletError::PermissionDenied);
            }
            PermissionState::Granted | PermissionState::Default => {}
        }

        if self.platform.permission() != PermissionState::Granted {
            self.set_state(PushState::Requesting);
            if !self.platform.show_consent_dialog().await {
                tracing::info!("User declined the notification prompt");
                self.set_state(PushState::Denied);
                return Err(PingletError::PermissionDenied);
            }
            if self.platform.request_permission().await != PermissionState::Granted {
                tracing::info!("Notification permission denied");
                self.set_state(PushState::Denied);
                return Err(PingletError::PermissionDenied);
            }
        }
        self.set_state(PushState::Granted);

        self.platform
            .register_worker()
            .await
            .map_err(|e| subscription_error("service worker registration failed", e))?;

        let existing = self
            .platform
            .get_subscription()
            .await
            .map_err(|e| subscription_error("push subscription lookup failed", e))?;
        if existing.is_some() {
            tracing::debug!("Reusing existing push subscription");
            self.set_state(PushState::Subscribed);
            return Ok(SubscribeOutcome::Existing);
        }

        let subscription = self
            .platform
            .subscribe()
            .await
            .map_err(|e| subscription_error("push subscribe failed", e))?;
        self.backend.subscribe(&subscription).await?;

        let confirm = !self.store.subscription_flag();
        self.store.set_subscription_flag(true)?;
        self.set_state(PushState::Subscribed);
        tracing::info!("Push subscription registered");

        Ok(SubscribeOutcome::Subscribed { confirm })
    }

    /// Drop the subscription locally, then tell the backend. A backend
    /// failure is returned but the local state stays `Unsubscribed`.
    pub async fn revoke(&self) -> Result<()> {
        let _guard = self.gate.lock().await;

        let existing = self.platform.get_subscription().await?;
        self.platform.unsubscribe().await?;
        self.store.set_subscription_flag(false)?;
        self.set_state(PushState::Unsubscribed);

        match existing {
            Some(subscription) => {
                if let Err(e) = self.backend.unsubscribe(&subscription.endpoint).await {
                    tracing::warn!("Backend unsubscribe failed: {}", e);
                    return Err(e);
                }
                tracing::info!("Push subscription revoked");
                Ok(())
            }
            None => {
                tracing::debug!("No push subscription to revoke on the backend");
                Ok(())
            }
        }
    }
}

/// Platform failures during subscribe all surface as
/// [`PingletError::Subscription`] so the user gets the retry popup.
fn subscription_error(context: &str, error: PingletError) -> PingletError {
    match error {
        e @ PingletError::Subscription(_) => e,
        e => PingletError::Subscription(format!("{}: {}", context, e)),
    }
}

/// Platform for hosts without push support.
pub struct UnsupportedPushPlatform;

#[async_trait]
impl PushPlatform for UnsupportedPushPlatform {
    fn permission(&self) -> PermissionState {
        PermissionState::Unsupported
    }

    async fn show_consent_dialog(&self) -> bool {
        false
    }

    async fn request_permission(&self) -> PermissionState {
        PermissionState::Unsupported
    }

    async fn register_worker(&self) -> Result<()> {
        Err(PingletError::Other("push is not supported".to_string()))
    }

    async fn get_subscription(&self) -> Result<Option<PushSubscription>> {
        Ok(None)
    }

    async fn subscribe(&self) -> Result<PushSubscription> {
        Err(PingletError::Other("push is not supported".to_string()))
    }

    async fn unsubscribe(&self) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RETRY_SUBSCRIBE_EVENT;
    use crate::test_utils::{client_for, offline_client, subscription, FakePushPlatform};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(backend: BackendClient, platform: Arc<FakePushPlatform>) -> (PushSubscriptionManager, Arc<ClientStore>) {
        let store = Arc::new(ClientStore::in_memory());
        let manager = PushSubscriptionManager::new(Arc::new(backend), platform, store.clone());
        (manager, store)
    }

    async fn mount_ack(server: &MockServer, route: &str, success: bool, times: u64) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": success})))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_subscribe_twice_posts_once() {
        let server = MockServer::start().await;
        mount_ack(&server, "/subscribe", true, 1).await;

        let platform = Arc::new(FakePushPlatform::new(PermissionState::Default, true, PermissionState::Granted));
        let (manager, store) = manager(client_for(&server), platform.clone());

        let first = manager.ensure_subscribed().await.unwrap();
        assert_eq!(first, SubscribeOutcome::Subscribed { confirm: true });
        assert_eq!(manager.state(), PushState::Subscribed);
        assert!(store.subscription_flag());

        let second = manager.ensure_subscribed().await.unwrap();
        assert_eq!(second, SubscribeOutcome::Unchanged);
        assert_eq!(platform.subscribe_calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_subscription_skips_post() {
        let server = MockServer::start().await;
        mount_ack(&server, "/subscribe", true, 0).await;

        let platform = Arc::new(FakePushPlatform::new(PermissionState::Granted, true, PermissionState::Granted));
        platform.set_existing(Some(subscription()));
        let (manager, _store) = manager(client_for(&server), platform.clone());

        assert_eq!(manager.ensure_subscribed().await.unwrap(), SubscribeOutcome::Existing);
        assert_eq!(manager.state(), PushState::Subscribed);
        assert_eq!(platform.consent_prompts(), 0);
    }

    #[tokio::test]
    async fn test_consent_refusal_is_terminal() {
        let platform = Arc::new(FakePushPlatform::new(PermissionState::Default, false, PermissionState::Granted));
        let (manager, _store) = manager(offline_client(), platform.clone());

        let err = manager.ensure_subscribed().await.unwrap_err();
        assert!(matches!(err, PingletError::PermissionDenied));
        assert_eq!(manager.state(), PushState::Denied);

        // No second prompt in the same session
        assert!(manager.ensure_subscribed().await.is_err());
        assert_eq!(platform.consent_prompts(), 1);
    }

    #[tokio::test]
    async fn test_declined_consent_never_registers_worker() {
        let platform = Arc::new(FakePushPlatform::new(PermissionState::Default, false, PermissionState::Granted));
        let (manager, _store) = manager(offline_client(), platform.clone());

        assert!(manager.ensure_subscribed().await.is_err());
        assert_eq!(platform.calls(), vec!["show_consent_dialog"]);
        assert_eq!(manager.state(), PushState::Denied);
    }

    #[tokio::test]
    async fn test_consent_precedes_worker_registration() {
        let server = MockServer::start().await;
        mount_ack(&server, "/subscribe", true, 1).await;

        let platform = Arc::new(FakePushPlatform::new(PermissionState::Default, true, PermissionState::Granted));
        let (manager, _store) = manager(client_for(&server), platform.clone());

        manager.ensure_subscribed().await.unwrap();
        assert_eq!(
            platform.calls(),
            vec![
                "show_consent_dialog",
                "request_permission",
                "register_worker",
                "get_subscription",
                "subscribe"
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_registration_failure_offers_retry() {
        let server = MockServer::start().await;
        mount_ack(&server, "/subscribe", true, 0).await;

        let platform = Arc::new(FakePushPlatform::new(PermissionState::Granted, true, PermissionState::Granted));
        platform.fail_register("sw.js returned 404");
        let (manager, _store) = manager(client_for(&server), platform.clone());

        let err = manager.ensure_subscribed().await.unwrap_err();
        match &err {
            PingletError::Subscription(msg) => assert!(msg.contains("sw.js returned 404")),
            other => panic!("unexpected error: {:?}", other),
        }
        let popup = err.user_popup().unwrap();
        assert_eq!(popup.retry_event.as_deref(), Some(RETRY_SUBSCRIBE_EVENT));
        assert_eq!(platform.subscribe_calls(), 0);
    }

    #[tokio::test]
    async fn test_native_denial() {
        let platform = Arc::new(FakePushPlatform::new(PermissionState::Default, true, PermissionState::Denied));
        let (manager, _store) = manager(offline_client(), platform);

        assert!(matches!(
            manager.ensure_subscribed().await,
            Err(PingletError::PermissionDenied)
        ));
        assert_eq!(manager.state(), PushState::Denied);
    }

    #[tokio::test]
    async fn test_confirmation_only_when_flag_unset() {
        let server = MockServer::start().await;
        mount_ack(&server, "/subscribe", true, 1).await;

        let platform = Arc::new(FakePushPlatform::new(PermissionState::Granted, true, PermissionState::Granted));
        let (manager, store) = manager(client_for(&server), platform);
        store.set_subscription_flag(true).unwrap();

        assert_eq!(
            manager.ensure_subscribed().await.unwrap(),
            SubscribeOutcome::Subscribed { confirm: false }
        );
    }

    #[tokio::test]
    async fn test_revoke_backend_failure_keeps_local_state() {
        let server = MockServer::start().await;
        mount_ack(&server, "/unsubscribe", false, 1).await;

        let platform = Arc::new(FakePushPlatform::new(PermissionState::Granted, true, PermissionState::Granted));
        platform.set_existing(Some(subscription()));
        let (manager, store) = manager(client_for(&server), platform.clone());
        store.set_subscription_flag(true).unwrap();

        let err = manager.revoke().await.unwrap_err();
        assert!(matches!(err, PingletError::Subscription(_)));
        assert_eq!(manager.state(), PushState::Unsubscribed);
        assert!(!store.subscription_flag());
        assert!(platform.existing().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_host() {
        let store = Arc::new(ClientStore::in_memory());
        let manager = PushSubscriptionManager::new(
            Arc::new(offline_client()),
            Arc::new(UnsupportedPushPlatform),
            store,
        );
        assert_eq!(manager.ensure_subscribed().await.unwrap(), SubscribeOutcome::Unsupported);
        assert_eq!(manager.state(), PushState::Unrequested);
    }
}
