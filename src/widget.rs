//! Widget bootstrap: script-tag attributes, init checks and wiring.

use crate::backend::{BackendClient, WidgetIdentity};
use crate::config::{ConfigResolver, EffectiveConfig, Resolved, StyleDocument};
use crate::error::{PingletError, Result, RETRY_CONFIG_EVENT, RETRY_SUBSCRIBE_EVENT};
use crate::push::{enabled_popup, PushPlatform, PushSubscriptionManager, SubscribeOutcome};
use crate::render::{ButtonAction, VariantRenderer};
use crate::signing::RequestSigner;
use crate::state::{parse_flag, ClientStore, RuntimeSession, WidgetSettings};
use crate::stream::{StreamIngestor, StreamState};
use crate::surface::DisplaySurface;
use crate::toast::{DismissReason, ToastEvent, ToastQueueManager};
use crate::PINGLET_VERSION;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Apply `data-*` script attributes on top of `base`. Unknown attributes
/// are ignored.
pub fn apply_script_attributes<'a, I>(base: WidgetSettings, attributes: I) -> WidgetSettings
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut settings = base;
    for (name, value) in attributes {
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "data-endpoint" => settings.endpoint = value.to_string(),
            "data-configured-domain" => settings.configured_domain = value.to_string(),
            "data-project-id" => settings.project_id = value.to_string(),
            "data-pinglet-id" => settings.pinglet_id = value.to_string(),
            "data-load-templates" => settings.load_templates = parse_flag(value),
            "data-checksum" => settings.checksum = Some(value.to_string()).filter(|v| !v.is_empty()),
            "data-testimonials" => settings.testimonials = parse_flag(value),
            "data-version" => settings.version = Some(value.to_string()).filter(|v| !v.is_empty()),
            other => tracing::trace!("Ignoring script attribute {}", other),
        }
    }
    settings
}

/// Checks that must pass before anything talks to the backend.
pub fn validate(settings: &WidgetSettings) -> Result<()> {
    if settings.checksum.as_deref().map_or(true, |c| c.trim().is_empty()) {
        return Err(PingletError::MissingChecksum);
    }
    if let Some(expected) = &settings.version {
        if expected != PINGLET_VERSION {
            return Err(PingletError::UnsupportedVersion {
                expected: expected.clone(),
                running: PINGLET_VERSION.to_string(),
            });
        }
    }
    for (name, value) in [
        ("data-endpoint", &settings.endpoint),
        ("data-project-id", &settings.project_id),
        ("data-pinglet-id", &settings.pinglet_id),
    ] {
        if value.trim().is_empty() {
            return Err(PingletError::Other(format!("{} is required", name)));
        }
    }
    Ok(())
}

/// One embedded widget: the stream, the toast queue and the push channel
/// sharing a single page session.
pub struct Widget {
    settings: WidgetSettings,
    backend: Arc<BackendClient>,
    resolver: Arc<ConfigResolver>,
    queue: ToastQueueManager,
    ingestor: Arc<StreamIngestor>,
    push: Option<Arc<PushSubscriptionManager>>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl Widget {
    /// Claim the process-wide instance slot and build the widget. A second
    /// call fails with [`PingletError::AlreadyInitialized`].
    pub fn launch(
        settings: WidgetSettings,
        surface: Arc<dyn DisplaySurface>,
        platform: Arc<dyn PushPlatform>,
        store: Arc<ClientStore>,
    ) -> Result<Arc<Self>> {
        if INITIALIZED.swap(true, Ordering::SeqCst) {
            tracing::warn!("Pinglet is already initialized; ignoring second load");
            return Err(PingletError::AlreadyInitialized);
        }
        Ok(Self::new(settings, surface, platform, store))
    }

    pub fn new(
        settings: WidgetSettings,
        surface: Arc<dyn DisplaySurface>,
        platform: Arc<dyn PushPlatform>,
        store: Arc<ClientStore>,
    ) -> Arc<Self> {
        let checksum = settings.checksum.clone().unwrap_or_default();
        let secret = settings.signing_secret.clone().unwrap_or_else(|| checksum.clone());
        let identity = WidgetIdentity {
            project_id: settings.project_id.clone(),
            pinglet_id: settings.pinglet_id.clone(),
            configured_domain: settings.configured_domain.clone(),
            checksum,
            version: PINGLET_VERSION.to_string(),
        };
        let backend = Arc::new(BackendClient::new(settings.endpoint.clone(), identity, RequestSigner::new(secret)));

        let session = Arc::new(RuntimeSession::new(surface));
        tracing::debug!("Created session {}", session.id);
        let queue = ToastQueueManager::new(session, Arc::new(VariantRenderer::new()));
        let resolver = Arc::new(ConfigResolver::new(backend.clone()));
        let ingestor = Arc::new(StreamIngestor::new(backend.clone(), resolver.clone(), queue.clone()));
        let push = settings
            .push_enabled
            .then(|| Arc::new(PushSubscriptionManager::new(backend.clone(), platform, store)));

        Arc::new(Self {
            settings,
            backend,
            resolver,
            queue,
            ingestor,
            push,
            stream_task: Mutex::new(None),
            listener_task: Mutex::new(None),
        })
    }

    pub fn queue(&self) -> &ToastQueueManager {
        &self.queue
    }

    pub fn settings(&self) -> &WidgetSettings {
        &self.settings
    }

    pub fn stream_state(&self) -> StreamState {
        self.ingestor.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream_task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn push(&self) -> Option<&Arc<PushSubscriptionManager>> {
        self.push.as_ref()
    }

    /// Validate, resolve configuration, open the stream and start the push
    /// channel. Failures are shown as popups and returned; nothing panics.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if let Err(e) = validate(&self.settings) {
            tracing::warn!("Pinglet halted: {}", e);
            self.report(&e);
            return Err(e);
        }

        tracing::info!(
            "Starting Pinglet {} for project {} (templates: {}, testimonials: {})",
            PINGLET_VERSION,
            self.settings.project_id,
            self.settings.load_templates,
            self.settings.testimonials
        );

        self.spawn_retry_listener();
        self.connect().await?;

        if self.push.is_some() {
            let widget = self.clone();
            tokio::spawn(async move {
                widget.subscribe_push().await;
            });
        }
        Ok(())
    }

    /// [`start`](Self::start) for long-running hosts. A failure the retry
    /// popup can fix is logged and the widget keeps running; bad settings
    /// and other fatal errors are returned.
    pub async fn start_or_await_retry(self: &Arc<Self>) -> Result<()> {
        let settings_valid = validate(&self.settings).is_ok();
        match self.start().await {
            Err(e) if settings_valid && e.is_recoverable() => {
                tracing::warn!("Pinglet started without a stream, waiting for retry: {}", e);
                Ok(())
            }
            result => result,
        }
    }

    /// Resolve config, load templates if asked to, then start the stream.
    /// A config failure leaves the stream stopped.
    async fn connect(&self) -> Result<()> {
        if let Err(e) = self
            .resolver
            .resolve(&self.settings.project_id, &self.settings.configured_domain)
            .await
        {
            self.report(&e);
            return Err(e);
        }

        if self.settings.load_templates {
            match self.backend.load_templates().await {
                Ok(templates) => self.queue.renderer().set_templates(templates),
                Err(e) => tracing::warn!("Template load failed, custom templates disabled: {}", e),
            }
        }

        let mut task = self.stream_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }
        *task = Some(tokio::spawn(self.ingestor.clone().run()));
        Ok(())
    }

    async fn subscribe_push(&self) {
        let Some(push) = &self.push else {
            return;
        };
        match push.ensure_subscribed().await {
            Ok(SubscribeOutcome::Subscribed { confirm: true }) => {
                let (config, style) = self.popup_style();
                self.queue.show_popup(&enabled_popup(), &config, &style);
            }
            Ok(outcome) => tracing::debug!("Push channel: {:?}", outcome),
            Err(e) => self.report(&e),
        }
    }

    /// Remove this browser's push subscription.
    pub async fn unsubscribe(&self) -> Result<()> {
        let Some(push) = &self.push else {
            return Ok(());
        };
        let result = push.revoke().await;
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    /// Retry buttons on popups emit events; pick them up here.
    fn spawn_retry_listener(self: &Arc<Self>) {
        let mut listener = self.listener_task.lock();
        if listener.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        let mut events = self.queue.subscribe();
        *listener = Some(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Retry listener skipped {} toast events", n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let ToastEvent::Action { id, action: ButtonAction::Event { name, .. } } = event else {
                    continue;
                };
                let Some(widget) = weak.upgrade() else {
                    break;
                };

                match name.as_str() {
                    RETRY_CONFIG_EVENT => {
                        widget.queue.dismiss(id, DismissReason::UserDismiss);
                        tracing::info!("Retrying configuration load");
                        let _ = widget.connect().await;
                    }
                    RETRY_SUBSCRIBE_EVENT => {
                        widget.queue.dismiss(id, DismissReason::UserDismiss);
                        tracing::info!("Retrying push subscription");
                        widget.subscribe_push().await;
                    }
                    _ => {}
                }
            }
        }));
    }

    fn popup_style(&self) -> (EffectiveConfig, StyleDocument) {
        match self.resolver.current() {
            Some(Resolved { config, style }) => (config, style),
            None => (EffectiveConfig::default(), StyleDocument::default()),
        }
    }

    fn report(&self, error: &PingletError) {
        let (config, style) = self.popup_style();
        self.queue.report(error, &config, &style);
    }

    pub fn shutdown(&self) {
        self.ingestor.shutdown();
        if let Some(listener) = self.listener_task.lock().take() {
            listener.abort();
        }
        self.queue.clear();
        tracing::info!("Pinglet stopped");
    }
}
