//! Shared fixtures for unit tests.

use crate::backend::{BackendClient, PushKeys, PushSubscription, WidgetIdentity};
use crate::config::{Position, Transition};
use crate::error::{PingletError, Result};
use crate::push::{PermissionState, PushPlatform};
use crate::render::{ButtonAction, Element};
use crate::signing::RequestSigner;
use crate::surface::DisplaySurface;
use crate::toast::ToastId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use wiremock::MockServer;

pub fn identity() -> WidgetIdentity {
    WidgetIdentity {
        project_id: "proj-1".to_string(),
        pinglet_id: "pinglet-1".to_string(),
        configured_domain: "example.com".to_string(),
        checksum: "checksum-1".to_string(),
        version: crate::PINGLET_VERSION.to_string(),
    }
}

pub fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::new(server.uri(), identity(), RequestSigner::new("secret"))
}

/// Client pointing at a port nothing listens on.
pub fn offline_client() -> BackendClient {
    BackendClient::new("http://127.0.0.1:9", identity(), RequestSigner::new("secret"))
}

pub fn subscription() -> PushSubscription {
    PushSubscription {
        endpoint: "https://push.example/abc".to_string(),
        expiration_time: None,
        keys: PushKeys {
            p256dh: "p256dh-key".to_string(),
            auth: "auth-key".to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    MountContainer(Position),
    Attach(ToastId),
    BeginExit(ToastId, Transition),
    Detach(ToastId),
    AttachBranding,
    CreateAudio,
    PlaySound(String, f64),
    Perform(ButtonAction),
}

/// Surface that records every call.
#[derive(Default)]
pub struct RecordingSurface {
    ops: Mutex<Vec<SurfaceOp>>,
    attached: Mutex<BTreeMap<ToastId, Element>>,
    branding_elements: Mutex<usize>,
}

impl RecordingSurface {
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.lock().clone()
    }

    pub fn attached_ids(&self) -> Vec<ToastId> {
        self.attached.lock().keys().copied().collect()
    }

    pub fn html(&self, id: ToastId) -> Option<String> {
        self.attached.lock().get(&id).map(Element::to_html)
    }

    /// Branding elements ever put on screen, session-level or per toast.
    pub fn branding_count(&self) -> usize {
        *self.branding_elements.lock()
    }

    fn record(&self, op: SurfaceOp) {
        self.ops.lock().push(op);
    }
}

impl DisplaySurface for RecordingSurface {
    fn mount_container(&self, position: Position) {
        self.record(SurfaceOp::MountContainer(position));
    }

    fn attach(&self, id: ToastId, element: &Element) {
        *self.branding_elements.lock() += element.find_by_class("pinglet-branding").len();
        self.attached.lock().insert(id, element.clone());
        self.record(SurfaceOp::Attach(id));
    }

    fn begin_exit(&self, id: ToastId, transition: Transition) {
        self.record(SurfaceOp::BeginExit(id, transition));
    }

    fn detach(&self, id: ToastId) {
        self.attached.lock().remove(&id);
        self.record(SurfaceOp::Detach(id));
    }

    fn attach_branding(&self, _element: &Element) {
        *self.branding_elements.lock() += 1;
        self.record(SurfaceOp::AttachBranding);
    }

    fn create_audio_player(&self) {
        self.record(SurfaceOp::CreateAudio);
    }

    fn play_sound(&self, src: &str, volume: f64) {
        self.record(SurfaceOp::PlaySound(src.to_string(), volume));
    }

    fn perform(&self, action: &ButtonAction) {
        self.record(SurfaceOp::Perform(action.clone()));
    }
}

/// Scripted push platform.
pub struct FakePushPlatform {
    permission: Mutex<PermissionState>,
    consent: bool,
    native_answer: PermissionState,
    existing: Mutex<Option<PushSubscription>>,
    consent_prompts: Mutex<usize>,
    subscribe_calls: Mutex<usize>,
    register_failure: Mutex<Option<String>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakePushPlatform {
    pub fn new(permission: PermissionState, consent: bool, native_answer: PermissionState) -> Self {
        Self {
            permission: Mutex::new(permission),
            consent,
            native_answer,
            existing: Mutex::new(None),
            consent_prompts: Mutex::new(0),
            subscribe_calls: Mutex::new(0),
            register_failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_existing(&self, subscription: Option<PushSubscription>) {
        *self.existing.lock() = subscription;
    }

    pub fn existing(&self) -> Option<PushSubscription> {
        self.existing.lock().clone()
    }

    pub fn consent_prompts(&self) -> usize {
        *self.consent_prompts.lock()
    }

    pub fn subscribe_calls(&self) -> usize {
        *self.subscribe_calls.lock()
    }

    /// Make `register_worker` fail with `reason`.
    pub fn fail_register(&self, reason: &str) {
        *self.register_failure.lock() = Some(reason.to_string());
    }

    /// Async platform operations in the order they were called.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PushPlatform for FakePushPlatform {
    fn permission(&self) -> PermissionState {
        *self.permission.lock()
    }

    async fn show_consent_dialog(&self) -> bool {
        self.record("show_consent_dialog");
        *self.consent_prompts.lock() += 1;
        self.consent
    }

    async fn request_permission(&self) -> PermissionState {
        self.record("request_permission");
        *self.permission.lock() = self.native_answer;
        self.native_answer
    }

    async fn register_worker(&self) -> Result<()> {
        self.record("register_worker");
        match self.register_failure.lock().clone() {
            Some(reason) => Err(PingletError::Other(reason)),
            None => Ok(()),
        }
    }

    async fn get_subscription(&self) -> Result<Option<PushSubscription>> {
        self.record("get_subscription");
        Ok(self.existing())
    }

    async fn subscribe(&self) -> Result<PushSubscription> {
        self.record("subscribe");
        *self.subscribe_calls.lock() += 1;
        let sub = subscription();
        self.set_existing(Some(sub.clone()));
        Ok(sub)
    }

    async fn unsubscribe(&self) -> Result<bool> {
        Ok(self.existing.lock().take().is_some())
    }
}
