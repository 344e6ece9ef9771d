use super::{DismissReason, DismissTimer, ToastEvent, ToastId};
use crate::config::{EffectiveConfig, StyleDocument};
use crate::error::{PingletError, Popup};
use crate::render::{
    branding_element, ButtonAction, ButtonSpec, ClickBinding, Element, NotificationPayload,
    ToastBody, VariantRenderer,
};
use crate::state::RuntimeSession;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const EVENT_CAPACITY: usize = 64;
const POPUP_DURATION_MS: u64 = 8000;

pub struct ToastEntry {
    pub id: ToastId,
    pub element: Element,
    pub config: EffectiveConfig,
    pub created_at: Instant,
    timer: Option<DismissTimer>,
}

impl ToastEntry {
    pub fn is_paused(&self) -> bool {
        self.timer.as_ref().is_some_and(DismissTimer::is_paused)
    }
}

struct Inner {
    session: Arc<RuntimeSession>,
    renderer: Arc<VariantRenderer>,
    entries: Mutex<VecDeque<ToastEntry>>,
    next_id: AtomicU64,
    events: broadcast::Sender<ToastEvent>,
}

/// Owns the visible toasts. Cloning shares the same queue.
#[derive(Clone)]
pub struct ToastQueueManager {
    inner: Arc<Inner>,
}

impl ToastQueueManager {
    pub fn new(session: Arc<RuntimeSession>, renderer: Arc<VariantRenderer>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                session,
                renderer,
                entries: Mutex::new(VecDeque::new()),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    pub fn renderer(&self) -> &Arc<VariantRenderer> {
        &self.inner.renderer
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.inner.events.subscribe()
    }

    /// Render `payload` and show it. `None` when the payload has nothing to
    /// show in the page.
    pub fn admit(
        &self,
        payload: &NotificationPayload,
        config: &EffectiveConfig,
        style: &StyleDocument,
    ) -> Option<ToastId> {
        let element = self.inner.renderer.render(payload, config, style)?;
        Some(self.admit_element(element, config, style))
    }

    /// Show an already-rendered toast, evicting the oldest entries first so
    /// the queue never exceeds the configured capacity.
    pub fn admit_element(&self, element: Element, config: &EffectiveConfig, style: &StyleDocument) -> ToastId {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let session = &self.inner.session;
        let mut entries = self.inner.entries.lock();

        let capacity = config.capacity();
        while entries.len() >= capacity {
            match entries.pop_front() {
                Some(evicted) => self.retire(evicted, DismissReason::Eviction),
                None => break,
            }
        }

        session.ensure_container(config.position);

        let mut element = element.attr("data-toast-id", id.to_string());
        if config.branding.show {
            let branding = branding_element(config, style);
            if config.branding.once {
                session.ensure_branding(&branding);
            } else {
                element = element.child(branding);
            }
        }

        session.surface().attach(id, &element);

        if config.sound.play && !config.sound.src.is_empty() {
            session.play_sound(&config.sound.src, config.sound.volume);
        }

        let timer = (config.auto_dismiss && config.duration > 0)
            .then(|| self.start_timer(id, Duration::from_millis(config.duration)));

        entries.push_back(ToastEntry {
            id,
            element,
            config: config.clone(),
            created_at: Instant::now(),
            timer,
        });
        drop(entries);

        tracing::debug!("Toast {} admitted", id);
        self.emit(ToastEvent::Shown { id });
        id
    }

    /// Remove a toast. Returns `false` when it is no longer visible.
    pub fn dismiss(&self, id: ToastId, reason: DismissReason) -> bool {
        let entry = {
            let mut entries = self.inner.entries.lock();
            let Some(index) = entries.iter().position(|e| e.id == id) else {
                return false;
            };
            entries.remove(index)
        };

        match entry {
            Some(entry) => {
                self.retire(entry, reason);
                true
            }
            None => false,
        }
    }

    /// Stop the timer, play the exit transition, detach once it has run,
    /// and tell collaborators why.
    fn retire(&self, mut entry: ToastEntry, reason: DismissReason) {
        if let Some(timer) = entry.timer.as_mut() {
            timer.cancel();
        }

        let surface = self.inner.session.surface().clone();
        let transition = entry.config.transition;
        surface.begin_exit(entry.id, transition);

        let exit = transition.exit_duration_ms();
        if exit == 0 {
            surface.detach(entry.id);
        } else {
            let id = entry.id;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(exit)).await;
                surface.detach(id);
            });
        }

        tracing::debug!("Toast {} dismissed ({})", entry.id, reason.as_str());
        self.emit(ToastEvent::Dismissed { id: entry.id, reason });
    }

    fn start_timer(&self, id: ToastId, after: Duration) -> DismissTimer {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        DismissTimer::start(after, move || async move {
            if let Some(inner) = weak.upgrade() {
                ToastQueueManager { inner }.dismiss(id, DismissReason::Timeout);
            }
        })
    }

    /// Pointer entered the toast: pause its timer if the config asks for it.
    pub fn hover_enter(&self, id: ToastId) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            if !entry.config.pause_on_hover {
                return;
            }
            if let Some(timer) = entry.timer.as_mut() {
                timer.pause();
                tracing::trace!("Toast {} paused with {:?} left", id, timer.remaining());
            }
        }
    }

    /// Pointer left the toast: resume with the time that was left.
    pub fn hover_leave(&self, id: ToastId) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            let weak = Arc::downgrade(&self.inner);
            let resumed = entry.timer.as_ref().and_then(|timer| {
                timer.resume(move || async move {
                    if let Some(inner) = weak.upgrade() {
                        ToastQueueManager { inner }.dismiss(id, DismissReason::Timeout);
                    }
                })
            });
            if let Some(resumed) = resumed {
                entry.timer = Some(resumed);
            }
        }
    }

    /// The toast's close control.
    pub fn click_close(&self, id: ToastId) -> bool {
        self.dismiss(id, DismissReason::UserDismiss)
    }

    /// A payload button, by its index in the payload's button list.
    pub fn click_button(&self, id: ToastId, index: usize) -> Option<ButtonAction> {
        let action = {
            let entries = self.inner.entries.lock();
            let entry = entries.iter().find(|e| e.id == id)?;
            entry.element.bindings().into_iter().find_map(|binding| match binding {
                ClickBinding::Button { index: i, action } if *i == index => Some(action.clone()),
                _ => None,
            })?
        };

        if action.dismisses_toast() {
            self.dismiss(id, DismissReason::UserDismiss);
        } else {
            self.inner.session.surface().perform(&action);
        }
        self.emit(ToastEvent::Action {
            id,
            action: action.clone(),
        });
        Some(action)
    }

    /// Surface a user-facing error through the same toast mechanism.
    pub fn report(&self, error: &PingletError, config: &EffectiveConfig, style: &StyleDocument) -> Option<ToastId> {
        match error.user_popup() {
            Some(popup) => {
                tracing::warn!("{}", error);
                Some(self.show_popup(&popup, config, style))
            }
            None => {
                tracing::error!("{}", error);
                None
            }
        }
    }

    pub fn show_popup(&self, popup: &Popup, config: &EffectiveConfig, style: &StyleDocument) -> ToastId {
        let mut buttons = Vec::new();
        if let Some(event) = &popup.retry_event {
            buttons.push(ButtonSpec {
                text: "Retry".to_string(),
                action: "event".to_string(),
                event: Some(event.clone()),
                ..Default::default()
            });
        }
        buttons.push(ButtonSpec {
            text: "Dismiss".to_string(),
            action: "dismiss".to_string(),
            ..Default::default()
        });

        let body = ToastBody {
            title: popup.title.clone(),
            description: popup.message.clone(),
            buttons,
            ..Default::default()
        };

        // Retryable popups stay until the user acts on them
        let config = EffectiveConfig {
            auto_dismiss: popup.retry_event.is_none(),
            duration: POPUP_DURATION_MS,
            dismissible: true,
            ..config.clone()
        };

        let element = self
            .inner
            .renderer
            .render(&NotificationPayload::Toast(body), &config, style)
            .unwrap_or_else(|| Element::new("div"))
            .class("pinglet-popup");
        self.admit_element(element, &config, style)
    }

    /// Remove everything at once, without exit transitions.
    pub fn clear(&self) {
        let drained: Vec<ToastEntry> = self.inner.entries.lock().drain(..).collect();
        let surface = self.inner.session.surface();
        for mut entry in drained {
            if let Some(timer) = entry.timer.as_mut() {
                timer.cancel();
            }
            surface.detach(entry.id);
            self.emit(ToastEvent::Dismissed {
                id: entry.id,
                reason: DismissReason::UserDismiss,
            });
        }
    }

    pub fn visible_ids(&self) -> Vec<ToastId> {
        self.inner.entries.lock().iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self, id: ToastId) -> bool {
        self.inner
            .entries
            .lock()
            .iter()
            .find(|e| e.id == id)
            .is_some_and(ToastEntry::is_paused)
    }

    fn emit(&self, event: ToastEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}
