//! The page the runtime draws into.
//!
//! A browser host implements [`DisplaySurface`] over the DOM; the crate
//! ships [`HeadlessSurface`], which logs every operation and keeps the
//! serialized markup of what is currently on screen.

use crate::config::{Position, Transition};
use crate::render::{ButtonAction, Element};
use crate::toast::ToastId;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Host display operations. Implementations must not call back into the
/// toast queue; they are invoked while the queue is mid-update.
pub trait DisplaySurface: Send + Sync {
    /// Create the toast container. Called at most once per session.
    fn mount_container(&self, position: Position);
    fn attach(&self, id: ToastId, element: &Element);
    fn begin_exit(&self, id: ToastId, transition: Transition);
    fn detach(&self, id: ToastId);
    /// Session-level branding element. Called at most once when branding is `once`.
    fn attach_branding(&self, element: &Element);
    /// Create the audio player. Called at most once per session.
    fn create_audio_player(&self);
    fn play_sound(&self, src: &str, volume: f64);
    /// Side effect of a button action other than closing the toast.
    fn perform(&self, action: &ButtonAction);
}

pub struct HeadlessSurface {
    open_links: bool,
    visible: Mutex<BTreeMap<ToastId, String>>,
}

impl HeadlessSurface {
    pub fn new(open_links: bool) -> Self {
        Self {
            open_links,
            visible: Mutex::new(BTreeMap::new()),
        }
    }

    /// Markup of every toast currently attached, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.visible.lock().values().cloned().collect()
    }
}

impl DisplaySurface for HeadlessSurface {
    fn mount_container(&self, position: Position) {
        tracing::info!("Mounted toast container at {}", position.as_str());
    }

    fn attach(&self, id: ToastId, element: &Element) {
        let html = element.to_html();
        tracing::info!("Toast {} shown: {}", id, html);
        self.visible.lock().insert(id, html);
    }

    fn begin_exit(&self, id: ToastId, transition: Transition) {
        tracing::debug!("Toast {} leaving ({})", id, transition.as_str());
    }

    fn detach(&self, id: ToastId) {
        if self.visible.lock().remove(&id).is_some() {
            tracing::debug!("Toast {} detached", id);
        }
    }

    fn attach_branding(&self, element: &Element) {
        tracing::debug!("Branding attached: {}", element.to_html());
    }

    fn create_audio_player(&self) {
        tracing::debug!("Audio player created");
    }

    fn play_sound(&self, src: &str, volume: f64) {
        tracing::info!("Playing notification sound {} at volume {:.2}", src, volume);
    }

    fn perform(&self, action: &ButtonAction) {
        match action {
            ButtonAction::Redirect { url } | ButtonAction::Open { url } | ButtonAction::Link { url } => {
                tracing::info!("Opening {}", url);
                if self.open_links {
                    if let Err(e) = opener::open(url) {
                        tracing::warn!("Failed to open {}: {}", url, e);
                    }
                }
            }
            ButtonAction::Alert { message } => tracing::info!("Alert: {}", message),
            ButtonAction::Reload => tracing::info!("Page reload requested"),
            ButtonAction::Event { name, data } => tracing::info!("Event '{}': {}", name, data),
            ButtonAction::Custom { data } => tracing::info!("Custom action: {}", data),
            ButtonAction::Close | ButtonAction::Dismiss => {}
        }
    }
}
