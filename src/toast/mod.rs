//! Visible toast queue with bounded capacity, eviction and auto-dismiss.

mod queue;
mod timer;

pub use queue::{ToastEntry, ToastQueueManager};
pub use timer::DismissTimer;

use crate::render::ButtonAction;
use serde::Serialize;

pub type ToastId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DismissReason {
    UserDismiss,
    Timeout,
    Eviction,
}

impl DismissReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DismissReason::UserDismiss => "user-dismiss",
            DismissReason::Timeout => "timeout",
            DismissReason::Eviction => "eviction",
        }
    }
}

/// Broadcast to collaborators (click/webhook analytics, host bindings).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ToastEvent {
    Shown { id: ToastId },
    Dismissed { id: ToastId, reason: DismissReason },
    Action { id: ToastId, action: ButtonAction },
}
