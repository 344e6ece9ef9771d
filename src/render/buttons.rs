//! Declarative button actions.
//!
//! Payload buttons never carry executable code; every action is one of a
//! closed set of kinds, and `custom` hands structured data to the host.

use super::{ButtonSpec, ClickBinding, Element};
use crate::config::Css;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ButtonAction {
    /// Navigate the current tab.
    Redirect { url: String },
    /// Open a new window.
    Open { url: String },
    /// Follow a link in a new tab.
    Link { url: String },
    Alert { message: String },
    Reload,
    /// Emit a named event to host collaborators.
    Event { name: String, data: Value },
    /// Close this toast.
    Close,
    /// Dismiss this toast.
    Dismiss,
    /// Structured payload for the host's custom handler.
    Custom { data: Value },
}

impl ButtonAction {
    /// Parse a payload button. `None` when the action is unknown or lacks
    /// the field it needs.
    pub fn from_spec(spec: &ButtonSpec) -> Option<Self> {
        let url = || spec.src.clone().filter(|s| !s.trim().is_empty());
        let action = match spec.action.trim().to_ascii_lowercase().as_str() {
            "redirect" => ButtonAction::Redirect { url: url()? },
            "open" => ButtonAction::Open { url: url()? },
            "link" => ButtonAction::Link { url: url()? },
            "alert" => ButtonAction::Alert {
                message: spec
                    .data
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| spec.text.clone()),
            },
            "reload" => ButtonAction::Reload,
            "event" => ButtonAction::Event {
                name: spec.event.clone().filter(|e| !e.is_empty())?,
                data: spec.data.clone().unwrap_or(Value::Null),
            },
            "close" => ButtonAction::Close,
            "dismiss" => ButtonAction::Dismiss,
            "custom" => ButtonAction::Custom {
                data: spec.data.clone().unwrap_or(Value::Null),
            },
            _ => return None,
        };
        Some(action)
    }

    /// Whether clicking removes the toast itself.
    pub fn dismisses_toast(&self) -> bool {
        matches!(self, ButtonAction::Close | ButtonAction::Dismiss)
    }
}

/// Render the button row. Invalid buttons are skipped, the rest keep their
/// original payload index in their binding.
pub fn render_buttons(buttons: &[ButtonSpec], css: &Css) -> Option<Element> {
    let rendered: Vec<Element> = buttons
        .iter()
        .enumerate()
        .filter_map(|(index, spec)| match ButtonAction::from_spec(spec) {
            Some(action) => Some(
                Element::new("button")
                    .class("pinglet-button")
                    .class(format!("pinglet-button-{}", spec.action.trim().to_ascii_lowercase()))
                    .attr("type", "button")
                    .styles(css)
                    .text(spec.text.clone())
                    .on_click(ClickBinding::Button { index, action }),
            ),
            None => {
                tracing::warn!(
                    "Skipping button '{}' with unsupported action '{}'",
                    spec.text,
                    spec.action
                );
                None
            }
        })
        .collect();

    if rendered.is_empty() {
        return None;
    }

    let mut row = Element::new("div").class("pinglet-buttons");
    row.children = rendered;
    Some(row)
}
