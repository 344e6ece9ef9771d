//! Notification rendering.
//!
//! This module provides:
//! - Stream payload types (`type -1 | 0 | 1`)
//! - A host-independent element tree
//! - Variant layouts, media sub-renderers and declarative button actions
//! - Custom template substitution

mod buttons;
mod element;
mod media;
mod payload;
mod template;
mod variant;

pub use buttons::{render_buttons, ButtonAction};
pub use element::{escape_html, ClickBinding, Element};
pub use media::{render_media, MediaKind};
pub use payload::{ButtonSpec, MediaSpec, NotificationPayload, StreamEvent, ToastBody};
pub use template::{render_template, substitute, Template};
pub use variant::{branding_element, Variant, VariantRenderer};
