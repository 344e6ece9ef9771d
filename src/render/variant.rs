use super::{
    render_buttons, render_media, render_template, ClickBinding, Element, MediaKind,
    NotificationPayload, Template, ToastBody,
};
use crate::config::{EffectiveConfig, StyleDocument};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Structural layout of a `type 0` toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Media on top, icon beside the text, buttons below.
    Default,
    /// Single row: icon, text, buttons. Large media is dropped.
    Compact,
    /// Media as a full-bleed header with padded content below.
    Card,
    /// Full-width strip: thumbnail, text, buttons side by side.
    Banner,
}

impl Variant {
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("default") => Variant::Default,
            Some("compact") => Variant::Compact,
            Some("card") => Variant::Card,
            Some("banner") => Variant::Banner,
            Some(other) => {
                tracing::debug!("Unknown variant '{}', using default layout", other);
                Variant::Default
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Default => "default",
            Variant::Compact => "compact",
            Variant::Card => "card",
            Variant::Banner => "banner",
        }
    }
}

/// Builds element trees for notification payloads.
pub struct VariantRenderer {
    templates: RwLock<HashMap<String, Template>>,
}

impl Default for VariantRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantRenderer {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_templates(&self, templates: HashMap<String, Template>) {
        *self.templates.write() = templates;
    }

    pub fn template(&self, template_id: &str) -> Option<Template> {
        self.templates.read().get(template_id).cloned()
    }

    /// Render a payload. `None` means there is nothing to show in the page:
    /// native pushes, or a template this session never loaded.
    pub fn render(
        &self,
        payload: &NotificationPayload,
        config: &EffectiveConfig,
        style: &StyleDocument,
    ) -> Option<Element> {
        match payload {
            NotificationPayload::Native(_) => {
                tracing::debug!("Native push payload has no in-page rendering");
                None
            }
            NotificationPayload::Toast(body) => Some(self.render_toast(body, config, style)),
            NotificationPayload::Template { template_id, data } => {
                let Some(template) = self.template(template_id) else {
                    tracing::warn!("Dropping notification for unknown template '{}'", template_id);
                    return None;
                };
                Some(self.render_custom(template_id, &template, data, config, style))
            }
        }
    }

    fn render_toast(&self, body: &ToastBody, config: &EffectiveConfig, style: &StyleDocument) -> Element {
        let variant = Variant::parse(body.variant.as_deref());

        let media = body
            .media
            .as_ref()
            .and_then(|m| render_media(m, &config.icon_defaults, style));
        let is_icon = media.as_ref().is_some_and(|m| {
            m.has_class(&format!("pinglet-media-{}", MediaKind::Icon.as_str()))
                || m.has_class(&format!("pinglet-media-{}", MediaKind::Logo.as_str()))
        });

        let text = content_block(body, style);
        let buttons = render_buttons(&body.buttons, &style.css("button"));

        let mut root = shell(variant.as_str(), config, style);

        match variant {
            Variant::Default => {
                let (top_media, side_icon) = if is_icon { (None, media) } else { (media, None) };
                let row = icon_row(text, side_icon, &config.icon_defaults.position);
                root = root.maybe_child(top_media).child(row).maybe_child(buttons);
            }
            Variant::Compact => {
                if media.is_some() && !is_icon {
                    tracing::debug!("Compact variant drops non-icon media");
                }
                let icon = if is_icon { media } else { None };
                let row = Element::new("div")
                    .class("pinglet-row")
                    .css("display", "flex")
                    .css("align-items", "center")
                    .css("gap", "10px")
                    .maybe_child(icon)
                    .child(text)
                    .maybe_child(buttons);
                root = root.child(row);
            }
            Variant::Card => {
                let header = media.map(|m| {
                    Element::new("div")
                        .class("pinglet-card-media")
                        .css("margin", "-14px -16px 10px")
                        .child(m)
                });
                root = root.maybe_child(header).child(text).maybe_child(buttons);
            }
            Variant::Banner => {
                let thumb = media.map(|m| m.css("max-width", "72px").css("max-height", "72px"));
                let row = Element::new("div")
                    .class("pinglet-row")
                    .css("display", "flex")
                    .css("align-items", "center")
                    .css("gap", "14px")
                    .maybe_child(thumb)
                    .child(text.css("flex", "1"))
                    .maybe_child(buttons);
                root = root.css("width", "100%").child(row);
            }
        }

        finish(root, config, style)
    }

    fn render_custom(
        &self,
        template_id: &str,
        template: &Template,
        data: &Value,
        config: &EffectiveConfig,
        style: &StyleDocument,
    ) -> Element {
        let root = shell("template", config, style).child(render_template(template_id, template, data));
        finish(root, config, style)
    }
}

/// Attribution element shown under toasts or once per session.
pub fn branding_element(config: &EffectiveConfig, style: &StyleDocument) -> Element {
    Element::new("div")
        .class("pinglet-branding")
        .styles(&style.css("branding"))
        .raw_html(config.branding.html.clone())
}

fn shell(variant: &str, config: &EffectiveConfig, style: &StyleDocument) -> Element {
    let theme = &config.theme;
    let mut root = Element::new("div")
        .class("pinglet-toast")
        .class(format!("pinglet-variant-{}", variant))
        .class(format!("pinglet-theme-{}", theme.mode))
        .class(format!("pinglet-enter-{}", config.transition.as_str()))
        .class(theme.custom_class.clone())
        .attr("role", "status")
        .attr("aria-live", "polite")
        .css("position", "relative")
        .styles(&style.css("toast"));

    if theme.rounded {
        root = root.class("pinglet-rounded").css("border-radius", "10px");
    }
    if theme.shadow {
        root = root
            .class("pinglet-shadow")
            .css("box-shadow", "0 8px 24px rgba(0, 0, 0, 0.15)");
    }
    if theme.border {
        root = root
            .class("pinglet-border")
            .css("border", "1px solid rgba(0, 0, 0, 0.1)");
    }
    root
}

fn finish(root: Element, config: &EffectiveConfig, style: &StyleDocument) -> Element {
    let close = config.dismissible.then(|| {
        Element::new("button")
            .class("pinglet-close")
            .attr("type", "button")
            .attr("aria-label", "Close")
            .css("position", "absolute")
            .css("top", "6px")
            .css("right", "8px")
            .text("\u{00d7}")
            .on_click(ClickBinding::Close)
    });

    let bar = &config.progress_bar;
    let progress = (bar.show && config.auto_dismiss && config.duration > 0).then(|| {
        Element::new("div")
            .class("pinglet-progress")
            .css("position", "absolute")
            .css("left", "0")
            .css("bottom", "0")
            .css("height", format!("{}px", bar.height))
            .css("background", bar.color.clone())
            .css("animation-duration", format!("{}ms", config.duration))
            .styles(&style.css("progressBar"))
    });

    root.maybe_child(close).maybe_child(progress)
}

fn content_block(body: &ToastBody, style: &StyleDocument) -> Element {
    let title = (!body.title.is_empty()).then(|| {
        Element::new("h4")
            .class("pinglet-title")
            .styles(&style.css("title"))
            .text(body.title.clone())
    });
    let description = (!body.description.is_empty()).then(|| {
        Element::new("p")
            .class("pinglet-description")
            .styles(&style.css("description"))
            .text(body.description.clone())
    });

    Element::new("div")
        .class("pinglet-content")
        .maybe_child(title)
        .maybe_child(description)
}

fn icon_row(text: Element, icon: Option<Element>, position: &str) -> Element {
    let Some(icon) = icon else {
        return text;
    };

    let row = Element::new("div").class("pinglet-row").css("gap", "10px");
    match position {
        "top" => row.css("display", "block").child(icon).child(text),
        "right" => row
            .css("display", "flex")
            .css("align-items", "flex-start")
            .child(text)
            .child(icon),
        _ => row
            .css("display", "flex")
            .css("align-items", "flex-start")
            .child(icon)
            .child(text),
    }
}
