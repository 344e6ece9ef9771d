//! Media sub-renderers, one per media kind.

use super::{Element, MediaSpec};
use crate::config::{Css, IconDefaults, StyleDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Icon,
    Logo,
    Iframe,
}

impl MediaKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "image" | "img" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            "icon" => Some(MediaKind::Icon),
            "logo" => Some(MediaKind::Logo),
            "iframe" => Some(MediaKind::Iframe),
            _ => None,
        }
    }

    /// Guess from the source's file extension when the payload has no type.
    pub fn infer(src: &str) -> Option<Self> {
        let path = src.split(['?', '#']).next().unwrap_or(src);
        let mime = mime_guess::from_path(path).first()?;
        match mime.type_().as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Icon => "icon",
            MediaKind::Logo => "logo",
            MediaKind::Iframe => "iframe",
        }
    }

    fn default_css(&self, icons: &IconDefaults) -> Css {
        let pairs: Vec<(&str, String)> = match self {
            MediaKind::Image => vec![
                ("width", "100%".into()),
                ("max-height", "180px".into()),
                ("object-fit", "cover".into()),
                ("border-radius", "8px".into()),
            ],
            MediaKind::Video => vec![
                ("width", "100%".into()),
                ("max-height", "200px".into()),
                ("border-radius", "8px".into()),
            ],
            MediaKind::Audio => vec![("width", "100%".into())],
            MediaKind::Icon => vec![
                ("width", format!("{}px", icons.size)),
                ("height", format!("{}px", icons.size)),
                ("object-fit", "contain".into()),
                ("flex-shrink", "0".into()),
            ],
            MediaKind::Logo => vec![("height", "32px".into()), ("width", "auto".into())],
            MediaKind::Iframe => vec![
                ("width", "100%".into()),
                ("height", "200px".into()),
                ("border", "none".into()),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// Render one media element. Returns `None` for an unknown kind, a missing
/// source, or an icon while icons are switched off.
pub fn render_media(media: &MediaSpec, icons: &IconDefaults, style: &StyleDocument) -> Option<Element> {
    if media.src.trim().is_empty() {
        return None;
    }

    let kind = match media.kind.as_deref() {
        Some(k) => match MediaKind::parse(k) {
            Some(kind) => kind,
            None => {
                tracing::warn!("Skipping media with unsupported type '{}'", k);
                return None;
            }
        },
        None => MediaKind::infer(&media.src)?,
    };

    if kind == MediaKind::Icon && !icons.show {
        return None;
    }

    let mut css = kind.default_css(icons);
    css.extend(style.media_css(kind.as_str()));

    let el = match kind {
        MediaKind::Image | MediaKind::Icon | MediaKind::Logo => Element::new("img")
            .attr("src", media.src.clone())
            .attr("alt", media.alt.clone().unwrap_or_default()),
        MediaKind::Video => Element::new("video")
            .attr("src", media.src.clone())
            .flag("autoplay", media.autoplay.unwrap_or(false))
            .flag("muted", media.muted.unwrap_or(true))
            .flag("loop", media.looping.unwrap_or(false))
            .flag("controls", media.controls.unwrap_or(true))
            .flag("playsinline", true),
        MediaKind::Audio => Element::new("audio")
            .attr("src", media.src.clone())
            .flag("autoplay", media.autoplay.unwrap_or(false))
            .flag("muted", media.muted.unwrap_or(false))
            .flag("loop", media.looping.unwrap_or(false))
            .flag("controls", media.controls.unwrap_or(true)),
        MediaKind::Iframe => Element::new("iframe")
            .attr("src", media.src.clone())
            .attr("sandbox", "allow-scripts allow-same-origin")
            .attr("loading", "lazy"),
    };

    Some(
        el.class("pinglet-media")
            .class(format!("pinglet-media-{}", kind.as_str()))
            .styles(&css),
    )
}
