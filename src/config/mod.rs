//! Effective configuration: the typed config tree, the style document, and
//! the resolver that layers them.

mod merge;
mod resolver;

pub use merge::{merge_config_layers, merge_style_layers, ConfigLayer};
pub use resolver::{ConfigResolver, Resolved};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::TopLeft => "top-left",
            Position::TopRight => "top-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomRight => "bottom-right",
        }
    }

    /// Newest toast goes nearest the screen edge it is anchored to.
    pub fn is_top(&self) -> bool {
        matches!(self, Position::TopLeft | Position::TopRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Fade,
    Slide,
    Zoom,
    None,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Fade => "fade",
            Transition::Slide => "slide",
            Transition::Zoom => "zoom",
            Transition::None => "none",
        }
    }

    /// How long the exit animation runs before the element is detached.
    pub fn exit_duration_ms(&self) -> u64 {
        match self {
            Transition::None => 0,
            _ => 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    pub show: bool,
    pub once: bool,
    pub html: String,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            show: true,
            once: true,
            html: "Notifications by <strong>Pinglet</strong>".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub play: bool,
    pub src: String,
    pub volume: f64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            play: false,
            src: String::new(),
            volume: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeConfig {
    pub mode: String,
    pub custom_class: String,
    pub rounded: bool,
    pub shadow: bool,
    pub border: bool,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            mode: "light".to_string(),
            custom_class: String::new(),
            rounded: true,
            shadow: true,
            border: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconDefaults {
    pub show: bool,
    pub size: u32,
    pub position: String,
}

impl Default for IconDefaults {
    fn default() -> Self {
        Self {
            show: true,
            size: 40,
            position: "left".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressBarConfig {
    pub show: bool,
    pub color: String,
    pub height: u32,
}

impl Default for ProgressBarConfig {
    fn default() -> Self {
        Self {
            show: true,
            color: "#4f46e5".to_string(),
            height: 3,
        }
    }
}

/// The single configuration one notification renders with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub position: Position,
    pub transition: Transition,
    pub branding: BrandingConfig,
    pub sound: SoundConfig,
    /// Milliseconds before an auto-dismissed toast is removed.
    pub duration: u64,
    pub max_visible: usize,
    pub stacking: bool,
    #[serde(rename = "auto_dismiss")]
    pub auto_dismiss: bool,
    pub dismissible: bool,
    pub pause_on_hover: bool,
    pub theme: ThemeConfig,
    pub icon_defaults: IconDefaults,
    pub progress_bar: ProgressBarConfig,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            position: Position::default(),
            transition: Transition::default(),
            branding: BrandingConfig::default(),
            sound: SoundConfig::default(),
            duration: 5000,
            max_visible: 3,
            stacking: true,
            auto_dismiss: true,
            dismissible: true,
            pause_on_hover: true,
            theme: ThemeConfig::default(),
            icon_defaults: IconDefaults::default(),
            progress_bar: ProgressBarConfig::default(),
        }
    }
}

impl EffectiveConfig {
    /// Visible capacity actually enforced. Without stacking only one toast
    /// is shown at a time; zero is treated as one.
    pub fn capacity(&self) -> usize {
        if self.stacking {
            self.max_visible.max(1)
        } else {
            1
        }
    }
}

/// CSS property map for one styled element.
pub type Css = BTreeMap<String, String>;

/// Style tree merged independently of [`EffectiveConfig`]. Top-level keys
/// name an element (`toast`, `title`, `description`, `button`, `branding`,
/// `progressBar`, `media`); values are CSS maps, except `media` which maps a
/// media kind to its CSS map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleDocument(pub Map<String, Value>);

impl StyleDocument {
    pub fn css(&self, key: &str) -> Css {
        self.0.get(key).map(css_from_value).unwrap_or_default()
    }

    pub fn media_css(&self, kind: &str) -> Css {
        self.0
            .get("media")
            .and_then(|m| m.get(kind))
            .map(css_from_value)
            .unwrap_or_default()
    }
}

fn css_from_value(value: &Value) -> Css {
    let Some(map) = value.as_object() else {
        return Css::new();
    };
    map.iter()
        .filter_map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((k.clone(), v))
        })
        .collect()
}
