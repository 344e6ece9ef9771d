//! Layer merging.
//!
//! Precedence, lowest first: built-in defaults, project, template,
//! per-notification overrides. The config tree merges per top-level key (a
//! nested object at a higher layer replaces the whole key); the style tree
//! merges one level deeper, so `{"title": {"color": ..}}` only touches
//! `title.color`.

use super::{EffectiveConfig, StyleDocument};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

static DEFAULT_STYLE: Lazy<Map<String, Value>> = Lazy::new(|| {
    let value = json!({
        "toast": {
            "background": "#ffffff",
            "color": "#111827",
            "padding": "14px 16px",
            "width": "340px",
            "font-family": "system-ui, sans-serif"
        },
        "title": {"font-size": "15px", "font-weight": "600", "margin": "0 0 4px"},
        "description": {"font-size": "13px", "line-height": "1.4", "margin": "0"},
        "button": {
            "padding": "6px 12px",
            "border-radius": "6px",
            "border": "none",
            "cursor": "pointer"
        },
        "branding": {"font-size": "11px", "opacity": "0.7", "text-align": "right"},
        "progressBar": {},
        "media": {}
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
});

/// One precedence layer, already split into its config and style parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    pub config: Map<String, Value>,
    pub style: Map<String, Value>,
}

impl ConfigLayer {
    /// Project layer: `result.config`, with styles under its `style` key.
    pub fn from_project(value: &Value) -> Self {
        Self::split(value)
    }

    /// Template layer: either `{config, style}` or a bare config object.
    pub fn from_template(value: &Value) -> Self {
        let has_sections = value.get("config").is_some_and(Value::is_object)
            || value.get("style").is_some_and(Value::is_object);
        if !has_sections {
            return Self::split(value);
        }
        Self {
            config: object(value.get("config")),
            style: object(value.get("style")),
        }
    }

    /// Per-notification `overrides`, with styles under its `style` key.
    pub fn from_overrides(value: &Value) -> Self {
        Self::split(value)
    }

    fn split(value: &Value) -> Self {
        let mut config = object(Some(value));
        let style = match config.remove("style") {
            Some(Value::Object(style)) => style,
            _ => Map::new(),
        };
        Self { config, style }
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty() && self.style.is_empty()
    }
}

fn object(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Merge config trees over the built-in defaults.
pub fn merge_config_layers(layers: &[&ConfigLayer]) -> serde_json::Result<EffectiveConfig> {
    let mut merged = match serde_json::to_value(EffectiveConfig::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for layer in layers {
        for (key, value) in &layer.config {
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    serde_json::from_value(Value::Object(merged))
}

/// Merge style trees over the built-in style, two levels deep.
pub fn merge_style_layers(layers: &[&ConfigLayer]) -> StyleDocument {
    let mut merged = DEFAULT_STYLE.clone();

    for layer in layers {
        for (key, value) in &layer.style {
            if value.is_null() {
                continue;
            }
            match (merged.get_mut(key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    for (sub_key, sub_value) in incoming {
                        if !sub_value.is_null() {
                            existing.insert(sub_key.clone(), sub_value.clone());
                        }
                    }
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }

    StyleDocument(merged)
}
