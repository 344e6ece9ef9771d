//! Custom HTML/CSS templates (`type 1` notifications).

use super::{escape_html, Element};
use crate::config::ConfigLayer;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex"));

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub style: Option<Value>,
}

impl Template {
    /// The template's own config/style as a precedence layer.
    pub fn layer(&self) -> ConfigLayer {
        let mut sections = serde_json::Map::new();
        if let Some(config) = &self.config {
            sections.insert("config".to_string(), config.clone());
        }
        if let Some(style) = &self.style {
            sections.insert("style".to_string(), style.clone());
        }
        ConfigLayer::from_template(&Value::Object(sections))
    }
}

/// Replace `{{ key }}` (dotted paths allowed) with HTML-escaped values from
/// `data`. Unknown keys render as empty strings.
pub fn substitute(source: &str, data: &Value) -> String {
    PLACEHOLDER_REGEX
        .replace_all(source, |caps: &regex::Captures| {
            lookup(data, &caps[1]).map(|v| escape_html(&v)).unwrap_or_default()
        })
        .into_owned()
}

fn lookup(data: &Value, path: &str) -> Option<String> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn render_template(template_id: &str, template: &Template, data: &Value) -> Element {
    let mut el = Element::new("div")
        .class("pinglet-template")
        .attr("data-template-id", template_id);

    if let Some(css) = template.css.as_deref().filter(|c| !c.trim().is_empty()) {
        el = el.child(Element::new("style").raw_html(substitute(css, data)));
    }

    el.child(Element::new("div").class("pinglet-template-body").raw_html(substitute(&template.html, data)))
}
