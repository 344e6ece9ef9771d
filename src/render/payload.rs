//! Notification payloads as they arrive on the stream.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Raw stream message: `{type, template_id?, data?, body?, overrides?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type", deserialize_with = "type_tag")]
    pub kind: i64,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub overrides: Option<Value>,
}

/// The backend sends the tag as `"0"` or `0` depending on the producer.
fn type_tag<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("type must be an integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid type tag '{}'", s))),
        other => Err(serde::de::Error::custom(format!("invalid type tag {}", other))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    /// `type -1`: delivered by the service worker while the page is closed.
    Native(Value),
    /// `type 0`: styled in-tab toast.
    Toast(ToastBody),
    /// `type 1`: custom template with variable data.
    Template { template_id: String, data: Value },
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ToastBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub media: Option<MediaSpec>,
    #[serde(default)]
    pub buttons: Vec<ButtonSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MediaSpec {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub autoplay: Option<bool>,
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default, rename = "loop")]
    pub looping: Option<bool>,
    #[serde(default)]
    pub controls: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ButtonSpec {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl StreamEvent {
    /// Typed payload, or `Ok(None)` for a type tag this runtime does not know.
    pub fn payload(&self) -> std::result::Result<Option<NotificationPayload>, String> {
        match self.kind {
            -1 => Ok(Some(NotificationPayload::Native(
                self.body.clone().or_else(|| self.data.clone()).unwrap_or(Value::Null),
            ))),
            0 => {
                let body = self
                    .body
                    .clone()
                    .or_else(|| self.data.clone())
                    .ok_or_else(|| "toast event has no body".to_string())?;
                let body: ToastBody =
                    serde_json::from_value(body).map_err(|e| format!("invalid toast body: {}", e))?;
                Ok(Some(NotificationPayload::Toast(body)))
            }
            1 => {
                let template_id = self
                    .template_id
                    .clone()
                    .ok_or_else(|| "template event has no template_id".to_string())?;
                Ok(Some(NotificationPayload::Template {
                    template_id,
                    data: self.data.clone().unwrap_or(Value::Null),
                }))
            }
            _ => Ok(None),
        }
    }
}
