//! Wire types and signed HTTP client for the Pinglet backend.

mod client;

pub use client::*;

use crate::render::Template;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Who this widget instance is, as sent on every signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetIdentity {
    pub project_id: String,
    pub pinglet_id: String,
    pub configured_domain: String,
    pub checksum: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<ProjectResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectResult {
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub template: Value,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Deserialize)]
pub struct TemplatesResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: HashMap<String, Template>,
}

#[derive(Debug, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Browser push subscription as produced by `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default, rename = "expirationTime", skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub endpoint: String,
    pub project_id: String,
}
