use super::{merge_config_layers, merge_style_layers, ConfigLayer, EffectiveConfig, StyleDocument};
use crate::backend::{BackendClient, ProjectResult};
use crate::error::{PingletError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Config and style for one notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub config: EffectiveConfig,
    pub style: StyleDocument,
}

#[derive(Debug, Clone)]
struct SessionLayers {
    project: ConfigLayer,
    template: ConfigLayer,
    is_premium: bool,
    base: Resolved,
}

pub struct ConfigResolver {
    backend: Arc<BackendClient>,
    layers: RwLock<Option<SessionLayers>>,
}

impl ConfigResolver {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            layers: RwLock::new(None),
        }
    }

    /// Fetch project configuration and compute the session's base config.
    pub async fn resolve(&self, project_id: &str, domain: &str) -> Result<Resolved> {
        let result = self.backend.load_project(project_id, domain).await?;
        self.install(result)
    }

    /// Cache the project/template layers from an already-fetched response.
    pub fn install(&self, result: ProjectResult) -> Result<Resolved> {
        if !(result.config.is_object() || result.config.is_null()) {
            return Err(PingletError::ConfigLoad("project config is not an object".to_string()));
        }

        let project = ConfigLayer::from_project(&result.config);
        let template = ConfigLayer::from_template(&result.template);
        let base = Self::compute(&[&project, &template], result.is_premium)
            .map_err(|e| PingletError::ConfigLoad(format!("invalid project config: {}", e)))?;

        tracing::info!(
            "Resolved config: position={}, duration={}ms, maxVisible={}",
            base.config.position.as_str(),
            base.config.duration,
            base.config.max_visible
        );

        *self.layers.write() = Some(SessionLayers {
            project,
            template,
            is_premium: result.is_premium,
            base: base.clone(),
        });
        Ok(base)
    }

    /// Config for one stream event. `template` replaces the project's default
    /// template layer (type-1 events); `overrides` is the notification layer.
    /// Invalid overrides are ignored rather than failing the event.
    pub fn resolve_for_event(
        &self,
        template: Option<&ConfigLayer>,
        overrides: Option<&Value>,
    ) -> Result<Resolved> {
        let guard = self.layers.read();
        let layers = guard
            .as_ref()
            .ok_or_else(|| PingletError::ConfigLoad("configuration not loaded".to_string()))?;

        let overrides = overrides
            .filter(|v| v.is_object())
            .map(ConfigLayer::from_overrides)
            .filter(|l| !l.is_empty());

        if template.is_none() && overrides.is_none() {
            return Ok(layers.base.clone());
        }

        let template = template.unwrap_or(&layers.template);
        let with_overrides = match &overrides {
            Some(o) => Self::compute(&[&layers.project, template, o], layers.is_premium),
            None => Self::compute(&[&layers.project, template], layers.is_premium),
        };

        match with_overrides {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                tracing::warn!("Ignoring invalid notification overrides: {}", e);
                Self::compute(&[&layers.project, template], layers.is_premium)
                    .map_err(|e| PingletError::ConfigLoad(e.to_string()))
            }
        }
    }

    pub fn current(&self) -> Option<Resolved> {
        self.layers.read().as_ref().map(|l| l.base.clone())
    }

    fn compute(layers: &[&ConfigLayer], is_premium: bool) -> serde_json::Result<Resolved> {
        let mut config = merge_config_layers(layers)?;
        if !is_premium {
            // Free projects cannot hide the attribution
            config.branding.show = true;
        }
        Ok(Resolved {
            config,
            style: merge_style_layers(layers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{client_for, offline_client};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_resolver() -> ConfigResolver {
        ConfigResolver::new(Arc::new(offline_client()))
    }

    fn project(config: Value, template: Value, is_premium: bool) -> ProjectResult {
        ProjectResult {
            config,
            template,
            is_premium,
        }
    }

    #[tokio::test]
    async fn test_resolve_from_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/load/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "",
                "result": {
                    "config": {"duration": 1000, "position": "top-right"},
                    "template": {"config": {"duration": 2000}},
                    "is_premium": true
                }
            })))
            .mount(&server)
            .await;

        let resolver = ConfigResolver::new(Arc::new(client_for(&server)));
        let resolved = resolver.resolve("proj-1", "example.com").await.unwrap();
        assert_eq!(resolved.config.duration, 2000);
        assert_eq!(resolved.config.position.as_str(), "top-right");
    }

    #[tokio::test]
    async fn test_resolve_failure_leaves_resolver_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/load/projects"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resolver = ConfigResolver::new(Arc::new(client_for(&server)));
        let err = resolver.resolve("proj-1", "example.com").await.unwrap_err();
        assert!(matches!(err, PingletError::ConfigLoad(_)));
        assert!(resolver.current().is_none());
        assert!(resolver.resolve_for_event(None, None).is_err());
    }

    #[test]
    fn test_overrides_layer() {
        let resolver = offline_resolver();
        resolver
            .install(project(json!({"duration": 1000}), json!({"duration": 2000}), true))
            .unwrap();

        let with = resolver
            .resolve_for_event(None, Some(&json!({"duration": 3000})))
            .unwrap();
        assert_eq!(with.config.duration, 3000);

        let without = resolver.resolve_for_event(None, None).unwrap();
        assert_eq!(without.config.duration, 2000);
    }

    #[test]
    fn test_event_template_replaces_default_template() {
        let resolver = offline_resolver();
        resolver
            .install(project(json!({"duration": 1000}), json!({"duration": 2000, "maxVisible": 7}), true))
            .unwrap();

        let event_template = ConfigLayer::from_template(&json!({"config": {"duration": 4000}}));
        let resolved = resolver.resolve_for_event(Some(&event_template), None).unwrap();
        assert_eq!(resolved.config.duration, 4000);
        assert_eq!(resolved.config.max_visible, 3);
    }

    #[test]
    fn test_invalid_overrides_fall_back() {
        let resolver = offline_resolver();
        resolver.install(project(json!({"duration": 1000}), Value::Null, true)).unwrap();
        let resolved = resolver
            .resolve_for_event(None, Some(&json!({"duration": "later"})))
            .unwrap();
        assert_eq!(resolved.config.duration, 1000);
    }

    #[test]
    fn test_free_projects_keep_branding() {
        let resolver = offline_resolver();
        let resolved = resolver
            .install(project(json!({"branding": {"show": false}}), Value::Null, false))
            .unwrap();
        assert!(resolved.config.branding.show);

        let premium = resolver
            .install(project(json!({"branding": {"show": false}}), Value::Null, true))
            .unwrap();
        assert!(!premium.config.branding.show);
    }

    #[test]
    fn test_malformed_project_config() {
        let resolver = offline_resolver();
        let err = resolver.install(project(json!([1, 2]), Value::Null, true)).unwrap_err();
        assert!(matches!(err, PingletError::ConfigLoad(_)));

        let err = resolver
            .install(project(json!({"maxVisible": "many"}), Value::Null, true))
            .unwrap_err();
        assert!(matches!(err, PingletError::ConfigLoad(_)));
    }
}
