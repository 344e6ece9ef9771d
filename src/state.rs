use crate::config::Position;
use crate::error::Result;
use crate::render::Element;
use crate::surface::DisplaySurface;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Widget settings: the script-tag attributes plus host-side options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSettings {
    pub endpoint: String,
    pub configured_domain: String,
    pub project_id: String,
    pub pinglet_id: String,
    #[serde(default)]
    pub load_templates: bool,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub testimonials: bool,
    /// Version the embedding page expects; defaults to the running version.
    #[serde(default)]
    pub version: Option<String>,
    /// HMAC secret; the script checksum is used when unset.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Ask for push permission on load.
    #[serde(default = "default_push_enabled")]
    pub push_enabled: bool,
    /// Headless surface only: hand redirect/open/link targets to the OS.
    #[serde(default)]
    pub open_links: bool,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_push_enabled() -> bool {
    true
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/api/v1".to_string(),
            configured_domain: String::new(),
            project_id: String::new(),
            pinglet_id: String::new(),
            load_templates: false,
            checksum: None,
            testimonials: false,
            version: None,
            signing_secret: None,
            push_enabled: true,
            open_links: false,
            store_path: None,
        }
    }
}

impl WidgetSettings {
    /// Load `settings.json` (if present), then apply `PINGLET_*` environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Self {
        let mut settings = match path {
            Some(path) if path.exists() => std::fs::read_to_string(path)
                .ok()
                .and_then(|s| match serde_json::from_str(&s) {
                    Ok(settings) => Some(settings),
                    Err(e) => {
                        tracing::warn!("Ignoring invalid settings file {:?}: {}", path, e);
                        None
                    }
                })
                .unwrap_or_default(),
            _ => WidgetSettings::default(),
        };
        settings.apply_env();
        settings
    }

    fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(v) = var("PINGLET_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = var("PINGLET_CONFIGURED_DOMAIN") {
            self.configured_domain = v;
        }
        if let Some(v) = var("PINGLET_PROJECT_ID") {
            self.project_id = v;
        }
        if let Some(v) = var("PINGLET_ID") {
            self.pinglet_id = v;
        }
        if let Some(v) = var("PINGLET_CHECKSUM") {
            self.checksum = Some(v);
        }
        if let Some(v) = var("PINGLET_SIGNING_SECRET") {
            tracing::info!("Using PINGLET_SIGNING_SECRET from environment variable");
            self.signing_secret = Some(v);
        }
        if let Some(v) = var("PINGLET_LOAD_TEMPLATES") {
            self.load_templates = parse_flag(&v);
        }
        if let Some(v) = var("PINGLET_STORE_PATH") {
            self.store_path = Some(PathBuf::from(v));
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// `"true"`, `"1"`, `"yes"` and the empty attribute (`data-x`) are on.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "" | "true" | "1" | "yes")
}

/// Small persisted key/value store standing in for `localStorage`.
pub struct ClientStore {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, String>>,
}

pub const SUBSCRIPTION_KEY: &str = "subscription";

impl ClientStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn open(path: PathBuf) -> Self {
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self {
            path: Some(path),
            values: RwLock::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        self.persist()
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        self.persist()
    }

    pub fn subscription_flag(&self) -> bool {
        self.get(SUBSCRIPTION_KEY).as_deref() == Some("true")
    }

    pub fn set_subscription_flag(&self, on: bool) -> Result<()> {
        if on {
            self.set(SUBSCRIPTION_KEY, "true")
        } else {
            self.remove(SUBSCRIPTION_KEY)
        }
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.values.read())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Per-page resources: the one toast container, the one branding element
/// and the one audio player, each created on first use.
pub struct RuntimeSession {
    pub id: String,
    surface: Arc<dyn DisplaySurface>,
    container: Mutex<Option<Position>>,
    branding_rendered: AtomicBool,
    audio_ready: AtomicBool,
}

impl RuntimeSession {
    pub fn new(surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            id: format!("pinglet-{}", uuid::Uuid::new_v4()),
            surface,
            container: Mutex::new(None),
            branding_rendered: AtomicBool::new(false),
            audio_ready: AtomicBool::new(false),
        }
    }

    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }

    /// Mount the container on first use. Later calls keep the original
    /// position.
    pub fn ensure_container(&self, position: Position) -> Position {
        let mut container = self.container.lock();
        match *container {
            Some(existing) => existing,
            None => {
                self.surface.mount_container(position);
                *container = Some(position);
                position
            }
        }
    }

    pub fn has_container(&self) -> bool {
        self.container.lock().is_some()
    }

    /// Attach the session-level branding element unless it already exists.
    pub fn ensure_branding(&self, element: &Element) -> bool {
        if self.branding_rendered.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.surface.attach_branding(element);
        true
    }

    pub fn branding_rendered(&self) -> bool {
        self.branding_rendered.load(Ordering::SeqCst)
    }

    pub fn play_sound(&self, src: &str, volume: f64) {
        if !self.audio_ready.swap(true, Ordering::SeqCst) {
            self.surface.create_audio_player();
        }
        self.surface.play_sound(src, volume.clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingSurface, SurfaceOp};
    use tempfile::tempdir;

    #[test]
    fn test_store_persists_subscription_flag() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.json");

        let store = ClientStore::open(path.clone());
        assert!(!store.subscription_flag());
        store.set_subscription_flag(true).unwrap();

        let reopened = ClientStore::open(path.clone());
        assert!(reopened.subscription_flag());
        assert_eq!(reopened.get(SUBSCRIPTION_KEY).as_deref(), Some("true"));

        reopened.set_subscription_flag(false).unwrap();
        assert!(!ClientStore::open(path).subscription_flag());
    }

    #[test]
    fn test_settings_roundtrip_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("settings.json");
        let settings = WidgetSettings {
            project_id: "p1".to_string(),
            checksum: Some("c".to_string()),
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let loaded = WidgetSettings::load(Some(&path));
        assert_eq!(loaded.checksum.as_deref(), Some("c"));
        assert!(loaded.push_enabled);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(""));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_session_singletons_created_once() {
        let surface = Arc::new(RecordingSurface::default());
        let session = RuntimeSession::new(surface.clone());

        assert_eq!(session.ensure_container(Position::TopLeft), Position::TopLeft);
        assert_eq!(session.ensure_container(Position::BottomRight), Position::TopLeft);

        let branding = Element::new("div").class("pinglet-branding");
        assert!(session.ensure_branding(&branding));
        assert!(!session.ensure_branding(&branding));

        session.play_sound("a.mp3", 2.0);
        session.play_sound("a.mp3", 0.3);

        let ops = surface.ops();
        assert_eq!(ops.iter().filter(|op| matches!(op, SurfaceOp::MountContainer(_))).count(), 1);
        assert_eq!(ops.iter().filter(|op| matches!(op, SurfaceOp::AttachBranding)).count(), 1);
        assert_eq!(ops.iter().filter(|op| matches!(op, SurfaceOp::CreateAudio)).count(), 1);
        assert!(ops.contains(&SurfaceOp::PlaySound("a.mp3".to_string(), 1.0)));
    }
}
