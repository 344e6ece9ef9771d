pub mod backend;
pub mod config;
pub mod error;
pub mod push;
pub mod render;
pub mod signing;
pub mod state;
pub mod stream;
pub mod surface;
pub mod toast;
pub mod widget;

#[cfg(test)]
pub mod test_utils;

use error::Result;
use push::UnsupportedPushPlatform;
use state::{ClientStore, WidgetSettings};
use std::path::PathBuf;
use std::sync::Arc;
use surface::HeadlessSurface;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use widget::Widget;

/// Runtime version, compared against the optional `data-version` attribute.
pub const PINGLET_VERSION: &str = env!("CARGO_PKG_VERSION");

const SETTINGS_FILE: &str = "settings.json";

/// Headless entry point. `args` are `data-*=value` script attributes that
/// override `settings.json` and the environment.
pub fn run(args: Vec<String>) -> Result<()> {
    // Load environment variables from .env file (for development)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pinglet=debug,pinglet_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pinglet {}", PINGLET_VERSION);

    let settings_path = std::env::var("PINGLET_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(SETTINGS_FILE));
    let base = WidgetSettings::load(Some(settings_path.as_path()));
    let attributes: Vec<(String, String)> = args
        .iter()
        .filter_map(|arg| arg.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let settings = widget::apply_script_attributes(
        base,
        attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );

    let store = Arc::new(match &settings.store_path {
        Some(path) => ClientStore::open(path.clone()),
        None => ClientStore::in_memory(),
    });
    let surface = Arc::new(HeadlessSurface::new(settings.open_links));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let widget = Widget::launch(settings, surface, Arc::new(UnsupportedPushPlatform), store)?;
        widget.start_or_await_retry().await?;

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for shutdown signal: {}", e);
        }
        widget.shutdown();
        Ok::<(), error::PingletError>(())
    })
}
