use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{routing::get, Router};
use shared::ArConfig;
use tower_http::{cors::CorsLayer, services::ServeDir};

mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArConfig>,
}

/// Read the gallery config, falling back to defaults when missing or malformed
fn load_config(path: &Path) -> ArConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("No config at {}: {e}; serving defaults", path.display());
            return ArConfig::default();
        }
    };
    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Malformed config {}: {e}; serving defaults", path.display());
            ArConfig::default()
        }
    }
}

fn app(state: AppState, models_dir: PathBuf) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/config", get(routes::config))
        .route("/api/models", get(routes::list_models))
        .route("/api/models/{id}", get(routes::get_model))
        .nest_service("/models", ServeDir::new(models_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path =
        PathBuf::from(std::env::var("AR_CONFIG").unwrap_or_else(|_| "config/models.json".into()));
    let models_dir =
        PathBuf::from(std::env::var("AR_MODELS_DIR").unwrap_or_else(|_| "models".into()));
    let addr = std::env::var("AR_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    let config = load_config(&config_path);
    tracing::info!(
        "Serving {} models from {}",
        config.models.len(),
        models_dir.display()
    );

    let state = AppState {
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Model server running on http://{addr}");
    axum::serve(listener, app(state, models_dir)).await
}
