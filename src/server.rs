// Local development server: serves the app's `assets/` directory and an
// `/app.json` document describing a single local installation, so the app
// can be loaded into the helpdesk UI straight from disk.

use crate::manifest::Manifest;
use crate::settings::{self, Settings};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

pub const DEFAULT_PORT: u16 = 4567;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const ASSETS_DIR: &str = "assets";

/// Id given to the app and its installation while served locally.
const LOCAL_ID: u64 = 0;

#[derive(Clone)]
pub struct ServerState {
    pub app_dir: PathBuf,
    pub config: PathBuf,
}

pub fn router(state: ServerState) -> Router {
    let assets = ServeDir::new(state.app_dir.join(ASSETS_DIR));
    Router::new()
        .route("/app.json", get(app_json))
        .with_state(Arc::new(state))
        .fallback_service(assets)
        .layer(CorsLayer::permissive())
}

pub async fn serve(addr: SocketAddr, state: ServerState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("serving {} on http://{}", state.app_dir.display(), addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// GET /app.json
async fn app_json(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, (StatusCode, String)> {
    let manifest = Manifest::load(&state.app_dir).map_err(internal_error)?;
    let file = settings::from_file(&state.config)
        .map_err(internal_error)?
        .unwrap_or_default();
    Ok(Json(app_document(&manifest, &file)))
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    log::warn!("app.json failed: {:#}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
}

/// Configured values, falling back to manifest defaults.
fn installation_settings(manifest: &Manifest, file: &Settings) -> Settings {
    let mut settings = Settings::new();
    for parameter in &manifest.parameters {
        if let Some(value) = file.get(&parameter.name).or(parameter.default.as_ref()) {
            settings.insert(parameter.name.clone(), value.clone());
        }
    }
    settings
}

fn app_document(manifest: &Manifest, file: &Settings) -> Value {
    let name = manifest.name.clone().unwrap_or_else(|| "Local App".to_string());
    let mut settings = installation_settings(manifest, file);
    settings.insert("title".to_string(), Value::String(name.clone()));

    json!({
        "apps": [{
            "id": LOCAL_ID,
            "name": name,
            "version": manifest.version,
            "framework_version": manifest.framework_version,
            "default_locale": manifest.default_locale,
            "location": manifest.location,
            "requirements_only": manifest.requirements_only,
        }],
        "installations": [{
            "id": LOCAL_ID,
            "app_id": LOCAL_ID,
            "name": name,
            "enabled": true,
            "settings": settings,
        }],
    })
}

impl ServerState {
    pub fn new(app_dir: &Path, config: &Path) -> Self {
        let config = if config.is_absolute() {
            config.to_path_buf()
        } else {
            app_dir.join(config)
        };
        Self {
            app_dir: app_dir.to_path_buf(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::testing::write_app;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::ORIGIN, "https://acme.zendesk.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    #[tokio::test]
    async fn app_json_merges_settings_with_defaults() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path());
        std::fs::write(dir.path().join("settings.yml"), "token: abc\n").unwrap();

        let app = router(ServerState::new(dir.path(), Path::new("settings.yml")));
        let (status, headers, body) = get(app, "/app.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let doc: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc["apps"][0]["name"], "Hello");
        let settings = &doc["installations"][0]["settings"];
        assert_eq!(settings["token"], "abc");
        assert_eq!(settings["color"], "blue");
        assert_eq!(settings["title"], "Hello");
    }

    #[tokio::test]
    async fn serves_assets() {
        let dir = TempDir::new().unwrap();
        write_app(dir.path());

        let app = router(ServerState::new(dir.path(), Path::new("settings.yml")));
        let (status, _, body) = get(app.clone(), "/iframe.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<html></html>");

        let (status, _, _) = get(app, "/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn broken_manifest_is_a_server_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.json"), "{").unwrap();

        let app = router(ServerState::new(dir.path(), Path::new("settings.yml")));
        let (status, _, _) = get(app, "/app.json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
