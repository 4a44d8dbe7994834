use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    app_state::{AppState, Status},
    error::GenieError,
    genre::Genre,
    ui,
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct PredictPayload {
    #[serde(default)]
    description: String,
}

#[derive(Serialize)]
pub struct PredictResponse {
    genre: Genre,
    label: i64,
    normalized: String,
    request_id: Uuid,
    predicted_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct GenreInfo {
    label: i64,
    name: &'static str,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/logo", get(logo_handler))
        .route("/api/predict", post(predict_handler))
        .route("/api/status", get(status_handler))
        .route("/api/genres", get(genres_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(ui::render_page(&state.ui))
}

/// El logo es opcional: si no está, 404 y la página sigue funcionando.
#[axum::debug_handler]
async fn logo_handler(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let bytes = tokio::fs::read(&state.ui.logo_path).await.map_err(|e| {
        warn!("Logo no disponible en {}: {}", state.ui.logo_path.display(), e);
        StatusCode::NOT_FOUND
    })?;
    let mime = mime_guess::from_path(&state.ui.logo_path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes))
}

#[axum::debug_handler]
async fn predict_handler(
    State(state): State<AppState>,
    Json(payload): Json<PredictPayload>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("predict", %request_id);

    let result = state
        .predictor
        .predict(&payload.description, state.status.clone())
        .instrument(span.clone())
        .await;

    match result {
        Ok(prediction) => {
            Status::finish(
                &state.status,
                format!("Último género predicho: {}", prediction.genre),
            );
            Ok(Json(PredictResponse {
                genre: prediction.genre,
                label: prediction.label,
                normalized: prediction.normalized,
                request_id,
                predicted_at: Utc::now(),
            }))
        }
        Err(err) => {
            span.in_scope(|| {
                if err.is_recoverable() {
                    warn!("Predicción fallida ({}): {}", err.kind(), err);
                } else {
                    error!("Error de configuración del modelo: {}", err);
                }
            });
            Status::finish(&state.status, format!("Error: {}", err));
            Err(error_response(&err))
        }
    }
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.lock().unwrap().clone())
}

#[axum::debug_handler]
async fn genres_handler() -> Json<Vec<GenreInfo>> {
    Json(
        Genre::ALL
            .iter()
            .map(|genre| GenreInfo {
                label: genre.label(),
                name: genre.name(),
            })
            .collect(),
    )
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

fn error_response(err: &GenieError) -> ApiError {
    let status = match err {
        GenieError::EmptyInput => StatusCode::BAD_REQUEST,
        GenieError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
        GenieError::InvalidArtifact { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "kind": err.kind(),
            "recoverable": err.is_recoverable(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::write_artifacts;
    use crate::artifacts::ArtifactStore;
    use crate::config::{AppConfig, FetchMode, RemoteIds, VectorizerSource};
    use crate::fetch::tests::spawn_remote;
    use crate::predict::PredictionService;
    use crate::text::Normalizer;
    use crate::ui::UiConfig;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use url::Url;

    fn test_config(dir: &Path, download_url: Url) -> AppConfig {
        AppConfig {
            server_addr: "127.0.0.1:0".to_string(),
            open_browser: false,
            artifact_dir: dir.to_path_buf(),
            download_url,
            fetch_mode: FetchMode::Validated,
            vectorizer_source: VectorizerSource::Persisted,
            remote_ids: RemoteIds {
                model: "m".to_string(),
                vectorizer: "v".to_string(),
                training_data: "d".to_string(),
            },
            logo_path: dir.join("BookGenie.png"),
        }
    }

    async fn spawn_app(cfg: AppConfig) -> String {
        let store = ArtifactStore::from_config(&cfg).unwrap();
        let state = AppState {
            ui: Arc::new(UiConfig::from_config(&cfg)),
            predictor: Arc::new(PredictionService::new(store, Normalizer::default())),
            status: Arc::new(Mutex::new(Status::ready())),
            shutdown_sender: Arc::new(Mutex::new(None)),
            config: cfg,
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn predict_returns_genre_for_local_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        let (url, remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/predict"))
            .json(&json!({"description": "A thrilling crime in the city"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["genre"], "crime");
        assert_eq!(body["label"], 1);
        assert_eq!(body["normalized"], "a thrilling crime city");
        assert_eq!(remote.hits(), 0);
    }

    #[tokio::test]
    async fn empty_description_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (url, remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/predict"))
            .json(&json!({"description": ""}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "empty_input");
        assert_eq!(remote.hits(), 0);
    }

    #[tokio::test]
    async fn failed_download_is_reported_and_server_keeps_serving() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/api/predict"))
            .json(&json!({"description": "dragons"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "fetch_failed");
        assert_eq!(body["recoverable"], true);

        let status: serde_json::Value = client
            .get(format!("{base}/api/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["is_busy"], false);
    }

    #[tokio::test]
    async fn unknown_label_is_flagged_as_unrecoverable() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::write(
            dir.path().join(crate::artifacts::MODEL_FILE),
            r#"{"classes":[7,8],"coef":[[1.0,1.0,1.0,1.0]],"intercept":[0.0]}"#,
        )
        .unwrap();
        let (url, _remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/predict"))
            .json(&json!({"description": "no matching words"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "unknown_label");
        assert_eq!(body["recoverable"], false);
    }

    #[tokio::test]
    async fn index_renders_without_logo_and_logo_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;
        let client = reqwest::Client::new();

        let html = client.get(&base).send().await.unwrap().text().await.unwrap();
        assert!(html.contains("BookGenie"));
        assert!(!html.contains("/logo"));

        let logo = client.get(format!("{base}/logo")).send().await.unwrap();
        assert_eq!(logo.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logo_is_served_with_guessed_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("BookGenie.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let (url, _remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;

        let logo = reqwest::get(format!("{base}/logo")).await.unwrap();
        assert_eq!(logo.status(), reqwest::StatusCode::OK);
        assert_eq!(logo.headers()[reqwest::header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn genres_lists_the_six_entry_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let (url, _remote) = spawn_remote(&[], None).await;
        let base = spawn_app(test_config(dir.path(), url)).await;

        let genres: Vec<serde_json::Value> = reqwest::get(format!("{base}/api/genres"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(genres.len(), 6);
        assert_eq!(genres[5], json!({"label": 5, "name": "thriller"}));
    }
}
