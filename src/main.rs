// Módulos de la aplicación
mod api;
mod app_state;
mod artifacts;
mod classifier;
mod config;
mod error;
mod fetch;
mod genre;
mod predict;
mod text;
mod ui;
mod vectorizer;

use crate::app_state::{AppState, Status};
use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env()?;
    info!(
        "Artefactos en {} (modo {:?}, vectorizador {:?}).",
        cfg.artifact_dir.display(),
        cfg.fetch_mode,
        cfg.vectorizer_source
    );

    // 3. Preparar almacén de artefactos y servicio de predicción
    let store = artifacts::ArtifactStore::from_config(&cfg)?;
    let predictor = predict::PredictionService::new(store, text::Normalizer::default());
    let ui_config = ui::UiConfig::from_config(&cfg);
    if !ui_config.logo_available() {
        info!(
            "Logo no encontrado en {}; la cabecera se mostrará sin imagen.",
            ui_config.logo_path.display()
        );
    }

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        ui: Arc::new(ui_config),
        predictor: Arc::new(predictor),
        status: Arc::new(Mutex::new(Status::ready())),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr).await?;
    let server_url = format!("http://{}", listener.local_addr()?);
    info!("🚀 Servidor escuchando en {}", &server_url);

    if app_state.config.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
    {
        error!("El servidor terminó con error: {}", err);
        return Err(err.into());
    }

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
