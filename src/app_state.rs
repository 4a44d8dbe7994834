use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{config::AppConfig, predict::PredictionService, ui::UiConfig};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ui: Arc<UiConfig>,
    pub predictor: Arc<PredictionService>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}

impl Status {
    pub fn ready() -> Self {
        Self {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        }
    }

    /// Marca la etapa en curso de la predicción.
    pub fn stage(status: &Mutex<Status>, message: &str, progress: f32) {
        let mut status = status.lock().unwrap();
        status.is_busy = true;
        status.message = message.to_string();
        status.progress = progress;
    }

    pub fn finish(status: &Mutex<Status>, message: String) {
        let mut status = status.lock().unwrap();
        status.is_busy = false;
        status.message = message;
        status.progress = 0.0;
    }
}
