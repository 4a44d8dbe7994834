//! Taxonomía de errores del pipeline de predicción.
//!
//! Todos los fallos de componente acaban aquí y la capa HTTP los convierte en
//! un mensaje visible; ninguno debe tumbar el proceso.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenieError>;

#[derive(Debug, Error)]
pub enum GenieError {
    #[error("La descripción del libro está vacía")]
    EmptyInput,

    #[error("No se pudo descargar el artefacto '{remote_id}': {source}")]
    FetchFailed {
        remote_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Artefacto inválido en {}: {reason}", path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Error de E/S en {}: {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No se pudo cargar {}: {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Error al vectorizar el texto: {0}")]
    TransformFailed(String),

    #[error("Error del clasificador: {0}")]
    PredictFailed(String),

    #[error("El clasificador devolvió la etiqueta {0}, fuera del mapeo de géneros")]
    UnknownLabel(i64),
}

impl GenieError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoFailure {
            path: path.into(),
            source,
        }
    }

    /// Código estable que viaja al frontend.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::InvalidArtifact { .. } => "invalid_artifact",
            Self::IoFailure { .. } => "io_failure",
            Self::LoadFailed { .. } => "load_failed",
            Self::TransformFailed(_) => "transform_failed",
            Self::PredictFailed(_) => "predict_failed",
            Self::UnknownLabel(_) => "unknown_label",
        }
    }

    /// `UnknownLabel` es un error de configuración: reintentar no sirve.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownLabel(_))
    }
}
