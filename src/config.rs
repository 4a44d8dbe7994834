//! Carga y gestión de configuración de la aplicación (artefactos + servidor).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use url::Url;

pub const DEFAULT_DOWNLOAD_URL: &str = "https://drive.google.com/uc?export=download";
pub const DEFAULT_MAX_FEATURES: usize = 40530;

/// Cómo se aceptan los artefactos descargados.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// El fichero se acepta tal cual.
    Plain,
    /// Se deserializa tras la descarga; si falla se borra.
    Validated,
    /// Se descarga un `.zip` y se extrae en el directorio de artefactos.
    Archive,
}

impl FetchMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "validated" => Ok(Self::Validated),
            "archive" => Ok(Self::Archive),
            other => Err(anyhow!("Modo de descarga no soportado: {other}")),
        }
    }
}

/// Procedencia del vectorizador; se fija al desplegar, nunca por petición.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorizerSource {
    /// Vectorizador ya ajustado, leído de `tfidf_vectorizer.json`.
    Persisted,
    /// Se reajusta con el CSV de entrenamiento en cada predicción.
    Refit { max_features: usize },
}

impl VectorizerSource {
    pub fn from_parts(source: &str, max_features: usize) -> Result<Self> {
        match source.to_lowercase().as_str() {
            "persisted" => Ok(Self::Persisted),
            "refit" => Ok(Self::Refit { max_features }),
            other => Err(anyhow!("Procedencia de vectorizador no soportada: {other}")),
        }
    }
}

/// Identificadores remotos de cada artefacto.
#[derive(Clone, Debug)]
pub struct RemoteIds {
    pub model: String,
    pub vectorizer: String,
    pub training_data: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub open_browser: bool,

    pub artifact_dir: PathBuf,
    pub download_url: Url,
    pub fetch_mode: FetchMode,
    pub vectorizer_source: VectorizerSource,
    pub remote_ids: RemoteIds,

    pub logo_path: PathBuf,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8501".to_string());
        let open_browser =
            parse_bool(&env::var("OPEN_BROWSER").unwrap_or_else(|_| "true".to_string()))?;

        let artifact_dir =
            PathBuf::from(env::var("ARTIFACT_DIR").unwrap_or_else(|_| ".".to_string()));

        let download_url_str =
            env::var("DOWNLOAD_URL").unwrap_or_else(|_| DEFAULT_DOWNLOAD_URL.to_string());
        let download_url = Url::parse(&download_url_str)
            .with_context(|| format!("DOWNLOAD_URL no es una URL válida: {download_url_str}"))?;

        let fetch_mode_str = env::var("FETCH_MODE").unwrap_or_else(|_| "plain".to_string());
        let fetch_mode = FetchMode::from_str(&fetch_mode_str)?;

        let max_features = match env::var("MAX_FEATURES") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| anyhow!("MAX_FEATURES debe ser un entero positivo: {raw}"))?,
            Err(_) => DEFAULT_MAX_FEATURES,
        };
        let source_str =
            env::var("VECTORIZER_SOURCE").unwrap_or_else(|_| "persisted".to_string());
        let vectorizer_source = VectorizerSource::from_parts(&source_str, max_features)?;

        let remote_ids = RemoteIds {
            model: env::var("MODEL_FILE_ID").unwrap_or_else(|_| "your_model_file_id".to_string()),
            vectorizer: env::var("VECTORIZER_FILE_ID")
                .unwrap_or_else(|_| "your_vectorizer_file_id".to_string()),
            training_data: env::var("DATA_FILE_ID")
                .unwrap_or_else(|_| "your_data_file_id".to_string()),
        };

        let logo_path =
            PathBuf::from(env::var("LOGO_PATH").unwrap_or_else(|_| "BookGenie.png".to_string()));

        Ok(Self {
            server_addr,
            open_browser,
            artifact_dir,
            download_url,
            fetch_mode,
            vectorizer_source,
            remote_ids,
            logo_path,
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("Valor booleano no válido: {other}")),
    }
}
