//! Artefactos del clasificador: dónde viven, cómo se descargan y cómo se cargan.
//!
//! API pública:
//!   - `load_model`, `load_vectorizer`, `load_training_corpus`.
//!   - `ArtifactStore::ensure_all` para dejar los ficheros en disco.
//!   - `ArtifactLayout::load` para tenerlos en memoria listos para predecir.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::classifier::LinearSvm;
use crate::config::{AppConfig, FetchMode, RemoteIds, VectorizerSource};
use crate::error::{GenieError, Result};
use crate::fetch::{Acceptance, FetchOutcome, Fetcher, Validator};
use crate::text::Normalizer;
use crate::vectorizer::TfidfVectorizer;

pub const MODEL_FILE: &str = "svm_model.json";
pub const VECTORIZER_FILE: &str = "tfidf_vectorizer.json";
pub const TRAINING_DATA_FILE: &str = "X_train_tfidf.csv";

/// Columna del CSV de entrenamiento con el texto combinado de cada libro.
pub const TEXT_COLUMN: &str = "Combined_Text";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| GenieError::LoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| GenieError::LoadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn load_model(path: &Path) -> Result<LinearSvm> {
    let model: LinearSvm = read_json(path)?;
    model.validate().map_err(|reason| GenieError::LoadFailed {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!(
        "Modelo cargado: {} clases, {} características.",
        model.classes.len(),
        model.n_features()
    );
    Ok(model)
}

pub fn load_vectorizer(path: &Path) -> Result<TfidfVectorizer> {
    let vectorizer: TfidfVectorizer = read_json(path)?;
    vectorizer.validate().map_err(|reason| GenieError::LoadFailed {
        path: path.to_path_buf(),
        reason,
    })?;
    debug!("Vectorizador cargado: {} términos.", vectorizer.vocabulary.len());
    Ok(vectorizer)
}

/// Lee la columna `Combined_Text` del CSV de entrenamiento.
pub fn load_training_corpus(path: &Path) -> Result<Vec<String>> {
    let load_failed = |reason: String| GenieError::LoadFailed {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| load_failed(e.to_string()))?;
    let column = reader
        .headers()
        .map_err(|e| load_failed(e.to_string()))?
        .iter()
        .position(|header| header == TEXT_COLUMN)
        .ok_or_else(|| load_failed(format!("falta la columna '{TEXT_COLUMN}'")))?;

    let mut corpus = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| load_failed(e.to_string()))?;
        corpus.push(record.get(column).unwrap_or_default().to_string());
    }
    Ok(corpus)
}

fn validate_model(path: &Path) -> Result<()> {
    load_model(path).map(|_| ())
}

fn validate_vectorizer(path: &Path) -> Result<()> {
    load_vectorizer(path).map(|_| ())
}

fn validate_training_data(path: &Path) -> Result<()> {
    load_training_corpus(path).map(|_| ())
}

/// Modelo y vectorizador en memoria, listos para el pipeline.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub model: LinearSvm,
    pub vectorizer: TfidfVectorizer,
}

/// Rutas locales de los artefactos y procedencia del vectorizador.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    pub dir: PathBuf,
    pub source: VectorizerSource,
}

impl ArtifactLayout {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn vectorizer_path(&self) -> PathBuf {
        self.dir.join(VECTORIZER_FILE)
    }

    pub fn training_data_path(&self) -> PathBuf {
        self.dir.join(TRAINING_DATA_FILE)
    }

    /// Deserializa el modelo y obtiene el vectorizador según la procedencia.
    ///
    /// Con `Refit` el corpus pasa por el mismo normalizador que la entrada.
    pub fn load(&self, normalizer: &Normalizer) -> Result<LoadedArtifacts> {
        let model = load_model(&self.model_path())?;
        let vectorizer = match self.source {
            VectorizerSource::Persisted => load_vectorizer(&self.vectorizer_path())?,
            VectorizerSource::Refit { max_features } => {
                let corpus: Vec<String> = load_training_corpus(&self.training_data_path())?
                    .iter()
                    .map(|doc| normalizer.normalize(doc))
                    .collect();
                let mut vectorizer = TfidfVectorizer::new(Some(max_features));
                vectorizer.fit(&corpus)?;
                info!(
                    "Vectorizador reajustado con {} documentos ({} términos).",
                    corpus.len(),
                    vectorizer.vocabulary.len()
                );
                vectorizer
            }
        };
        Ok(LoadedArtifacts { model, vectorizer })
    }
}

/// Garantiza que los artefactos configurados están en disco.
pub struct ArtifactStore {
    fetcher: Fetcher,
    layout: ArtifactLayout,
    mode: FetchMode,
    remote_ids: RemoteIds,
}

impl ArtifactStore {
    pub fn new(
        fetcher: Fetcher,
        layout: ArtifactLayout,
        mode: FetchMode,
        remote_ids: RemoteIds,
    ) -> Self {
        Self {
            fetcher,
            layout,
            mode,
            remote_ids,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let fetcher = Fetcher::new(cfg.download_url.clone())?;
        let layout = ArtifactLayout {
            dir: cfg.artifact_dir.clone(),
            source: cfg.vectorizer_source,
        };
        Ok(Self::new(
            fetcher,
            layout,
            cfg.fetch_mode,
            cfg.remote_ids.clone(),
        ))
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Descarga lo que falte: el modelo y, según la procedencia, el
    /// vectorizador ajustado o el CSV de entrenamiento.
    pub async fn ensure_all(&self) -> Result<()> {
        self.ensure(&self.remote_ids.model, &self.layout.model_path(), validate_model)
            .await?;
        match self.layout.source {
            VectorizerSource::Persisted => {
                self.ensure(
                    &self.remote_ids.vectorizer,
                    &self.layout.vectorizer_path(),
                    validate_vectorizer,
                )
                .await?
            }
            VectorizerSource::Refit { .. } => {
                self.ensure(
                    &self.remote_ids.training_data,
                    &self.layout.training_data_path(),
                    validate_training_data,
                )
                .await?
            }
        };
        Ok(())
    }

    async fn ensure(
        &self,
        remote_id: &str,
        target: &Path,
        validator: Validator,
    ) -> Result<FetchOutcome> {
        match self.mode {
            FetchMode::Plain => {
                self.fetcher
                    .ensure_local(remote_id, target, &Acceptance::AsIs)
                    .await
            }
            FetchMode::Validated => {
                self.fetcher
                    .ensure_local(remote_id, target, &Acceptance::Validate(validator))
                    .await
            }
            FetchMode::Archive => {
                let archive = target.with_extension("zip");
                self.fetcher
                    .ensure_extracted(remote_id, &archive, &self.layout.dir, target)
                    .await
            }
        }
    }
}
