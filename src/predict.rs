//! Pipeline de predicción de género.
//!
//! Flujo:
//!   1. Rechazar la entrada vacía antes de tocar red o modelos.
//!   2. Asegurar los artefactos en disco (descarga si faltan).
//!   3. Cargar modelo y vectorizador.
//!   4. normalizar → vectorizar → clasificar → mapear etiqueta.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use crate::app_state::Status;
use crate::artifacts::ArtifactStore;
use crate::classifier::Classifier;
use crate::error::{GenieError, Result};
use crate::genre::Genre;
use crate::text::Normalizer;
use crate::vectorizer::Vectorizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub genre: Genre,
    pub label: i64,
    pub normalized: String,
}

/// Predice el género de un texto con un modelo y un vectorizador ya cargados.
pub fn predict(
    raw_text: &str,
    normalizer: &Normalizer,
    vectorizer: &dyn Vectorizer,
    model: &dyn Classifier,
) -> Result<Prediction> {
    // Sólo espacios cuenta como vacío: no hay nada que normalizar.
    if raw_text.trim().is_empty() {
        return Err(GenieError::EmptyInput);
    }

    let normalized = normalizer.normalize(raw_text);
    let features = vectorizer.transform(std::slice::from_ref(&normalized))?;
    let labels = model.predict(&features)?;
    let label = labels
        .first()
        .copied()
        .ok_or_else(|| GenieError::PredictFailed("el clasificador no devolvió etiquetas".into()))?;
    let genre = Genre::from_label(label)?;

    debug!("'{}' → etiqueta {} ({})", normalized, label, genre);
    Ok(Prediction {
        genre,
        label,
        normalized,
    })
}

/// Orquesta descarga, carga y predicción para cada petición.
pub struct PredictionService {
    store: ArtifactStore,
    normalizer: Normalizer,
}

impl PredictionService {
    pub fn new(store: ArtifactStore, normalizer: Normalizer) -> Self {
        Self { store, normalizer }
    }

    pub async fn predict(&self, raw_text: &str, status: Arc<Mutex<Status>>) -> Result<Prediction> {
        if raw_text.trim().is_empty() {
            return Err(GenieError::EmptyInput);
        }

        Status::stage(&status, "Comprobando artefactos del modelo...", 0.2);
        self.store.ensure_all().await?;

        Status::stage(&status, "Cargando modelo y vectorizador...", 0.5);
        let layout = self.store.layout().clone();
        let normalizer = self.normalizer.clone();
        let text = raw_text.to_string();
        let prediction = tokio::task::spawn_blocking(move || {
            let artifacts = layout.load(&normalizer)?;
            Status::stage(&status, "Realizando predicción...", 0.8);
            predict(&text, &normalizer, &artifacts.vectorizer, &artifacts.model)
        })
        .await
        .map_err(|e| GenieError::PredictFailed(e.to_string()))??;

        info!("Predicción completada: {}", prediction.genre);
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::tests::{write_artifacts, MODEL_JSON, VECTORIZER_JSON};
    use crate::artifacts::{ArtifactLayout, MODEL_FILE, VECTORIZER_FILE};
    use crate::classifier::LinearSvm;
    use crate::config::{FetchMode, RemoteIds, VectorizerSource};
    use crate::fetch::tests::spawn_remote;
    use crate::fetch::Fetcher;
    use crate::vectorizer::{FeatureMatrix, TfidfVectorizer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingVectorizer {
        calls: AtomicUsize,
    }

    impl Vectorizer for CountingVectorizer {
        fn fit_transform(&mut self, corpus: &[String]) -> Result<FeatureMatrix> {
            self.transform(corpus)
        }

        fn transform(&self, texts: &[String]) -> Result<FeatureMatrix> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn n_features(&self) -> usize {
            1
        }
    }

    struct FixedClassifier {
        label: i64,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(label: i64) -> Self {
            Self {
                label,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.label; features.len()])
        }
    }

    fn fitted() -> (LinearSvm, TfidfVectorizer) {
        (
            serde_json::from_str(MODEL_JSON).unwrap(),
            serde_json::from_str(VECTORIZER_JSON).unwrap(),
        )
    }

    fn status() -> Arc<Mutex<Status>> {
        Arc::new(Mutex::new(Status::ready()))
    }

    #[test]
    fn crime_sentence_maps_to_a_known_genre() {
        let (model, vectorizer) = fitted();
        let prediction = predict(
            "A thrilling crime in the city",
            &Normalizer::default(),
            &vectorizer,
            &model,
        )
        .unwrap();

        assert_eq!(prediction.normalized, "a thrilling crime city");
        assert!(Genre::ALL.contains(&prediction.genre));
        assert_eq!(prediction.genre, Genre::Crime);
    }

    #[test]
    fn empty_input_short_circuits_before_any_model_call() {
        let vectorizer = CountingVectorizer::default();
        let model = FixedClassifier::new(0);

        for input in ["", "   \n\t"] {
            let err = predict(input, &Normalizer::default(), &vectorizer, &model).unwrap_err();
            assert!(matches!(err, GenieError::EmptyInput));
        }
        assert_eq!(vectorizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn label_outside_mapping_is_unknown_label() {
        let vectorizer = CountingVectorizer::default();
        let model = FixedClassifier::new(7);

        let err = predict("a dark tale", &Normalizer::default(), &vectorizer, &model).unwrap_err();
        assert!(matches!(err, GenieError::UnknownLabel(7)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn same_text_always_yields_same_genre() {
        let (model, vectorizer) = fitted();
        let normalizer = Normalizer::default();
        let text = "An epic dragon quest across the kingdom";

        let first = predict(text, &normalizer, &vectorizer, &model).unwrap();
        for _ in 0..10 {
            assert_eq!(predict(text, &normalizer, &vectorizer, &model).unwrap(), first);
        }
    }

    #[test]
    fn vectorizer_errors_propagate_verbatim() {
        let model = FixedClassifier::new(0);
        let unfitted = TfidfVectorizer::new(None);

        let err = predict("dragon", &Normalizer::default(), &unfitted, &model).unwrap_err();
        assert_eq!(err.kind(), "transform_failed");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_rejects_empty_input_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let (url, remote) = spawn_remote(&[], None).await;
        let store = ArtifactStore::new(
            Fetcher::new(url).unwrap(),
            ArtifactLayout {
                dir: dir.path().to_path_buf(),
                source: VectorizerSource::Persisted,
            },
            FetchMode::Plain,
            RemoteIds {
                model: "m".into(),
                vectorizer: "v".into(),
                training_data: "d".into(),
            },
        );
        let service = PredictionService::new(store, Normalizer::default());

        let err = service.predict("", status()).await.unwrap_err();
        assert!(matches!(err, GenieError::EmptyInput));
        assert_eq!(remote.hits(), 0);
    }

    #[tokio::test]
    async fn service_downloads_then_predicts() {
        let dir = tempfile::tempdir().unwrap();
        let (url, remote) = spawn_remote(
            &[
                ("m", MODEL_JSON.as_bytes().to_vec()),
                ("v", VECTORIZER_JSON.as_bytes().to_vec()),
            ],
            None,
        )
        .await;
        let store = ArtifactStore::new(
            Fetcher::new(url).unwrap(),
            ArtifactLayout {
                dir: dir.path().to_path_buf(),
                source: VectorizerSource::Persisted,
            },
            FetchMode::Plain,
            RemoteIds {
                model: "m".into(),
                vectorizer: "v".into(),
                training_data: "d".into(),
            },
        );
        let service = PredictionService::new(store, Normalizer::default());
        let status = status();

        let first = service.predict("A dragon awakens", status.clone()).await.unwrap();
        let second = service.predict("A dragon awakens", status.clone()).await.unwrap();

        assert_eq!(first.genre, Genre::Fantasy);
        assert_eq!(first, second);
        assert_eq!(remote.hits(), 2);
        assert!(dir.path().join(MODEL_FILE).exists());
        assert!(dir.path().join(VECTORIZER_FILE).exists());
    }

    #[tokio::test]
    async fn service_uses_local_artifacts_when_present() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        let (url, remote) = spawn_remote(&[], None).await;
        let store = ArtifactStore::new(
            Fetcher::new(url).unwrap(),
            ArtifactLayout {
                dir: dir.path().to_path_buf(),
                source: VectorizerSource::Persisted,
            },
            FetchMode::Validated,
            RemoteIds {
                model: "m".into(),
                vectorizer: "v".into(),
                training_data: "d".into(),
            },
        );
        let service = PredictionService::new(store, Normalizer::default());

        let prediction = service
            .predict("Homework from the algebra textbook", status())
            .await
            .unwrap();
        assert_eq!(prediction.genre, Genre::Learning);
        assert_eq!(remote.hits(), 0);
    }
}
