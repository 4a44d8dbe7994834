//! Vectorizador TF-IDF serializable con serde.
//!
//! Convención de tokens y pesos: palabras de dos o más caracteres de palabra,
//! conteo bruto × idf suavizado, filas normalizadas L2.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{GenieError, Result};

/// Una fila por documento; todas con la dimensión del vocabulario ajustado.
pub type FeatureMatrix = Vec<Vec<f64>>;

/// Capacidad mínima que el pipeline exige a un vectorizador.
pub trait Vectorizer: Send + Sync {
    fn fit_transform(&mut self, corpus: &[String]) -> Result<FeatureMatrix>;
    fn transform(&self, texts: &[String]) -> Result<FeatureMatrix>;
    fn n_features(&self) -> usize;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Límite de vocabulario usado en el ajuste (`None` = sin límite).
    #[serde(default)]
    pub max_features: Option<usize>,
    /// Término → columna.
    pub vocabulary: HashMap<String, usize>,
    /// Peso idf por columna.
    pub idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: Option<usize>) -> Self {
        Self {
            max_features,
            ..Default::default()
        }
    }

    /// Comprueba la coherencia interna tras deserializar.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(format!(
                "vocabulario con {} términos pero {} pesos idf",
                self.vocabulary.len(),
                self.idf.len()
            ));
        }
        let mut seen = HashSet::with_capacity(self.vocabulary.len());
        for (term, &column) in &self.vocabulary {
            if column >= self.idf.len() || !seen.insert(column) {
                return Err(format!("columna {column} inválida para el término '{term}'"));
            }
        }
        if let Some(bad) = self.idf.iter().find(|w| !w.is_finite()) {
            return Err(format!("peso idf no finito: {bad}"));
        }
        Ok(())
    }

    /// Construye vocabulario e idf a partir del corpus.
    pub fn fit(&mut self, corpus: &[String]) -> Result<()> {
        let mut term_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();

        for doc in corpus {
            let tokens = tokenize(doc);
            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in tokens {
                *term_freq.entry(term).or_insert(0) += 1;
            }
        }

        if term_freq.is_empty() {
            return Err(GenieError::TransformFailed(
                "vocabulario vacío: el corpus no contiene términos".to_string(),
            ));
        }

        let mut terms: Vec<String> = match self.max_features {
            Some(limit) if limit < term_freq.len() => {
                let mut ranked: Vec<(&String, &usize)> = term_freq.iter().collect();
                // Orden estable: empates resueltos por orden del término.
                ranked.sort_by(|a, b| b.1.cmp(a.1));
                ranked.into_iter().take(limit).map(|(t, _)| t.clone()).collect()
            }
            _ => term_freq.keys().cloned().collect(),
        };
        terms.sort();

        let n_docs = corpus.len() as f64;
        self.idf = terms
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(column, term)| (term, column))
            .collect();
        Ok(())
    }

    fn transform_one(&self, text: &str) -> Vec<f64> {
        let mut row = vec![0.0; self.idf.len()];
        for token in tokenize(text) {
            if let Some(&column) = self.vocabulary.get(&token) {
                row[column] += 1.0;
            }
        }
        for (value, weight) in row.iter_mut().zip(&self.idf) {
            *value *= weight;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
        row
    }
}

impl Vectorizer for TfidfVectorizer {
    fn fit_transform(&mut self, corpus: &[String]) -> Result<FeatureMatrix> {
        self.fit(corpus)?;
        self.transform(corpus)
    }

    fn transform(&self, texts: &[String]) -> Result<FeatureMatrix> {
        if self.vocabulary.is_empty() {
            return Err(GenieError::TransformFailed(
                "el vectorizador no está ajustado".to_string(),
            ));
        }
        self.validate().map_err(GenieError::TransformFailed)?;
        Ok(texts.iter().map(|text| self.transform_one(text)).collect())
    }

    fn n_features(&self) -> usize {
        self.idf.len()
    }
}

/// Tokens de dos o más caracteres de palabra, en minúsculas.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}
