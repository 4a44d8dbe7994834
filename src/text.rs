//! Normalización del texto de entrada antes de vectorizar.
//!
//! Los pasos se aplican siempre en el mismo orden: minúsculas → signos de
//! puntuación → stopwords → stemming.

use std::sync::Arc;

/// Stopwords fijas; la comparación es exacta y posterior al paso a minúsculas.
pub const STOPWORDS: [&str; 6] = ["the", "and", "is", "in", "to", "with"];

/// Estrategia de stemming inyectable en el normalizador.
pub trait Stemmer: Send + Sync {
    fn stem(&self, text: &str) -> String;
}

/// Stemmer por defecto: deja el texto intacto.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem(&self, text: &str) -> String {
        text.to_string()
    }
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// Conserva sólo caracteres alfanuméricos y espacios en blanco, en su posición.
pub fn remove_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// Elimina stopwords y une los tokens restantes con un único espacio.
pub fn remove_stopwords(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone)]
pub struct Normalizer {
    stemmer: Arc<dyn Stemmer>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(IdentityStemmer))
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer").finish_non_exhaustive()
    }
}

impl Normalizer {
    pub fn new(stemmer: Arc<dyn Stemmer>) -> Self {
        Self { stemmer }
    }

    pub fn normalize(&self, text: &str) -> String {
        let text = lowercase(text);
        let text = remove_punctuation(&text);
        let text = remove_stopwords(&text);
        self.stemmer.stem(&text)
    }
}
