//! SVM lineal uno-contra-resto, deserializado desde JSON.

use serde::{Deserialize, Serialize};

use crate::error::{GenieError, Result};
use crate::vectorizer::FeatureMatrix;

/// Capacidad mínima que el pipeline exige a un clasificador.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>>;
}

/// Pesos de un SVM lineal.
///
/// `coef` tiene una fila por clase (o una sola fila en el caso binario) y
/// tantas columnas como características produce el vectorizador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    pub classes: Vec<i64>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearSvm {
    pub fn n_features(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }

    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!("se necesitan al menos 2 clases, hay {}", self.classes.len()));
        }
        let expected_rows = if self.classes.len() == 2 {
            1..=2
        } else {
            self.classes.len()..=self.classes.len()
        };
        if !expected_rows.contains(&self.coef.len()) {
            return Err(format!(
                "{} filas de coeficientes para {} clases",
                self.coef.len(),
                self.classes.len()
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "{} interceptos para {} filas de coeficientes",
                self.intercept.len(),
                self.coef.len()
            ));
        }
        let width = self.n_features();
        if width == 0 || self.coef.iter().any(|row| row.len() != width) {
            return Err("filas de coeficientes de ancho irregular o vacío".to_string());
        }
        Ok(())
    }

    fn decision(&self, row: &[f64]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(weights, bias)| {
                weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias
            })
            .collect()
    }
}

impl Classifier for LinearSvm {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<i64>> {
        self.validate().map_err(GenieError::PredictFailed)?;
        let width = self.n_features();

        features
            .iter()
            .map(|row| {
                if row.len() != width {
                    return Err(GenieError::PredictFailed(format!(
                        "el modelo espera {width} características y recibió {}",
                        row.len()
                    )));
                }
                let scores = self.decision(row);
                if self.is_binary() {
                    return Ok(if scores[0] > 0.0 { self.classes[1] } else { self.classes[0] });
                }
                // En empate gana la primera clase, igual que un argmax clásico.
                let best = scores
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best, best_score), (idx, &score)| {
                        if score > best_score { (idx, score) } else { (best, best_score) }
                    })
                    .0;
                Ok(self.classes[best])
            })
            .collect()
    }
}
