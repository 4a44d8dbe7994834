//! Mapeo fijo etiqueta → género literario.

use serde::Serialize;
use std::fmt;

use crate::error::{GenieError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Adventure,
    Crime,
    Fantasy,
    Learning,
    Romance,
    Thriller,
}

impl Genre {
    /// Orden por etiqueta: la posición es el id de clase.
    pub const ALL: [Genre; 6] = [
        Genre::Adventure,
        Genre::Crime,
        Genre::Fantasy,
        Genre::Learning,
        Genre::Romance,
        Genre::Thriller,
    ];

    pub fn from_label(label: i64) -> Result<Self> {
        usize::try_from(label)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(GenieError::UnknownLabel(label))
    }

    pub fn label(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            Genre::Adventure => "adventure",
            Genre::Crime => "crime",
            Genre::Fantasy => "fantasy",
            Genre::Learning => "learning",
            Genre::Romance => "romance",
            Genre::Thriller => "thriller",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
