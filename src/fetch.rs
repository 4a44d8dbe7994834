//! Descarga de artefactos remotos al disco local.
//!
//! Idempotente por fichero: si el destino ya existe no se toca la red. La
//! descarga se escribe primero en un `.part` hermano y sólo se renombra al
//! destino cuando está completa (y validada o extraída), así que un fallo nunca
//! deja un destino corrupto que bloquee el reintento.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reqwest::{Client, Response};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use url::Url;
use zip::ZipArchive;

use crate::error::{GenieError, Result};

const CHUNK_SIZE: usize = 32 * 1024;
const CONFIRM_COOKIE_PREFIX: &str = "download_warning";

/// Comprueba que un fichero descargado es deserializable.
pub type Validator = fn(&Path) -> Result<()>;

/// Qué hacer con el fichero descargado antes de aceptarlo.
#[derive(Clone)]
pub enum Acceptance {
    AsIs,
    Validate(Validator),
    /// El destino es un `.zip` que se extrae en `into`.
    Extract { into: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent,
    Downloaded { bytes: u64 },
}

/// Cliente de descarga con un cerrojo por ruta de destino.
pub struct Fetcher {
    client: Client,
    endpoint: Url,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl Fetcher {
    pub fn new(endpoint: Url) -> reqwest::Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            endpoint,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn lock_for(&self, destination: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(destination.to_path_buf())
            .or_default()
            .clone()
    }

    /// Garantiza que `destination` existe en disco, descargándolo si hace falta.
    pub async fn ensure_local(
        &self,
        remote_id: &str,
        destination: &Path,
        acceptance: &Acceptance,
    ) -> Result<FetchOutcome> {
        let lock = self.lock_for(destination);
        let _guard = lock.lock().await;

        if exists(destination).await {
            debug!("Artefacto {} ya presente, no se descarga.", destination.display());
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let partial = partial_path(destination);
        info!("Descargando '{}' en {}...", remote_id, destination.display());

        let bytes = match self.download(remote_id, &partial).await {
            Ok(bytes) => bytes,
            Err(err) => {
                remove_quietly(&partial).await;
                return Err(err);
            }
        };

        if let Err(err) = accept(&partial, destination, acceptance).await {
            remove_quietly(&partial).await;
            warn!("Artefacto rechazado {}: {}", destination.display(), err);
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&partial, destination).await {
            remove_quietly(&partial).await;
            return Err(GenieError::io(destination, err));
        }

        info!("Artefacto {} listo ({} bytes).", destination.display(), bytes);
        Ok(FetchOutcome::Downloaded { bytes })
    }

    /// Variante comprimida: garantiza que `expected` existe tras extraer `archive`.
    ///
    /// Si el `.zip` ya está en disco pero falta el fichero esperado, se vuelve a
    /// extraer sin descargar.
    pub async fn ensure_extracted(
        &self,
        remote_id: &str,
        archive: &Path,
        into: &Path,
        expected: &Path,
    ) -> Result<FetchOutcome> {
        let lock = self.lock_for(expected);
        let _guard = lock.lock().await;

        if exists(expected).await {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let acceptance = Acceptance::Extract {
            into: into.to_path_buf(),
        };
        let outcome = self.ensure_local(remote_id, archive, &acceptance).await?;
        if outcome == FetchOutcome::AlreadyPresent {
            info!("Reextrayendo {} en {}.", archive.display(), into.display());
            if let Err(err) = extract_blocking(archive, into).await {
                // Un zip local ilegible se descarta para que el siguiente intento lo descargue.
                if matches!(err, GenieError::InvalidArtifact { .. }) {
                    warn!("Archivo {} descartado: {}", archive.display(), err);
                    remove_quietly(archive).await;
                }
                return Err(err);
            }
        }

        if !exists(expected).await {
            remove_quietly(archive).await;
            return Err(GenieError::InvalidArtifact {
                path: archive.to_path_buf(),
                reason: format!("el archivo no contiene {}", display_name(expected)),
            });
        }
        Ok(outcome)
    }

    async fn download(&self, remote_id: &str, partial: &Path) -> Result<u64> {
        let fetch_failed = |source| GenieError::FetchFailed {
            remote_id: remote_id.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("id", remote_id)])
            .send()
            .await
            .map_err(fetch_failed)?;

        if let Some(token) = confirm_token(&response) {
            debug!("Aviso de fichero grande para '{}', confirmando descarga.", remote_id);
            response = self
                .client
                .get(self.endpoint.clone())
                .query(&[("id", remote_id), ("confirm", token.as_str())])
                .send()
                .await
                .map_err(fetch_failed)?;
        }

        let response = response.error_for_status().map_err(fetch_failed)?;
        save_response_content(response, remote_id, partial).await
    }
}

fn confirm_token(response: &Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name().starts_with(CONFIRM_COOKIE_PREFIX))
        .map(|cookie| cookie.value().to_string())
}

async fn save_response_content(
    mut response: Response,
    remote_id: &str,
    partial: &Path,
) -> Result<u64> {
    let file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| GenieError::io(partial, e))?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut written = 0u64;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| GenieError::FetchFailed {
            remote_id: remote_id.to_string(),
            source,
        })?
    {
        // keep-alive
        if chunk.is_empty() {
            continue;
        }
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| GenieError::io(partial, e))?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| GenieError::io(partial, e))?;
    Ok(written)
}

async fn accept(partial: &Path, destination: &Path, acceptance: &Acceptance) -> Result<()> {
    match acceptance {
        Acceptance::AsIs => Ok(()),
        Acceptance::Validate(check) => {
            let check = *check;
            let path = partial.to_path_buf();
            let verdict = tokio::task::spawn_blocking(move || check(&path))
                .await
                .map_err(|e| GenieError::InvalidArtifact {
                    path: destination.to_path_buf(),
                    reason: e.to_string(),
                })?;
            verdict.map_err(|err| GenieError::InvalidArtifact {
                path: destination.to_path_buf(),
                reason: err.to_string(),
            })
        }
        Acceptance::Extract { into } => extract_blocking(partial, into)
            .await
            .map(|_| ())
            .map_err(|err| match err {
                GenieError::InvalidArtifact { reason, .. } => GenieError::InvalidArtifact {
                    path: destination.to_path_buf(),
                    reason,
                },
                other => other,
            }),
    }
}

async fn extract_blocking(archive: &Path, into: &Path) -> Result<Vec<PathBuf>> {
    let archive = archive.to_path_buf();
    let into = into.to_path_buf();
    let fallback = archive.clone();
    tokio::task::spawn_blocking(move || extract_archive(&archive, &into))
        .await
        .map_err(|e| GenieError::InvalidArtifact {
            path: fallback,
            reason: e.to_string(),
        })?
}

/// Extrae todas las entradas de un `.zip` en `dest`.
///
/// Las entradas cuyo nombre saldría de `dest` se ignoran. Cada fichero se
/// escribe en un `.part` y se renombra al terminar; si cualquier entrada falla
/// se borran los ficheros ya extraídos en esta pasada.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(archive_path).map_err(|e| GenieError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| GenieError::InvalidArtifact {
        path: archive_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut extracted = Vec::new();

    if let Err(err) = extract_entries(&mut archive, archive_path, dest, &mut extracted) {
        for path in &extracted {
            if let Err(e) = fs::remove_file(path) {
                warn!("No se pudo borrar {}: {}", path.display(), e);
            }
        }
        return Err(err);
    }

    debug!(
        "Extraídas {} entradas de {}.",
        extracted.len(),
        archive_path.display()
    );
    Ok(extracted)
}

fn extract_entries(
    archive: &mut ZipArchive<fs::File>,
    archive_path: &Path,
    dest: &Path,
    extracted: &mut Vec<PathBuf>,
) -> Result<()> {
    let invalid = |reason: String| GenieError::InvalidArtifact {
        path: archive_path.to_path_buf(),
        reason,
    };

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| invalid(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Entrada ignorada en {}: '{}'", archive_path.display(), entry.name());
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| GenieError::io(&outpath, e))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| GenieError::io(parent, e))?;
        }

        // El CRC sólo se comprueba al final de la lectura.
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| invalid(format!("entrada '{}': {}", entry.name(), e)))?;

        let partial = partial_path(&outpath);
        let written = fs::write(&partial, &data).and_then(|_| fs::rename(&partial, &outpath));
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(GenieError::io(&outpath, e));
        }
        extracted.push(outpath);
    }
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            warn!("No se pudo borrar {}: {}", path.display(), err);
        }
    }
}
