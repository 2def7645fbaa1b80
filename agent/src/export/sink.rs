//! Durable sink implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::EvidenceSink;
use crate::error::{ComplianceError, ComplianceResult};
use crate::evidence::canonical::is_content_reference;

/// In-memory content-addressed sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EvidenceSink for MemorySink {
    async fn export(&self, reference: &str, payload: &[u8]) -> ComplianceResult<()> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.to_string(), payload.to_vec());
        Ok(())
    }
}

/// Writes each blob to `<dir>/<reference>.json`.
///
/// References must be hex SHA-256 digests; anything else is rejected so a
/// reference can never escape the directory. Writes go through a temporary
/// file and a rename, so a blob is either fully present or absent.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, reference: &str) -> PathBuf {
        self.dir.join(format!("{}.json", reference))
    }
}

#[async_trait]
impl EvidenceSink for DirectorySink {
    async fn export(&self, reference: &str, payload: &[u8]) -> ComplianceResult<()> {
        if !is_content_reference(reference) {
            return Err(ComplianceError::export_error(format!(
                "Refusing to store blob under non-digest reference '{}'",
                reference
            )));
        }

        let target = self.path_for(reference);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tracing::debug!(reference, "blob already present in sink");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ComplianceError::export_error(format!(
                "cannot create sink directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let tmp = self.dir.join(format!(".{}.tmp", reference));
        tokio::fs::write(&tmp, payload).await.map_err(|e| {
            ComplianceError::export_error(format!("cannot write '{}': {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &target).await.map_err(|e| {
            ComplianceError::export_error(format!(
                "cannot move blob into place at '{}': {}",
                target.display(),
                e
            ))
        })?;

        tracing::debug!(reference, path = %target.display(), "blob stored");
        Ok(())
    }
}
