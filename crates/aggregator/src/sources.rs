//! Observation sources
//!
//! A source wraps one upstream and its normalizer: each call to
//! [`ObservationSource::fetch`] yields that upstream's typed observations for
//! the current cycle.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use tokenagg_core::{NormalizedObservation, SourceError, SourceResult};

/// Base trait for observation sources
#[async_trait]
pub trait ObservationSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> SourceResult<Vec<NormalizedObservation>>;
}

/// Source reading already-normalized observations from a file.
///
/// The file holds either a JSON array of observations or one observation
/// per line. It is re-read on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Self { name, path }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, reason: impl ToString) -> SourceError {
        SourceError::InvalidPayload {
            source_name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn parse(&self, text: &str) -> SourceResult<Vec<NormalizedObservation>> {
        let trimmed = text.trim_start();
        if trimmed.is_empty() {
            return Ok(vec![]);
        }

        if trimmed.starts_with('[') {
            return serde_json::from_str(trimmed).map_err(|e| self.invalid(e));
        }

        trimmed
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| self.invalid(format!("line {}: {}", n + 1, e)))
            })
            .collect()
    }
}

#[async_trait]
impl ObservationSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> SourceResult<Vec<NormalizedObservation>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Unavailable {
                source_name: self.name.clone(),
                reason: format!("{}: {}", self.path.display(), e),
            })?;

        let observations = self.parse(&text)?;
        debug!("Source {} read {} observations", self.name, observations.len());
        Ok(observations)
    }
}
