//! Artifact persistence
//!
//! The file format is a JSON envelope holding the serialized artifact next to
//! the SHA-256 of its exact bytes. Loads recompute the checksum before
//! deserializing.

use super::TrainedArtifact;
use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Envelope layout version written by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Persist and restore the trained artifact
pub trait ArtifactStore: Send + Sync {
    fn save(&self, artifact: &TrainedArtifact) -> Result<()>;

    /// `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<TrainedArtifact>>;

    /// Where artifacts are kept, for logs
    fn location(&self) -> String;
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    format_version: u32,
    checksum: &'a str,
    artifact: &'a RawValue,
}

#[derive(Deserialize)]
struct EnvelopeIn<'a> {
    format_version: u32,
    checksum: String,
    #[serde(borrow)]
    artifact: &'a RawValue,
}

/// Stores the artifact as a single JSON file
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    path: PathBuf,
}

impl FileArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, artifact: &TrainedArtifact) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_string(artifact)?;
        let checksum = compute_checksum(body.as_bytes());
        let raw = RawValue::from_string(body)?;
        let envelope = EnvelopeOut {
            format_version: ARTIFACT_FORMAT_VERSION,
            checksum: &checksum,
            artifact: &raw,
        };
        let bytes = serde_json::to_vec(&envelope)?;

        // Write to temp file first, then rename into place
        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            version = %artifact.version(),
            size_bytes = bytes.len(),
            checksum = %checksum,
            "Artifact saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<TrainedArtifact>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted artifact");
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)?;
        let envelope: EnvelopeIn<'_> = serde_json::from_str(&text)?;
        if envelope.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(DetectorError::storage(format!(
                "unsupported artifact format version {}",
                envelope.format_version
            )));
        }

        let actual = compute_checksum(envelope.artifact.get().as_bytes());
        if actual != envelope.checksum {
            return Err(DetectorError::storage(format!(
                "artifact checksum mismatch: expected {}, got {}",
                envelope.checksum, actual
            )));
        }

        let artifact: TrainedArtifact = serde_json::from_str(envelope.artifact.get())?;
        artifact.classifier().check_structure()?;
        info!(
            path = %self.path.display(),
            version = %artifact.version(),
            "Artifact loaded"
        );
        Ok(Some(artifact))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// SHA-256 of `data` as lowercase hex
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
