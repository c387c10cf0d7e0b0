//! Binary artifact envelope for fitted pipelines and feature tables
//!
//! Every artifact file is a bincode-encoded [`ArtifactEnvelope`] wrapping the
//! bincode payload of the stored value, tagged with magic bytes, a format
//! version, the payload kind and an FNV-1a checksum.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

use crate::dataset::Table;
use crate::error::{LabError, Result};
use crate::training::CreditPipeline;

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// A fitted [`CreditPipeline`]
    Pipeline,
    /// A raw feature [`Table`]
    FeatureTable,
}

/// Descriptive fields stored next to the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub kind: ArtifactKind,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Raw feature columns, when the payload has them
    pub feature_names: Vec<String>,
    pub crate_version: String,
}

impl ArtifactMetadata {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            created_at: Utc::now().to_rfc3339(),
            feature_names: Vec::new(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }
}

/// Container written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ArtifactMetadata,
    /// bincode-encoded value
    pub payload: Vec<u8>,
    /// FNV-1a hash of `payload`
    pub checksum: u64,
}

impl ArtifactEnvelope {
    pub const MAGIC: [u8; 4] = [b'M', b'L', b'A', b'B'];
    pub const VERSION: u32 = 1;

    pub fn new(metadata: ArtifactMetadata, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            payload,
            checksum,
        }
    }

    /// FNV-1a hash
    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(&self.payload) == self.checksum
    }

    /// Check magic, version, kind and checksum
    fn validate(&self, expected: ArtifactKind) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(LabError::SerializationError("not an artifact file".to_string()));
        }
        if self.format_version != Self::VERSION {
            return Err(LabError::SerializationError(format!(
                "unsupported artifact format version {}",
                self.format_version
            )));
        }
        if self.metadata.kind != expected {
            return Err(LabError::SerializationError(format!(
                "artifact holds {:?}, expected {:?}",
                self.metadata.kind, expected
            )));
        }
        if !self.verify_checksum() {
            return Err(LabError::SerializationError(
                "artifact checksum mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Values that can be stored as artifacts
pub trait Artifact: Serialize + DeserializeOwned + Sized {
    const KIND: ArtifactKind;

    fn metadata(&self) -> ArtifactMetadata {
        ArtifactMetadata::new(Self::KIND)
    }

    /// Encode into envelope bytes
    fn to_artifact_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let envelope = ArtifactEnvelope::new(self.metadata(), payload);
        Ok(bincode::serialize(&envelope)?)
    }

    /// Decode from envelope bytes, rejecting foreign or corrupted data
    fn from_artifact_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: ArtifactEnvelope = bincode::deserialize(bytes)
            .map_err(|e| LabError::SerializationError(format!("unreadable artifact: {}", e)))?;
        envelope.validate(Self::KIND)?;
        Ok(bincode::deserialize(&envelope.payload)?)
    }

    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.to_artifact_bytes()?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(path = %path.display(), bytes = bytes.len(), kind = ?Self::KIND, "artifact saved");
        Ok(())
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path.as_ref())?).read_to_end(&mut bytes)?;
        Self::from_artifact_bytes(&bytes)
    }
}

impl Artifact for CreditPipeline {
    const KIND: ArtifactKind = ArtifactKind::Pipeline;

    fn metadata(&self) -> ArtifactMetadata {
        ArtifactMetadata::new(Self::KIND).with_features(self.feature_columns().to_vec())
    }
}

impl Artifact for Table {
    const KIND: ArtifactKind = ArtifactKind::FeatureTable;

    fn metadata(&self) -> ArtifactMetadata {
        let names = self.column_names().into_iter().map(String::from).collect();
        ArtifactMetadata::new(Self::KIND).with_features(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TableColumn;
    use tempfile::tempdir;

    fn create_test_table() -> Table {
        Table::new(vec![
            TableColumn::numeric("Age", vec![Some(22.0), None, Some(49.0)]),
            TableColumn::categorical("Purpose", vec![Some("car".into()), Some("tv".into()), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_checksum_verification() {
        let mut envelope = ArtifactEnvelope::new(
            ArtifactMetadata::new(ArtifactKind::FeatureTable),
            vec![1, 2, 3],
        );
        assert!(envelope.verify_checksum());
        envelope.payload[0] = 9;
        assert!(!envelope.verify_checksum());
    }

    #[test]
    fn test_table_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outputs").join("x_test.pkl");
        let table = create_test_table();

        table.save(&path).unwrap();
        let loaded = Table::load(&path).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let table = create_test_table();
        let bytes = table.to_artifact_bytes().unwrap();
        let mut envelope: ArtifactEnvelope = bincode::deserialize(&bytes).unwrap();
        let last = envelope.payload.len() - 1;
        envelope.payload[last] ^= 0xFF;
        let tampered = bincode::serialize(&envelope).unwrap();

        assert!(Table::from_artifact_bytes(&tampered).is_err());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let bytes = create_test_table().to_artifact_bytes().unwrap();
        assert!(CreditPipeline::from_artifact_bytes(&bytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Table::from_artifact_bytes(b"not an artifact").is_err());
    }
}
