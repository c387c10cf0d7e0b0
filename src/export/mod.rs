//! Artifact serialization module
//!
//! Fitted pipelines and feature tables are written as checksummed bincode
//! envelopes; see [`Artifact`].

mod artifact;

pub use artifact::{Artifact, ArtifactEnvelope, ArtifactKind, ArtifactMetadata};
