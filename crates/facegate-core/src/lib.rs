//! facegate-core — reference gallery and face-matching decision logic.
//!
//! Holds the in-memory gallery of known face embeddings and the pure
//! distance/threshold decision logic for identification and verification.
//! The embedding model and the remote asset library are external
//! collaborators, consumed through the [`EmbeddingOracle`] and
//! [`AssetSource`] traits.

pub mod decode;
pub mod gallery;
pub mod matcher;
pub mod oracle;
pub mod source;
pub mod types;

pub use gallery::{Gallery, GalleryStatus, RebuildOutcome};
pub use oracle::{EmbeddingOracle, OracleError};
pub use source::{Asset, AssetSource, SourceError};
pub use types::{Embedding, EmbeddingError, GalleryEntry, MatchDecision};
