//! Adapters for the external collaborators.
//!
//! Each adapter wraps exactly one outbound round trip and normalizes the
//! result into the crate's error kinds, so the pipeline never sees transport
//! details. The traits are the seam that lets pipeline tests run without a
//! network.

/// Editor service client (package retrieval and signed-package upload)
pub mod editor;
/// Signing service client (sign and validate calls)
pub mod signature;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
pub use editor::EditorClient;
use serde_json::Value;
pub use signature::SignatureClient;

use crate::error::Result;

/// Operations offered by the editor service that stores packages.
#[async_trait]
pub trait EditorApi: Send + Sync {
    /// Retrieve the package archive for an identifier, streaming it into
    /// `dest_dir`, and return the path of the written archive.
    async fn load_package(&self, iri: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Upload the signed metadata document and public key for an identifier;
    /// the service's JSON acknowledgement is passed through opaquely.
    async fn upload_signed(&self, iri: &str, document: &Path, public_key: &Path) -> Result<Value>;
}

/// Operations offered by the cryptographic signing service.
#[async_trait]
pub trait SignatureApi: Send + Sync {
    /// Sign the metadata document; returns the signed document bytes.
    async fn sign(&self, document: &Path, public_key: &Path, private_key: &Path)
        -> Result<Vec<u8>>;

    /// Validate the signature over the (canonicalized) document bytes;
    /// returns the service's validity verdict.
    async fn validate(&self, document: &[u8], public_key: &Path) -> Result<bool>;
}
