//! Signing and validation front-end for zipped XML document packages.
//!
//! A package is a zip archive holding one metadata XML document plus binary
//! attachments, identified by an IRI-like string in a remote editor service.
//! The crate retrieves a package, keeps its embedded attachment checksums
//! consistent with the bytes on disk, and delegates the cryptography to
//! external sign/validate services through a short-circuiting stage pipeline.

/// Whitespace canonicalization for the signature region
pub mod canonical;

/// Checksum injection and verification inside the metadata document
pub mod checksum;

/// Environment-driven service configuration
pub mod config;

/// Attachment content digests
pub mod digest;

/// Error kinds shared across the pipeline
pub mod error;

/// HTTP front-end routes
pub mod http;

/// Package archive extraction and path derivation
pub mod package;

/// Pipeline context, stages and executor
pub mod pipeline;

/// Clients for the external editor and signing services
pub mod services;
