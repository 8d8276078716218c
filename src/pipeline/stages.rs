//! The stages composing the sign and validate workflows.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;

use crate::{
    canonical::trim_signature_whitespace,
    checksum::{inject_checksums, verify_checksums, AttachmentCheck},
    config::KeyMaterial,
    error::Result,
    package,
    pipeline::{Context, Outcome, Stage},
    services::{EditorApi, SignatureApi},
};

/// Normalizes the submitted identifier and creates the request's scratch
/// directory.
pub struct Receive;

#[async_trait]
impl Stage for Receive {
    fn name(&self) -> &'static str {
        "receive_submit_data"
    }

    async fn run(&self, cx: &mut Context) -> Result<()> {
        cx.iri = package::normalize_iri(&cx.iri)?;
        tokio::fs::create_dir_all(&cx.scratch_dir).await?;
        Ok(())
    }
}

/// Retrieves the package archive for the identifier into the scratch
/// directory.
pub struct LoadPackage {
    pub editor: Arc<dyn EditorApi>,
}

#[async_trait]
impl Stage for LoadPackage {
    fn name(&self) -> &'static str {
        "load_pkg_for_iri"
    }

    async fn run(&self, cx: &mut Context) -> Result<()> {
        let archive = self.editor.load_package(&cx.iri, &cx.scratch_dir).await?;
        cx.archive_path = Some(archive);
        Ok(())
    }
}

/// Extracts the archive and injects per-attachment checksums into the
/// metadata document (sign workflow).
///
/// Checksums are computed strictly after extraction and strictly before any
/// call that forwards the document, so the signed bytes match what is on
/// disk at pipeline time.
pub struct ProcessPackage;

#[async_trait]
impl Stage for ProcessPackage {
    fn name(&self) -> &'static str {
        "process_pkg"
    }

    async fn run(&self, cx: &mut Context) -> Result<()> {
        let archive = cx.require_archive()?.to_owned();
        package::extract(&archive, &cx.scratch_dir)?;

        let pkg_dir = cx
            .scratch_dir
            .join(package::package_folder_name(&archive)?);
        let doc_path = package::document_path(&cx.scratch_dir, &archive, &cx.iri)?;

        let xml = tokio::fs::read_to_string(&doc_path).await?;
        let injected = inject_checksums(&xml, &pkg_dir)?;
        tokio::fs::write(&doc_path, injected).await?;

        cx.document_path = Some(doc_path);
        Ok(())
    }
}

/// Sends the metadata document to the external signer and overwrites the
/// document file with the signed bytes.
pub struct SignPackage {
    pub signature: Arc<dyn SignatureApi>,
    pub keys: KeyMaterial,
}

#[async_trait]
impl Stage for SignPackage {
    fn name(&self) -> &'static str {
        "sign_pkg"
    }

    async fn run(&self, cx: &mut Context) -> Result<()> {
        let doc_path = cx.require_document()?.to_owned();
        let signed = self
            .signature
            .sign(&doc_path, &self.keys.public_key, &self.keys.private_key)
            .await?;
        tokio::fs::write(&doc_path, signed).await?;
        debug!("signed document written to {}", doc_path.display());
        Ok(())
    }
}

/// Uploads the signed document and public key; the editor's acknowledgement
/// becomes the response payload.
pub struct UploadSignedPackage {
    pub editor: Arc<dyn EditorApi>,
    pub public_key: PathBuf,
}

#[async_trait]
impl Stage for UploadSignedPackage {
    fn name(&self) -> &'static str {
        "upload_signed_pkg"
    }

    async fn run(&self, cx: &mut Context) -> Result<()> {
        let doc_path = cx.require_document()?.to_owned();
        let ack = self
            .editor
            .upload_signed(&cx.iri, &doc_path, &self.public_key)
            .await?;
        cx.outcome = Outcome::Success(ack);
        Ok(())
    }
}

/// Extracts the archive, verifies attachment checksums, canonicalizes the
/// signature region and asks the external validator for a verdict (validate
/// workflow).
///
/// Attachment validity and signature validity test different properties, so
/// a checksum mismatch does not suppress the validator call; both flags are
/// computed independently and reported together.
pub struct ValidatePackage {
    pub signature: Arc<dyn SignatureApi>,
    pub public_key: PathBuf,
}

#[async_trait]
impl Stage for ValidatePackage {
    fn name(&self) -> &'static str {
        "validate_pkg"
    }

    async fn run(&self, cx: &mut Context) -> Result<()> {
        let archive = cx.require_archive()?.to_owned();
        package::extract(&archive, &cx.scratch_dir)?;

        let pkg_dir = cx
            .scratch_dir
            .join(package::package_folder_name(&archive)?);
        let doc_path = package::document_path(&cx.scratch_dir, &archive, &cx.iri)?;
        let xml = tokio::fs::read_to_string(&doc_path).await?;

        let check = verify_checksums(&xml, &pkg_dir)?;
        if let AttachmentCheck::Mismatch { attachment } = &check {
            warn!("attachment checksum mismatch: {attachment}");
        }
        cx.attachments_valid = Some(check.is_valid());

        let canonical = trim_signature_whitespace(&xml);
        let signature_valid = self
            .signature
            .validate(canonical.as_bytes(), &self.public_key)
            .await?;
        cx.signature_valid = Some(signature_valid);

        cx.document_path = Some(doc_path);
        cx.outcome = Outcome::Success(json!({
            "attachmentsValid": check.is_valid(),
            "signatureValid": signature_valid,
        }));
        Ok(())
    }
}
