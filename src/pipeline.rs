//! Pipeline context and executor.
//!
//! A request is served by running an ordered list of stages over one mutable
//! [`Context`]. Stages report failures as values; the executor records the
//! first failure and skips every remaining stage, so no domain work happens
//! after an error. The terminal response step always runs and serializes
//! whatever outcome the context holds, so a request is never left
//! unanswered. Failures travel in-band: the HTTP layer returns 200 with a
//! `status: error` body.

/// Stage implementations for the sign and validate workflows
pub mod stages;

use std::{io, path::Path, path::PathBuf, sync::Arc};

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    config::KeyMaterial,
    error::{Error, Result},
    pipeline::stages::{
        LoadPackage, ProcessPackage, Receive, SignPackage, UploadSignedPackage, ValidatePackage,
    },
    services::{EditorApi, SignatureApi},
};

/// Payload submitted to either endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitData {
    /// External identifier of the package to sign or validate.
    pub iri: String,
}

/// Result accumulated by a pipeline run.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// No stage has produced a final result yet.
    Pending,
    /// The workflow completed; the value is the response payload.
    Success(Value),
    /// A stage failed; later domain stages were skipped.
    Error {
        code: &'static str,
        message: String,
    },
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error { .. })
    }
}

/// Mutable state threaded through one pipeline run.
///
/// Owned by the executor for the lifetime of a single request and dropped
/// once the response has been built; requests never share state beyond the
/// filesystem scratch root, and each run gets its own scratch directory.
#[derive(Debug)]
pub struct Context {
    /// Package identifier; normalized to a leading `/` by the receive stage.
    pub iri: String,
    /// Request-private working directory under the scratch root.
    pub scratch_dir: PathBuf,
    /// Retrieved archive, set by the load stage.
    pub archive_path: Option<PathBuf>,
    /// Metadata document inside the extracted package.
    pub document_path: Option<PathBuf>,
    /// Attachment checksum verdict (validate workflow).
    pub attachments_valid: Option<bool>,
    /// Signature verdict from the external validator (validate workflow).
    pub signature_valid: Option<bool>,
    pub outcome: Outcome,
}

impl Context {
    fn new(iri: String, scratch_dir: PathBuf) -> Self {
        Context {
            iri,
            scratch_dir,
            archive_path: None,
            document_path: None,
            attachments_valid: None,
            signature_valid: None,
            outcome: Outcome::Pending,
        }
    }

    /// Record a stage failure; later domain stages become no-ops.
    pub fn fail(&mut self, err: Error) {
        warn!("pipeline stage failed: {err}");
        self.outcome = Outcome::Error {
            code: err.code(),
            message: err.to_string(),
        };
    }

    pub(crate) fn require_archive(&self) -> Result<&Path> {
        self.archive_path
            .as_deref()
            .ok_or_else(|| Error::Io(io::Error::other("no archive in pipeline context")))
    }

    pub(crate) fn require_document(&self) -> Result<&Path> {
        self.document_path
            .as_deref()
            .ok_or_else(|| Error::Io(io::Error::other("no document in pipeline context")))
    }
}

/// One unit of pipeline work.
///
/// A stage performs at most one external operation (file I/O or a service
/// call), mutates the context for its successors, and reports failure as an
/// `Err` value. Failures never propagate past the executor.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, cx: &mut Context) -> Result<()>;
}

/// Ordered stage sequence serving one endpoint.
pub struct Pipeline {
    tmp_root: PathBuf,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(tmp_root: PathBuf, stages: Vec<Box<dyn Stage>>) -> Self {
        Pipeline { tmp_root, stages }
    }

    /// Run the stage sequence over a fresh context and return the response
    /// payload. Every run gets a unique scratch directory, which is removed
    /// before returning regardless of outcome.
    pub async fn execute(&self, submit: SubmitData) -> Value {
        let scratch_dir = self.tmp_root.join(Uuid::new_v4().to_string());
        let mut cx = Context::new(submit.iri, scratch_dir);

        for stage in &self.stages {
            if cx.outcome.is_error() {
                // No-op passthrough once a failure is recorded.
                continue;
            }
            info!(" IN: {}", stage.name());
            if let Err(err) = stage.run(&mut cx).await {
                cx.fail(err);
            }
        }

        let response = match &cx.outcome {
            Outcome::Success(payload) => payload.clone(),
            Outcome::Error { message, .. } => json!({
                "status": "error",
                "message": message,
            }),
            Outcome::Pending => json!({
                "status": "error",
                "message": "pipeline completed without producing an outcome",
            }),
        };

        if let Err(err) = tokio::fs::remove_dir_all(&cx.scratch_dir).await {
            // The receive stage may have failed before the directory existed.
            debug!(
                "could not remove scratch dir {}: {err}",
                cx.scratch_dir.display()
            );
        }

        response
    }
}

/// Stage sequence for the sign workflow: receive, retrieve, extract and
/// inject checksums, sign, upload.
pub fn sign_pipeline(
    tmp_root: PathBuf,
    editor: Arc<dyn EditorApi>,
    signature: Arc<dyn SignatureApi>,
    keys: KeyMaterial,
) -> Pipeline {
    let public_key = keys.public_key.clone();
    Pipeline::new(
        tmp_root,
        vec![
            Box::new(Receive),
            Box::new(LoadPackage {
                editor: editor.clone(),
            }),
            Box::new(ProcessPackage),
            Box::new(SignPackage { signature, keys }),
            Box::new(UploadSignedPackage { editor, public_key }),
        ],
    )
}

/// Stage sequence for the validate workflow: receive, retrieve, extract and
/// verify checksums, validate the signature.
pub fn validate_pipeline(
    tmp_root: PathBuf,
    editor: Arc<dyn EditorApi>,
    signature: Arc<dyn SignatureApi>,
    public_key: PathBuf,
) -> Pipeline {
    Pipeline::new(
        tmp_root,
        vec![
            Box::new(Receive),
            Box::new(LoadPackage { editor }),
            Box::new(ValidatePackage {
                signature,
                public_key,
            }),
        ],
    )
}
