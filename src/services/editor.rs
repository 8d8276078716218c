use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::{
    error::{Error, Result},
    services::EditorApi,
};

/// HTTP client for the editor service that stores and serves packages.
#[derive(Debug, Clone)]
pub struct EditorClient {
    base_url: String,
    client: reqwest::Client,
}

impl EditorClient {
    /// Create a client for the editor service at `base_url`, with a bounded
    /// timeout applied to every call.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::RetrievalFailed(e.to_string()))?;
        Ok(EditorClient {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl EditorApi for EditorClient {
    async fn load_package(&self, iri: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = format!("{}/gwd/pkg/load", self.base_url);
        trace!("loading package for {iri} from {url}");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "data": { "iri": iri } }))
            .send()
            .await
            .map_err(|e| Error::RetrievalFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::RetrievalFailed(format!(
                "editor service returned {status}: {text}"
            )));
        }

        // A JSON body means the service reported an error instead of a
        // package stream; the content type distinguishes the two cases.
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if content_type.starts_with("application/json") {
            let body: Value = response
                .json()
                .await
                .map_err(|e| Error::RetrievalFailed(e.to_string()))?;
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("error loading package")
                .to_owned();
            return Err(Error::RetrievalFailed(message));
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .ok_or_else(|| {
                Error::RetrievalFailed("response carries no archive filename".to_owned())
            })?;

        let archive_path = dest_dir.join(filename);
        let mut file = tokio::fs::File::create(&archive_path).await?;
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => file.write_all(&chunk).await?,
                Ok(None) => break,
                // A transport failure mid-stream still surfaces as a
                // retrieval error, never an abandoned request.
                Err(e) => return Err(Error::RetrievalFailed(e.to_string())),
            }
        }
        file.flush().await?;

        debug!("wrote package archive to {}", archive_path.display());
        Ok(archive_path)
    }

    async fn upload_signed(&self, iri: &str, document: &Path, public_key: &Path) -> Result<Value> {
        let url = format!("{}/gwd/pkg/upload", self.base_url);
        trace!("uploading signed package for {iri} to {url}");

        let form = Form::new()
            .text("iri", iri.to_owned())
            .part("file", file_part(document).await?)
            .part("public_key", file_part(public_key).await?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::UploadFailed(format!(
                "editor service returned {status}: {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))
    }
}

/// Build a multipart file part from a file on disk.
pub(crate) async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_owned();
    Ok(Part::bytes(bytes).file_name(file_name))
}

/// Extract the archive filename from a `Content-Disposition` header value,
/// e.g. `attachment; filename="Cap_44.zip"`. Quotes and an optional
/// `utf-8''` prefix are stripped.
fn filename_from_content_disposition(header: &str) -> Option<String> {
    let after = header.split("filename").nth(1)?;
    let after = after.trim_start_matches('*');
    let value = after.split('=').nth(1)?;
    let value = value.split(';').next()?.trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    let value = value.strip_prefix("utf-8''").unwrap_or(value);
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_plain() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=Cap_44.zip"),
            Some("Cap_44.zip".to_owned())
        );
    }

    #[test]
    fn filename_quoted() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=\"Cap_44.zip\""),
            Some("Cap_44.zip".to_owned())
        );
    }

    #[test]
    fn filename_extended_syntax() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename*=utf-8''Cap_44.zip"),
            Some("Cap_44.zip".to_owned())
        );
    }

    #[test]
    fn filename_absent() {
        assert_eq!(filename_from_content_disposition("attachment"), None);
        assert_eq!(filename_from_content_disposition("attachment; filename="), None);
    }
}
