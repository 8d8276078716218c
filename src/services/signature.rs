use std::{path::Path, time::Duration};

use async_trait::async_trait;
use log::trace;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    services::{editor::file_part, SignatureApi},
};

/// HTTP client for the external signing service.
#[derive(Debug, Clone)]
pub struct SignatureClient {
    base_url: String,
    client: reqwest::Client,
}

impl SignatureClient {
    /// Create a client for the signing service at `base_url`, with a bounded
    /// timeout applied to every call.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        Ok(SignatureClient {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl SignatureApi for SignatureClient {
    async fn sign(
        &self,
        document: &Path,
        public_key: &Path,
        private_key: &Path,
    ) -> Result<Vec<u8>> {
        let url = format!("{}/sign", self.base_url);
        trace!("signing {} via {url}", document.display());

        let form = Form::new()
            .part("input_file", file_part(document).await?)
            .part("public_key", file_part(public_key).await?)
            .part("private_key", file_part(private_key).await?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::SigningFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::SigningFailed(format!(
                "signing service returned {status}: {text}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn validate(&self, document: &[u8], public_key: &Path) -> Result<bool> {
        let url = format!("{}/validate", self.base_url);
        trace!("validating signature via {url}");

        let form = Form::new()
            .part(
                "input_file",
                Part::bytes(document.to_vec()).file_name("document.xml"),
            )
            .part("public_key", file_part(public_key).await?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::ValidationCallFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ValidationCallFailed(format!(
                "validation service returned {status}: {text}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::ValidationCallFailed(e.to_string()))?;
        body.get("valid")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| {
                Error::ValidationCallFailed(format!(
                    "response carries no boolean 'valid' field: {body}"
                ))
            })
    }
}
