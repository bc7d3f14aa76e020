//! The HTTP server boundary (spec §6.2/§6.3): uploading/fetching the
//! opaque wrapped master key, and reading/writing the opaque sealed
//! manifest. The core never interprets the manifest plaintext — the
//! server side is further out of scope still, reached only through this
//! trait.

use crate::error::ServerError;
use crate::manifest::SealedManifest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPutAck {
    pub vault_id: String,
    pub version: u64,
    pub etag: String,
    pub updated_at: String,
}

#[async_trait]
pub trait ServerClient: Send + Sync {
    async fn upload_wmk(&self, wmk_b64: &str) -> Result<(), ServerError>;
    async fn fetch_wmk(&self) -> Result<Option<String>, ServerError>;
    async fn fetch_manifest(&self) -> Result<Option<SealedManifest>, ServerError>;
    async fn put_manifest(&self, sealed: &SealedManifest, version: u64) -> Result<ManifestPutAck, ServerError>;
}

#[derive(Debug, Serialize)]
struct UploadWmkRequest<'a> {
    wrapped_mk: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadWmkResponse {
    #[allow(dead_code)]
    ok: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponseWmk {
    wrapped_mk: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutManifestRequest<'a> {
    version: u64,
    nonce: &'a str,
    ciphertext: &'a str,
}

/// Production client. Carries its own bearer token and base URL; never
/// mints or validates the token itself (spec §6: "the core reads
/// `SessionToken::expires_at` only").
#[cfg(feature = "http-client")]
pub struct HttpServerClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

#[cfg(feature = "http-client")]
impl HttpServerClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn map_response_status(status: reqwest::StatusCode) -> Option<ServerError> {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Some(ServerError::Unauthorized)
        } else if !status.is_success() {
            Some(ServerError::Rejected(format!("server returned {status}")))
        } else {
            None
        }
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl ServerClient for HttpServerClient {
    async fn upload_wmk(&self, wmk_b64: &str) -> Result<(), ServerError> {
        let resp = self
            .http
            .post(self.url("/user/wmk"))
            .bearer_auth(&self.bearer_token)
            .json(&UploadWmkRequest { wrapped_mk: wmk_b64 })
            .send()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        if let Some(err) = Self::map_response_status(resp.status()) {
            return Err(err);
        }
        let _: UploadWmkResponse = resp.json().await.map_err(|e| ServerError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn fetch_wmk(&self) -> Result<Option<String>, ServerError> {
        let resp = self
            .http
            .get(self.url("/user/login"))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        if let Some(err) = Self::map_response_status(resp.status()) {
            return Err(err);
        }
        let body: LoginResponseWmk = resp.json().await.map_err(|e| ServerError::Transport(e.to_string()))?;
        Ok(body.wrapped_mk)
    }

    async fn fetch_manifest(&self) -> Result<Option<SealedManifest>, ServerError> {
        let resp = self
            .http
            .get(self.url("/vault/manifest"))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(err) = Self::map_response_status(resp.status()) {
            return Err(err);
        }
        let sealed: SealedManifest = resp.json().await.map_err(|e| ServerError::Transport(e.to_string()))?;
        Ok(Some(sealed))
    }

    async fn put_manifest(&self, sealed: &SealedManifest, version: u64) -> Result<ManifestPutAck, ServerError> {
        let resp = self
            .http
            .put(self.url("/vault/manifest"))
            .bearer_auth(&self.bearer_token)
            .json(&PutManifestRequest {
                version,
                nonce: &sealed.nonce_b64,
                ciphertext: &sealed.ciphertext_b64,
            })
            .send()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        if let Some(err) = Self::map_response_status(resp.status()) {
            return Err(err);
        }
        resp.json().await.map_err(|e| ServerError::Transport(e.to_string()))
    }
}

/// Test double that never touches the network. Records every call it
/// receives so orchestrator tests can assert on interaction, not just the
/// return value.
#[derive(Default)]
pub struct RecordingServerClient {
    pub uploaded_wmks: Mutex<Vec<String>>,
    pub stub_wmk: Mutex<Option<String>>,
    pub stub_manifest: Mutex<Option<SealedManifest>>,
    pub fail_upload: Mutex<bool>,
    pub fail_upload_unauthorized: Mutex<bool>,
}

impl RecordingServerClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stub_wmk(self, wmk: Option<String>) -> Self {
        *self.stub_wmk.lock().unwrap() = wmk;
        self
    }

    pub fn set_fail_upload(&self, fail: bool) {
        *self.fail_upload.lock().unwrap() = fail;
    }

    /// Simulates the server rejecting the upload with a 401, as opposed to
    /// an ordinary transport failure — the distinction `Orchestrator::unlock`
    /// uses to choose `SessionExpired` over `WmkUploadFailed`.
    pub fn set_fail_upload_unauthorized(&self, fail: bool) {
        *self.fail_upload_unauthorized.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ServerClient for RecordingServerClient {
    async fn upload_wmk(&self, wmk_b64: &str) -> Result<(), ServerError> {
        if *self.fail_upload_unauthorized.lock().unwrap() {
            return Err(ServerError::Unauthorized);
        }
        if *self.fail_upload.lock().unwrap() {
            return Err(ServerError::Transport("simulated network failure".into()));
        }
        self.uploaded_wmks.lock().unwrap().push(wmk_b64.to_string());
        *self.stub_wmk.lock().unwrap() = Some(wmk_b64.to_string());
        Ok(())
    }

    async fn fetch_wmk(&self) -> Result<Option<String>, ServerError> {
        Ok(self.stub_wmk.lock().unwrap().clone())
    }

    async fn fetch_manifest(&self) -> Result<Option<SealedManifest>, ServerError> {
        Ok(self.stub_manifest.lock().unwrap().clone())
    }

    async fn put_manifest(&self, sealed: &SealedManifest, version: u64) -> Result<ManifestPutAck, ServerError> {
        *self.stub_manifest.lock().unwrap() = Some(sealed.clone());
        Ok(ManifestPutAck {
            vault_id: "test-vault".into(),
            version,
            etag: format!("etag-{version}"),
            updated_at: "1970-01-01T00:00:00Z".into(),
        })
    }
}
