use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::models::task::{MediaKind, ProviderKind};

use super::{
    interpret, PollOutcome, Provider, ProviderError, StatusEnvelope, SubmitEnvelope, SubmitRequest,
};

const IMAGE_MODEL: &str = "gemini-3-pro-image";
const VIDEO_MODEL: &str = "sora_video2-15s";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Secondary generation provider. Submissions are multipart (the reference
/// asset is uploaded from the local scratch copy rather than passed by URL);
/// status is polled per-resource.
pub struct SoraClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SoraClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::MissingCredential)
    }

    fn resource(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

/// Map an aspect-ratio string to the fixed output sizes this provider
/// accepts: square, landscape, or portrait.
fn size_for(kind: MediaKind, aspect_ratio: &str) -> &'static str {
    let landscape = match aspect_ratio.split_once(':') {
        Some((w, h)) => {
            let w: u32 = w.parse().unwrap_or(1);
            let h: u32 = h.parse().unwrap_or(1);
            w > h
        }
        None => false,
    };
    match (kind, landscape) {
        (MediaKind::Video, true) => "1280x720",
        (MediaKind::Video, false) => "720x1280",
        (MediaKind::Image, true) => "1792x1024",
        (MediaKind::Image, false) if aspect_ratio == "1:1" => "1024x1024",
        (MediaKind::Image, false) => "1024x1792",
    }
}

#[async_trait]
impl Provider for SoraClient {
    fn id(&self) -> ProviderKind {
        ProviderKind::Sora
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    fn requires_reference(&self) -> bool {
        false
    }

    async fn submit(&self, req: &SubmitRequest) -> Result<String, ProviderError> {
        let key = self.key()?;

        let model = match req.kind {
            MediaKind::Image => IMAGE_MODEL,
            MediaKind::Video => VIDEO_MODEL,
        };

        let mut form = Form::new()
            .text("model", model)
            .text("prompt", req.prompt.clone())
            .text("size", size_for(req.kind, &req.aspect_ratio));

        if let Some(path) = &req.reference_path {
            let bytes = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "reference.png".to_string());
            form = form.part("input_reference", Part::bytes(bytes).file_name(file_name));
        }

        let url = format!("{}/{}", self.base_url, Self::resource(req.kind));
        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .multipart(form)
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: SubmitEnvelope = response.json().await?;
        envelope.into_id()
    }

    async fn poll(&self, external_id: &str, kind: MediaKind) -> Result<PollOutcome, ProviderError> {
        let key = self.key()?;

        let url = format!(
            "{}/{}/{}",
            self.base_url,
            Self::resource(kind),
            external_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(key)
            .timeout(POLL_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: StatusEnvelope = response.json().await?;
        Ok(interpret(envelope.into_body()))
    }
}
