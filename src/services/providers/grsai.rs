use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::models::task::{MediaKind, ProviderKind};

use super::{
    interpret, PollOutcome, Provider, ProviderError, StatusEnvelope, SubmitEnvelope, SubmitRequest,
};

const IMAGE_MODEL: &str = "gpt-image-1.5";
const VIDEO_MODEL: &str = "sora-2";
const VIDEO_DURATION_SECS: u32 = 15;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Primary generation provider. Submissions are JSON, results are fetched by
/// POSTing the external id to a shared result endpoint; webhooks are
/// disabled so status is observed by polling only.
pub struct GrsaiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GrsaiClient {
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
}

#[async_trait]
impl Provider for GrsaiClient {
    fn id(&self) -> ProviderKind {
        ProviderKind::Grsai
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    fn requires_reference(&self) -> bool {
        true
    }

    async fn submit(&self, req: &SubmitRequest) -> Result<String, ProviderError> {
        let key = self.key()?;

        let (url, body) = match req.kind {
            MediaKind::Image => (
                format!("{}/draw/completions", self.base_url),
                serde_json::json!({
                    "model": IMAGE_MODEL,
                    "prompt": req.prompt,
                    "size": req.aspect_ratio,
                    "variants": 1,
                    "urls": req.reference_url.iter().collect::<Vec<_>>(),
                    "webHook": "-1",
                    "shutProgress": false,
                }),
            ),
            MediaKind::Video => (
                format!("{}/video/sora-video", self.base_url),
                serde_json::json!({
                    "model": VIDEO_MODEL,
                    "prompt": req.prompt,
                    "url": req.reference_url,
                    "aspectRatio": req.aspect_ratio,
                    "duration": VIDEO_DURATION_SECS,
                    "size": "small",
                    "webHook": "-1",
                    "shutProgress": false,
                }),
            ),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
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

    async fn poll(&self, external_id: &str, _kind: MediaKind) -> Result<PollOutcome, ProviderError> {
        let key = self.key()?;

        // Images and videos share one result endpoint.
        let url = format!("{}/draw/result", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&serde_json::json!({ "id": external_id }))
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
