pub mod grsai;
pub mod mock;
pub mod sora;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::models::task::{MediaKind, ProviderKind};

pub use grsai::GrsaiClient;
pub use mock::MockProvider;
pub use sora::SoraClient;

/// Three-way status lattice every adapter normalizes into. The rest of the
/// system never sees provider-specific status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    Success,
    Failed,
}

/// Normalized result of one provider poll call.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub phase: JobPhase,
    pub result_url: Option<String>,
    pub failure_reason: Option<String>,
    pub error_message: Option<String>,
}

impl PollOutcome {
    pub fn pending() -> Self {
        Self {
            phase: JobPhase::Pending,
            result_url: None,
            failure_reason: None,
            error_message: None,
        }
    }
}

/// Everything an adapter needs to submit one generation job.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub kind: MediaKind,
    pub prompt: String,
    pub aspect_ratio: String,
    /// Presigned URL of the reference asset, for adapters that take URLs.
    pub reference_url: Option<String>,
    /// Local scratch copy of the reference asset, for adapters that upload it.
    pub reference_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider credential not configured")]
    MissingCredential,

    #[error("reference asset I/O failed: {0}")]
    Reference(#[from] std::io::Error),
}

/// Uniform submit/poll contract over one external generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderKind;

    /// Credential configured and adapter usable.
    fn available(&self) -> bool;

    /// Whether submission needs a publicly reachable reference URL.
    fn requires_reference(&self) -> bool;

    /// Submit a generation job; returns the provider-assigned external id.
    async fn submit(&self, req: &SubmitRequest) -> Result<String, ProviderError>;

    /// Check the status of a previously submitted job.
    async fn poll(&self, external_id: &str, kind: MediaKind) -> Result<PollOutcome, ProviderError>;
}

/// Map one provider status string into the three-way lattice.
pub fn normalize_status(raw: &str) -> JobPhase {
    match raw {
        "succeeded" | "success" | "completed" | "finish" => JobPhase::Success,
        "failed" | "error" => JobPhase::Failed,
        _ => JobPhase::Pending,
    }
}

/// Reduce width/height to an aspect-ratio string via GCD, defaulting to 1:1
/// when either dimension is missing.
pub fn aspect_ratio(width: u32, height: u32) -> String {
    if width == 0 || height == 0 {
        return "1:1".to_string();
    }
    let mut a = width;
    let mut b = height;
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    format!("{}:{}", width / a, height / a)
}

/// Submission response body: `{id}` or `{data: {id}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SubmitEnvelope {
    Wrapped { data: SubmitBody },
    Flat(SubmitBody),
}

impl SubmitEnvelope {
    pub fn into_id(self) -> Result<String, ProviderError> {
        let body = match self {
            SubmitEnvelope::Wrapped { data } => data,
            SubmitEnvelope::Flat(body) => body,
        };
        if body.id.is_empty() {
            Err(ProviderError::Malformed("no id in response".to_string()))
        } else {
            Ok(body.id)
        }
    }
}

/// Poll response body: `{status, results, failure_reason, error}`, possibly
/// nested under `{data: ...}`. Adapters parse this, never the raw shape.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub results: Vec<ResultEntry>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultEntry {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StatusEnvelope {
    Wrapped { data: StatusBody },
    Flat(StatusBody),
}

impl StatusEnvelope {
    pub fn into_body(self) -> StatusBody {
        match self {
            StatusEnvelope::Wrapped { data } => data,
            StatusEnvelope::Flat(body) => body,
        }
    }
}

/// Normalize a parsed status body into a PollOutcome.
pub(crate) fn interpret(body: StatusBody) -> PollOutcome {
    let phase = normalize_status(&body.status);
    let result_url = if phase == JobPhase::Success {
        body.results
            .into_iter()
            .map(|r| r.url)
            .find(|u| !u.is_empty())
    } else {
        None
    };
    PollOutcome {
        phase,
        result_url,
        failure_reason: body.failure_reason,
        error_message: body.error,
    }
}

/// Ordered provider candidates with first-match selection. The mock adapter
/// is the unconditional fallback so credential-absent deployments still
/// exercise the full pipeline.
pub struct ProviderRegistry {
    candidates: Vec<Arc<dyn Provider>>,
    fallback: Arc<dyn Provider>,
}

impl ProviderRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        let candidates: Vec<Arc<dyn Provider>> = vec![
            Arc::new(GrsaiClient::new(
                &config.grsai_base_url,
                config.grsai_key.clone(),
            )),
            Arc::new(SoraClient::new(
                &config.sora_base_url,
                config.sora_api_key.clone(),
            )),
        ];
        Self {
            candidates,
            fallback: Arc::new(MockProvider::new()),
        }
    }

    /// Build a registry over an explicit candidate list (ordering is the
    /// selection priority); the mock remains the unconditional fallback.
    pub fn with_candidates(candidates: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            candidates,
            fallback: Arc::new(MockProvider::new()),
        }
    }

    /// First candidate whose credential is configured and whose reference
    /// requirement is satisfied; the mock otherwise.
    pub fn select(&self, has_reference: bool) -> Arc<dyn Provider> {
        self.candidates
            .iter()
            .find(|p| p.available() && (!p.requires_reference() || has_reference))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Resolve the adapter a poll-state message was submitted through.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn Provider>> {
        if self.fallback.id() == kind {
            return Some(Arc::clone(&self.fallback));
        }
        self.candidates.iter().find(|p| p.id() == kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_maps_success_vocabulary() {
        for raw in ["succeeded", "success", "completed", "finish"] {
            assert_eq!(normalize_status(raw), JobPhase::Success, "{raw}");
        }
    }

    #[test]
    fn normalization_maps_failure_vocabulary() {
        for raw in ["failed", "error"] {
            assert_eq!(normalize_status(raw), JobPhase::Failed, "{raw}");
        }
    }

    #[test]
    fn normalization_defaults_to_pending() {
        for raw in ["processing", "pending", "queued", "running", "", "unknown"] {
            assert_eq!(normalize_status(raw), JobPhase::Pending, "{raw}");
        }
    }

    #[test]
    fn aspect_ratio_reduces_via_gcd() {
        assert_eq!(aspect_ratio(1920, 1080), "16:9");
        assert_eq!(aspect_ratio(1080, 1920), "9:16");
        assert_eq!(aspect_ratio(1000, 1000), "1:1");
    }

    #[test]
    fn aspect_ratio_defaults_on_missing_dimension() {
        assert_eq!(aspect_ratio(0, 1080), "1:1");
        assert_eq!(aspect_ratio(1920, 0), "1:1");
    }

    #[test]
    fn status_envelope_parses_flat_and_wrapped() {
        let flat = r#"{"status": "success", "results": [{"url": "https://cdn/x.png"}]}"#;
        let body = serde_json::from_str::<StatusEnvelope>(flat)
            .expect("flat body should parse")
            .into_body();
        let outcome = interpret(body);
        assert_eq!(outcome.phase, JobPhase::Success);
        assert_eq!(outcome.result_url.as_deref(), Some("https://cdn/x.png"));

        let wrapped = r#"{"code": 0, "data": {"status": "failed", "failure_reason": "nsfw"}, "msg": "ok"}"#;
        let body = serde_json::from_str::<StatusEnvelope>(wrapped)
            .expect("wrapped body should parse")
            .into_body();
        let outcome = interpret(body);
        assert_eq!(outcome.phase, JobPhase::Failed);
        assert_eq!(outcome.failure_reason.as_deref(), Some("nsfw"));
    }

    #[test]
    fn success_without_result_url_yields_none() {
        let body = StatusBody {
            status: "success".to_string(),
            results: vec![],
            failure_reason: None,
            error: None,
        };
        let outcome = interpret(body);
        assert_eq!(outcome.phase, JobPhase::Success);
        assert!(outcome.result_url.is_none());
    }

    #[test]
    fn submit_envelope_parses_both_shapes() {
        let flat = r#"{"id": "ext-1"}"#;
        let id = serde_json::from_str::<SubmitEnvelope>(flat)
            .expect("flat id should parse")
            .into_id()
            .expect("id present");
        assert_eq!(id, "ext-1");

        let wrapped = r#"{"code": 0, "data": {"id": "ext-2"}}"#;
        let id = serde_json::from_str::<SubmitEnvelope>(wrapped)
            .expect("wrapped id should parse")
            .into_id()
            .expect("id present");
        assert_eq!(id, "ext-2");

        let empty = r#"{"code": 1, "msg": "denied"}"#;
        let result = serde_json::from_str::<SubmitEnvelope>(empty)
            .expect("empty body should still parse")
            .into_id();
        assert!(result.is_err());
    }

    #[test]
    fn selection_falls_back_to_mock_without_credentials() {
        let registry = ProviderRegistry::with_candidates(vec![
            Arc::new(GrsaiClient::new("http://grsai.test", None)),
            Arc::new(SoraClient::new("http://sora.test", None)),
        ]);
        assert_eq!(registry.select(true).id(), ProviderKind::Mock);
        assert_eq!(registry.select(false).id(), ProviderKind::Mock);
    }

    #[test]
    fn selection_is_first_match_in_order() {
        let registry = ProviderRegistry::with_candidates(vec![
            Arc::new(GrsaiClient::new("http://grsai.test", Some("k1".into()))),
            Arc::new(SoraClient::new("http://sora.test", Some("k2".into()))),
        ]);
        // Reference available: the capability-rich provider wins.
        assert_eq!(registry.select(true).id(), ProviderKind::Grsai);
        // No reference: grsai is skipped, sora takes it.
        assert_eq!(registry.select(false).id(), ProviderKind::Sora);
    }

    #[test]
    fn registry_resolves_by_kind() {
        let registry = ProviderRegistry::with_candidates(vec![Arc::new(GrsaiClient::new(
            "http://grsai.test",
            Some("k1".into()),
        ))]);
        assert!(registry.get(ProviderKind::Grsai).is_some());
        assert!(registry.get(ProviderKind::Mock).is_some());
        assert!(registry.get(ProviderKind::Sora).is_none());
    }
}
