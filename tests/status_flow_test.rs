//! State-machine tests for the poll chain, run entirely against in-process
//! adapters: the degraded-mode scenario (no credentials configured) and the
//! bounded-retry guarantees.

use std::sync::Arc;

use async_trait::async_trait;
use media_task::models::task::{MediaKind, ProviderKind};
use media_task::services::handlers::poll::{decide, PollAction, POLL_CEILING};
use media_task::services::providers::{
    GrsaiClient, JobPhase, PollOutcome, Provider, ProviderError, ProviderRegistry, SoraClient,
    SubmitRequest,
};

fn submit_request(kind: MediaKind) -> SubmitRequest {
    SubmitRequest {
        kind,
        prompt: "a pendant on velvet".to_string(),
        aspect_ratio: "1:1".to_string(),
        reference_url: None,
        reference_path: None,
    }
}

/// No credentials configured: the registry falls back to the mock adapter,
/// which reports pending for exactly two polls, then success, and the chain
/// ends in a materialize hand-off.
#[tokio::test]
async fn degraded_mode_pipeline_reaches_success() {
    let registry = ProviderRegistry::with_candidates(vec![
        Arc::new(GrsaiClient::new("http://grsai.test", None)),
        Arc::new(SoraClient::new("http://sora.test", None)),
    ]);

    let provider = registry.select(false);
    assert_eq!(provider.id(), ProviderKind::Mock);

    let external_id = provider
        .submit(&submit_request(MediaKind::Video))
        .await
        .expect("mock submission always succeeds");

    let mut try_count = 0u32;
    let mut actions = Vec::new();
    let result_url = loop {
        let outcome = provider
            .poll(&external_id, MediaKind::Video)
            .await
            .expect("mock poll never errors");
        match decide(&outcome, try_count) {
            PollAction::Reschedule => {
                actions.push("reschedule");
                try_count += 1;
            }
            PollAction::Materialize { result_url } => break result_url,
            PollAction::Fail { .. } => panic!("mock chain must not fail"),
        }
    };

    assert_eq!(actions, vec!["reschedule", "reschedule"]);
    assert_eq!(try_count, 2);
    assert!(result_url.starts_with("mock://"));
    assert!(result_url.ends_with(".mp4"));
}

/// An adapter that never finishes, for exercising the try ceiling.
struct StuckProvider;

#[async_trait]
impl Provider for StuckProvider {
    fn id(&self) -> ProviderKind {
        ProviderKind::Grsai
    }

    fn available(&self) -> bool {
        true
    }

    fn requires_reference(&self) -> bool {
        false
    }

    async fn submit(&self, _req: &SubmitRequest) -> Result<String, ProviderError> {
        Ok("stuck-1".to_string())
    }

    async fn poll(
        &self,
        _external_id: &str,
        _kind: MediaKind,
    ) -> Result<PollOutcome, ProviderError> {
        Ok(PollOutcome::pending())
    }
}

/// A provider that stays pending forever produces exactly one terminal
/// failure, after a bounded number of reschedules.
#[tokio::test]
async fn perpetual_pending_hits_ceiling_exactly_once() {
    let provider = StuckProvider;
    let mut try_count = 0u32;
    let mut terminal_failures = 0u32;

    for _ in 0..(POLL_CEILING + 10) {
        let outcome = provider
            .poll("stuck-1", MediaKind::Image)
            .await
            .expect("poll");
        match decide(&outcome, try_count) {
            PollAction::Reschedule => try_count += 1,
            PollAction::Fail { .. } => {
                terminal_failures += 1;
                break;
            }
            PollAction::Materialize { .. } => panic!("stuck provider cannot succeed"),
        }
    }

    assert_eq!(terminal_failures, 1);
    assert_eq!(try_count, POLL_CEILING + 1);
}

/// A provider-reported failure terminates the chain immediately with the
/// provider's reason text carried through unmodified.
#[tokio::test]
async fn provider_failure_is_terminal_and_verbatim() {
    let outcome = PollOutcome {
        phase: JobPhase::Failed,
        result_url: None,
        failure_reason: Some("input image rejected".to_string()),
        error_message: None,
    };

    match decide(&outcome, 0) {
        PollAction::Fail { failure_reason, .. } => {
            assert_eq!(failure_reason.as_deref(), Some("input image rejected"));
        }
        other => panic!("expected terminal failure, got {other:?}"),
    }
}
