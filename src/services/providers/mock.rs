use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::task::{MediaKind, ProviderKind};

use super::{JobPhase, PollOutcome, Provider, ProviderError, SubmitRequest};

/// How many polls of a given external id report `pending` before `success`.
const READY_AFTER_POLLS: u32 = 2;

/// Degraded-mode adapter used when no provider credential is configured.
/// Submission always succeeds with a synthetic id; polling reports pending
/// for a fixed number of calls, then success with a `mock://` result URL the
/// materializer resolves into a locally synthesized placeholder.
pub struct MockProvider {
    polls: Mutex<HashMap<String, u32>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            polls: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn available(&self) -> bool {
        true
    }

    fn requires_reference(&self) -> bool {
        false
    }

    async fn submit(&self, _req: &SubmitRequest) -> Result<String, ProviderError> {
        Ok(format!("mock-{}", Uuid::new_v4().simple()))
    }

    async fn poll(&self, external_id: &str, kind: MediaKind) -> Result<PollOutcome, ProviderError> {
        let count = {
            let mut polls = self.polls.lock().unwrap_or_else(|e| e.into_inner());
            let count = polls.entry(external_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if count <= READY_AFTER_POLLS {
            return Ok(PollOutcome::pending());
        }

        let ext = match kind {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        };
        Ok(PollOutcome {
            phase: JobPhase::Success,
            result_url: Some(format!("mock://{external_id}.{ext}")),
            failure_reason: None,
            error_message: None,
        })
    }
}
