use std::time::Duration;

use crate::app_state::AppState;
use crate::models::job::JobStatus;
use crate::models::task::{Delivery, PollState, Task};
use crate::services::providers::{JobPhase, PollOutcome, ProviderError};

use super::{materialize, TaskError};

/// Maximum number of status-check retries before a job is declared failed.
/// With the fixed interval this bounds a poll chain to about ten minutes.
pub const POLL_CEILING: u32 = 60;

/// Fixed re-check interval; polling is fixed-rate, not exponential, because
/// the total timeout is short.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// What one poll invocation does next. Exactly one action per invocation;
/// `Fail` and `Materialize` are terminal for the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollAction {
    /// Re-enqueue the same poll state with `try_count + 1`.
    Reschedule,
    /// Provider finished; hand the result URL to the materializer.
    Materialize { result_url: String },
    /// Terminal failure; notify once and stop.
    Fail {
        failure_reason: Option<String>,
        error_message: Option<String>,
    },
}

/// Pure transition function of the poll state machine.
pub fn decide(outcome: &PollOutcome, try_count: u32) -> PollAction {
    match outcome.phase {
        JobPhase::Pending => {
            if try_count > POLL_CEILING {
                PollAction::Fail {
                    failure_reason: Some("generation timed out".to_string()),
                    error_message: None,
                }
            } else {
                PollAction::Reschedule
            }
        }
        JobPhase::Failed => PollAction::Fail {
            failure_reason: outcome.failure_reason.clone(),
            error_message: outcome.error_message.clone(),
        },
        JobPhase::Success => match &outcome.result_url {
            Some(url) => PollAction::Materialize {
                result_url: url.clone(),
            },
            None => PollAction::Fail {
                failure_reason: Some("provider returned no result URL".to_string()),
                error_message: None,
            },
        },
    }
}

/// Handle one status-check task: poll the provider, then either reschedule,
/// materialize, or fail. A transient poll error counts as pending so a
/// single flaky check never fails the job.
pub async fn handle(state: &AppState, mut poll_state: PollState) -> Result<(), TaskError> {
    tracing::info!(
        task_id = %poll_state.task_id,
        external_id = %poll_state.external_id,
        provider = %poll_state.provider,
        try_count = poll_state.try_count,
        "checking provider status"
    );

    let provider = state
        .providers
        .get(poll_state.provider)
        .ok_or(TaskError::UnknownProvider(poll_state.provider))?;

    let outcome = match provider.poll(&poll_state.external_id, poll_state.kind).await {
        Ok(outcome) => outcome,
        Err(ProviderError::MissingCredential) => {
            // Credential revoked mid-flight: permanent, not worth retrying.
            PollOutcome {
                phase: JobPhase::Failed,
                result_url: None,
                failure_reason: None,
                error_message: Some("provider credential no longer configured".to_string()),
            }
        }
        Err(e) => {
            tracing::warn!(
                task_id = %poll_state.task_id,
                error = %e,
                "poll attempt failed, treating as pending"
            );
            PollOutcome::pending()
        }
    };

    match decide(&outcome, poll_state.try_count) {
        PollAction::Reschedule => {
            poll_state.try_count += 1;
            metrics::counter!("media_poll_retries").increment(1);
            state
                .queue
                .enqueue_in(&Delivery::new(Task::CheckStatus(poll_state)), POLL_INTERVAL)
                .await?;
            Ok(())
        }
        PollAction::Materialize { result_url } => {
            match materialize::handle(state, &poll_state, &result_url).await {
                Ok(()) => {
                    metrics::counter!("media_jobs_completed").increment(1);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(
                        task_id = %poll_state.task_id,
                        error = %e,
                        "artifact materialization failed"
                    );
                    metrics::counter!("media_jobs_failed").increment(1);
                    state
                        .notifier
                        .notify(
                            &poll_state.task_id,
                            JobStatus::Failed,
                            serde_json::json!({ "errorMessage": e.to_string() }),
                        )
                        .await;
                    Ok(())
                }
            }
        }
        PollAction::Fail {
            failure_reason,
            error_message,
        } => {
            tracing::warn!(
                task_id = %poll_state.task_id,
                try_count = poll_state.try_count,
                failure_reason = failure_reason.as_deref().unwrap_or(""),
                "job failed"
            );
            metrics::counter!("media_jobs_failed").increment(1);

            let mut extra = serde_json::Map::new();
            if let Some(reason) = failure_reason {
                extra.insert("failureReason".to_string(), reason.into());
            }
            if let Some(message) = error_message {
                extra.insert("errorMessage".to_string(), message.into());
            }
            state
                .notifier
                .notify(
                    &poll_state.task_id,
                    JobStatus::Failed,
                    serde_json::Value::Object(extra),
                )
                .await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PollOutcome {
        PollOutcome::pending()
    }

    fn success(url: Option<&str>) -> PollOutcome {
        PollOutcome {
            phase: JobPhase::Success,
            result_url: url.map(str::to_string),
            failure_reason: None,
            error_message: None,
        }
    }

    #[test]
    fn pending_under_ceiling_reschedules() {
        assert_eq!(decide(&pending(), 0), PollAction::Reschedule);
        assert_eq!(decide(&pending(), POLL_CEILING), PollAction::Reschedule);
    }

    #[test]
    fn pending_over_ceiling_fails_once() {
        match decide(&pending(), POLL_CEILING + 1) {
            PollAction::Fail { failure_reason, .. } => {
                assert_eq!(failure_reason.as_deref(), Some("generation timed out"));
            }
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[test]
    fn provider_failure_carries_reason_verbatim() {
        let outcome = PollOutcome {
            phase: JobPhase::Failed,
            result_url: None,
            failure_reason: Some("content policy violation".to_string()),
            error_message: Some("rejected by upstream".to_string()),
        };
        match decide(&outcome, 1) {
            PollAction::Fail {
                failure_reason,
                error_message,
            } => {
                assert_eq!(failure_reason.as_deref(), Some("content policy violation"));
                assert_eq!(error_message.as_deref(), Some("rejected by upstream"));
            }
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[test]
    fn success_hands_off_result_url() {
        match decide(&success(Some("https://cdn/result.mp4")), 4) {
            PollAction::Materialize { result_url } => {
                assert_eq!(result_url, "https://cdn/result.mp4");
            }
            other => panic!("expected Materialize, got {other:?}"),
        }
    }

    #[test]
    fn success_without_url_is_a_failure() {
        assert!(matches!(
            decide(&success(None), 4),
            PollAction::Fail { .. }
        ));
    }

    #[test]
    fn chain_terminates_under_perpetual_pending() {
        let mut try_count = 0u32;
        let mut steps = 0u32;
        loop {
            steps += 1;
            match decide(&pending(), try_count) {
                PollAction::Reschedule => try_count += 1,
                PollAction::Fail { .. } => break,
                other => panic!("unexpected action {other:?}"),
            }
            assert!(steps <= POLL_CEILING + 2, "chain must terminate");
        }
        assert_eq!(try_count, POLL_CEILING + 1);
        assert_eq!(steps, POLL_CEILING + 2);
    }
}
