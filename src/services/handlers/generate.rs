use std::path::PathBuf;
use std::time::Duration;

use crate::app_state::AppState;
use crate::models::job::JobStatus;
use crate::models::task::{Delivery, JobRequest, MediaKind, PollState, Task};
use crate::services::providers::{self, SubmitRequest};
use crate::services::storage;

use super::TaskError;

/// Providers answer image polls sooner than video polls, so the first check
/// is scheduled accordingly.
const IMAGE_FIRST_POLL_DELAY: Duration = Duration::from_secs(5);
const VIDEO_FIRST_POLL_DELAY: Duration = Duration::from_secs(10);

fn first_poll_delay(kind: MediaKind) -> Duration {
    match kind {
        MediaKind::Image => IMAGE_FIRST_POLL_DELAY,
        MediaKind::Video => VIDEO_FIRST_POLL_DELAY,
    }
}

/// Handle one generation request: resolve the reference asset, derive and
/// publish a preview cover, select a provider, submit, and schedule the
/// first status check.
///
/// Returns Err only for the reference fetch, which the dispatcher may safely
/// redeliver; every later failure resolves into a terminal notification.
pub async fn handle(state: &AppState, job: JobRequest) -> Result<(), TaskError> {
    tracing::info!(
        task_id = %job.task_id,
        asset_id = %job.asset_id,
        kind = %job.kind,
        "processing generation request"
    );

    let scratch = PathBuf::from(&state.config.scratch_dir);
    tokio::fs::create_dir_all(&scratch).await?;

    let namespace = job.namespace(&state.config.default_namespace).to_string();

    // 1. Fetch the reference asset, if any. A missing reference is permanent
    // from the job's point of view, but the fetch itself is retried through
    // broker redelivery before the dispatcher gives up.
    let mut local_ref: Option<PathBuf> = None;
    let mut cover_key = String::new();

    if let Some(reference_key) = &job.reference_key {
        let ref_path = scratch.join(format!("{}_ref.png", job.task_id));
        let bytes = state
            .storage
            .download_private(reference_key)
            .await
            .map_err(TaskError::Reference)?;
        tokio::fs::write(&ref_path, &bytes).await?;
        tracing::info!(task_id = %job.task_id, reference_key, "downloaded reference asset");

        // 2. Best-effort preview cover from the reference.
        let cover_path = scratch.join(format!("{}_ref_cover.png", job.task_id));
        match state.media.scale_cover(&ref_path, &cover_path).await {
            Ok(()) => {
                let key = storage::reference_cover_key(&namespace, &job.task_id);
                match tokio::fs::read(&cover_path).await {
                    Ok(data) => match state.storage.upload_public(&key, &data).await {
                        Ok(()) => {
                            tracing::info!(task_id = %job.task_id, cover = %key, "uploaded reference cover");
                            cover_key = key;
                        }
                        Err(e) => {
                            tracing::warn!(task_id = %job.task_id, error = %e, "reference cover upload failed");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(task_id = %job.task_id, error = %e, "reference cover unreadable");
                    }
                }
                let _ = tokio::fs::remove_file(&cover_path).await;
            }
            Err(e) => {
                tracing::warn!(task_id = %job.task_id, error = %e, "reference cover derivation failed");
            }
        }

        local_ref = Some(ref_path);
    }

    // 3. Announce the job before submission; the cover key may be empty.
    state
        .notifier
        .notify(
            &job.task_id,
            JobStatus::Generating,
            serde_json::json!({ "coverPath": cover_key }),
        )
        .await;

    // 4. Resolve aspect ratio and pick a provider. Presigning can fail
    // independently of the download; a provider that needs the URL is then
    // simply not eligible.
    let ratio = providers::aspect_ratio(job.width, job.height);

    let mut reference_url = None;
    if let (Some(reference_key), Some(_)) = (&job.reference_key, &local_ref) {
        match state.storage.presign_reference(reference_key).await {
            Ok(url) => reference_url = Some(url),
            Err(e) => {
                tracing::warn!(
                    task_id = %job.task_id,
                    error = %e,
                    "failed to presign reference, URL-based providers will be skipped"
                );
            }
        }
    }

    let provider = state.providers.select(reference_url.is_some());
    tracing::info!(task_id = %job.task_id, provider = %provider.id(), "selected generation provider");

    // 5. Submit. Submission errors are surfaced immediately; only polling is
    // retried.
    let submit = SubmitRequest {
        kind: job.kind,
        prompt: job.prompt.clone(),
        aspect_ratio: ratio,
        reference_url,
        reference_path: local_ref.clone(),
    };

    let external_id = match provider.submit(&submit).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(task_id = %job.task_id, provider = %provider.id(), error = %e, "provider submission failed");
            metrics::counter!("media_jobs_failed").increment(1);
            state
                .notifier
                .notify(
                    &job.task_id,
                    JobStatus::Failed,
                    serde_json::json!({ "errorMessage": e.to_string() }),
                )
                .await;
            cleanup(&local_ref).await;
            return Ok(());
        }
    };
    tracing::info!(task_id = %job.task_id, external_id, provider = %provider.id(), "submitted to provider");

    // 6. Chain the first status check; poll state lives only in this message.
    let poll = PollState {
        task_id: job.task_id.clone(),
        asset_id: job.asset_id.clone(),
        media_id: job.media_id.clone(),
        kind: job.kind,
        external_id,
        provider: provider.id(),
        reference_key: job.reference_key.clone(),
        try_count: 0,
        user_id: job.user_id.clone(),
        width: job.width,
        height: job.height,
    };

    state
        .queue
        .enqueue_in(&Delivery::new(Task::CheckStatus(poll)), first_poll_delay(job.kind))
        .await?;

    cleanup(&local_ref).await;
    Ok(())
}

async fn cleanup(local_ref: &Option<PathBuf>) {
    if let Some(path) = local_ref {
        let _ = tokio::fs::remove_file(path).await;
    }
}
