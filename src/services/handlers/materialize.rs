use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::app_state::AppState;
use crate::models::job::JobStatus;
use crate::models::task::{MediaKind, PollState};
use crate::services::storage;

use super::TaskError;

/// Bodies smaller than this are upstream error pages, not media.
const MIN_ARTIFACT_BYTES: u64 = 1024;

/// Result downloads move real media, so they get the longest timeout in the
/// pipeline.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Mock results carry this scheme instead of a fetchable URL.
const MOCK_SCHEME: &str = "mock://";

/// Materialize a finished job: download (or synthesize) the primary
/// artifact, derive a cover, stage both into object storage under
/// deterministic keys, and emit the `completed` notification.
pub async fn handle(state: &AppState, poll_state: &PollState, result_url: &str) -> Result<(), TaskError> {
    let scratch = PathBuf::from(&state.config.scratch_dir);
    tokio::fs::create_dir_all(&scratch).await?;

    let ext = match poll_state.kind {
        MediaKind::Image => "png",
        MediaKind::Video => "mp4",
    };
    let primary_path = scratch.join(format!("{}.{}", poll_state.media_id, ext));

    // 1. Fetch the primary artifact. Mock URLs synthesize a placeholder
    // locally so the degraded-mode pipeline still runs end-to-end.
    if result_url.starts_with(MOCK_SCHEME) {
        tracing::info!(task_id = %poll_state.task_id, "synthesizing placeholder artifact for mock result");
        match poll_state.kind {
            MediaKind::Video => state.media.placeholder_video(&primary_path).await?,
            MediaKind::Image => state.media.placeholder_file(&primary_path).await?,
        }
    } else {
        download(&state.http, result_url, &primary_path).await?;
        let size = tokio::fs::metadata(&primary_path).await?.len();
        if size < MIN_ARTIFACT_BYTES {
            let _ = tokio::fs::remove_file(&primary_path).await;
            return Err(TaskError::TooSmall(size));
        }
        tracing::info!(task_id = %poll_state.task_id, bytes = size, "downloaded result artifact");
    }

    // 2. Derive the cover; on failure the primary artifact doubles as its
    // own cover.
    let cover_path = scratch.join(format!("{}_cover.png", poll_state.media_id));
    let cover_result = match poll_state.kind {
        MediaKind::Image => state.media.scale_cover(&primary_path, &cover_path).await,
        MediaKind::Video => state.media.extract_frame(&primary_path, &cover_path).await,
    };
    let cover_src = match cover_result {
        Ok(()) => cover_path.clone(),
        Err(e) => {
            tracing::warn!(
                task_id = %poll_state.task_id,
                error = %e,
                "cover derivation failed, reusing primary artifact as cover"
            );
            primary_path.clone()
        }
    };

    // 3. Stage into object storage. The primary upload is load-bearing; the
    // cover upload is not.
    let namespace = poll_state.namespace(&state.config.default_namespace);
    let primary_key = storage::media_key(namespace, &poll_state.media_id, poll_state.kind);
    let cover_key = storage::cover_key(namespace, &poll_state.media_id, poll_state.kind);

    let primary_data = tokio::fs::read(&primary_path).await?;
    state.storage.upload_private(&primary_key, &primary_data).await?;
    tracing::info!(task_id = %poll_state.task_id, key = %primary_key, "uploaded primary artifact");

    match tokio::fs::read(&cover_src).await {
        Ok(cover_data) => {
            if let Err(e) = state.storage.upload_public(&cover_key, &cover_data).await {
                tracing::warn!(task_id = %poll_state.task_id, error = %e, "cover upload failed");
            }
        }
        Err(e) => {
            tracing::warn!(task_id = %poll_state.task_id, error = %e, "cover unreadable, skipping upload");
        }
    }

    // 4. Report completion with both keys and the original dimensions.
    let (path_field, cover_field) = match poll_state.kind {
        MediaKind::Image => ("imagePath", "imageCoverPath"),
        MediaKind::Video => ("videoPath", "videoCoverPath"),
    };
    state
        .notifier
        .notify(
            &poll_state.task_id,
            JobStatus::Completed,
            serde_json::json!({
                path_field: primary_key,
                cover_field: cover_key,
                "width": poll_state.width,
                "height": poll_state.height,
            }),
        )
        .await;

    let _ = tokio::fs::remove_file(&primary_path).await;
    if cover_src != primary_path {
        let _ = tokio::fs::remove_file(&cover_src).await;
    }

    tracing::info!(task_id = %poll_state.task_id, "job completed");
    Ok(())
}

async fn download(http: &reqwest::Client, url: &str, dest: &Path) -> Result<(), TaskError> {
    let mut response = http
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
