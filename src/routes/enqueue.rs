use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::task::{Delivery, GenerateImage, GenerateVideo, Task};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImageJobRequest {
    #[garde(length(min = 1, max = 2000))]
    pub prompt: String,

    #[garde(skip)]
    #[serde(default)]
    pub asset_id: String,

    #[garde(skip)]
    #[serde(default)]
    pub reference_key: Option<String>,

    #[garde(range(max = 8192))]
    #[serde(default)]
    pub width: u32,

    #[garde(range(max = 8192))]
    #[serde(default)]
    pub height: u32,

    #[garde(skip)]
    #[serde(default)]
    pub style_id: Option<String>,

    #[garde(skip)]
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VideoJobRequest {
    #[garde(length(min = 1, max = 2000))]
    pub prompt: String,

    #[garde(skip)]
    #[serde(default)]
    pub asset_id: String,

    #[garde(skip)]
    #[serde(default)]
    pub reference_key: Option<String>,

    #[garde(range(max = 8192))]
    #[serde(default)]
    pub width: u32,

    #[garde(range(max = 8192))]
    #[serde(default)]
    pub height: u32,

    #[garde(skip)]
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

/// POST /api/v1/queue/image — validate, mint a task id, enqueue.
pub async fn enqueue_image(
    State(state): State<AppState>,
    Json(req): Json<ImageJobRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let task_id = format!("task_{}", Uuid::new_v4().simple());
    let payload = GenerateImage {
        task_id: task_id.clone(),
        asset_id: req.asset_id,
        reference_key: req.reference_key,
        width: req.width,
        height: req.height,
        prompt: req.prompt,
        style_id: req.style_id,
        user_id: req.user_id,
    };

    state
        .queue
        .enqueue(&Delivery::new(Task::GenerateImage(payload)))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    metrics::counter!("media_jobs_submitted").increment(1);
    tracing::info!(task_id, "enqueued image generation task");

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            task_id,
            video_id: None,
        }),
    ))
}

/// POST /api/v1/queue/video — validate, mint task and video ids, enqueue.
///
/// The first status check is NOT enqueued here: the generation task performs
/// that enqueue itself once it holds an external id, which is the only
/// ordering primitive between the two.
pub async fn enqueue_video(
    State(state): State<AppState>,
    Json(req): Json<VideoJobRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, String)> {
    req.validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let task_id = format!("task_{}", Uuid::new_v4().simple());
    let video_id = format!("vid_{}", Uuid::new_v4().simple());
    let payload = GenerateVideo {
        task_id: task_id.clone(),
        asset_id: req.asset_id,
        video_id: video_id.clone(),
        reference_key: req.reference_key,
        prompt: req.prompt,
        user_id: req.user_id,
        width: req.width,
        height: req.height,
    };

    state
        .queue
        .enqueue(&Delivery::new(Task::GenerateVideo(payload)))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    metrics::counter!("media_jobs_submitted").increment(1);
    tracing::info!(task_id, video_id, "enqueued video generation task");

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            task_id,
            video_id: Some(video_id),
        }),
    ))
}
