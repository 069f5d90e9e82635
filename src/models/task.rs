use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Class of media a job produces. Image and video jobs share one pipeline but
/// differ in poll delays, cover derivation, and storage key extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// Identity of a generation provider adapter. Serialized into the
/// `check_status` payload so the poll handler can resolve the same adapter
/// that accepted the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    Grsai,
    Sora,
    Mock,
}

/// Payload for an image generation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImage {
    pub task_id: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub reference_key: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub prompt: String,
    #[serde(default)]
    pub style_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Payload for a video generation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideo {
    pub task_id: String,
    #[serde(default)]
    pub asset_id: String,
    pub video_id: String,
    #[serde(default)]
    pub reference_key: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Payload for a status-check task. This message is the only durable copy of
/// in-flight poll state: each poll either re-emits an updated copy
/// (`try_count + 1`) or terminates the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub task_id: String,
    #[serde(default)]
    pub asset_id: String,
    /// Task id for images, the dedicated video id for videos.
    pub media_id: String,
    pub kind: MediaKind,
    pub external_id: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub reference_key: Option<String>,
    #[serde(default)]
    pub try_count: u32,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl PollState {
    /// Storage namespace for this job: the job's user identity when present,
    /// the configured default otherwise.
    pub fn namespace<'a>(&'a self, default_ns: &'a str) -> &'a str {
        self.user_id
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(default_ns)
    }
}

/// A queue task, tagged by type for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    GenerateImage(GenerateImage),
    GenerateVideo(GenerateVideo),
    CheckStatus(PollState),
}

impl Task {
    pub fn task_id(&self) -> &str {
        match self {
            Task::GenerateImage(p) => &p.task_id,
            Task::GenerateVideo(p) => &p.task_id,
            Task::CheckStatus(p) => &p.task_id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Task::GenerateImage(_) => "generate_image",
            Task::GenerateVideo(_) => "generate_video",
            Task::CheckStatus(_) => "check_status",
        }
    }
}

/// Queue envelope around a task. `attempts` counts redeliveries after handler
/// errors; it belongs to the queue layer, not to the task payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(default)]
    pub attempts: u32,
    pub task: Task,
}

impl Delivery {
    pub fn new(task: Task) -> Self {
        Self { attempts: 0, task }
    }
}

/// One logical unit of generation work, normalized from either generate
/// payload. Immutable once built.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub task_id: String,
    pub asset_id: String,
    /// Id the artifact is stored under: task id for images, video id for videos.
    pub media_id: String,
    pub kind: MediaKind,
    pub prompt: String,
    pub reference_key: Option<String>,
    pub width: u32,
    pub height: u32,
    pub user_id: Option<String>,
    pub style_id: Option<String>,
}

impl JobRequest {
    pub fn namespace<'a>(&'a self, default_ns: &'a str) -> &'a str {
        self.user_id
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(default_ns)
    }
}

impl From<GenerateImage> for JobRequest {
    fn from(p: GenerateImage) -> Self {
        Self {
            media_id: p.task_id.clone(),
            task_id: p.task_id,
            asset_id: p.asset_id,
            kind: MediaKind::Image,
            prompt: p.prompt,
            reference_key: p.reference_key,
            width: p.width,
            height: p.height,
            user_id: p.user_id,
            style_id: p.style_id,
        }
    }
}

impl From<GenerateVideo> for JobRequest {
    fn from(p: GenerateVideo) -> Self {
        Self {
            task_id: p.task_id,
            asset_id: p.asset_id,
            media_id: p.video_id,
            kind: MediaKind::Video,
            prompt: p.prompt,
            reference_key: p.reference_key,
            width: p.width,
            height: p.height,
            user_id: p.user_id,
            style_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_status_payload_uses_camel_case_keys() {
        let json = r#"{
            "type": "check_status",
            "taskId": "task_1",
            "assetId": "asset_1",
            "mediaId": "vid_1",
            "kind": "video",
            "externalId": "ext-42",
            "provider": "grsai",
            "tryCount": 3,
            "width": 720,
            "height": 1280
        }"#;

        let task: Task = serde_json::from_str(json).expect("payload should parse");
        match task {
            Task::CheckStatus(ps) => {
                assert_eq!(ps.try_count, 3);
                assert_eq!(ps.provider, ProviderKind::Grsai);
                assert_eq!(ps.kind, MediaKind::Video);
                assert!(ps.reference_key.is_none());
            }
            other => panic!("expected check_status, got {}", other.type_name()),
        }
    }

    #[test]
    fn video_request_stores_under_video_id() {
        let job: JobRequest = GenerateVideo {
            task_id: "task_1".into(),
            asset_id: "asset_1".into(),
            video_id: "vid_9".into(),
            reference_key: None,
            prompt: "a calm sea".into(),
            user_id: Some("user_7".into()),
            width: 1280,
            height: 720,
        }
        .into();

        assert_eq!(job.media_id, "vid_9");
        assert_eq!(job.kind, MediaKind::Video);
    }

    #[test]
    fn namespace_falls_back_to_default() {
        let mut job: JobRequest = GenerateImage {
            task_id: "task_1".into(),
            asset_id: String::new(),
            reference_key: None,
            width: 0,
            height: 0,
            prompt: "x".into(),
            style_id: None,
            user_id: None,
        }
        .into();

        assert_eq!(job.namespace("userid123456"), "userid123456");

        job.user_id = Some("user_7".into());
        assert_eq!(job.namespace("userid123456"), "user_7");

        job.user_id = Some(String::new());
        assert_eq!(job.namespace("userid123456"), "userid123456");
    }
}
