use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the task queue
    pub redis_url: String,

    /// Status-update endpoint of the consuming application
    pub notify_url: String,

    /// R2 endpoint URL (S3-compatible)
    pub r2_endpoint: String,

    /// R2 access key ID
    pub r2_access_key: String,

    /// R2 secret access key
    pub r2_secret_key: String,

    /// Private bucket holding generated media and reference assets
    #[serde(default = "default_r2_bucket")]
    pub r2_bucket: String,

    /// Public bucket holding covers and thumbnails
    #[serde(default = "default_r2_public_bucket")]
    pub r2_public_bucket: String,

    /// Primary provider API key; when absent the adapter reports unavailable
    #[serde(default)]
    pub grsai_key: Option<String>,

    #[serde(default = "default_grsai_base_url")]
    pub grsai_base_url: String,

    /// Secondary provider API key
    #[serde(default)]
    pub sora_api_key: Option<String>,

    #[serde(default = "default_sora_base_url")]
    pub sora_base_url: String,

    /// Storage namespace used when a job carries no user identity
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// ffmpeg binary used by the media-transform collaborator
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    /// Scratch directory for downloaded and derived files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Number of concurrent worker tasks in the processing pool
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_r2_bucket() -> String {
    "media".to_string()
}

fn default_r2_public_bucket() -> String {
    "covers".to_string()
}

fn default_grsai_base_url() -> String {
    "https://grsai.dakka.com.cn/v1".to_string()
}

fn default_sora_base_url() -> String {
    "https://api.laozhang.ai/v1".to_string()
}

fn default_namespace() -> String {
    "userid123456".to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_scratch_dir() -> String {
    "tmp".to_string()
}

fn default_worker_concurrency() -> usize {
    5
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
