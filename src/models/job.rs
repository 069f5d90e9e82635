use serde::{Deserialize, Serialize};
use strum::Display;

/// Externally observable status of a generation job, reported through the
/// Notifier. A job moves `generating -> completed` or `generating -> failed`;
/// a terminal status is reported at most once per task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Generating,
    Completed,
    Failed,
}
