pub mod generate;
pub mod materialize;
pub mod poll;

use crate::models::task::ProviderKind;
use crate::services::media::TransformError;
use crate::services::queue::QueueError;
use crate::services::storage::StorageError;

/// Errors a task handler surfaces to the dispatcher. Anything returned here
/// triggers broker-level redelivery; handlers that resolve a failure into a
/// terminal notification return Ok instead.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("reference asset fetch failed: {0}")]
    Reference(#[source] StorageError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("scratch I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("downloaded artifact implausibly small: {0} bytes")]
    TooSmall(u64),

    #[error("media transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("no adapter registered for provider {0}")]
    UnknownProvider(ProviderKind),
}
