use std::time::Duration;

use media_task::{
    app_state::AppState,
    config::AppConfig,
    models::{job::JobStatus, task::{Delivery, Task}},
    services::{
        handlers::{self, TaskError},
        media::MediaTransform,
        notify::Notifier,
        providers::ProviderRegistry,
        queue::{QueueError, TaskQueue},
        storage::R2Client,
    },
};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

/// A task whose handler errors is redelivered this many times before the job
/// is declared failed.
const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Delay before a failed delivery is retried.
const REDELIVERY_DELAY: Duration = Duration::from_secs(5);

/// Idle sleep when the queue is empty.
const IDLE_POLL_MS: u64 = 1000;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting media generation worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize services
    tracing::info!("Initializing services");
    let queue = TaskQueue::new(&config.redis_url).expect("Failed to initialize task queue");

    let storage = R2Client::new(
        &config.r2_bucket,
        &config.r2_public_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 client");

    let notifier = Notifier::new(&config.notify_url);
    let media = MediaTransform::new(&config.ffmpeg_bin);
    let providers = ProviderRegistry::from_config(&config);

    let concurrency = config.worker_concurrency.max(1);
    let state = AppState::new(config, queue, storage, notifier, media, providers);

    tracing::info!(concurrency, "Worker ready, starting processing pool");

    // Bounded worker pool: each worker blocks on its own task, never on a
    // provider. Waiting is always a delayed re-enqueue.
    let mut pool = JoinSet::new();
    for worker_id in 0..concurrency {
        let state = state.clone();
        pool.spawn(async move {
            worker_loop(worker_id, state).await;
        });
    }

    while let Some(result) = pool.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "worker task exited abnormally");
        }
    }
}

async fn worker_loop(worker_id: usize, state: AppState) {
    loop {
        match process_next_task(&state).await {
            Ok(true) => {
                tracing::debug!(worker_id, "task processed, checking for next task");
            }
            Ok(false) => {
                sleep(Duration::from_millis(IDLE_POLL_MS)).await;
            }
            Err(e) => {
                tracing::error!(worker_id, error = %e, "error processing task, will retry");
                sleep(Duration::from_millis(IDLE_POLL_MS)).await;
            }
        }
    }
}

/// Process the next task from the queue.
/// Returns Ok(true) if a task was processed, Ok(false) if no task available.
async fn process_next_task(state: &AppState) -> Result<bool, QueueError> {
    let delivery = match state.queue.dequeue().await? {
        Some(d) => d,
        None => return Ok(false),
    };

    let task_id = delivery.task.task_id().to_string();
    let task_type = delivery.task.type_name();

    tracing::info!(task_id, task_type, attempts = delivery.attempts, "dispatching task");

    match dispatch(state, delivery.task.clone()).await {
        Ok(()) => {
            state.queue.complete(&delivery).await?;
            Ok(true)
        }
        Err(e) => {
            tracing::error!(task_id, task_type, error = %e, "task handler failed");
            state.queue.complete(&delivery).await?;

            let attempts = delivery.attempts + 1;
            if attempts >= MAX_DELIVERY_ATTEMPTS {
                tracing::warn!(
                    task_id,
                    attempts,
                    "task failed after max delivery attempts"
                );
                metrics::counter!("media_jobs_failed").increment(1);
                state
                    .notifier
                    .notify(
                        &task_id,
                        JobStatus::Failed,
                        serde_json::json!({ "errorMessage": e.to_string() }),
                    )
                    .await;
            } else {
                let retry = Delivery {
                    attempts,
                    task: delivery.task,
                };
                state.queue.enqueue_in(&retry, REDELIVERY_DELAY).await?;
                tracing::info!(task_id, attempts, "task re-queued for retry");
            }

            Ok(true)
        }
    }
}

/// Route a queue task to its handler by type.
async fn dispatch(state: &AppState, task: Task) -> Result<(), TaskError> {
    match task {
        Task::GenerateImage(payload) => handlers::generate::handle(state, payload.into()).await,
        Task::GenerateVideo(payload) => handlers::generate::handle(state, payload.into()).await,
        Task::CheckStatus(poll_state) => handlers::poll::handle(state, poll_state).await,
    }
}
