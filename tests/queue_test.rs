//! Task queue integration tests.
//!
//! These require a running Redis instance configured via REDIS_URL (or the
//! full environment from .env).
//!
//! Run with: cargo test --test queue_test -- --ignored

use std::time::Duration;

use media_task::models::task::{Delivery, GenerateImage, MediaKind, PollState, ProviderKind, Task};
use media_task::services::queue::TaskQueue;
use uuid::Uuid;

fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/1".to_string())
}

fn image_task() -> Delivery {
    Delivery::new(Task::GenerateImage(GenerateImage {
        task_id: format!("task_{}", Uuid::new_v4().simple()),
        asset_id: "asset_test".to_string(),
        reference_key: None,
        width: 1024,
        height: 1024,
        prompt: "queue integration test".to_string(),
        style_id: None,
        user_id: None,
    }))
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn enqueue_then_dequeue_roundtrips() {
    let queue = TaskQueue::new(&redis_url()).expect("queue init");

    let delivery = image_task();
    let task_id = delivery.task.task_id().to_string();
    queue.enqueue(&delivery).await.expect("enqueue");

    // Drain until our task comes out; other tests may share the queue.
    let mut found = None;
    for _ in 0..100 {
        match queue.dequeue().await.expect("dequeue") {
            Some(d) => {
                let matches = d.task.task_id() == task_id;
                queue.complete(&d).await.expect("complete");
                if matches {
                    found = Some(d);
                    break;
                }
            }
            None => break,
        }
    }

    let found = found.expect("enqueued task should be dequeued");
    assert_eq!(found.attempts, 0);
    assert_eq!(found.task.type_name(), "generate_image");
}

#[tokio::test]
#[ignore] // Requires running Redis
async fn delayed_task_is_invisible_until_due() {
    let queue = TaskQueue::new(&redis_url()).expect("queue init");

    let delivery = Delivery::new(Task::CheckStatus(PollState {
        task_id: format!("task_{}", Uuid::new_v4().simple()),
        asset_id: String::new(),
        media_id: format!("vid_{}", Uuid::new_v4().simple()),
        kind: MediaKind::Video,
        external_id: "ext-delayed".to_string(),
        provider: ProviderKind::Mock,
        reference_key: None,
        try_count: 0,
        user_id: None,
        width: 0,
        height: 0,
    }));
    let task_id = delivery.task.task_id().to_string();

    queue
        .enqueue_in(&delivery, Duration::from_secs(2))
        .await
        .expect("delayed enqueue");

    // Not yet due: draining the queue must not surface it.
    for _ in 0..100 {
        match queue.dequeue().await.expect("dequeue") {
            Some(d) => {
                assert_ne!(d.task.task_id(), task_id, "delayed task surfaced early");
                queue.complete(&d).await.expect("complete");
            }
            None => break,
        }
    }

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let mut found = false;
    for _ in 0..100 {
        match queue.dequeue().await.expect("dequeue") {
            Some(d) => {
                let matches = d.task.task_id() == task_id;
                queue.complete(&d).await.expect("complete");
                if matches {
                    found = true;
                    break;
                }
            }
            None => break,
        }
    }
    assert!(found, "delayed task should surface once due");
}
