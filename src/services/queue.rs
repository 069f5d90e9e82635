use std::time::Duration;

use redis::AsyncCommands;

use crate::models::task::Delivery;

const PENDING_KEY: &str = "media_task:pending";
const SCHEDULED_KEY: &str = "media_task:scheduled";
const PROCESSING_KEY: &str = "media_task:processing";

/// How many due scheduled tasks one dequeue call promotes at most.
const PROMOTE_BATCH: isize = 16;

/// Redis-backed task queue with delayed delivery.
///
/// Immediate tasks go on a list; delayed tasks go into a sorted set scored by
/// their due time and are promoted onto the list once due. Dequeued tasks are
/// parked on a processing list until the worker acknowledges them.
pub struct TaskQueue {
    client: redis::Client,
}

impl TaskQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Enqueue a task for immediate delivery.
    pub async fn enqueue(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(delivery).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(PENDING_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Enqueue a task that becomes eligible for dequeue after `delay`.
    pub async fn enqueue_in(&self, delivery: &Delivery, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(delivery).map_err(QueueError::Serialize)?;
        let due_ms = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;
        conn.zadd::<_, _, _, ()>(SCHEDULED_KEY, &payload, due_ms)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Dequeue the next eligible task, promoting any due scheduled tasks first.
    pub async fn dequeue(&self) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let due: Vec<String> = conn
            .zrangebyscore_limit(SCHEDULED_KEY, 0, now_ms, 0, PROMOTE_BATCH)
            .await
            .map_err(QueueError::Redis)?;
        for payload in due {
            // ZREM is the claim: concurrent workers race on it, and only the
            // one that removes the member may push it onto the pending list.
            let removed: i64 = conn
                .zrem(SCHEDULED_KEY, &payload)
                .await
                .map_err(QueueError::Redis)?;
            if removed > 0 {
                conn.lpush::<_, _, ()>(PENDING_KEY, &payload)
                    .await
                    .map_err(QueueError::Redis)?;
            }
        }

        let result: Option<String> = conn
            .rpoplpush(PENDING_KEY, PROCESSING_KEY)
            .await
            .map_err(QueueError::Redis)?;

        match result {
            Some(payload) => {
                let delivery: Delivery =
                    serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
                Ok(Some(delivery))
            }
            None => Ok(None),
        }
    }

    /// Acknowledge a dequeued task (remove from the processing list).
    pub async fn complete(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let payload = serde_json::to_string(delivery).map_err(QueueError::Serialize)?;
        conn.lrem::<_, _, ()>(PROCESSING_KEY, 1, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Current number of immediately-eligible tasks.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(PENDING_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
