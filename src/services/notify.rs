use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::sleep;

use crate::models::job::JobStatus;

const NOTIFY_ATTEMPTS: u32 = 3;
const NOTIFY_RETRY_DELAY: Duration = Duration::from_secs(1);
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts job-state transitions to the consuming application's status
/// endpoint. Delivery is best-effort: failures are retried a fixed number of
/// times, then dropped. A notification never fails the owning task.
pub struct Notifier {
    http: Client,
    endpoint: String,
}

impl Notifier {
    pub fn new(endpoint: &str) -> Self {
        let http = Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            endpoint: endpoint.to_string(),
        }
    }

    /// Send one status update: `{taskId, status, ...extra}`.
    ///
    /// `extra` must be a JSON object; its fields are merged into the body.
    pub async fn notify(&self, task_id: &str, status: JobStatus, extra: Value) {
        let mut body = serde_json::json!({
            "taskId": task_id,
            "status": status,
        });
        if let (Some(obj), Some(extra_obj)) = (body.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                obj.insert(k.clone(), v.clone());
            }
        }

        for attempt in 1..=NOTIFY_ATTEMPTS {
            match self.http.post(&self.endpoint).json(&body).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    tracing::debug!(task_id, status = %status, "status notification delivered");
                    return;
                }
                Ok(resp) => {
                    tracing::warn!(
                        task_id,
                        status = %status,
                        http_status = %resp.status(),
                        attempt,
                        "status endpoint rejected notification"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        task_id,
                        status = %status,
                        error = %e,
                        attempt,
                        "status notification failed"
                    );
                }
            }
            if attempt < NOTIFY_ATTEMPTS {
                sleep(NOTIFY_RETRY_DELAY).await;
            }
        }

        tracing::warn!(task_id, status = %status, "giving up on status notification");
    }
}
