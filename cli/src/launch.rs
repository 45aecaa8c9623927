//! Launch notifier that POSTs the request as JSON.
//!
//! Fire-and-forget: the session spawns `notify` and never looks at the
//! outcome, so the response status is only logged. A one-shot command can
//! call [`HttpLauncher::wait_completed`] before exiting so the spawned POST
//! is not cut off by runtime shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use canvas::launch::{LaunchNotifier, LaunchRequest};
use tokio::sync::Notify;
use tracing::{info, warn};

pub struct HttpLauncher {
    client: reqwest::Client,
    url: String,
    completed: AtomicUsize,
    done: Notify,
}

impl HttpLauncher {
    #[must_use]
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self { client, url: url.to_owned(), completed: AtomicUsize::new(0), done: Notify::new() }
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` notifications finished, successful or
    /// not. Returns false when `limit` passes first.
    pub async fn wait_completed(&self, count: usize, limit: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.done.notified();
                if self.completed() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(limit, wait).await.is_ok()
    }
}

#[async_trait]
impl LaunchNotifier for HttpLauncher {
    async fn notify(&self, request: LaunchRequest) {
        match self.client.post(&self.url).json(&request).send().await {
            Ok(response) => info!(
                status = response.status().as_u16(),
                board_id = request.board_id,
                x = request.x,
                y = request.y,
                name = %request.name,
                "launch notified"
            ),
            Err(e) => warn!(board_id = request.board_id, error = %e, "launch notification failed"),
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.done.notify_waiters();
    }
}

#[cfg(test)]
#[path = "launch_test.rs"]
mod tests;
