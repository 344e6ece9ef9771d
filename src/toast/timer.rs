//! Auto-dismiss timers that can be paused and resumed with their remaining time.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct DismissTimer {
    task: Option<JoinHandle<()>>,
    deadline: Instant,
    /// Set while paused.
    remaining: Option<Duration>,
}

impl DismissTimer {
    /// Run `on_expire` after `after`, unless cancelled or paused first.
    pub fn start<F, Fut>(after: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + after;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_expire().await;
        });
        Self {
            task: Some(task),
            deadline,
            remaining: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.remaining.is_some()
    }

    /// Time left before expiry.
    pub fn remaining(&self) -> Duration {
        self.remaining
            .unwrap_or_else(|| self.deadline.saturating_duration_since(Instant::now()))
    }

    /// Stop the clock, keeping the time left. No-op when already paused.
    pub fn pause(&mut self) {
        if self.is_paused() {
            return;
        }
        self.remaining = Some(self.deadline.saturating_duration_since(Instant::now()));
        self.cancel();
    }

    /// Restart the clock with the time left at pause. Returns the new timer,
    /// or `None` when this one was not paused.
    pub fn resume<F, Fut>(&self, on_expire: F) -> Option<Self>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.remaining.map(|left| Self::start(left, on_expire))
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DismissTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
