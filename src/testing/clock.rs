//! Instant sleepers for driving the confirmation waiter in tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::confirmation::Sleeper;

/// Records every requested sleep and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Number of sleeps requested so far
    pub fn calls(&self) -> u32 {
        self.sleeps().len() as u32
    }

    /// Sum of all requested sleep durations
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        tokio::task::yield_now().await;
    }
}
