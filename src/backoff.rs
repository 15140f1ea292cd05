//! Pacing and bounded retry
//!
//! All suspension points of a run (retry backoff, inter-record pacing) go
//! through the [`Pacer`] trait so the schedule is observable in tests.

use crate::error::LicenseCheckError;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Largest exponent used for the backoff table (2^10 s is about 17 minutes).
const MAX_BACKOFF_EXPONENT: u32 = 10;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real clock-backed pacer
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Delay before retrying after failed attempt `attempt` (1-based): `2^attempt` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(MAX_BACKOFF_EXPONENT))
}

/// Run `operation` up to `max_attempts` times (at least once), pausing
/// `2^attempt` seconds between failures but never after the final one.
///
/// Returns the first success, or the error of the last attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    pacer: &dyn Pacer,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Attempt failed"
                );

                if attempt < max_attempts {
                    let delay = backoff_delay(attempt);
                    info!(
                        operation = label,
                        delay_secs = delay.as_secs(),
                        "Waiting before retrying"
                    );
                    pacer.pause(delay).await;
                }

                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        LicenseCheckError::Verification(format!("{} made no attempts", label))
    }))
}

/// Pacer that records requested pauses instead of sleeping.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingPacer {
    pauses: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingPacer {
    pub(crate) fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}
