//! Timer-backed backoff.

use std::time::Duration;

use roomwatch_core::Delay;

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
