//! Time source abstraction for the scheduler.
//!
//! The scheduler never reads the system clock or sleeps directly; it goes
//! through this trait so tests can drive ticks at fabricated instants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Resolve after `duration` has elapsed.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the system time and the tokio timer.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
