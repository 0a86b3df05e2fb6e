//! Splash-screen loading gate.
//!
//! Startup counts as finished once the engine's initial join has reported
//! and at least `floor` has passed since the gate was created.

use std::time::Duration;

use tokio::time::Instant;

use crate::engine::{DashboardHandle, StartupReport};

pub struct LoadingGate {
    floor: Duration,
    opened_at: Instant,
}

impl LoadingGate {
    pub fn new(floor: Duration) -> Self {
        Self {
            floor,
            opened_at: Instant::now(),
        }
    }

    /// `max(floor - elapsed, 0)`
    pub fn remaining_after(floor: Duration, elapsed: Duration) -> Duration {
        floor.saturating_sub(elapsed)
    }

    pub fn remaining(&self) -> Duration {
        Self::remaining_after(self.floor, self.opened_at.elapsed())
    }

    /// Wait for the join, then for whatever is left of the floor.
    pub async fn wait(&self, handle: &DashboardHandle) -> Option<StartupReport> {
        let report = handle.wait_startup().await;
        let remaining = self.remaining();
        if !remaining.is_zero() {
            log::debug!("Loading gate: holding splash for another {:?}", remaining);
            tokio::time::sleep(remaining).await;
        }
        report
    }
}
