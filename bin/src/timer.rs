//! Stage timing.

use std::time::Instant;

use tracing::info;

/// Logs when a stage starts and, on drop, how long it took.
#[derive(Debug)]
pub(crate) struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    pub(crate) fn start(label: &'static str) -> Self {
        info!("Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("Finished: {} (took {:.2?})", self.label, self.start.elapsed());
    }
}
