use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::heap::Heap;

/// Runs one background re-resolution task per scheduled heap.
///
/// Each task sleeps for the heap's own interval, re-invokes the DAOs and
/// lets the heap swap its resolved set on change. Polling never blocks
/// concurrent readers; they observe the pre- or post-refresh set. Tasks end
/// when the scheduler shuts down or the heap is dropped elsewhere.
pub struct PollingScheduler {
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Schedules the heap if it has a polling interval. Returns whether a
    /// task was started.
    pub fn schedule(&self, heap: &Arc<Heap>) -> bool {
        let Some(interval) = heap.polling_interval() else {
            tracing::debug!(heap = %heap.id(), "polling disabled");
            return false;
        };

        let cancel = self.cancel.clone();
        let heap_weak = Arc::downgrade(heap);
        let heap_id = heap.id().to_string();

        let handle = tokio::spawn(async move {
            tracing::info!(heap = %heap_id, ?interval, "polling started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let Some(heap) = heap_weak.upgrade() else { break };
                        match heap.check_for_updates().await {
                            Ok(true) => tracing::info!(heap = %heap_id, "refresh swapped a new nut set"),
                            Ok(false) => {}
                            Err(error) => tracing::warn!(heap = %heap_id, %error, "polling check failed"),
                        }
                    }
                }
            }

            tracing::info!(heap = %heap_id, "polling stopped");
        });

        self.handles
            .lock()
            .expect("poller handles lock poisoned")
            .push(handle);
        true
    }

    /// Stops every polling task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
