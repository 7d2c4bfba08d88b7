//! Location subscription pipeline.
//!
//! While subscribed, the platform pushes batches of fixes into an unbounded
//! channel. A consumer task drains the channel in delivery order, keeps only
//! the newest fix of each batch and spawns one ingestion per fix. Ingestions
//! are independent tasks: they may overlap and finish in any order, and
//! unsubscribing does not cancel the ones already running. Every task is
//! recorded so that shutdown can wait for them with
//! [`LocationPipeline::drain`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::ingest::Ingestor;
use super::platform::{DeliveryTarget, LocationPlatform, PlatformError};
use super::request::LocationRequest;
use super::Coordinate;

enum PipelineState {
    Inactive,
    Subscribed { target_id: u64, cancel: CancellationToken },
}

/// Owns the platform subscription and the task consuming its deliveries.
pub struct LocationPipeline {
    platform: Arc<dyn LocationPlatform>,
    ingestor: Arc<Ingestor>,
    request: LocationRequest,
    state: Mutex<PipelineState>,
    next_target_id: AtomicU64,
    tasks: TaskTracker,
}

impl std::fmt::Debug for LocationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationPipeline")
            .field("request", &self.request)
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

impl LocationPipeline {
    pub fn new(platform: Arc<dyn LocationPlatform>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            platform,
            ingestor,
            request: LocationRequest::tracking(),
            state: Mutex::new(PipelineState::Inactive),
            next_target_id: AtomicU64::new(1),
            tasks: TaskTracker::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        // The state is a plain enum; a panic elsewhere cannot leave it half-written.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(*self.lock_state(), PipelineState::Subscribed { .. })
    }

    /// Register with the platform and start consuming deliveries.
    ///
    /// Returns `Ok(false)` without touching the platform when already
    /// subscribed. Must be called from within a Tokio runtime.
    pub fn subscribe(&self) -> Result<bool, PlatformError> {
        let mut state = self.lock_state();
        if matches!(*state, PipelineState::Subscribed { .. }) {
            return Ok(false);
        }

        let target_id = self.next_target_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.platform
            .request_updates(&self.request, DeliveryTarget::new(target_id, tx))?;

        let cancel = CancellationToken::new();
        self.tasks.spawn(consume_deliveries(
            rx,
            Arc::clone(&self.ingestor),
            self.tasks.clone(),
            cancel.clone(),
        ));

        *state = PipelineState::Subscribed { target_id, cancel };
        tracing::info!(target_id, "Subscribed to location updates");
        Ok(true)
    }

    /// Remove the platform subscription, if any. Safe to call repeatedly.
    ///
    /// Returns whether a subscription was active.
    pub fn unsubscribe(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lock_state(), PipelineState::Inactive);
        match previous {
            PipelineState::Subscribed { target_id, cancel } => {
                self.platform.remove_updates(target_id);
                cancel.cancel();
                tracing::info!(target_id, "Unsubscribed from location updates");
                true
            }
            PipelineState::Inactive => false,
        }
    }

    /// Wait for the delivery consumer and every ingestion started so far.
    ///
    /// Only returns once unsubscribed; call it after
    /// [`LocationPipeline::unsubscribe`] so searches already under way can
    /// store their results before the process exits.
    pub async fn drain(&self) {
        let pending = self.tasks.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight photo searches");
        }
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

impl Drop for LocationPipeline {
    fn drop(&mut self) {
        // Never leave a live platform subscription behind.
        self.unsubscribe();
    }
}

async fn consume_deliveries(
    mut rx: mpsc::UnboundedReceiver<Vec<Coordinate>>,
    ingestor: Arc<Ingestor>,
    tasks: TaskTracker,
    cancel: CancellationToken,
) {
    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            batch = rx.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        let Some(latest) = batch.last().copied() else {
            continue;
        };
        tracing::debug!(fixes = batch.len(), at = %latest, "Location update delivered");

        let ingestor = Arc::clone(&ingestor);
        tasks.spawn(async move {
            if let Err(e) = ingestor.ingest(latest).await {
                tracing::error!(at = %latest, error = %e, "Failed to store photos");
            }
        });
    }
    tracing::debug!("Location delivery consumer stopped");
}
