//! Boundary to whatever produces location fixes.

use thiserror::Error;
use tokio::sync::mpsc;

use super::request::LocationRequest;
use super::Coordinate;

/// The platform refused to register a subscription.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Location updates refused: {0}")]
    Refused(String),
}

/// Where the platform hands delivered batches.
///
/// Delivery is a non-blocking channel send, so the platform's notification
/// thread never waits on the subscriber.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    id: u64,
    tx: mpsc::UnboundedSender<Vec<Coordinate>>,
}

impl DeliveryTarget {
    pub fn new(id: u64, tx: mpsc::UnboundedSender<Vec<Coordinate>>) -> Self {
        Self { id, tx }
    }

    /// Identifier used to remove this target again.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deliver a batch of fixes, oldest first.
    ///
    /// Returns `false` once the subscriber has gone away; the platform
    /// should stop delivering to this target.
    pub fn deliver(&self, batch: Vec<Coordinate>) -> bool {
        if batch.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(batch).is_ok()
    }
}

/// A source of location updates.
pub trait LocationPlatform: Send + Sync {
    /// Start delivering fixes matching `request` to `target`.
    fn request_updates(
        &self,
        request: &LocationRequest,
        target: DeliveryTarget,
    ) -> Result<(), PlatformError>;

    /// Stop delivering to the target registered under `target_id`.
    /// Unknown ids are ignored.
    fn remove_updates(&self, target_id: u64);
}
