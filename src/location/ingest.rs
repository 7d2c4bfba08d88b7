//! Search-and-store step run for every accepted location fix.

use std::sync::Arc;

use crate::search::PhotoSearch;
use crate::store::{PhotoStore, StoreError};

use super::Coordinate;

/// Search radius used when none is configured, in kilometers.
pub const DEFAULT_RADIUS_KM: f32 = 0.4;

/// Looks up photos around a fix and caches the ones not seen before.
pub struct Ingestor {
    search: Arc<dyn PhotoSearch>,
    store: Arc<dyn PhotoStore>,
    radius_km: f32,
}

impl Ingestor {
    pub fn new(search: Arc<dyn PhotoSearch>, store: Arc<dyn PhotoStore>) -> Self {
        Self {
            search,
            store,
            radius_km: DEFAULT_RADIUS_KM,
        }
    }

    pub fn with_radius(mut self, radius_km: f32) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn radius_km(&self) -> f32 {
        self.radius_km
    }

    /// Run one search at `at` and insert every result that is not cached yet,
    /// as a single batch.
    ///
    /// An empty or failed search is a no-op. Returns the number of new
    /// records; storage errors are returned to the caller.
    pub async fn ingest(&self, at: Coordinate) -> Result<usize, StoreError> {
        let records = self
            .search
            .search(at.latitude, at.longitude, self.radius_km)
            .await;
        if records.is_empty() {
            tracing::debug!(at = %at, "No photos found");
            return Ok(0);
        }

        let inserted = self.store.insert_all_if_absent(&records).await?;

        tracing::info!(
            at = %at,
            found = records.len(),
            new = inserted,
            "Cached photos near location"
        );
        Ok(inserted)
    }
}
