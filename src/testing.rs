//! Test doubles for the collaborator traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::location::{DeliveryTarget, LocationPlatform, LocationRequest, PlatformError};
use crate::search::PhotoSearch;
use crate::store::PhotoRecord;
use crate::tracking::CapabilityChecker;

/// Search that returns the same ids for every call and records its inputs.
pub struct FakeSearch {
    ids: Vec<String>,
    calls: Mutex<Vec<(f64, f64, f32)>>,
    gate: Option<Semaphore>,
    delay: Duration,
}

impl FakeSearch {
    pub fn returning(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
            gate: None,
            delay: Duration::ZERO,
        }
    }

    /// Take `delay` to answer every search.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold every search until [`FakeSearch::open_gate`] is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<(f64, f64, f32)> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for searches");
    }
}

#[async_trait]
impl PhotoSearch for FakeSearch {
    async fn search(&self, latitude: f64, longitude: f64, radius_km: f32) -> Vec<PhotoRecord> {
        self.calls
            .lock()
            .unwrap()
            .push((latitude, longitude, radius_km));
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.ids
            .iter()
            .map(|id| PhotoRecord {
                latitude,
                longitude,
                ..PhotoRecord::new(id.as_str())
            })
            .collect()
    }
}

#[derive(Default)]
struct PlatformLog {
    requests: Vec<LocationRequest>,
    targets: Vec<DeliveryTarget>,
    removed: Vec<u64>,
    refuse: bool,
}

/// Platform that records subscriptions and lets tests deliver by hand.
#[derive(Default)]
pub struct FakePlatform {
    log: Mutex<PlatformLog>,
}

impl FakePlatform {
    pub fn refuse(&self, refuse: bool) {
        self.log.lock().unwrap().refuse = refuse;
    }

    pub fn subscribe_count(&self) -> usize {
        self.log.lock().unwrap().requests.len()
    }

    pub fn last_request(&self) -> Option<LocationRequest> {
        self.log.lock().unwrap().requests.last().cloned()
    }

    /// Most recently registered target.
    pub fn target(&self) -> Option<DeliveryTarget> {
        self.log.lock().unwrap().targets.last().cloned()
    }

    pub fn removed(&self) -> Vec<u64> {
        self.log.lock().unwrap().removed.clone()
    }
}

impl LocationPlatform for FakePlatform {
    fn request_updates(
        &self,
        request: &LocationRequest,
        target: DeliveryTarget,
    ) -> Result<(), PlatformError> {
        let mut log = self.log.lock().unwrap();
        if log.refuse {
            return Err(PlatformError::Refused("refused by test".to_string()));
        }
        log.requests.push(request.clone());
        log.targets.push(target);
        Ok(())
    }

    fn remove_updates(&self, target_id: u64) {
        self.log.lock().unwrap().removed.push(target_id);
    }
}

/// Capability checker with switchable answers.
pub struct FakeChecker {
    permission: AtomicBool,
    enabled: AtomicBool,
}

impl FakeChecker {
    pub fn new(permission: bool, enabled: bool) -> Self {
        Self {
            permission: AtomicBool::new(permission),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_permission(&self, permission: bool) {
        self.permission.store(permission, Ordering::SeqCst);
    }
}

impl CapabilityChecker for FakeChecker {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn is_location_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}
