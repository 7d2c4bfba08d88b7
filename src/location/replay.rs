//! Route replay: a location source that plays back a file of fixes.
//!
//! Route files hold one `latitude,longitude` pair per line. Blank lines and
//! lines starting with `#` are ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::platform::{DeliveryTarget, LocationPlatform, PlatformError};
use super::request::LocationRequest;
use super::Coordinate;
use crate::tracking::CapabilityChecker;

/// Plays a fixed route to every registered target, one point per `pace`.
pub struct RouteReplay {
    source: Option<PathBuf>,
    points: Arc<Vec<Coordinate>>,
    pace: Duration,
    readable: bool,
    running: Arc<Mutex<HashMap<u64, CancellationToken>>>,
    finished: CancellationToken,
}

impl std::fmt::Debug for RouteReplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteReplay")
            .field("source", &self.source)
            .field("points", &self.points.len())
            .field("pace", &self.pace)
            .finish_non_exhaustive()
    }
}

impl RouteReplay {
    /// Load a route file. An unreadable file yields a replay without
    /// permission rather than an error.
    pub fn load(path: &Path, pace: Duration) -> Self {
        let (readable, points) = match std::fs::read_to_string(path) {
            Ok(text) => (true, parse_route(&text)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read route file");
                (false, Vec::new())
            }
        };
        tracing::debug!(path = %path.display(), points = points.len(), "Loaded route");

        let mut replay = Self::from_points(points, pace);
        replay.source = Some(path.to_path_buf());
        replay.readable = readable;
        replay
    }

    pub fn from_points(points: Vec<Coordinate>, pace: Duration) -> Self {
        Self {
            source: None,
            points: Arc::new(points),
            pace,
            readable: true,
            running: Arc::new(Mutex::new(HashMap::new())),
            finished: CancellationToken::new(),
        }
    }

    /// Cancelled once any replay has played its last point.
    pub fn route_finished(&self) -> CancellationToken {
        self.finished.clone()
    }
}

impl CapabilityChecker for RouteReplay {
    fn has_permission(&self) -> bool {
        self.readable
    }

    fn is_location_enabled(&self) -> bool {
        !self.points.is_empty()
    }
}

impl LocationPlatform for RouteReplay {
    fn request_updates(
        &self,
        request: &LocationRequest,
        target: DeliveryTarget,
    ) -> Result<(), PlatformError> {
        if !self.readable {
            return Err(PlatformError::Refused("route file is not readable".to_string()));
        }

        tracing::debug!(
            target_id = target.id(),
            priority = ?request.priority,
            interval = ?request.interval,
            fastest_interval = ?request.fastest_interval,
            max_wait_time = ?request.max_wait_time,
            pace = ?self.pace,
            "Replaying route"
        );

        let cancel = CancellationToken::new();
        {
            let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = running.insert(target.id(), cancel.clone()) {
                previous.cancel();
            }
        }

        tokio::spawn(play(
            Arc::clone(&self.points),
            self.pace,
            f64::from(request.smallest_displacement_m),
            target,
            Arc::clone(&self.running),
            cancel,
            self.finished.clone(),
        ));
        Ok(())
    }

    fn remove_updates(&self, target_id: u64) {
        let removed = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&target_id);
        if let Some(cancel) = removed {
            cancel.cancel();
        }
    }
}

async fn play(
    points: Arc<Vec<Coordinate>>,
    pace: Duration,
    min_displacement_m: f64,
    target: DeliveryTarget,
    running: Arc<Mutex<HashMap<u64, CancellationToken>>>,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    let completed = replay_points(&points, pace, min_displacement_m, &target, &cancel).await;

    {
        // A cancelled token was removed or replaced by its owner already.
        let mut running = running.lock().unwrap_or_else(|e| e.into_inner());
        if !cancel.is_cancelled() {
            running.remove(&target.id());
        }
    }

    if completed {
        tracing::info!(target_id = target.id(), "Route replay finished");
        finished.cancel();
    }
}

/// Deliver the route to `target`. Returns `false` if the replay was cut
/// short by cancellation or a closed target.
async fn replay_points(
    points: &[Coordinate],
    pace: Duration,
    min_displacement_m: f64,
    target: &DeliveryTarget,
    cancel: &CancellationToken,
) -> bool {
    let mut last: Option<Coordinate> = None;
    for (index, point) in points.iter().enumerate() {
        if index > 0 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(pace) => {}
            }
        } else if cancel.is_cancelled() {
            return false;
        }

        if let Some(prev) = last {
            if prev.distance_m(point) < min_displacement_m {
                tracing::trace!(at = %point, "Skipping fix below minimum displacement");
                continue;
            }
        }
        if !target.deliver(vec![*point]) {
            return false;
        }
        last = Some(*point);
    }
    true
}

/// Parse route text into fixes, skipping blank, comment and malformed lines.
pub fn parse_route(text: &str) -> Vec<Coordinate> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let parsed = parse_point(line);
            if parsed.is_none() {
                tracing::warn!(line = index + 1, text = line, "Ignoring malformed route line");
            }
            parsed
        })
        .collect()
}

fn parse_point(line: &str) -> Option<Coordinate> {
    let (lat, lon) = line.split_once(',')?;
    let latitude: f64 = lat.trim().parse().ok()?;
    let longitude: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some(Coordinate::new(latitude, longitude))
}
