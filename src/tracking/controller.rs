//! Tracking controller.
//!
//! `start`, `stop` and `toggle` never block: they queue a command for a
//! single worker task and return. The worker applies commands one at a time,
//! so the check of the current state and the following subscribe or
//! unsubscribe cannot interleave within this process. Results are observed
//! through [`TrackingController::state`] and the two advisory streams.
//!
//! Between commands the worker re-reads the persisted flag on a fixed
//! interval, so a write by another process reaches `state` observers. A
//! flag cleared elsewhere also drops this process's subscription.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::location::LocationPipeline;
use crate::store::StoreError;

use super::capability::CapabilityChecker;
use super::state::TrackingStateStore;

/// Buffered advisory events per receiver before the oldest are dropped.
const ADVISORY_CAPACITY: usize = 16;

/// How often the persisted flag is checked for writes by other processes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Toggle,
    /// Start again after a restart found the flag set.
    Resume,
    Flush(oneshot::Sender<()>),
}

/// Starts and stops location tracking on behalf of the presentation layer.
pub struct TrackingController {
    commands: mpsc::UnboundedSender<Command>,
    flag: Arc<TrackingStateStore>,
    grant_needed: broadcast::Sender<()>,
    enable_needed: broadcast::Sender<()>,
}

impl std::fmt::Debug for TrackingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingController")
            .field("tracking", &self.is_tracking())
            .finish_non_exhaustive()
    }
}

impl TrackingController {
    /// Create the controller and spawn its worker.
    ///
    /// If the flag was left set by a previous process, tracking is resumed:
    /// the capability checks run again and either the subscription is
    /// restored or the flag is cleared. Must be called from within a Tokio
    /// runtime.
    pub fn new(
        flag: Arc<TrackingStateStore>,
        checker: Arc<dyn CapabilityChecker>,
        pipeline: Arc<LocationPipeline>,
    ) -> Self {
        Self::with_refresh_interval(flag, checker, pipeline, DEFAULT_REFRESH_INTERVAL)
    }

    /// Like [`TrackingController::new`], checking for writes by other
    /// processes every `refresh_interval`.
    pub fn with_refresh_interval(
        flag: Arc<TrackingStateStore>,
        checker: Arc<dyn CapabilityChecker>,
        pipeline: Arc<LocationPipeline>,
        refresh_interval: Duration,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (grant_needed, _) = broadcast::channel(ADVISORY_CAPACITY);
        let (enable_needed, _) = broadcast::channel(ADVISORY_CAPACITY);

        if flag.is_tracking() {
            tracing::info!("Tracking was active before restart, resuming");
            let _ = commands.send(Command::Resume);
        }

        let worker = Worker {
            flag: Arc::clone(&flag),
            checker,
            pipeline,
            grant_needed: grant_needed.clone(),
            enable_needed: enable_needed.clone(),
        };
        tokio::spawn(worker.run(rx, refresh_interval));

        Self {
            commands,
            flag,
            grant_needed,
            enable_needed,
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Tracking worker has stopped, command dropped");
        }
    }

    /// Start tracking if permitted. Emits the current state even when
    /// already tracking.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Stop tracking. Safe to call when not tracking.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Stop when tracking, start otherwise. Decided against the state at the
    /// time the worker applies it, after every earlier command.
    pub fn toggle(&self) {
        self.send(Command::Toggle);
    }

    /// Wait until every command queued before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx));
        let _ = rx.await;
    }

    /// Current tracking state, starting at the value persisted when the
    /// controller was built.
    pub fn state(&self) -> watch::Receiver<bool> {
        self.flag.subscribe()
    }

    pub fn is_tracking(&self) -> bool {
        self.flag.is_tracking()
    }

    /// One event per `start` refused for missing location permission.
    /// Only events sent after subscribing are received.
    pub fn grant_needed(&self) -> broadcast::Receiver<()> {
        self.grant_needed.subscribe()
    }

    /// One event per `start` refused because location services are off.
    /// Only events sent after subscribing are received.
    pub fn enable_needed(&self) -> broadcast::Receiver<()> {
        self.enable_needed.subscribe()
    }
}

struct Worker {
    flag: Arc<TrackingStateStore>,
    checker: Arc<dyn CapabilityChecker>,
    pipeline: Arc<LocationPipeline>,
    grant_needed: broadcast::Sender<()>,
    enable_needed: broadcast::Sender<()>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>, refresh_interval: Duration) {
        let mut refresh = tokio::time::interval(refresh_interval);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the flag was just read on open.
        refresh.tick().await;

        loop {
            let command = tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                _ = refresh.tick() => {
                    if let Err(e) = self.sync_external().await {
                        tracing::warn!(error = %e, "Failed to re-read tracking state");
                    }
                    continue;
                }
            };

            let result = match command {
                Command::Start => self.start().await.map(drop),
                Command::Stop => self.stop().await,
                Command::Toggle => {
                    if self.flag.is_tracking() {
                        self.stop().await
                    } else {
                        self.start().await.map(drop)
                    }
                }
                Command::Resume => self.resume().await,
                Command::Flush(done) => {
                    let _ = done.send(());
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to persist tracking state");
            }
        }
        tracing::debug!("Tracking worker stopped");
    }

    /// Returns `Ok(false)` when a capability check refused the start.
    async fn start(&self) -> Result<bool, StoreError> {
        if !self.checker.has_permission() {
            tracing::info!("Location permission missing, not starting");
            let _ = self.grant_needed.send(());
            return Ok(false);
        }
        if !self.checker.is_location_enabled() {
            tracing::info!("Location services disabled, not starting");
            let _ = self.enable_needed.send(());
            return Ok(false);
        }

        match self.pipeline.subscribe() {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Already subscribed"),
            Err(e) => {
                tracing::warn!(error = %e, "Could not subscribe to location updates");
                self.flag.set(false).await?;
                return Ok(false);
            }
        }
        self.flag.set(true).await?;
        Ok(true)
    }

    async fn stop(&self) -> Result<(), StoreError> {
        self.pipeline.unsubscribe();
        self.flag.set(false).await
    }

    /// Publish a flag written by another process and, if it was cleared,
    /// drop the local subscription to match.
    async fn sync_external(&self) -> Result<(), StoreError> {
        let tracking = self.flag.refresh().await?;
        if !tracking && self.pipeline.unsubscribe() {
            tracing::info!("Tracking was stopped by another process");
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), StoreError> {
        let started = self.start().await?;
        if !started && self.flag.is_tracking() {
            self.flag.set(false).await?;
        }
        Ok(())
    }
}
