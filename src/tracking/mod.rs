//! Tracking state machine: the persisted on/off flag, the capability checks
//! guarding a start, and the controller that keeps the flag and the
//! location subscription in step.

pub mod capability;
pub mod controller;
pub mod state;

pub use capability::CapabilityChecker;
pub use controller::TrackingController;
pub use state::TrackingStateStore;
