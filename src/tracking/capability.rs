/// Answers whether location tracking may start right now.
///
/// Both checks are cheap, synchronous reads of platform state.
pub trait CapabilityChecker: Send + Sync {
    /// The user has granted location access.
    fn has_permission(&self) -> bool;

    /// Location services are switched on.
    fn is_location_enabled(&self) -> bool;
}
