use std::time::Duration;

/// How hard the platform should work for an accurate fix. Tracking only
/// ever asks for the most accurate fixes available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    HighAccuracy,
}

/// Parameters of a location update subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRequest {
    pub priority: Priority,
    /// Nominal time between updates.
    pub interval: Duration,
    /// Updates arriving faster than this are throttled.
    pub fastest_interval: Duration,
    /// Longest the platform may hold fixes back to deliver them as a batch.
    pub max_wait_time: Duration,
    /// Fixes closer than this to the last delivered one are dropped.
    pub smallest_displacement_m: f32,
}

impl LocationRequest {
    /// The request used while tracking: high accuracy, one fix every 20 s
    /// (never faster than 10 s), batched for at most a minute, and only
    /// after moving at least 100 m.
    pub fn tracking() -> Self {
        Self {
            priority: Priority::HighAccuracy,
            interval: Duration::from_secs(20),
            fastest_interval: Duration::from_secs(10),
            max_wait_time: Duration::from_secs(60),
            smallest_displacement_m: 100.0,
        }
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self::tracking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_request_parameters() {
        let request = LocationRequest::tracking();
        assert_eq!(request.priority, Priority::HighAccuracy);
        assert_eq!(request.interval, Duration::from_secs(20));
        assert_eq!(request.fastest_interval, Duration::from_secs(10));
        assert_eq!(request.max_wait_time, Duration::from_secs(60));
        assert_eq!(request.smallest_displacement_m, 100.0);
        assert_eq!(LocationRequest::default(), request);
    }
}
