//! Types for the photo cache.

use chrono::{DateTime, TimeZone, Utc};

/// A cached photo found near a tracked location.
///
/// Everything except `id` is optional upstream; missing values are stored as
/// empty strings or zeroes. An empty `image_url` means there is nothing to
/// render.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    /// Upload time in epoch seconds, as reported by the remote service.
    pub uploaded_at: i64,
    /// Insertion time in epoch milliseconds. `None` until the store assigns it.
    pub cached_at: Option<i64>,
}

impl PhotoRecord {
    /// Create a record with every optional field at its default.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            owner: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            image_url: String::new(),
            width: 0,
            height: 0,
            uploaded_at: 0,
            cached_at: None,
        }
    }

    /// Whether the record carries a renderable image.
    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }

    /// Cache time as a UTC timestamp, if assigned.
    pub fn cached_at_utc(&self) -> Option<DateTime<Utc>> {
        self.cached_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let record = PhotoRecord::new("42");
        assert_eq!(record.id, "42");
        assert_eq!(record.title, "");
        assert_eq!(record.owner, "");
        assert_eq!(record.latitude, 0.0);
        assert_eq!(record.longitude, 0.0);
        assert_eq!(record.width, 0);
        assert_eq!(record.height, 0);
        assert_eq!(record.uploaded_at, 0);
        assert!(record.cached_at.is_none());
        assert!(!record.has_image());
    }

    #[test]
    fn test_cached_at_utc() {
        let mut record = PhotoRecord::new("1");
        assert!(record.cached_at_utc().is_none());
        record.cached_at = Some(1_700_000_000_123);
        let dt = record.cached_at_utc().unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
    }
}
