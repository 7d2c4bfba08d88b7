//! Wire types for the `flickr.photos.search` response and their
//! normalization into [`PhotoRecord`]s.
//!
//! Flickr is loose about types: numeric extras such as `width_l` or
//! `dateupload` arrive as numbers or as strings depending on the endpoint
//! version, so every optional field is read as a raw JSON value and
//! coerced leniently. Anything absent, null or unreadable falls back to the
//! record default.

use serde::Deserialize;
use serde_json::Value;

use crate::store::PhotoRecord;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    photos: Option<Photos>,
}

#[derive(Debug, Deserialize)]
struct Photos {
    #[serde(default)]
    photo: Option<Vec<Photo>>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: Option<Value>,
    title: Option<Value>,
    owner: Option<Value>,
    url_l: Option<Value>,
    width_l: Option<Value>,
    height_l: Option<Value>,
    latitude: Option<Value>,
    longitude: Option<Value>,
    dateupload: Option<Value>,
}

impl SearchResponse {
    /// Normalize every photo that carries an id. Photos without one cannot
    /// be deduplicated and are dropped.
    pub(crate) fn into_records(self) -> Vec<PhotoRecord> {
        self.photos
            .and_then(|p| p.photo)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|photo| {
                let record = photo.into_record();
                if record.is_none() {
                    tracing::debug!("Dropping search result without an id");
                }
                record
            })
            .collect()
    }
}

impl Photo {
    fn into_record(self) -> Option<PhotoRecord> {
        let id = self.id.as_ref().and_then(text).filter(|id| !id.is_empty())?;
        Some(PhotoRecord {
            title: self.title.as_ref().and_then(text).unwrap_or_default(),
            owner: self.owner.as_ref().and_then(text).unwrap_or_default(),
            latitude: self.latitude.as_ref().and_then(float).unwrap_or(0.0),
            longitude: self.longitude.as_ref().and_then(float).unwrap_or(0.0),
            image_url: self.url_l.as_ref().and_then(text).unwrap_or_default(),
            width: self.width_l.as_ref().and_then(dimension).unwrap_or(0),
            height: self.height_l.as_ref().and_then(dimension).unwrap_or(0),
            uploaded_at: self.dateupload.as_ref().and_then(integer).unwrap_or(0),
            ..PhotoRecord::new(id)
        })
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn dimension(value: &Value) -> Option<u32> {
    integer(value).and_then(|n| u32::try_from(n).ok())
}
