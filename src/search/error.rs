use thiserror::Error;

/// Failures inside a single photo search round trip.
///
/// These never leave the search client: `PhotoSearchClient::search` logs
/// them and returns an empty result instead.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search endpoint returned HTTP {0}")]
    Status(u16),
    #[error("Search response body was empty")]
    EmptyBody,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
