//! Photo cache module.
//!
//! SQLite-backed storage for photo records collected while tracking. Every
//! record is keyed by its remote id and written at most once; consumers
//! follow the cache through a live query that is republished after every
//! committed change.

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{PhotoStore, SqlitePhotoStore};
pub use error::StoreError;
pub use types::PhotoRecord;
