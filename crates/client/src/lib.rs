//! Client code for chordium.
//!
//! This crate provides the upstream collaborators of the artist song cache:
//! the HTTP fetch pipeline, the scraping [`SongSource`], and object storage.

pub mod fetch;
pub mod source;
pub mod store;

pub use fetch::{FetchClient, FetchConfig, FetchResponse};
pub use source::{LinkHarvestSource, SongSource};
pub use store::{
    ArtistSongStore, LazyObjectStore, MemoryObjectStore, ObjectInfo, ObjectStore, S3ObjectStore, StoreError,
    StoreResult,
};
