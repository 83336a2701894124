//! artfolio: local art-collection companion core.
//!
//! Photograph an artwork, send it to the recognition service, keep the
//! result as a collection entry with a chat history and optional
//! synthesized audio. This crate is the storage, API and reconciliation
//! core; rendering is somebody else's job.

pub mod api;
pub mod audio;
pub mod collection;
pub mod config;
pub mod db;
pub mod logging;
pub mod storage;

pub use collection::CollectionService;
pub use config::Config;
pub use db::Database;
pub use storage::MediaStore;
