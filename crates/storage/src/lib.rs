//! Storage layer for the theme gallery
//!
//! This crate provides the SQLite database layer, the theme catalog store,
//! and the JSON gallery snapshot.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod database;
pub mod migrations;
pub mod snapshot;

pub use catalog::{CatalogStore, ThemeStore};
pub use database::{DatabaseConfig, DatabaseError, MigrationDefinition, SqliteDatabase, SynchronousMode};
pub use snapshot::{GallerySnapshot, SnapshotConfig, SnapshotError};
