//! Theme gallery
//!
//! Collects editor color themes from several public sources, merges them into
//! one gallery, stores it in SQLite and writes a JSON snapshot.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod pipeline;

pub use config::AppConfig;
pub use pipeline::{build_registry, download_gallery, run, DownloadReport, RunReport};
