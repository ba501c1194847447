//! Catalog core
//!
//! This crate holds everything the theme gallery needs that is independent of
//! any particular upstream source:
//!
//! - Data model: [`Theme`], [`Gallery`], [`ListFilter`], [`ProviderName`]
//! - Repository identity: [`ProjectRepository`] and the GitHub metadata client
//! - The [`Provider`] capability and its failure types
//! - The fan-out/pagination engine shared by provider implementations
//! - The explicit [`ProviderRegistry`] and the gallery [`Aggregator`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod fetch;
pub mod hash;
pub mod model;
pub mod provider;
pub mod registry;
pub mod repository;

pub use aggregate::{Aggregation, Aggregator, SourceFailure};
pub use fetch::{fan_out, fetch_all_pages, page_count, FanOut, Page, PageSource};
pub use hash::{content_hash, repository_hash};
pub use model::{Gallery, ListFilter, ProviderName, Theme, ThemeError};
pub use provider::{FetchFailure, FetchResult, Provider, ProviderError};
pub use registry::ProviderRegistry;
pub use repository::{resolve_repo, GithubApi, ProjectRepository, RepoError};

// Re-exported so provider implementations and callers share one token type.
pub use tokio_util::sync::CancellationToken;
