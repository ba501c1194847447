//! Theme gallery providers
//!
//! One module per upstream source:
//!
//! - [`tmtheme_editor`] and [`colorsublime`]: single JSON list, one request
//! - [`package_control`]: label search followed by per-package details
//! - [`marketplace`] and [`github`]: paged search APIs
//!
//! Every provider takes its [`HttpTransport`](networking::HttpTransport) by
//! injection and owns a [`RateGate`](networking::RateGate) that paces its own
//! requests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod colorsublime;
pub mod github;
pub mod marketplace;
pub mod package_control;
pub mod static_list;
pub mod tmtheme_editor;

mod serde_util;

pub use colorsublime::{ColorSublime, ColorSublimeProvider};
pub use github::{GithubSearchConfig, GithubSearchProvider};
pub use marketplace::{MarketplaceConfig, MarketplaceProvider};
pub use package_control::{PackageControlConfig, PackageControlProvider};
pub use static_list::{StaticListProvider, StaticSource};
pub use tmtheme_editor::{TmThemeEditor, TmThemeEditorProvider};

/// Names of every provider this crate implements
pub const ALL_PROVIDERS: &[&str] = &[
    tmtheme_editor::NAME,
    colorsublime::NAME,
    package_control::NAME,
    marketplace::NAME,
    github::NAME,
];
