//! Theme catalog data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use crate::hash::{content_hash, repository_hash};
use crate::repository::ProjectRepository;

/// Reasons a record is refused by a [`Gallery`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThemeError {
    /// The theme has no name
    #[error("theme has no name")]
    MissingName,

    /// The theme has no download URL
    #[error("theme '{0}' has no download URL")]
    MissingUrl(String),
}

// =============================================================================
// Provider Name
// =============================================================================

/// Stable tag naming the source a theme came from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderName(String);

impl ProviderName {
    /// Create a provider name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProviderName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ProviderName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProviderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Theme
// =============================================================================

/// A normalized color theme record
///
/// `id` is empty until the catalog store assigns one. No component other
/// than the store writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: String,

    /// Display name
    pub name: String,

    /// Author(s)
    #[serde(default)]
    pub author: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Download URL of the theme file
    pub url: String,

    /// Content hash of `url`
    #[serde(default)]
    pub hash: String,

    /// Light (true) or dark (false) theme
    #[serde(default)]
    pub light: bool,

    /// Semantic version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Hash of the canonical project repository URL
    #[serde(default)]
    pub project_repo_id: String,

    /// Canonical project repository URL
    #[serde(default)]
    pub project_repo: String,

    /// Inferred README URL
    #[serde(default)]
    pub readme: String,

    /// License name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Source provider tag
    #[serde(default)]
    pub provider: ProviderName,

    /// Last upstream update
    #[serde(default, rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl Theme {
    /// Create a theme with its content hash filled in
    pub fn new(name: impl Into<String>, url: impl Into<String>, provider: impl Into<ProviderName>) -> Self {
        let url = url.into();
        Self {
            name: name.into(),
            hash: content_hash(&url),
            url,
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Set the author
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the light flag
    pub fn with_light(mut self, light: bool) -> Self {
        self.light = light;
        self
    }

    /// Set the version; empty strings are ignored
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.version = (!version.is_empty()).then_some(version);
        self
    }

    /// Set the README URL
    pub fn with_readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = readme.into();
        self
    }

    /// Set the license; empty strings are ignored
    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        let license = license.into();
        self.license = (!license.is_empty()).then_some(license);
        self
    }

    /// Set the last update timestamp
    pub fn with_last_update(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_update = at;
        self
    }

    /// Attach a resolved project repository
    ///
    /// Sets both the canonical URL and its hash, and the license when the
    /// repository knows it and the theme does not.
    pub fn with_project_repository(mut self, repo: &ProjectRepository) -> Self {
        self.project_repo = repo.canonical_url();
        self.project_repo_id = repo.hash();
        if self.license.is_none() {
            self.license = repo.license.clone().filter(|l| !l.is_empty());
        }
        self
    }

    /// Attach a project URL that is not a resolvable repository
    ///
    /// The hash is still derived from the URL so equal URLs converge.
    pub fn with_project_url(mut self, url: impl Into<String>) -> Self {
        self.project_repo = url.into();
        self.project_repo_id = repository_hash(&self.project_repo);
        self
    }

    /// Check the required fields
    pub fn validate(&self) -> Result<(), ThemeError> {
        if self.name.trim().is_empty() {
            return Err(ThemeError::MissingName);
        }
        if self.url.trim().is_empty() {
            return Err(ThemeError::MissingUrl(self.name.clone()));
        }
        Ok(())
    }

    /// Whether the store has assigned an identifier
    pub fn is_saved(&self) -> bool {
        !self.id.is_empty()
    }
}

// =============================================================================
// Gallery
// =============================================================================

/// An unordered collection of validated themes
///
/// Records only enter through [`Gallery::accept`] (or the iterator/extend
/// helpers built on it), so every theme inside has a name and a URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Gallery(Vec<Theme>);

impl Gallery {
    /// Create an empty gallery
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a theme if it is valid; invalid records are logged and dropped
    pub fn accept(&mut self, theme: Theme) -> bool {
        match theme.validate() {
            Ok(()) => {
                self.0.push(theme);
                true
            }
            Err(e) => {
                tracing::warn!(provider = %theme.provider, error = %e, "dropping invalid theme");
                false
            }
        }
    }

    /// Append all valid records of another gallery
    pub fn merge(&mut self, other: Gallery) {
        self.0.extend(other.0);
    }

    /// Mutable access for store-side id assignment
    pub fn as_mut_slice(&mut self) -> &mut [Theme] {
        &mut self.0
    }

    /// Consume the gallery
    pub fn into_inner(self) -> Vec<Theme> {
        self.0
    }

    /// Sort by name, the order the store lists in
    pub fn sort_by_name(&mut self) {
        self.0.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Serialize as a JSON array of themes
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a JSON array of themes, dropping invalid records
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let themes: Vec<Theme> = serde_json::from_str(json)?;
        Ok(themes.into_iter().collect())
    }
}

impl Deref for Gallery {
    type Target = [Theme];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Extend<Theme> for Gallery {
    fn extend<I: IntoIterator<Item = Theme>>(&mut self, iter: I) {
        for theme in iter {
            self.accept(theme);
        }
    }
}

impl FromIterator<Theme> for Gallery {
    fn from_iter<I: IntoIterator<Item = Theme>>(iter: I) -> Self {
        let mut gallery = Gallery::new();
        gallery.extend(iter);
        gallery
    }
}

impl IntoIterator for Gallery {
    type Item = Theme;
    type IntoIter = std::vec::IntoIter<Theme>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Gallery {
    type Item = &'a Theme;
    type IntoIter = std::slice::Iter<'a, Theme>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Gallery {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let themes = Vec::<Theme>::deserialize(deserializer)?;
        Ok(themes.into_iter().collect())
    }
}

// =============================================================================
// List Filter
// =============================================================================

/// Page window for store listings
///
/// Zero means "no restriction" for either field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Maximum number of rows
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl ListFilter {
    /// Create a page window
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}
