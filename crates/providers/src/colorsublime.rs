//! Color Sublime themes repository

use serde::Deserialize;
use std::sync::Arc;

use catalog_core::{ProjectRepository, Theme};
use networking::HttpTransport;

use crate::serde_util::nullable;
use crate::static_list::{StaticListProvider, StaticSource};

/// Provider name
pub const NAME: &str = "Color Sublime";

/// Published theme list
pub const DEFAULT_GALLERY_URL: &str =
    "https://raw.githubusercontent.com/Colorsublime/Colorsublime-Themes/master/themes.json";

/// Directory the theme files live in
pub const DEFAULT_THEME_BASE_URL: &str =
    "https://raw.githubusercontent.com/Colorsublime/Colorsublime-Themes/master/themes/";

/// Provider over the Color Sublime list
pub type ColorSublimeProvider = StaticListProvider<ColorSublime>;

/// One published entry
#[derive(Debug, Clone, Deserialize)]
pub struct ColorSublimeTheme {
    /// Display title
    #[serde(rename = "Title", alias = "title", default, deserialize_with = "nullable")]
    pub title: String,
    /// Author
    #[serde(rename = "Author", alias = "author", default, deserialize_with = "nullable")]
    pub author: String,
    /// Description
    #[serde(rename = "Description", alias = "description", default, deserialize_with = "nullable")]
    pub description: String,
    /// File name under the theme directory
    #[serde(rename = "FileName", alias = "fileName", default, deserialize_with = "nullable")]
    pub file_name: String,
}

/// The Color Sublime source
///
/// Every theme belongs to the Color Sublime repository itself.
#[derive(Debug, Clone)]
pub struct ColorSublime {
    gallery_url: String,
    theme_base_url: String,
    repository: ProjectRepository,
}

impl Default for ColorSublime {
    fn default() -> Self {
        Self {
            gallery_url: DEFAULT_GALLERY_URL.to_string(),
            theme_base_url: DEFAULT_THEME_BASE_URL.to_string(),
            repository: ProjectRepository::new("Colorsublime", "Colorsublime-Themes").with_branch("master"),
        }
    }
}

impl ColorSublime {
    /// Source at the public repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the list from somewhere else
    pub fn with_gallery_url(mut self, url: impl Into<String>) -> Self {
        self.gallery_url = url.into();
        self
    }

    /// Resolve theme files against another directory
    pub fn with_theme_base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.theme_base_url = url;
        self
    }

    /// Attribute themes to another repository
    pub fn with_repository(mut self, repository: ProjectRepository) -> Self {
        self.repository = repository;
        self
    }

    /// Build the provider
    pub fn into_provider(self, transport: Arc<dyn HttpTransport>) -> ColorSublimeProvider {
        StaticListProvider::new(self, transport)
    }
}

impl StaticSource for ColorSublime {
    type Entry = ColorSublimeTheme;

    const NAME: &'static str = NAME;

    fn source_url(&self) -> &str {
        &self.gallery_url
    }

    fn to_theme(&self, entry: ColorSublimeTheme) -> Theme {
        let url = if entry.file_name.is_empty() {
            String::new()
        } else {
            format!("{}{}", self.theme_base_url, entry.file_name)
        };

        Theme::new(entry.title, url, NAME)
            .with_author(entry.author)
            .with_description(entry.description)
            .with_project_repository(&self.repository)
            .with_readme(self.repository.readme_url())
    }
}
