//! tmTheme-editor gallery

use serde::Deserialize;
use std::sync::Arc;

use catalog_core::{resolve_repo, Theme};
use networking::HttpTransport;

use crate::serde_util::nullable;
use crate::static_list::{StaticListProvider, StaticSource};

/// Provider name
pub const NAME: &str = "tmTheme-editor";

/// Published gallery
pub const DEFAULT_GALLERY_URL: &str = "https://tmtheme-editor.herokuapp.com/gallery.json";

/// Provider over the tmTheme-editor gallery
pub type TmThemeEditorProvider = StaticListProvider<TmThemeEditor>;

/// One gallery entry
#[derive(Debug, Clone, Deserialize)]
pub struct EditorTheme {
    /// Theme name
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Download URL
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
    /// Light theme flag
    #[serde(default, deserialize_with = "nullable")]
    pub light: bool,
    /// Author
    #[serde(default, deserialize_with = "nullable")]
    pub author: String,
}

/// The tmTheme-editor source
#[derive(Debug, Clone)]
pub struct TmThemeEditor {
    gallery_url: String,
}

impl Default for TmThemeEditor {
    fn default() -> Self {
        Self {
            gallery_url: DEFAULT_GALLERY_URL.to_string(),
        }
    }
}

impl TmThemeEditor {
    /// Source at the public gallery
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the gallery from somewhere else
    pub fn with_gallery_url(mut self, url: impl Into<String>) -> Self {
        self.gallery_url = url.into();
        self
    }

    /// Build the provider
    pub fn into_provider(self, transport: Arc<dyn HttpTransport>) -> TmThemeEditorProvider {
        StaticListProvider::new(self, transport)
    }
}

impl StaticSource for TmThemeEditor {
    type Entry = EditorTheme;

    const NAME: &'static str = NAME;

    fn source_url(&self) -> &str {
        &self.gallery_url
    }

    fn to_theme(&self, entry: EditorTheme) -> Theme {
        let theme = Theme::new(entry.name, entry.url, NAME)
            .with_author(entry.author)
            .with_light(entry.light);

        match resolve_repo(&theme.url) {
            Ok(repo) => {
                let readme = repo.readme_url();
                theme.with_project_repository(&repo).with_readme(readme)
            }
            Err(e) => {
                tracing::debug!(theme = %theme.name, error = %e, "no project repository");
                theme
            }
        }
    }
}
