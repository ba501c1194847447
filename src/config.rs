//! Process configuration
//!
//! Everything is read from environment variables; unset variables fall back
//! to the defaults below. List values are comma separated.

use std::path::PathBuf;

/// Database file path
pub const ENV_DB: &str = "THEME_GALLERY_DB";
/// Snapshot file path
pub const ENV_SNAPSHOT: &str = "THEME_GALLERY_SNAPSHOT";
/// Download directory; downloads are skipped when unset
pub const ENV_DOWNLOAD_DIR: &str = "THEME_GALLERY_DOWNLOAD_DIR";
/// Provider names to run; all when unset
pub const ENV_PROVIDERS: &str = "THEME_GALLERY_PROVIDERS";
/// Repositories searched by the GitHub provider
pub const ENV_GITHUB_REPOS: &str = "THEME_GALLERY_GITHUB_REPOS";

const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database path
    pub database_path: String,
    /// Snapshot path
    pub snapshot_path: PathBuf,
    /// Where theme files are downloaded to
    pub download_dir: Option<PathBuf>,
    /// Providers to run, empty for all
    pub providers: Vec<String>,
    /// Repository URLs for the GitHub provider
    pub github_repositories: Vec<String>,
    /// GitHub access token
    pub github_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "themes.db".to_string(),
            snapshot_path: PathBuf::from("themes.json"),
            download_dir: None,
            providers: Vec::new(),
            github_repositories: vec![providers::github::DEFAULT_REPOSITORY.to_string()],
            github_token: None,
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let github_repositories = get(ENV_GITHUB_REPOS)
            .map(|v| split_list(&v))
            .unwrap_or(defaults.github_repositories);

        Self {
            database_path: get(ENV_DB).unwrap_or(defaults.database_path),
            snapshot_path: get(ENV_SNAPSHOT).map(PathBuf::from).unwrap_or(defaults.snapshot_path),
            download_dir: get(ENV_DOWNLOAD_DIR).map(PathBuf::from),
            providers: get(ENV_PROVIDERS).map(|v| split_list(&v)).unwrap_or_default(),
            github_repositories,
            github_token: TOKEN_VARS.iter().find_map(|key| get(*key)),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = lookup(&[]);
        assert_eq!(config, AppConfig::default());
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = lookup(&[
            (ENV_DB, "/tmp/t.db"),
            (ENV_SNAPSHOT, "/tmp/t.json"),
            (ENV_DOWNLOAD_DIR, "/tmp/themes"),
            (ENV_PROVIDERS, "tmTheme-editor, Color Sublime,"),
            (ENV_GITHUB_REPOS, "https://github.com/a/b,https://github.com/c/d"),
            ("GH_TOKEN", "secret"),
        ]);

        assert_eq!(config.database_path, "/tmp/t.db");
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/t.json"));
        assert_eq!(config.download_dir, Some(PathBuf::from("/tmp/themes")));
        assert_eq!(config.providers, vec!["tmTheme-editor", "Color Sublime"]);
        assert_eq!(config.github_repositories.len(), 2);
        assert_eq!(config.github_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_github_token_preferred() {
        let config = lookup(&[("GITHUB_TOKEN", "a"), ("GH_TOKEN", "b")]);
        assert_eq!(config.github_token.as_deref(), Some("a"));
    }

    #[test]
    fn test_blank_values_ignored() {
        let config = lookup(&[(ENV_DB, "  "), (ENV_PROVIDERS, "")]);
        assert_eq!(config.database_path, "themes.db");
        assert!(config.providers.is_empty());
    }
}
