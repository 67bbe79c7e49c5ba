//! Per-site cookie persistence.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use web2api_browser::Cookie;

use crate::error::EngineError;

/// Stores browser cookies per site.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Saved cookies for `domain`; empty if none were saved.
    async fn load_cookies(&self, domain: &str) -> Result<Vec<Cookie>, EngineError>;

    async fn save_cookies(&self, domain: &str, cookies: &[Cookie]) -> Result<(), EngineError>;
}

/// One JSON file per domain.
pub struct JsonCookieStore {
    directory: PathBuf,
}

impl JsonCookieStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub(crate) fn cookie_path(&self, domain: &str) -> PathBuf {
        let name: String = domain
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{}.json", name))
    }
}

fn storage_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Storage(e.to_string())
}

#[async_trait]
impl CookieStore for JsonCookieStore {
    async fn load_cookies(&self, domain: &str) -> Result<Vec<Cookie>, EngineError> {
        let path = self.cookie_path(domain);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(storage_error)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&json).map_err(storage_error)?;
        debug!("Loaded {} cookie(s) for {} from {:?}", cookies.len(), domain, path);
        Ok(cookies)
    }

    async fn save_cookies(&self, domain: &str, cookies: &[Cookie]) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(storage_error)?;

        let json = serde_json::to_string_pretty(cookies).map_err(storage_error)?;
        let path = self.cookie_path(domain);
        tokio::fs::write(&path, json).await.map_err(storage_error)?;
        debug!("Saved {} cookie(s) for {} to {:?}", cookies.len(), domain, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::cookie;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonCookieStore::new(dir.path());
        assert!(store.load_cookies("chat.example.test").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonCookieStore::new(dir.path().join("jar"));
        let cookies = vec![cookie("session", ".example.test"), cookie("pref", ".example.test")];

        store.save_cookies("chat.example.test", &cookies).await.unwrap();
        assert!(dir.path().join("jar/chat.example.test.json").exists());

        let loaded = store.load_cookies("chat.example.test").await.unwrap();
        assert_eq!(loaded, cookies);
        assert!(store.load_cookies("other.test").await.unwrap().is_empty());
    }

    #[test]
    fn test_path_is_sanitized() {
        let store = JsonCookieStore::new("/tmp/jar");
        assert_eq!(
            store.cookie_path("../evil/site:8080"),
            PathBuf::from("/tmp/jar/.._evil_site_8080.json")
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.test.json"), "not json").unwrap();
        let store = JsonCookieStore::new(dir.path());
        assert!(matches!(
            store.load_cookies("bad.test").await,
            Err(EngineError::Storage(_))
        ));
    }
}
