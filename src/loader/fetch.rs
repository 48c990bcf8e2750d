//! Partial fetching.
//!
//! [`Fetcher`] is the network side of the loader. [`DirFetcher`] answers
//! requests straight from the served directory using the same resolution as
//! the static server, so a missing partial comes back as the fallback
//! document with status 200, exactly as a browser would see it.

use crate::{
    config::SiteConfig,
    log,
    serve::{Resolved, resolve},
};
use std::{future::Future, path::PathBuf};
use thiserror::Error;

/// A settled HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl FetchResponse {
    /// `200 OK` with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".into(),
            body: body.into(),
        }
    }

    /// `404 Not Found` with an empty body.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            status_text: "Not Found".into(),
            body: String::new(),
        }
    }

    /// 2xx status.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Network-level failure: no response was received.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("{0}")]
    Network(String),
}

/// Source of partial HTML.
///
/// Implementations must always return fresh content; nothing is cached
/// between calls.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

/// Serves fetches from the site directory on disk.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
    fallback: PathBuf,
}

impl DirFetcher {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            root: config.serve.root.clone(),
            fallback: config.serve.fallback_path(),
        }
    }
}

impl Fetcher for DirFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send {
        async move {
            let path = match resolve(&self.root, &self.fallback, url) {
                Resolved::File(path) => path,
                Resolved::Fallback(path) => {
                    log!("warn"; "{url} not found, the server answers with the fallback document");
                    path
                }
                Resolved::NotFound => return Ok(FetchResponse::not_found()),
            };

            let body = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| FetchError::Io(path, err))?;
            Ok(FetchResponse::ok(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, DirFetcher) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("collie/dist")).unwrap();
        fs::write(dir.path().join("collie/dist/Hero.html"), "<h1>Hero</h1>").unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let fetcher = DirFetcher {
            root: dir.path().to_path_buf(),
            fallback: dir.path().join("index.html"),
        };
        (dir, fetcher)
    }

    #[test]
    fn test_response_status() {
        assert!(FetchResponse::ok("").is_success());
        assert!(!FetchResponse::not_found().is_success());
        let redirect = FetchResponse {
            status: 304,
            ..FetchResponse::ok("")
        };
        assert!(!redirect.is_success());
    }

    #[tokio::test]
    async fn test_fetch_existing_partial() {
        let (_dir, fetcher) = site();
        let response = fetcher.fetch("/collie/dist/Hero.html").await.unwrap();
        assert_eq!(response, FetchResponse::ok("<h1>Hero</h1>"));
    }

    #[tokio::test]
    async fn test_fetch_missing_partial_yields_fallback() {
        let (_dir, fetcher) = site();
        let response = fetcher.fetch("/collie/dist/Footer.html").await.unwrap();
        assert_eq!(response, FetchResponse::ok("<html></html>"));
    }

    #[tokio::test]
    async fn test_fetch_without_fallback_is_404() {
        let (dir, fetcher) = site();
        fs::remove_file(dir.path().join("index.html")).unwrap();
        let response = fetcher.fetch("/collie/dist/Footer.html").await.unwrap();
        assert_eq!(response.status, 404);
    }
}
