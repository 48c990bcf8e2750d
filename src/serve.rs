//! Static file server.
//!
//! Serves the site directory over HTTP, built on `tiny_http`:
//!
//! - Static files with a content type guessed from the extension
//! - Automatic `index.html` resolution for directories
//! - Every unmatched path answers with the fallback document (status 200)
//! - Partial rebuilds on template changes (via `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    resolve() + respond     Detect changes
//!                            Rebuild partials
//!          │                       │
//!          └───────────┬───────────┘
//!                      ▼
//!               config.serve.root
//!             (public/ + partials)
//! ```

use crate::{
    build::Owners,
    config::SiteConfig,
    log,
    utils::path::is_contained,
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Path Resolution
// ============================================================================

/// What a request path maps to on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// An existing file, or a directory's `index.html`.
    File(PathBuf),
    /// Nothing matched; the fallback document is served with status 200.
    Fallback(PathBuf),
    /// Nothing matched and there is no fallback document.
    NotFound,
}

/// Map a request URL to a file below `root`.
///
/// Query strings and fragments are ignored and the path is percent-decoded.
/// Paths with `..` never reach the filesystem and resolve like any other
/// unmatched path.
pub fn resolve(root: &Path, fallback: &Path, url: &str) -> Resolved {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
    let relative = Path::new(decoded.trim_matches('/'));

    if is_contained(relative) {
        let local = root.join(relative);
        if local.is_file() {
            return Resolved::File(local);
        }
        let index = local.join("index.html");
        if index.is_file() {
            return Resolved::File(index);
        }
    }

    if fallback.is_file() {
        Resolved::Fallback(fallback.to_path_buf())
    } else {
        Resolved::NotFound
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the static server with optional file watching.
///
/// This function:
/// 1. Binds to the configured interface and port (with auto-retry on port conflict)
/// 2. Sets up Ctrl+C handler for graceful shutdown
/// 3. Spawns file watcher thread (if enabled)
/// 4. Enters the main request handling loop
///
/// The server blocks until Ctrl+C is received. `owners` seeds the watcher's
/// id collision checks.
pub fn serve_site(config: &'static SiteConfig, owners: Owners) -> Result<()> {
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", config.serve.interface))?;

    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if !config.serve.fallback_path().is_file() {
        let fallback = config.serve.fallback.display();
        log!("warn"; "fallback {fallback} not found, unmatched paths will 404");
    }

    if config.serve.watch {
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(config, owners) {
                log!("watch"; "{err}");
            }
        });
    }

    let fallback = config.serve.fallback_path();
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &config.serve.root, &fallback) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
///
/// Only `GET` and `HEAD` are answered with content; `tiny_http` drops the
/// body for `HEAD`. Everything else is a 404.
fn handle_request(request: Request, root: &Path, fallback: &Path) -> Result<()> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        return serve_not_found(request);
    }

    match resolve(root, fallback, request.url()) {
        Resolved::File(path) | Resolved::Fallback(path) => serve_file(request, &path),
        Resolved::NotFound => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value)
        .map_err(|()| anyhow!("Invalid header value `{value}`"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let header = content_type_header(guess_content_type(path))?;
    let response = Response::from_data(content).with_header(header);

    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")?],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("webmanifest") => "application/manifest+json",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{Read, Write},
        net::TcpStream,
        thread,
    };
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("generated")).unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("index.html"), "<html>home</html>").unwrap();
        fs::write(dir.path().join("generated/a.html"), "<p>a</p>").unwrap();
        fs::write(dir.path().join("generated/Main Menu.html"), "<nav></nav>").unwrap();
        fs::write(dir.path().join("docs/index.html"), "<html>docs</html>").unwrap();
        dir
    }

    #[test]
    fn test_resolve_file() {
        let dir = site();
        let root = dir.path();
        let fallback = root.join("index.html");

        assert_eq!(
            resolve(root, &fallback, "/generated/a.html"),
            Resolved::File(root.join("generated/a.html"))
        );
        assert_eq!(
            resolve(root, &fallback, "/generated/a.html?v=3#top"),
            Resolved::File(root.join("generated/a.html"))
        );
        assert_eq!(
            resolve(root, &fallback, "/generated/Main%20Menu.html"),
            Resolved::File(root.join("generated/Main Menu.html"))
        );
    }

    #[test]
    fn test_resolve_directory_index() {
        let dir = site();
        let root = dir.path();
        let fallback = root.join("index.html");

        assert_eq!(resolve(root, &fallback, "/"), Resolved::File(root.join("index.html")));
        assert_eq!(
            resolve(root, &fallback, "/docs/"),
            Resolved::File(root.join("docs/index.html"))
        );
    }

    #[test]
    fn test_resolve_unmatched_is_fallback() {
        let dir = site();
        let root = dir.path();
        let fallback = root.join("index.html");

        for url in [
            "/nonexistent-path",
            "/generated",
            "/../secret.txt",
            "/generated/%2e%2e/%2e%2e/x",
        ] {
            let resolved = resolve(root, &fallback, url);
            assert_eq!(resolved, Resolved::Fallback(fallback.clone()), "{url}");
        }
    }

    #[test]
    fn test_resolve_without_fallback() {
        let dir = site();
        let root = dir.path();
        assert_eq!(resolve(root, &root.join("missing.html"), "/nope"), Resolved::NotFound);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(
            guess_content_type(Path::new("main.js")),
            "application/javascript; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("LOGO.PNG")), "image/png");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }

    /// Serve `count` requests from `root` on an ephemeral port.
    fn spawn_server(root: PathBuf, count: usize) -> (SocketAddr, thread::JoinHandle<()>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = thread::spawn(move || {
            let fallback = root.join("index.html");
            for _ in 0..count {
                let request = server.recv().unwrap();
                handle_request(request, &root, &fallback).unwrap();
            }
        });
        (addr, handle)
    }

    fn request(addr: SocketAddr, method: &str, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_http_fallback_and_partial() {
        let dir = site();
        let (addr, handle) = spawn_server(dir.path().to_path_buf(), 4);

        let missing = request(addr, "GET", "/nonexistent-path");
        assert!(missing.starts_with("HTTP/1.1 200"));
        assert!(missing.ends_with("<html>home</html>"));

        let partial = request(addr, "GET", "/generated/a.html");
        assert!(partial.starts_with("HTTP/1.1 200"));
        assert!(partial.contains("text/html; charset=utf-8"));
        assert!(partial.ends_with("<p>a</p>"));

        let head = request(addr, "HEAD", "/generated/a.html");
        assert!(head.starts_with("HTTP/1.1 200"));
        assert!(!head.contains("<p>a</p>"));

        let post = request(addr, "POST", "/generated/a.html");
        assert!(post.starts_with("HTTP/1.1 404"));

        handle.join().unwrap();
    }

    #[test]
    fn test_try_bind_port_skips_taken_port() {
        let taken = Server::http("127.0.0.1:0").unwrap();
        let port = taken.server_addr().to_ip().unwrap().port();

        let (_server, addr) = try_bind_port("127.0.0.1".parse().unwrap(), port, 3).unwrap();
        assert_ne!(addr.port(), port);

        assert!(try_bind_port("127.0.0.1".parse().unwrap(), port, 1).is_err());
    }
}
