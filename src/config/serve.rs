//! `[serve]` section configuration.
//!
//! Contains static server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[serve]` section in collie.toml - static server settings.
///
/// # Example
/// ```toml
/// [serve]
/// root = "public"           # Directory served over HTTP
/// fallback = "index.html"   # Returned for every unmatched path
/// interface = "0.0.0.0"     # Listen on all interfaces
/// port = 3000               # Used when $PORT is unset
/// watch = true              # Rebuild partials on template changes
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Served directory.
    #[serde(default = "defaults::serve::root")]
    #[educe(Default = defaults::serve::root())]
    pub root: PathBuf,

    /// Fallback document, relative to `root`.
    #[serde(default = "defaults::serve::fallback")]
    #[educe(Default = defaults::serve::fallback())]
    pub fallback: PathBuf,

    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 5173), used when the port variable is unset.
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Environment variable consulted for the port.
    #[serde(default = "defaults::serve::port_env")]
    #[educe(Default = defaults::serve::port_env())]
    pub port_env: String,

    /// Rebuild partials when templates change.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub watch: bool,
}

impl ServeConfig {
    /// Absolute path of the fallback document.
    pub fn fallback_path(&self) -> PathBuf {
        self.root.join(&self.fallback)
    }
}
