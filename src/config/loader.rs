//! `[loader]` section configuration.
//!
//! Controls the generated client loader script and placeholder naming.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[loader]` section in collie.toml.
///
/// # Example
/// ```toml
/// [loader]
/// enable = true
/// script = "main.js"            # Written under [serve].root
/// placeholder_suffix = "root"   # Header.html -> <div id="header-root">
///
/// [loader.toggle]
/// control = ".menu-toggle"
/// target = ".nav"
/// class = "nav-open"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Generate the loader script after each build.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Script path, relative to the serve root.
    #[serde(default = "defaults::loader::script")]
    #[educe(Default = defaults::loader::script())]
    pub script: PathBuf,

    /// Suffix of placeholder element ids.
    #[serde(default = "defaults::loader::placeholder_suffix")]
    #[educe(Default = defaults::loader::placeholder_suffix())]
    pub placeholder_suffix: String,

    /// Click toggle wired once all partials have settled.
    #[serde(default)]
    pub toggle: ToggleConfig,
}

/// `[loader.toggle]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct ToggleConfig {
    /// Selector of the clickable control.
    #[serde(default = "defaults::loader::toggle::control")]
    #[educe(Default = defaults::loader::toggle::control())]
    pub control: String,

    /// Selector of the element whose class is toggled.
    #[serde(default = "defaults::loader::toggle::target")]
    #[educe(Default = defaults::loader::toggle::target())]
    pub target: String,

    /// Class added or removed on each click.
    #[serde(default = "defaults::loader::toggle::class")]
    #[educe(Default = defaults::loader::toggle::class())]
    pub class: String,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_loader_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert!(config.loader.enable);
        assert_eq!(config.loader.script, PathBuf::from("main.js"));
        assert_eq!(config.loader.placeholder_suffix, "collie");
        assert_eq!(config.loader.toggle.control, ".menu-toggle");
        assert_eq!(config.loader.toggle.target, ".nav");
        assert_eq!(config.loader.toggle.class, "nav-open");
    }

    #[test]
    fn test_loader_toggle_override() {
        let config = r#"
            [loader]
            placeholder_suffix = "root"

            [loader.toggle]
            class = "open"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.loader.placeholder_suffix, "root");
        assert_eq!(config.loader.toggle.class, "open");
        assert_eq!(config.loader.toggle.target, ".nav");
    }
}
