//! Browser loader script generation.
//!
//! The script is rendered from an embedded template with the manifest
//! inlined as JSON, then written into the served directory.

use super::Manifest;
use crate::config::SiteConfig;
use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

/// Loader script template (embedded at compile time)
const LOADER_TEMPLATE: &str = include_str!("../embed/loader.js");

/// Render the loader script for `manifest`.
pub fn render_script(manifest: &Manifest) -> Result<String> {
    let partials = serde_json::to_string_pretty(&manifest.slots)
        .context("Failed to serialize partial slots")?;
    let toggle =
        serde_json::to_string(&manifest.toggle).context("Failed to serialize toggle")?;

    Ok(LOADER_TEMPLATE
        .replace("__PARTIALS__", &partials)
        .replace("__TOGGLE__", &toggle))
}

/// Write the loader script to `<serve.root>/<loader.script>`.
pub fn write_script(config: &SiteConfig, manifest: &Manifest) -> Result<PathBuf> {
    let path = config.serve.root.join(&config.loader.script);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, render_script(manifest)?)
        .with_context(|| format!("Failed to write loader script {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{PartialSlot, ToggleSpec};
    use tempfile::TempDir;

    fn manifest() -> Manifest {
        Manifest {
            slots: vec![PartialSlot {
                element_id: "hero-collie".into(),
                url: "/collie/dist/Hero.html".into(),
            }],
            toggle: ToggleSpec {
                control: ".menu-toggle".into(),
                target: ".nav".into(),
                class: "nav-open".into(),
            },
        }
    }

    #[test]
    fn test_render_inlines_manifest() {
        let script = render_script(&manifest()).unwrap();

        assert!(!script.contains("__PARTIALS__"));
        assert!(!script.contains("__TOGGLE__"));
        assert!(script.contains(r#""elementId": "hero-collie""#));
        assert!(script.contains(r#""url": "/collie/dist/Hero.html""#));
        assert!(script.contains(
            r#"const TOGGLE = {"control":".menu-toggle","target":".nav","class":"nav-open"};"#
        ));
        assert!(script.contains(r#"cache: "no-cache""#));
    }

    #[test]
    fn test_render_empty_manifest() {
        let empty = Manifest {
            slots: Vec::new(),
            ..manifest()
        };
        assert!(render_script(&empty).unwrap().contains("const PARTIALS = [];"));
    }

    #[test]
    fn test_write_script() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.serve.root = dir.path().join("public");
        config.loader.script = "js/main.js".into();

        let path = write_script(&config, &manifest()).unwrap();

        assert_eq!(path, dir.path().join("public/js/main.js"));
        assert!(fs::read_to_string(path).unwrap().contains("hero-collie"));
    }
}
