//! Loader dry run.
//!
//! Loads the built partials into the fallback document the same way the
//! browser script does, and reports placeholders that stay empty.

use crate::{
    config::SiteConfig,
    loader::{DirFetcher, HtmlPage, LoadReport, Manifest, SlotState, bootstrap, scan_ids},
    log,
};
use anyhow::{Context, Result, bail};
use std::{fs, sync::Arc};

/// Run the loader against the built site.
///
/// Returns the load report; abandoned placeholders are logged as errors.
pub fn check_site(config: &SiteConfig) -> Result<LoadReport> {
    let output = &config.build.output;
    if !output.is_dir() {
        bail!("{} does not exist, run `build` first", output.display());
    }

    let ids = scan_ids(output)?;
    let Some(manifest) = Manifest::from_ids(ids.iter().map(String::as_str), config) else {
        bail!(
            "{} is not inside {}, partials cannot be served",
            output.display(),
            config.serve.root.display()
        );
    };

    let page_path = config.serve.fallback_path();
    let page = fs::read_to_string(&page_path)
        .with_context(|| format!("Failed to read {}", page_path.display()))?;
    let mut page = HtmlPage::new(&page);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start async runtime")?;
    let fetcher = Arc::new(DirFetcher::new(config));
    let report = runtime.block_on(bootstrap(&mut page, fetcher, &manifest));

    log_report(&report);
    Ok(report)
}

fn log_report(report: &LoadReport) {
    for (slot, state) in &report.slots {
        match state {
            SlotState::Populated => log!("check"; "#{} <- {}", slot.element_id, slot.url),
            SlotState::Missing => {
                log!("check"; "#{} not in page, {} unused", slot.element_id, slot.url);
            }
            SlotState::Abandoned(reason) => {
                log!("error"; "#{} stays empty: {} ({reason})", slot.element_id, slot.url);
            }
        }
    }

    if report.toggle_wired {
        log!("check"; "menu toggle wired");
    } else {
        log!("warn"; "menu toggle not wired, control or target missing");
    }

    log!(
        "check";
        "{} populated, {} abandoned, {} missing",
        report.populated(),
        report.abandoned(),
        report.count(|s| *s == SlotState::Missing)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = r#"<body>
<div id="header-collie"></div>
<main><div id="hero-collie"></div></main>
</body>"#;

    fn site() -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.update_path_with_root(dir.path());
        fs::create_dir_all(&config.build.output).unwrap();
        fs::write(config.serve.root.join("index.html"), PAGE).unwrap();
        (dir, config)
    }

    #[test]
    fn test_check_populates_placeholders() {
        let (_dir, config) = site();
        let out = &config.build.output;
        fs::write(
            out.join("Header.html"),
            r#"<button class="menu-toggle"></button><nav class="nav"></nav>"#,
        )
        .unwrap();
        fs::write(out.join("Hero.html"), "<h1>Hero</h1>").unwrap();
        fs::write(out.join("Unused.html"), "<p></p>").unwrap();

        let report = check_site(&config).unwrap();

        assert_eq!(report.populated(), 2);
        assert_eq!(report.abandoned(), 0);
        assert_eq!(report.count(|s| *s == SlotState::Missing), 1);
        assert!(report.toggle_wired);
    }

    #[test]
    fn test_check_unreadable_partial_is_abandoned() {
        let (_dir, config) = site();
        fs::write(config.build.output.join("Hero.html"), "<h1>Hero</h1>").unwrap();
        fs::write(config.build.output.join("Header.html"), [0xff, 0xfe, 0xfd]).unwrap();

        let report = check_site(&config).unwrap();

        assert_eq!(report.populated(), 1);
        assert_eq!(report.abandoned(), 1);
        assert!(!report.toggle_wired);
    }

    #[test]
    fn test_check_requires_build_output() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::default();
        config.update_path_with_root(dir.path());
        assert!(check_site(&config).is_err());
    }

    #[test]
    fn test_check_requires_fallback_page() {
        let (_dir, config) = site();
        fs::remove_file(config.serve.fallback_path()).unwrap();
        assert!(check_site(&config).is_err());
    }
}
