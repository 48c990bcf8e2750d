//! Partial loader.
//!
//! Fetches compiled partials, injects each into its placeholder element,
//! and wires the menu toggle once every fetch has settled.
//!
//! # Architecture
//!
//! ```text
//! bootstrap()
//!     │
//!     ├── for each slot with a placeholder ──► spawn fetch   (concurrent)
//!     │
//!     ├── join_next() ──► inject_partial()                  (completion order)
//!     │       pending ──► populated | abandoned             (terminal)
//!     │
//!     └── all settled ──► look up toggle control + target ──► attach click
//! ```
//!
//! The same pipeline ships to browsers as the generated script (see
//! [`script`]); the Rust side runs it against the built site for `check`.

mod dom;
mod fetch;
pub mod script;

pub use dom::{Dom, HtmlPage};
pub use fetch::{DirFetcher, FetchError, FetchResponse, Fetcher};

use crate::{
    config::{SiteConfig, ToggleConfig},
    log,
    utils::path::to_posix,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    future::{self, Future},
    path::Path,
    sync::Arc,
};
use tokio::task::JoinSet;
use walkdir::WalkDir;

// ============================================================================
// Manifest
// ============================================================================

/// One placeholder and the partial injected into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSlot {
    pub element_id: String,
    pub url: String,
}

/// The click toggle wired after injection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleSpec {
    pub control: String,
    pub target: String,
    pub class: String,
}

impl From<&ToggleConfig> for ToggleSpec {
    fn from(config: &ToggleConfig) -> Self {
        Self {
            control: config.control.clone(),
            target: config.target.clone(),
            class: config.class.clone(),
        }
    }
}

/// Everything the loader needs to know about a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub slots: Vec<PartialSlot>,
    pub toggle: ToggleSpec,
}

impl Manifest {
    /// Build the manifest for a set of partial ids.
    ///
    /// Returns `None` when the partials directory is not inside the served
    /// directory, since no URL would reach them.
    pub fn from_ids<'a>(
        ids: impl IntoIterator<Item = &'a str>,
        config: &SiteConfig,
    ) -> Option<Self> {
        let base = url_base(&config.build.output, &config.serve.root)?;
        let suffix = &config.loader.placeholder_suffix;

        let mut ids: Vec<&str> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let slots = ids
            .into_iter()
            .map(|id| PartialSlot {
                element_id: placeholder_id(id, suffix),
                url: partial_url(&base, id),
            })
            .collect();

        Some(Self {
            slots,
            toggle: ToggleSpec::from(&config.loader.toggle),
        })
    }
}

/// Placeholder element id for a partial: `nav/Menu` → `nav-menu-collie`.
pub fn placeholder_id(id: &str, suffix: &str) -> String {
    format!("{}-{suffix}", id.to_lowercase().replace('/', "-"))
}

/// URL of a partial below `base`, each path segment percent-encoded.
pub fn partial_url(base: &str, id: &str) -> String {
    let encoded: Vec<_> = id.split('/').map(urlencoding::encode).collect();
    format!("{base}/{}.html", encoded.join("/"))
}

/// URL prefix of the partials directory, e.g. `/collie/dist`, or `""` when
/// partials are written to the served directory itself.
pub fn url_base(output: &Path, serve_root: &Path) -> Option<String> {
    let relative = output.strip_prefix(serve_root).ok()?;
    let relative = to_posix(relative);
    if relative.is_empty() {
        Some(String::new())
    } else {
        Some(format!("/{relative}"))
    }
}

/// Ids of the partials present in the output directory.
pub fn scan_ids(output: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in WalkDir::new(output).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to scan partials in {}", output.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "html") {
            continue;
        }
        if let Ok(relative) = path.with_extension("").strip_prefix(output) {
            ids.push(to_posix(relative));
        }
    }
    Ok(ids)
}

// ============================================================================
// Injection
// ============================================================================

/// Final state of one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// No such element in the document; nothing was fetched.
    Missing,
    /// Content replaced with the fetched partial.
    Populated,
    /// Fetch failed; the element was left unchanged.
    Abandoned(String),
}

/// Outcome of [`bootstrap`], slots in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub slots: Vec<(PartialSlot, SlotState)>,
    pub toggle_wired: bool,
}

impl LoadReport {
    pub fn count(&self, state: impl Fn(&SlotState) -> bool) -> usize {
        self.slots.iter().filter(|(_, s)| state(s)).count()
    }

    pub fn populated(&self) -> usize {
        self.count(|s| *s == SlotState::Populated)
    }

    pub fn abandoned(&self) -> usize {
        self.count(|s| matches!(s, SlotState::Abandoned(_)))
    }
}

/// Inject the partial answered by `response` into its placeholder.
///
/// An absent element is not an error: `response` is never polled, so
/// nothing is fetched, and the document is untouched. A failed response
/// leaves the element unchanged.
pub async fn inject_partial<D, R>(dom: &mut D, slot: &PartialSlot, response: R) -> SlotState
where
    D: Dom,
    R: Future<Output = Result<FetchResponse, FetchError>>,
{
    if !dom.has_element(&slot.element_id) {
        return SlotState::Missing;
    }
    let (element_id, url) = (&slot.element_id, &slot.url);

    match response.await {
        Ok(response) if response.is_success() => {
            if dom.set_inner_html(element_id, &response.body) {
                SlotState::Populated
            } else {
                log!("loader"; "#{element_id} cannot hold {url}");
                SlotState::Abandoned("placeholder cannot hold content".into())
            }
        }
        Ok(response) => {
            log!("loader"; "failed to load {url}: {} {}", response.status, response.status_text);
            SlotState::Abandoned(format!("{} {}", response.status, response.status_text))
        }
        Err(err) => {
            log!("loader"; "error loading {url}: {err}");
            SlotState::Abandoned(err.to_string())
        }
    }
}

/// Load every partial of the manifest concurrently, then wire the toggle.
///
/// Must run inside a tokio runtime. Individual failures never stop the other
/// loads or the toggle step.
pub async fn bootstrap<D, F>(dom: &mut D, fetcher: Arc<F>, manifest: &Manifest) -> LoadReport
where
    D: Dom,
    F: Fetcher,
{
    let mut states: Vec<Option<SlotState>> = vec![None; manifest.slots.len()];
    let mut tasks = JoinSet::new();

    for (index, slot) in manifest.slots.iter().enumerate() {
        if !dom.has_element(&slot.element_id) {
            states[index] = Some(SlotState::Missing);
            continue;
        }
        let fetcher = Arc::clone(&fetcher);
        let url = slot.url.clone();
        tasks.spawn(async move { (index, fetcher.fetch(&url).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                let slot = &manifest.slots[index];
                states[index] = Some(inject_partial(dom, slot, future::ready(result)).await);
            }
            Err(err) => log!("loader"; "fetch task failed: {err}"),
        }
    }

    let toggle_wired = wire_toggle(dom, &manifest.toggle);

    LoadReport {
        slots: manifest
            .slots
            .iter()
            .cloned()
            .zip(states)
            .map(|(slot, state)| {
                let state =
                    state.unwrap_or_else(|| SlotState::Abandoned("fetch task failed".into()));
                (slot, state)
            })
            .collect(),
        toggle_wired,
    }
}

/// Attach the toggle if both its control and target exist.
fn wire_toggle<D: Dom>(dom: &mut D, toggle: &ToggleSpec) -> bool {
    let (Some(control), Some(target)) = (
        dom.query_selector(&toggle.control),
        dom.query_selector(&toggle.target),
    ) else {
        return false;
    };
    dom.on_click_toggle_class(control, target, &toggle.class);
    true
}

// ============================================================================
// Tests
// ============================================================================
