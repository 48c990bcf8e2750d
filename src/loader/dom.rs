//! Document model used by the loader.
//!
//! [`Dom`] is the small slice of a browser document the loader needs.
//! [`HtmlPage`] implements it over a parsed HTML tree, so comments, raw text
//! in `<script>`/`<style>` and attribute values are never mistaken for
//! elements. Click handlers are recorded so they can be fired with
//! [`HtmlPage::click`].
//!
//! Supported selectors are simple compounds: `tag`, `#id`, `.class`, and
//! combinations such as `nav.menu` or `button#toggle.primary`.

use html5ever::{
    Attribute, LocalName, Namespace, ParseOpts, QualName, parse_document, parse_fragment,
    serialize::{SerializeOpts, serialize},
    tendril::{StrTendril, TendrilSink},
};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::rc::Rc;

/// The document operations the loader relies on.
pub trait Dom {
    /// Handle to an element returned by [`Dom::query_selector`].
    type Node;

    /// Whether an element with this id exists.
    fn has_element(&self, id: &str) -> bool;

    /// Replace the content of the element with this id. Returns false when
    /// the element is gone or cannot hold content.
    fn set_inner_html(&mut self, id: &str, html: &str) -> bool;

    /// First element matching `selector`.
    fn query_selector(&self, selector: &str) -> Option<Self::Node>;

    /// Attach a click handler on `control` that toggles `class` on `target`.
    fn on_click_toggle_class(&mut self, control: Self::Node, target: Self::Node, class: &str);
}

// ============================================================================
// Tree Helpers
// ============================================================================

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn attr(node: &Handle, name: &str) -> Option<String> {
    let NodeData::Element { attrs, .. } = &node.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| a.value.to_string())
}

fn element_has_class(node: &Handle, class: &str) -> bool {
    attr(node, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// First element below `root` in document order for which `pred` holds.
///
/// Template contents are not part of the document tree and are skipped.
fn find_element(root: &Handle, pred: impl Fn(&Handle) -> bool) -> Option<Handle> {
    let mut stack = vec![Rc::clone(root)];
    while let Some(node) = stack.pop() {
        if tag_name(&node).is_some() && pred(&node) {
            return Some(node);
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }
    None
}

/// Serialized children of `node`.
fn serialize_children(node: &Handle) -> String {
    let mut out = Vec::new();
    let handle = SerializableHandle::from(Rc::clone(node));
    match serialize(&mut out, &handle, SerializeOpts::default()) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => String::new(),
    }
}

/// Parse `html` as the content of a `context` element.
fn parse_children(context: &str, html: &str) -> Vec<Handle> {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(context));
    let fragment =
        parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html);

    // the fragment parser wraps the nodes in a single <html> root
    let roots = fragment.document.children.take();
    roots.iter().flat_map(|root| root.children.take()).collect()
}

fn toggle_class(node: &Handle, class: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    let existing = attrs.iter_mut().find(|a| &*a.name.local == "class");

    match existing {
        Some(existing) => {
            let mut classes: Vec<&str> = existing.value.split_whitespace().collect();
            match classes.iter().position(|c| *c == class) {
                Some(pos) => {
                    classes.remove(pos);
                }
                None => classes.push(class),
            }
            let updated = classes.join(" ");
            existing.value = StrTendril::from(updated);
        }
        None => attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from("class")),
            value: StrTendril::from(class),
        }),
    }
}

// ============================================================================
// Selectors
// ============================================================================

#[derive(Debug, Default, PartialEq)]
struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    fn parse(selector: &str) -> Option<Self> {
        let selector = selector.trim();
        if selector.is_empty() || selector.contains(char::is_whitespace) {
            return None;
        }

        let mut parsed = Self::default();
        let tag_end = selector.find(['#', '.']).unwrap_or(selector.len());
        if tag_end > 0 {
            parsed.tag = Some(selector[..tag_end].to_ascii_lowercase());
        }

        let mut rest = &selector[tag_end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                '#' => parsed.id = Some(name.to_string()),
                _ => parsed.classes.push(name.to_string()),
            }
            rest = &body[end..];
        }

        Some(parsed)
    }

    fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    fn matches(&self, node: &Handle) -> bool {
        self.tag.as_deref().is_none_or(|tag| tag_name(node) == Some(tag))
            && self
                .id
                .as_ref()
                .is_none_or(|id| attr(node, "id").is_some_and(|value| value == *id))
            && self.classes.iter().all(|class| element_has_class(node, class))
    }
}

// ============================================================================
// HtmlPage
// ============================================================================

/// A click handler registered through [`Dom::on_click_toggle_class`].
struct ToggleBinding {
    control: Handle,
    target: Handle,
    class: String,
}

/// A parsed HTML document.
pub struct HtmlPage {
    dom: RcDom,
    toggles: Vec<ToggleBinding>,
}

impl HtmlPage {
    pub fn new(html: &str) -> Self {
        Self {
            dom: parse_document(RcDom::default(), ParseOpts::default()).one(html),
            toggles: Vec::new(),
        }
    }

    /// Current markup, serialized from the tree.
    pub fn html(&self) -> String {
        serialize_children(&self.dom.document)
    }

    /// Inner HTML of the element with this id.
    pub fn inner_html(&self, id: &str) -> Option<String> {
        self.find(&Selector::by_id(id)).map(|node| serialize_children(&node))
    }

    /// Whether the first element matching `selector` carries `class`.
    pub fn has_class(&self, selector: &str, class: &str) -> bool {
        Selector::parse(selector)
            .and_then(|s| self.find(&s))
            .is_some_and(|node| element_has_class(&node, class))
    }

    /// Fire the click handlers registered on the first element matching
    /// `selector`.
    ///
    /// Returns the number of handlers that ran.
    pub fn click(&mut self, selector: &str) -> usize {
        let Some(control) = Selector::parse(selector).and_then(|s| self.find(&s)) else {
            return 0;
        };

        let mut fired = 0;
        for binding in &self.toggles {
            if Rc::ptr_eq(&binding.control, &control) {
                toggle_class(&binding.target, &binding.class);
                fired += 1;
            }
        }
        fired
    }

    fn find(&self, selector: &Selector) -> Option<Handle> {
        find_element(&self.dom.document, |node| selector.matches(node))
    }
}

impl Dom for HtmlPage {
    type Node = Handle;

    fn has_element(&self, id: &str) -> bool {
        self.find(&Selector::by_id(id)).is_some()
    }

    fn set_inner_html(&mut self, id: &str, html: &str) -> bool {
        let Some(element) = self.find(&Selector::by_id(id)) else {
            return false;
        };
        let Some(name) = tag_name(&element) else {
            return false;
        };
        if VOID_ELEMENTS.contains(&name) {
            return false;
        }

        let children = parse_children(name, html);
        for child in &children {
            child.parent.set(Some(Rc::downgrade(&element)));
        }
        for old in element.children.replace(children) {
            old.parent.set(None);
        }
        true
    }

    fn query_selector(&self, selector: &str) -> Option<Handle> {
        self.find(&Selector::parse(selector)?)
    }

    fn on_click_toggle_class(&mut self, control: Handle, target: Handle, class: &str) {
        self.toggles.push(ToggleBinding {
            control,
            target,
            class: class.to_string(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
