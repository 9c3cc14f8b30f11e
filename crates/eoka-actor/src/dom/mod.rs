//! The page surface the collector and the actor work against.
//!
//! [`Dom`] is a small, selector-addressed set of primitives. Two backends:
//!
//! - [`PageDom`] runs each primitive as a short JS program in a live
//!   `eoka::Page`.
//! - [`MemoryDom`] is an in-process document with the same observable
//!   behavior (events, bubbling listeners, focus, scrolling, mutations).

mod memory;
mod page;
mod selector;

pub use memory::{Element, EventRecord, Listener, MemoryDom, NodeId};
pub use page::PageDom;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::action::ScrollOptions;
use crate::affordance::BBox;
use crate::Result;

/// Attribute that carries an element's affordance identity.
pub const IDENTITY_ATTR: &str = "data-id";

/// Elements considered interactive, in the order the query lists them.
pub const INTERACTIVE_QUERY: &str = "a, button, input, textarea, select, \
    [role=\"button\"], [role=\"link\"], [role=\"tab\"], [role=\"menuitem\"], \
    [role=\"option\"], [role=\"treeitem\"], \
    [contenteditable=\"\"], [contenteditable=\"true\"]";

/// One pass over the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scan {
    /// Interactive nodes in document order.
    pub nodes: Vec<NodeFacts>,
    /// Every identity value present anywhere in the document, interactive
    /// or not, scanned or past the limit.
    pub taken: Vec<String>,
}

/// Everything the collector needs to know about one interactive node,
/// read in a single pass over the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeFacts {
    /// Backend handle for [`Dom::stamp`]; meaningful until the next scan.
    pub key: String,
    /// Lower-case tag name.
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    /// Raw `textContent`.
    pub text: String,
    /// Text of a `<label for>` pointing at this element.
    pub label_text: Option<String>,
    /// Text of the elements named by `aria-labelledby`.
    pub labelledby_text: Option<String>,
    /// Existing identity, `None` if absent or carried by any other element
    /// of the document.
    pub identity: Option<String>,
    /// Nearest ancestor tag, unless that ancestor is `<body>`.
    pub parent_tag: Option<String>,
    /// 1-based position among same-tag siblings.
    pub nth_of_type: usize,
    /// Viewport coordinates.
    pub bbox: BBox,
    pub display: String,
    pub visibility: String,
    pub disabled: bool,
}

/// How text gets into an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// `<input>` / `<textarea>`: native `value` setter.
    FormControl,
    /// contenteditable: `textContent`.
    ContentEditable,
    Other,
}

/// What a selector resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    pub tag: String,
    pub input: InputKind,
    pub focusable: bool,
}

/// Synthetic events the actor dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEvent {
    /// Bubbling, cancelable `MouseEvent`.
    Click,
    /// Bubbling `Event`.
    Input,
    /// Bubbling `Event`.
    Change,
}

impl DomEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Input => "input",
            Self::Change => "change",
        }
    }

    pub fn cancelable(self) -> bool {
        matches!(self, Self::Click)
    }
}

/// Window-level scrolling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    To { x: f64, y: f64 },
    By { x: f64, y: f64 },
    Top,
    Bottom,
    /// One viewport height down.
    PageDown,
    /// One viewport height up.
    PageUp,
}

/// Selector-addressed DOM primitives.
///
/// Methods returning `bool` report whether the selector matched; turning a
/// miss into an error is the caller's job.
#[allow(async_fn_in_trait)]
pub trait Dom {
    /// Interactive nodes in document order, at most `limit`.
    async fn scan(&self, limit: usize) -> Result<Scan>;

    /// Write identities onto scanned nodes, `(key, identity)` pairs.
    async fn stamp(&self, assignments: &[(String, String)]) -> Result<()>;

    async fn locate(&self, selector: &str) -> Result<Option<ElementInfo>>;

    async fn focus(&self, selector: &str) -> Result<bool>;

    async fn blur(&self, selector: &str) -> Result<bool>;

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<bool>;

    /// `value` for form controls, `textContent` otherwise.
    async fn read_value(&self, selector: &str) -> Result<Option<String>>;

    /// Write through the native setter (form controls) or `textContent`.
    async fn write_value(&self, selector: &str, value: &str) -> Result<bool>;

    async fn scroll_window(&self, command: ScrollCommand) -> Result<()>;

    async fn scroll_into_view(&self, selector: &str, options: ScrollOptions) -> Result<bool>;

    /// Resolve once `selector` matches, or `false` after `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool>;
}
