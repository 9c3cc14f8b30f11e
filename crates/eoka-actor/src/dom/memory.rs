//! In-process document.
//!
//! Models the slice of browser behavior the actor relies on: an element
//! tree with attributes, text and form values, computed `display` /
//! `visibility`, boxes in document coordinates, focus, window scrolling,
//! synthetic events that bubble to listeners, and subtree mutation
//! notifications for waiters.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use super::selector::{SelectorList, Subject};
use super::{
    DomEvent, Dom, ElementInfo, InputKind, NodeFacts, Scan, ScrollCommand, IDENTITY_ATTR,
    INTERACTIVE_QUERY,
};
use crate::action::{ScrollAlign, ScrollOptions};
use crate::affordance::BBox;
use crate::Result;

/// Handle to a node of a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Builder for a new element.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    value: String,
    bbox: BBox,
    display: String,
    visibility: String,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            value: String::new(),
            bbox: BBox {
                x: 0.0,
                y: 0.0,
                width: 120.0,
                height: 24.0,
            },
            display: "block".into(),
            visibility: "visible".into(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn bbox(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bbox = BBox {
            x,
            y,
            width,
            height,
        };
        self
    }

    pub fn disabled(self) -> Self {
        self.attr("disabled", "")
    }

    /// `display: none`.
    pub fn hidden(mut self) -> Self {
        self.display = "none".into();
        self
    }

    /// `visibility: hidden`.
    pub fn invisible(mut self) -> Self {
        self.visibility = "hidden".into();
        self
    }
}

/// One dispatched event, as seen at its target.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub target: NodeId,
    pub event: DomEvent,
    pub bubbles: bool,
    pub cancelable: bool,
    /// Target's value (or text) at dispatch time.
    pub value: String,
}

/// Counts events delivered to one node, including bubbled ones.
#[derive(Debug, Clone, Default)]
pub struct Listener(Arc<AtomicUsize>);

impl Listener {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    bbox: BBox,
    display: String,
    visibility: String,
}

impl Subject for Node {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Debug)]
struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    focused: Option<NodeId>,
    scroll: (f64, f64),
    viewport: (f64, f64),
    page_size: (f64, f64),
    listeners: Vec<(NodeId, DomEvent, Listener)>,
    events: Vec<EventRecord>,
}

impl Document {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Attached nodes under `<body>`, document order, body excluded.
    fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(self.body).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    fn query_all(&self, selector: &SelectorList) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|id| selector.matches(self.node(*id)))
            .collect()
    }

    fn query(&self, selector: &str) -> Result<Option<NodeId>> {
        let sel = SelectorList::parse(selector)?;
        Ok(self
            .preorder()
            .into_iter()
            .find(|id| sel.matches(self.node(*id))))
    }

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(id).parent, move |p| self.node(*p).parent)
    }

    fn text_content(&self, id: NodeId) -> String {
        let node = self.node(id);
        let mut out = node.text.clone();
        for child in &node.children {
            out.push_str(&self.text_content(*child));
        }
        out
    }

    fn input_kind(&self, id: NodeId) -> InputKind {
        let node = self.node(id);
        match node.tag.as_str() {
            "input" | "textarea" => InputKind::FormControl,
            _ if matches!(node.attr("contenteditable"), Some("" | "true")) => {
                InputKind::ContentEditable
            }
            _ => InputKind::Other,
        }
    }

    fn focusable(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.attrs.contains_key("disabled") {
            return false;
        }
        matches!(
            node.tag.as_str(),
            "a" | "button" | "input" | "textarea" | "select"
        ) || node.attrs.contains_key("tabindex")
            || self.input_kind(id) == InputKind::ContentEditable
    }

    fn read_value(&self, id: NodeId) -> String {
        match self.input_kind(id) {
            InputKind::ContentEditable => self.text_content(id),
            _ => self.node(id).value.clone(),
        }
    }

    /// `display: none` and `visibility: hidden` both inherit for our purposes.
    fn computed_style(&self, id: NodeId) -> (String, String) {
        let chain = std::iter::once(id).chain(self.ancestors(id));
        let mut display = self.node(id).display.clone();
        let mut visibility = self.node(id).visibility.clone();
        for n in chain {
            let node = self.node(n);
            if node.display == "none" {
                display = "none".into();
            }
            if node.visibility == "hidden" {
                visibility = "hidden".into();
            }
        }
        (display, visibility)
    }

    fn facts(&self, id: NodeId, identity: Option<String>) -> NodeFacts {
        let node = self.node(id);
        let (display, visibility) = self.computed_style(id);

        let label_text = node.attr("id").and_then(|el_id| {
            self.preorder()
                .into_iter()
                .find(|n| {
                    let l = self.node(*n);
                    l.tag == "label" && l.attr("for") == Some(el_id)
                })
                .map(|n| self.text_content(n).trim().to_string())
        });

        let labelledby_text = node.attr("aria-labelledby").and_then(|ids| {
            let parts: Vec<String> = ids
                .split_whitespace()
                .filter_map(|want| {
                    self.preorder()
                        .into_iter()
                        .find(|n| self.node(*n).attr("id") == Some(want))
                })
                .map(|n| self.text_content(n).trim().to_string())
                .collect();
            let joined = parts.join(" ");
            (!joined.is_empty()).then_some(joined)
        });

        let parent_tag = node
            .parent
            .filter(|p| *p != self.body)
            .map(|p| self.node(p).tag.clone());

        let nth_of_type = node
            .parent
            .map(|p| {
                self.node(p)
                    .children
                    .iter()
                    .filter(|c| self.node(**c).tag == node.tag)
                    .position(|c| *c == id)
                    .map_or(1, |i| i + 1)
            })
            .unwrap_or(1);

        // Elements that are not rendered have an empty box.
        let bbox = if display == "none" {
            BBox::default()
        } else {
            BBox {
                x: node.bbox.x - self.scroll.0,
                y: node.bbox.y - self.scroll.1,
                ..node.bbox
            }
        };

        NodeFacts {
            key: id.0.to_string(),
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: self.text_content(id),
            label_text,
            labelledby_text,
            identity,
            parent_tag,
            nth_of_type,
            bbox,
            display,
            visibility,
            disabled: node.attrs.contains_key("disabled"),
        }
    }

    fn max_scroll(&self) -> (f64, f64) {
        (
            (self.page_size.0 - self.viewport.0).max(0.0),
            (self.page_size.1 - self.viewport.1).max(0.0),
        )
    }

    fn scroll_to(&mut self, x: f64, y: f64) {
        let (mx, my) = self.max_scroll();
        self.scroll = (x.clamp(0.0, mx), y.clamp(0.0, my));
    }

    fn dispatch(&mut self, target: NodeId, event: DomEvent) {
        let record = EventRecord {
            target,
            event,
            bubbles: true,
            cancelable: event.cancelable(),
            value: self.read_value(target),
        };
        let path: HashSet<NodeId> = std::iter::once(target).chain(self.ancestors(target)).collect();
        for (node, ev, listener) in &self.listeners {
            if *ev == event && path.contains(node) {
                listener.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.events.push(record);
    }
}

/// In-process [`Dom`] backend. Cheap to clone; clones share the document.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    doc: Arc<Mutex<Document>>,
    mutations: Arc<watch::Sender<u64>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Empty document: a `<body>`, a 1280x720 viewport, a 1280x2000 page.
    pub fn new() -> Self {
        let body = Node {
            tag: "body".into(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            parent: None,
            children: Vec::new(),
            bbox: BBox::default(),
            display: "block".into(),
            visibility: "visible".into(),
        };
        let doc = Document {
            nodes: vec![body],
            body: NodeId(0),
            focused: None,
            scroll: (0.0, 0.0),
            viewport: (1280.0, 720.0),
            page_size: (1280.0, 2000.0),
            listeners: Vec::new(),
            events: Vec::new(),
        };
        let (tx, _) = watch::channel(0u64);
        Self {
            doc: Arc::new(Mutex::new(doc)),
            mutations: Arc::new(tx),
        }
    }

    pub fn with_viewport(self, width: f64, height: f64) -> Self {
        self.doc().viewport = (width, height);
        self
    }

    pub fn set_page_size(&self, width: f64, height: f64) {
        self.doc().page_size = (width, height);
    }

    fn doc(&self) -> MutexGuard<'_, Document> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutated(&self) {
        self.mutations.send_modify(|v| *v = v.wrapping_add(1));
    }

    pub fn body(&self) -> NodeId {
        self.doc().body
    }

    /// Append a new element as the last child of `parent`.
    pub fn append(&self, parent: NodeId, element: Element) -> NodeId {
        let id = {
            let mut doc = self.doc();
            let id = NodeId(doc.nodes.len());
            doc.nodes.push(Node {
                tag: element.tag,
                attrs: element.attrs.into_iter().collect(),
                text: element.text,
                value: element.value,
                parent: Some(parent),
                children: Vec::new(),
                bbox: element.bbox,
                display: element.display,
                visibility: element.visibility,
            });
            doc.node_mut(parent).children.push(id);
            id
        };
        self.mutated();
        id
    }

    /// Detach a node and its subtree from the document.
    pub fn remove(&self, node: NodeId) {
        {
            let mut doc = self.doc();
            if let Some(parent) = doc.node_mut(node).parent.take() {
                doc.node_mut(parent).children.retain(|c| *c != node);
            }
            if doc.focused == Some(node) {
                doc.focused = None;
            }
        }
        self.mutated();
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.doc()
            .node_mut(node)
            .attrs
            .insert(name.to_string(), value.to_string());
        self.mutated();
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        self.doc().node_mut(node).attrs.remove(name);
        self.mutated();
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.doc().node(node).attrs.get(name).cloned()
    }

    pub fn set_bbox(&self, node: NodeId, bbox: BBox) {
        self.doc().node_mut(node).bbox = bbox;
    }

    /// `value` of a form control (what the native getter returns).
    pub fn value(&self, node: NodeId) -> String {
        self.doc().node(node).value.clone()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.doc().text_content(node)
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.doc().focused
    }

    pub fn scroll_position(&self) -> (f64, f64) {
        self.doc().scroll
    }

    /// Count `event`s reaching `node`, at target or by bubbling.
    pub fn listen(&self, node: NodeId, event: DomEvent) -> Listener {
        let listener = Listener::default();
        self.doc().listeners.push((node, event, listener.clone()));
        listener
    }

    /// Every event dispatched so far, in order.
    pub fn events(&self) -> Vec<EventRecord> {
        self.doc().events.clone()
    }

    /// Events of one kind dispatched with `node` as target.
    pub fn events_for(&self, node: NodeId, event: DomEvent) -> Vec<EventRecord> {
        self.doc()
            .events
            .iter()
            .filter(|r| r.target == node && r.event == event)
            .cloned()
            .collect()
    }

    pub fn query(&self, selector: &str) -> Result<Option<NodeId>> {
        self.doc().query(selector)
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let sel = SelectorList::parse(selector)?;
        Ok(self.doc().query_all(&sel))
    }

    /// Live mutation subscriptions (pending waiters).
    pub fn observer_count(&self) -> usize {
        self.mutations.receiver_count()
    }
}

impl Dom for MemoryDom {
    async fn scan(&self, limit: usize) -> Result<Scan> {
        let interactive = SelectorList::parse(INTERACTIVE_QUERY)?;
        let doc = self.doc();

        let mut carriers: HashMap<String, usize> = HashMap::new();
        for id in doc.preorder() {
            if let Some(v) = doc.node(id).attr(IDENTITY_ATTR) {
                *carriers.entry(v.to_string()).or_default() += 1;
            }
        }

        let mut nodes = Vec::new();
        for id in doc.query_all(&interactive) {
            if nodes.len() >= limit {
                break;
            }
            let identity = doc
                .node(id)
                .attr(IDENTITY_ATTR)
                .filter(|v| !v.is_empty() && carriers.get(*v) == Some(&1))
                .map(str::to_string);
            nodes.push(doc.facts(id, identity));
        }
        Ok(Scan {
            nodes,
            taken: carriers.into_keys().collect(),
        })
    }

    async fn stamp(&self, assignments: &[(String, String)]) -> Result<()> {
        if assignments.is_empty() {
            return Ok(());
        }
        {
            let mut doc = self.doc();
            for (key, identity) in assignments {
                let Some(idx) = key.parse::<usize>().ok().filter(|i| *i < doc.nodes.len()) else {
                    debug!(key = %key, "stamp: unknown node key");
                    continue;
                };
                doc.node_mut(NodeId(idx))
                    .attrs
                    .insert(IDENTITY_ATTR.to_string(), identity.clone());
            }
        }
        self.mutated();
        Ok(())
    }

    async fn locate(&self, selector: &str) -> Result<Option<ElementInfo>> {
        let doc = self.doc();
        Ok(doc.query(selector)?.map(|id| ElementInfo {
            tag: doc.node(id).tag.clone(),
            input: doc.input_kind(id),
            focusable: doc.focusable(id),
        }))
    }

    async fn focus(&self, selector: &str) -> Result<bool> {
        let mut doc = self.doc();
        let Some(id) = doc.query(selector)? else {
            return Ok(false);
        };
        if doc.focusable(id) {
            doc.focused = Some(id);
        }
        Ok(true)
    }

    async fn blur(&self, selector: &str) -> Result<bool> {
        let mut doc = self.doc();
        let Some(id) = doc.query(selector)? else {
            return Ok(false);
        };
        if doc.focused == Some(id) {
            doc.focused = None;
        }
        Ok(true)
    }

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<bool> {
        let mut doc = self.doc();
        let Some(id) = doc.query(selector)? else {
            return Ok(false);
        };
        doc.dispatch(id, event);
        Ok(true)
    }

    async fn read_value(&self, selector: &str) -> Result<Option<String>> {
        let doc = self.doc();
        Ok(doc.query(selector)?.map(|id| doc.read_value(id)))
    }

    async fn write_value(&self, selector: &str, value: &str) -> Result<bool> {
        let replaced_children = {
            let mut doc = self.doc();
            let Some(id) = doc.query(selector)? else {
                return Ok(false);
            };
            match doc.input_kind(id) {
                InputKind::ContentEditable => {
                    // textContent replaces the subtree with a single text node
                    let children = std::mem::take(&mut doc.node_mut(id).children);
                    for child in &children {
                        doc.node_mut(*child).parent = None;
                    }
                    doc.node_mut(id).text = value.to_string();
                    !children.is_empty()
                }
                _ => {
                    doc.node_mut(id).value = value.to_string();
                    false
                }
            }
        };
        if replaced_children {
            self.mutated();
        }
        Ok(true)
    }

    async fn scroll_window(&self, command: ScrollCommand) -> Result<()> {
        let mut doc = self.doc();
        let (x, y) = doc.scroll;
        let (_, vh) = doc.viewport;
        let (_, max_y) = doc.max_scroll();
        match command {
            ScrollCommand::To { x, y } => doc.scroll_to(x, y),
            ScrollCommand::By { x: dx, y: dy } => doc.scroll_to(x + dx, y + dy),
            ScrollCommand::Top => doc.scroll_to(x, 0.0),
            ScrollCommand::Bottom => doc.scroll_to(x, max_y),
            ScrollCommand::PageDown => doc.scroll_to(x, y + vh),
            ScrollCommand::PageUp => doc.scroll_to(x, y - vh),
        }
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str, options: ScrollOptions) -> Result<bool> {
        let mut doc = self.doc();
        let Some(id) = doc.query(selector)? else {
            return Ok(false);
        };
        let b = doc.node(id).bbox;
        let (vw, vh) = doc.viewport;
        let (sx, sy) = doc.scroll;
        let align = |align: ScrollAlign, pos: f64, len: f64, view: f64, current: f64| match align {
            ScrollAlign::Start => pos,
            ScrollAlign::Center => pos - (view - len) / 2.0,
            ScrollAlign::End => pos + len - view,
            ScrollAlign::Nearest => {
                if pos < current {
                    pos
                } else if pos + len > current + view {
                    pos + len - view
                } else {
                    current
                }
            }
        };
        let x = align(options.inline, b.x, b.width, vw, sx);
        let y = align(options.block, b.y, b.height, vh, sy);
        doc.scroll_to(x, y);
        Ok(true)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool> {
        // Subscribe before the first check so no insertion slips between them.
        let mut changes = self.mutations.subscribe();
        if self.doc().query(selector)?.is_some() {
            return Ok(true);
        }
        let watch = async {
            while changes.changed().await.is_ok() {
                if self.doc().query(selector)?.is_some() {
                    return Ok(true);
                }
            }
            Ok::<_, crate::Error>(false)
        };
        // The subscription is dropped on either outcome.
        match tokio::time::timeout(timeout, watch).await {
            Ok(found) => found,
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_is_document_order_and_bounded() {
        let dom = MemoryDom::new();
        let form = dom.append(dom.body(), Element::new("form"));
        dom.append(form, Element::new("input").attr("name", "q"));
        dom.append(form, Element::new("button").text("Go"));
        dom.append(dom.body(), Element::new("a").attr("href", "/next").text("Next"));
        dom.append(dom.body(), Element::new("div").text("not interactive"));

        let facts = dom.scan(400).await.unwrap().nodes;
        let tags: Vec<&str> = facts.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, ["input", "button", "a"]);
        assert_eq!(facts[0].parent_tag.as_deref(), Some("form"));
        assert_eq!(facts[2].parent_tag, None);

        assert_eq!(dom.scan(2).await.unwrap().nodes.len(), 2);
    }

    #[tokio::test]
    async fn scan_reports_only_document_unique_identities() {
        let dom = MemoryDom::new();
        dom.append(dom.body(), Element::new("button").attr(IDENTITY_ATTR, "dup"));
        dom.append(dom.body(), Element::new("button").attr(IDENTITY_ATTR, "dup"));
        dom.append(dom.body(), Element::new("tr").attr(IDENTITY_ATTR, "5"));
        dom.append(dom.body(), Element::new("a").attr(IDENTITY_ATTR, "5"));
        dom.append(dom.body(), Element::new("input").attr(IDENTITY_ATTR, "solo"));
        dom.append(dom.body(), Element::new("button").attr(IDENTITY_ATTR, "late"));
        dom.append(dom.body(), Element::new("button").attr(IDENTITY_ATTR, "late"));

        let scan = dom.scan(4).await.unwrap();
        let ids: Vec<Option<&str>> = scan.nodes.iter().map(|f| f.identity.as_deref()).collect();
        assert_eq!(ids, [None, None, None, Some("solo")]);

        let mut taken = scan.taken;
        taken.sort();
        assert_eq!(taken, ["5", "dup", "late", "solo"]);
    }

    #[tokio::test]
    async fn labels_and_style_are_resolved() {
        let dom = MemoryDom::new();
        dom.append(dom.body(), Element::new("label").attr("for", "email").text(" Email "));
        dom.append(dom.body(), Element::new("span").id("hint").text("Search"));
        dom.append(dom.body(), Element::new("input").id("email"));
        dom.append(dom.body(), Element::new("input").attr("aria-labelledby", "hint"));
        let hidden = dom.append(dom.body(), Element::new("div").hidden());
        dom.append(hidden, Element::new("button").text("Ghost"));

        let facts = dom.scan(10).await.unwrap().nodes;
        assert_eq!(facts[0].label_text.as_deref(), Some("Email"));
        assert_eq!(facts[1].labelledby_text.as_deref(), Some("Search"));
        assert_eq!(facts[2].display, "none");
        assert_eq!(facts[2].bbox.width, 0.0);
    }

    #[tokio::test]
    async fn click_bubbles_to_ancestor_listeners() {
        let dom = MemoryDom::new();
        let list = dom.append(dom.body(), Element::new("ul"));
        let item = dom.append(list, Element::new("button").id("b"));
        let on_list = dom.listen(list, DomEvent::Click);
        let on_body = dom.listen(dom.body(), DomEvent::Click);
        let on_item_input = dom.listen(item, DomEvent::Input);

        assert!(dom.dispatch("#b", DomEvent::Click).await.unwrap());
        assert_eq!(on_list.count(), 1);
        assert_eq!(on_body.count(), 1);
        assert_eq!(on_item_input.count(), 0);

        let rec = &dom.events_for(item, DomEvent::Click)[0];
        assert!(rec.bubbles && rec.cancelable);
        assert!(!dom.dispatch("#nope", DomEvent::Click).await.unwrap());
    }

    #[tokio::test]
    async fn contenteditable_write_replaces_children() {
        let dom = MemoryDom::new();
        let ed = dom.append(dom.body(), Element::new("div").attr("contenteditable", "true"));
        dom.append(ed, Element::new("b").text("old"));
        assert!(dom.write_value("[contenteditable=\"true\"]", "new").await.unwrap());
        assert_eq!(dom.text_content(ed), "new");
    }

    #[tokio::test]
    async fn window_scroll_is_clamped() {
        let dom = MemoryDom::new().with_viewport(800.0, 600.0);
        dom.set_page_size(800.0, 1500.0);
        dom.scroll_window(ScrollCommand::PageDown).await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 600.0));
        dom.scroll_window(ScrollCommand::PageDown).await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 900.0));
        dom.scroll_window(ScrollCommand::By { x: 0.0, y: -5000.0 }).await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 0.0));
        dom.scroll_window(ScrollCommand::Bottom).await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 900.0));
    }

    #[tokio::test]
    async fn wait_for_sees_late_insertions_and_releases_observer() {
        let dom = MemoryDom::new();
        let inserter = dom.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            inserter.append(inserter.body(), Element::new("div").id("late"));
        });
        let found = dom
            .wait_for("#late", Duration::from_millis(1000))
            .await
            .unwrap();
        task.await.unwrap();
        assert!(found);
        assert_eq!(dom.observer_count(), 0);

        let missing = dom
            .wait_for("#never", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!missing);
        assert_eq!(dom.observer_count(), 0);
    }
}
