//! Affordance collection: the interactive elements of the page as a
//! stable, serializable list.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{Dom, NodeFacts, IDENTITY_ATTR};
use crate::Result;

/// Default cap on affordances per scan.
pub const DEFAULT_MAX_AFFORDANCES: usize = 400;

/// Visible text is truncated to this many characters.
const TEXT_LIMIT: usize = 80;

/// Characters of text that feed the identity hash.
const IDENTITY_TEXT_LIMIT: usize = 40;

/// Attributes copied into [`Affordance::attrs`].
const ATTR_ALLOW_LIST: &[&str] = &[
    "id",
    "name",
    "type",
    "placeholder",
    "aria-label",
    "title",
    "alt",
    "role",
    "href",
];

/// Ids produced by frameworks or bundlers rather than written by hand.
static GENERATED_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^:|\d{4,}|[0-9a-f]{8,}|^(ember|react|radix|mui|headlessui|rc)[-_:]")
        .expect("generated-id pattern")
});

/// Bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One interactive element at scan time.
///
/// `bbox`, `visible` and `enabled` are facts about the moment of the scan
/// and go stale with the next DOM change. `selector` stays valid for as
/// long as the node lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub role: String,
    /// Lower-case tag name.
    #[serde(default)]
    pub tag: String,
    /// Best-effort accessible name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Visible text, whitespace collapsed, at most 80 chars.
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub bbox: BBox,
    #[serde(default)]
    pub visible: bool,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Human-readable selector. Informational only, may not be unique.
    #[serde(default)]
    pub css_path: String,
    /// `[data-id="<id>"]`, unique in the document.
    pub selector: String,
}

fn enabled_default() -> bool {
    true
}

impl Affordance {
    /// Selector addressing the element carrying `id`.
    pub fn selector_for(id: &str) -> String {
        format!("[{}=\"{}\"]", IDENTITY_ATTR, css_quote(id))
    }

    fn from_facts(facts: NodeFacts, id: String) -> Self {
        let text = truncate(&collapse_ws(&facts.text), TEXT_LIMIT);
        let name = accessible_name(&facts);
        let role = role_of(&facts);
        let css_path = css_path(&facts);
        let visible = facts.bbox.width > 0.0
            && facts.bbox.height > 0.0
            && facts.visibility != "hidden"
            && facts.display != "none";
        let attrs = facts
            .attrs
            .iter()
            .filter(|(k, _)| ATTR_ALLOW_LIST.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            selector: Self::selector_for(&id),
            id,
            role,
            href: facts.attrs.get("href").cloned(),
            tag: facts.tag,
            name,
            text,
            attrs,
            bbox: facts.bbox,
            visible,
            enabled: !facts.disabled,
            css_path,
        }
    }
}

impl fmt::Display for Affordance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        let redundant = (self.role == "button" && self.tag == "button")
            || (self.role == "link" && self.tag == "a")
            || self.role.is_empty();
        if !redundant {
            write!(f, " role=\"{}\"", self.role)?;
        }
        if let Some(t) = self.attrs.get("type") {
            if t != "text" {
                write!(f, " type=\"{}\"", t)?;
            }
        }
        f.write_str(">")?;
        if let Some(ref name) = self.name {
            write!(f, " \"{}\"", name)?;
        }
        if let Some(p) = self.attrs.get("placeholder") {
            write!(f, " placeholder=\"{}\"", p)?;
        }
        if !self.visible {
            f.write_str(" [hidden]")?;
        }
        if !self.enabled {
            f.write_str(" [disabled]")?;
        }
        write!(f, " {}", self.selector)
    }
}

/// Compact text listing for model context, one affordance per line.
pub fn affordance_list(affordances: &[Affordance]) -> String {
    affordances
        .iter()
        .enumerate()
        .map(|(i, a)| format!("[{}] {}", i, a))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scan the page and return at most `max` affordances in document order.
///
/// Elements without an identity get one and have it written back. An
/// existing identity is kept only while no other element of the document
/// carries the same value (a cloned node, or a page that uses the attribute
/// for its own rows); otherwise the element is re-stamped so its selector
/// matches it alone. Fresh identities avoid every value already on the page.
pub async fn collect<D: Dom>(dom: &D, max: usize) -> Result<Vec<Affordance>> {
    let scan = dom.scan(max).await?;
    let mut used: HashSet<String> = scan.taken.into_iter().collect();
    let mut stamps = Vec::new();
    let mut out = Vec::with_capacity(scan.nodes.len());

    for f in scan.nodes {
        if f.tag.is_empty() {
            debug!(key = %f.key, "skipping node without a tag");
            continue;
        }
        let id = match f.identity.clone() {
            Some(id) => id,
            None if f.key.is_empty() => {
                debug!(tag = %f.tag, "skipping node without a stamp key");
                continue;
            }
            None => {
                let id = unique_identity(&f, &mut used);
                stamps.push((f.key.clone(), id.clone()));
                id
            }
        };
        out.push(Affordance::from_facts(f, id));
    }

    dom.stamp(&stamps).await?;
    debug!(count = out.len(), stamped = stamps.len(), "collected affordances");
    Ok(out)
}

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over `parts`, each followed by a 0xff byte.
fn fnv1a(parts: &[&str]) -> u32 {
    let mut hash = FNV_OFFSET;
    for part in parts {
        // 0xff never occurs in UTF-8.
        for byte in part.bytes().chain(std::iter::once(0xff)) {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

fn identity_hash(f: &NodeFacts) -> String {
    let attr = |name: &str| f.attrs.get(name).map(String::as_str).unwrap_or("");
    let text: String = collapse_ws(&f.text).chars().take(IDENTITY_TEXT_LIMIT).collect();
    let hash = fnv1a(&[
        f.tag.as_str(),
        attr("id"),
        attr("name"),
        attr("aria-label"),
        text.as_str(),
        attr("class"),
    ]);
    format!("{:08x}", hash)
}

fn unique_identity(f: &NodeFacts, used: &mut HashSet<String>) -> String {
    let base = identity_hash(f);
    let mut id = base.clone();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    used.insert(id.clone());
    id
}

fn accessible_name(f: &NodeFacts) -> Option<String> {
    let non_empty = |s: &str| {
        let s = collapse_ws(s);
        (!s.is_empty()).then(|| truncate(&s, TEXT_LIMIT))
    };
    f.attrs
        .get("aria-label")
        .and_then(|s| non_empty(s))
        .or_else(|| f.labelledby_text.as_deref().and_then(non_empty))
        .or_else(|| f.label_text.as_deref().and_then(non_empty))
        .or_else(|| f.attrs.get("alt").and_then(|s| non_empty(s)))
        .or_else(|| non_empty(&f.text))
}

fn role_of(f: &NodeFacts) -> String {
    if let Some(role) = f.attrs.get("role").filter(|r| !r.trim().is_empty()) {
        return role.trim().to_string();
    }
    let input_type = f
        .attrs
        .get("type")
        .map(|t| t.to_ascii_lowercase())
        .unwrap_or_default();
    let role = match f.tag.as_str() {
        "a" => "link",
        "button" => "button",
        "textarea" => "textbox",
        "select" if f.attrs.contains_key("multiple") => "listbox",
        "select" => "combobox",
        "input" => match input_type.as_str() {
            "checkbox" => "checkbox",
            "radio" => "radio",
            "button" | "submit" | "reset" | "image" => "button",
            "range" => "slider",
            "number" => "spinbutton",
            "search" => "searchbox",
            _ => "textbox",
        },
        _ if f.attrs.contains_key("contenteditable") => "textbox",
        _ => "generic",
    };
    role.to_string()
}

fn css_path(f: &NodeFacts) -> String {
    let tag = &f.tag;
    if let Some(id) = f.attrs.get("id").filter(|id| !id.is_empty()) {
        if !GENERATED_ID.is_match(id) {
            return if id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
                && !id.starts_with(|c: char| c.is_ascii_digit())
            {
                format!("#{}", id)
            } else {
                format!("{}[id=\"{}\"]", tag, css_quote(id))
            };
        }
    }
    for attr in ["name", "placeholder"] {
        if let Some(v) = f.attrs.get(attr).filter(|v| !v.is_empty()) {
            return format!("{}[{}=\"{}\"]", tag, attr, css_quote(v));
        }
    }
    let class = f
        .attrs
        .get("class")
        .and_then(|c| c.split_whitespace().next())
        .map(|c| format!(".{}", c))
        .unwrap_or_default();
    let own = format!("{}{}:nth-of-type({})", tag, class, f.nth_of_type.max(1));
    match f.parent_tag {
        Some(ref parent) => format!("{} > {}", parent, own),
        None => own,
    }
}

fn css_quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
