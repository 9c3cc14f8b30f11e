//! [`Dom`] over a live `eoka::Page`: every primitive is one JS evaluation.

use std::time::Duration;

use eoka::Page;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    DomEvent, Dom, ElementInfo, InputKind, Scan, ScrollCommand, IDENTITY_ATTR, INTERACTIVE_QUERY,
};
use crate::action::ScrollOptions;
use crate::Result;

/// Transient attribute marking scanned nodes that still need an identity.
const SCAN_KEY_ATTR: &str = "data-eoka-key";

/// Enumerates interactive elements. Each element is read inside its own
/// try block so one bad node cannot fail the scan.
const SCAN_JS: &str = r#"
((limit, query, idAttr, keyAttr) => {
    const out = [];
    const carriers = new Map();
    for (const n of document.querySelectorAll('[' + idAttr + ']')) {
        const v = n.getAttribute(idAttr);
        carriers.set(v, (carriers.get(v) || 0) + 1);
    }
    window.__eokaKeySeq = window.__eokaKeySeq || 0;
    const trimText = n => (n.textContent || '').trim();

    for (const el of document.querySelectorAll(query)) {
        if (out.length >= limit) break;
        try {
            const attrs = {};
            for (const a of el.attributes) attrs[a.name] = a.value;

            let identity = el.getAttribute(idAttr);
            if (!identity || carriers.get(identity) !== 1) identity = null;

            let key = identity;
            if (identity === null) {
                key = el.getAttribute(keyAttr);
                if (!key) {
                    key = 'k' + (++window.__eokaKeySeq);
                    el.setAttribute(keyAttr, key);
                }
            }

            let labelText = null;
            if (el.id) {
                const label = document.querySelector('label[for=' + JSON.stringify(el.id) + ']');
                if (label) labelText = trimText(label);
            }

            let labelledbyText = null;
            const labelledBy = el.getAttribute('aria-labelledby');
            if (labelledBy) {
                labelledbyText = labelledBy.split(/\s+/)
                    .map(id => document.getElementById(id))
                    .filter(Boolean)
                    .map(trimText)
                    .join(' ') || null;
            }

            const p = el.parentElement;
            const parentTag = p && p.tagName !== 'BODY' ? p.tagName.toLowerCase() : null;
            const nthOfType = p
                ? [...p.children].filter(c => c.tagName === el.tagName).indexOf(el) + 1
                : 1;

            const r = el.getBoundingClientRect();
            const s = getComputedStyle(el);
            out.push({
                key,
                tag: el.tagName.toLowerCase(),
                attrs,
                text: (el.textContent || '').slice(0, 400),
                labelText,
                labelledbyText,
                identity,
                parentTag,
                nthOfType,
                bbox: { x: r.x, y: r.y, width: r.width, height: r.height },
                display: s.display,
                visibility: s.visibility,
                disabled: !!el.disabled,
            });
        } catch (e) {
            // skip this element
        }
    }
    return { nodes: out, taken: [...carriers.keys()] };
})
"#;

const STAMP_JS: &str = r#"
((pairs, idAttr, keyAttr) => {
    let stamped = 0;
    for (const [key, id] of pairs) {
        const el = document.querySelector('[' + keyAttr + '=' + JSON.stringify(key) + ']');
        if (!el) continue;
        el.setAttribute(idAttr, id);
        el.removeAttribute(keyAttr);
        stamped++;
    }
    return stamped;
})
"#;

const LOCATE_JS: &str = r#"
(sel => {
    const el = document.querySelector(sel);
    if (!el) return null;
    const formControl = el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement;
    const input = formControl ? 'formControl' : (el.isContentEditable ? 'contentEditable' : 'other');
    const focusable = !el.disabled && (el.tabIndex >= 0 || el.isContentEditable);
    return { tag: el.tagName.toLowerCase(), input, focusable };
})
"#;

/// Writes through the prototype's own `value` setter so framework wrappers
/// installed on the instance do not swallow the change.
const WRITE_JS: &str = r#"
((sel, value) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    if (el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement) {
        const proto = el instanceof HTMLTextAreaElement
            ? HTMLTextAreaElement.prototype
            : HTMLInputElement.prototype;
        Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
    } else {
        el.textContent = value;
    }
    return true;
})
"#;

const READ_JS: &str = r#"
(sel => {
    const el = document.querySelector(sel);
    if (!el) return null;
    return el.isContentEditable ? el.textContent : (el.value ?? el.textContent);
})
"#;

const DISPATCH_JS: &str = r#"
((sel, type) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    const ev = type === 'click'
        ? new MouseEvent('click', { bubbles: true, cancelable: true, view: window })
        : new Event(type, { bubbles: true });
    el.dispatchEvent(ev);
    return true;
})
"#;

const FOCUS_JS: &str = r#"
((sel, blur) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    if (blur) el.blur(); else el.focus();
    return true;
})
"#;

/// Resolves `true` as soon as `sel` matches, `false` after `ms`. The
/// observer and the timer are released on both outcomes.
const WAIT_FOR_JS: &str = r#"
((sel, ms) => new Promise(resolve => {
    if (document.querySelector(sel)) return resolve(true);
    let timer = null;
    const observer = new MutationObserver(() => {
        if (document.querySelector(sel)) finish(true);
    });
    const finish = found => {
        observer.disconnect();
        clearTimeout(timer);
        resolve(found);
    };
    observer.observe(document, { subtree: true, childList: true, attributes: true });
    timer = setTimeout(() => finish(!!document.querySelector(sel)), ms);
}))
"#;

const SCROLL_INTO_VIEW_JS: &str = r#"
((sel, opts) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    el.scrollIntoView(opts);
    return true;
})
"#;

/// `f(args...)` with JSON-encoded arguments.
fn call(function: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("{}({})", function.trim(), args.join(","))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    tag: String,
    input: String,
    focusable: bool,
}

/// [`Dom`] backed by a Chrome page.
#[derive(Clone, Copy)]
pub struct PageDom<'a> {
    page: &'a Page,
}

impl<'a> PageDom<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    /// Get a reference to the underlying Page.
    pub fn page(&self) -> &Page {
        self.page
    }
}

impl Dom for PageDom<'_> {
    async fn scan(&self, limit: usize) -> Result<Scan> {
        let js = call(
            SCAN_JS,
            &[
                json!(limit),
                json!(INTERACTIVE_QUERY),
                json!(IDENTITY_ATTR),
                json!(SCAN_KEY_ATTR),
            ],
        );
        let scan: Scan = self.page.evaluate(&js).await?;
        Ok(scan)
    }

    async fn stamp(&self, assignments: &[(String, String)]) -> Result<()> {
        if assignments.is_empty() {
            return Ok(());
        }
        let js = call(
            STAMP_JS,
            &[json!(assignments), json!(IDENTITY_ATTR), json!(SCAN_KEY_ATTR)],
        );
        let stamped: usize = self.page.evaluate(&js).await?;
        if stamped < assignments.len() {
            debug!(
                stamped,
                requested = assignments.len(),
                "some scanned nodes left the page before stamping"
            );
        }
        Ok(())
    }

    async fn locate(&self, selector: &str) -> Result<Option<ElementInfo>> {
        let raw: Option<RawInfo> = self.page.evaluate(&call(LOCATE_JS, &[json!(selector)])).await?;
        Ok(raw.map(|r| ElementInfo {
            tag: r.tag,
            input: match r.input.as_str() {
                "formControl" => InputKind::FormControl,
                "contentEditable" => InputKind::ContentEditable,
                _ => InputKind::Other,
            },
            focusable: r.focusable,
        }))
    }

    async fn focus(&self, selector: &str) -> Result<bool> {
        let js = call(FOCUS_JS, &[json!(selector), json!(false)]);
        Ok(self.page.evaluate(&js).await?)
    }

    async fn blur(&self, selector: &str) -> Result<bool> {
        let js = call(FOCUS_JS, &[json!(selector), json!(true)]);
        Ok(self.page.evaluate(&js).await?)
    }

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<bool> {
        let js = call(DISPATCH_JS, &[json!(selector), json!(event.name())]);
        Ok(self.page.evaluate(&js).await?)
    }

    async fn read_value(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.page.evaluate(&call(READ_JS, &[json!(selector)])).await?)
    }

    async fn write_value(&self, selector: &str, value: &str) -> Result<bool> {
        let js = call(WRITE_JS, &[json!(selector), json!(value)]);
        Ok(self.page.evaluate(&js).await?)
    }

    async fn scroll_window(&self, command: ScrollCommand) -> Result<()> {
        let js = match command {
            ScrollCommand::To { x, y } => format!("window.scrollTo({}, {})", json!(x), json!(y)),
            ScrollCommand::By { x, y } => format!("window.scrollBy({}, {})", json!(x), json!(y)),
            ScrollCommand::Top => "window.scrollTo(window.scrollX, 0)".to_string(),
            ScrollCommand::Bottom => {
                "window.scrollTo(window.scrollX, document.documentElement.scrollHeight)".to_string()
            }
            ScrollCommand::PageDown => "window.scrollBy(0, window.innerHeight)".to_string(),
            ScrollCommand::PageUp => "window.scrollBy(0, -window.innerHeight)".to_string(),
        };
        self.page.execute(&js).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str, options: ScrollOptions) -> Result<bool> {
        let opts = json!({
            "behavior": options.behavior.as_str(),
            "block": options.block.as_str(),
            "inline": options.inline.as_str(),
        });
        let js = call(SCROLL_INTO_VIEW_JS, &[json!(selector), opts]);
        Ok(self.page.evaluate(&js).await?)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let js = call(WAIT_FOR_JS, &[json!(selector), json!(timeout.as_millis() as u64)]);
        let found: bool = self.page.evaluate(&js).await?;
        if !found {
            debug!(selector, timeout_ms = timeout.as_millis() as u64, "wait_for gave up");
        }
        Ok(found)
    }
}
