//! The action executor.
//!
//! Every invocation runs validate → locate → (wait) → mutate → dispatch
//! events → settle. A selector that matches nothing is a terminal
//! [`Error::ElementNotFound`]; nothing is retried here.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::action::{Action, ActionKind, ActionRequest, ScrollAlign, ScrollOptions};
use crate::dom::{Dom, DomEvent, ElementInfo, InputKind, ScrollCommand};
use crate::{Error, Result};

/// Pause after each simulated keystroke.
pub const TYPING_DELAY: Duration = Duration::from_millis(50);

/// `waitForElement` bound when the request names none.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// What ran, for logs and tool payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub elapsed_ms: u64,
}

/// Runs [`Action`]s against a [`Dom`].
#[derive(Debug, Clone)]
pub struct Actor<D> {
    dom: D,
    wait_timeout: Duration,
}

impl<D: Dom> Actor<D> {
    pub fn new(dom: D) -> Self {
        Self {
            dom,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Default bound for `waitForElement`.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    /// Validate a wire request and run it.
    pub async fn execute(&self, request: &ActionRequest) -> Result<ActionReport> {
        let action = request.validate()?;
        self.run(&action).await
    }

    /// Run one validated action.
    pub async fn run(&self, action: &Action) -> Result<ActionReport> {
        let started = Instant::now();
        match action {
            Action::Click { selector } => self.click(selector).await?,
            Action::Type {
                selector,
                text,
                simulate,
            } => self.type_text(selector, text, *simulate).await?,
            Action::TypeFast { selector, text } => self.type_fast(selector, text).await?,
            Action::Clear { selector } => self.clear(selector).await?,
            Action::WaitForElement { selector, timeout } => {
                self.wait_for_element(selector, *timeout).await?
            }
            Action::ScrollTo { x, y } => self.scroll_to(*x, *y).await?,
            Action::ScrollToTop => self.scroll_to_top().await?,
            Action::ScrollToBottom => self.scroll_to_bottom().await?,
            Action::ScrollBy { x, y } => self.scroll_by(*x, *y).await?,
            Action::ScrollToElement { selector, options } => {
                self.scroll_to_element(selector, *options).await?
            }
            Action::ScrollToElementTop { selector, options } => {
                self.scroll_to_element_top(selector, *options).await?
            }
            Action::ScrollToElementBottom { selector, options } => {
                self.scroll_to_element_bottom(selector, *options).await?
            }
            Action::ScrollPageDown => self.scroll_page_down().await?,
            Action::ScrollPageUp => self.scroll_page_up().await?,
            Action::Focus { selector } => self.focus(selector).await?,
            Action::Blur { selector } => self.blur(selector).await?,
        }

        let report = ActionReport {
            action: action.kind(),
            selector: action.selector().map(str::to_string),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "{}: {} ({}ms)",
            report.action,
            report.selector.as_deref().unwrap_or("page"),
            report.elapsed_ms
        );
        Ok(report)
    }

    async fn locate(&self, action: ActionKind, selector: &str) -> Result<ElementInfo> {
        self.dom
            .locate(selector)
            .await?
            .ok_or_else(|| not_found(action, selector))
    }

    /// Focus (when focusable), then a bubbling, cancelable synthetic click.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let info = self.locate(ActionKind::Click, selector).await?;
        if info.focusable {
            self.dom.focus(selector).await?;
        }
        debug!("click: dispatching on <{}> {}", info.tag, selector);
        present(
            ActionKind::Click,
            selector,
            self.dom.dispatch(selector, DomEvent::Click).await?,
        )
    }

    /// Type `text`, one keystroke at a time when `simulate` is set.
    pub async fn type_text(&self, selector: &str, text: &str, simulate: bool) -> Result<()> {
        self.write_text(ActionKind::Type, selector, text, simulate)
            .await
    }

    /// Write `text` in one step.
    pub async fn type_fast(&self, selector: &str, text: &str) -> Result<()> {
        self.write_text(ActionKind::TypeFast, selector, text, false)
            .await
    }

    async fn write_text(
        &self,
        action: ActionKind,
        selector: &str,
        text: &str,
        simulate: bool,
    ) -> Result<()> {
        if text.is_empty() {
            return Err(Error::MissingParameter {
                action,
                param: "text",
            });
        }
        let info = self.locate(action, selector).await?;
        let form_control = match info.input {
            InputKind::FormControl => true,
            InputKind::ContentEditable => false,
            InputKind::Other => {
                return Err(Error::UnsupportedElement {
                    action,
                    selector: selector.to_string(),
                    tag: info.tag,
                })
            }
        };
        if info.focusable {
            self.dom.focus(selector).await?;
        }

        if simulate {
            debug!("{}: {} chars into {}", action, text.chars().count(), selector);
            self.write(action, selector, "").await?;
            let mut typed = String::with_capacity(text.len());
            for ch in text.chars() {
                typed.push(ch);
                self.write(action, selector, &typed).await?;
                self.fire(action, selector, DomEvent::Input).await?;
                tokio::time::sleep(TYPING_DELAY).await;
            }
        } else {
            debug!("{}: {} (instant)", action, selector);
            self.write(action, selector, text).await?;
            self.fire(action, selector, DomEvent::Input).await?;
        }

        if form_control {
            self.fire(action, selector, DomEvent::Change).await?;
        }
        Ok(())
    }

    /// Empty the value (or text) of an editable element.
    pub async fn clear(&self, selector: &str) -> Result<()> {
        let action = ActionKind::Clear;
        let info = self.locate(action, selector).await?;
        if info.input == InputKind::Other {
            return Err(Error::UnsupportedElement {
                action,
                selector: selector.to_string(),
                tag: info.tag,
            });
        }
        self.write(action, selector, "").await?;
        self.fire(action, selector, DomEvent::Input).await?;
        if info.input == InputKind::FormControl {
            self.fire(action, selector, DomEvent::Change).await?;
        }
        Ok(())
    }

    /// Resolve once `selector` matches, or fail with [`Error::Timeout`].
    pub async fn wait_for_element(&self, selector: &str, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.wait_timeout);
        debug!("waitForElement: {} (up to {}ms)", selector, timeout.as_millis());
        if self.dom.wait_for(selector, timeout).await? {
            Ok(())
        } else {
            Err(Error::Timeout {
                action: ActionKind::WaitForElement,
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    pub async fn scroll_to(&self, x: f64, y: f64) -> Result<()> {
        self.dom.scroll_window(ScrollCommand::To { x, y }).await
    }

    pub async fn scroll_by(&self, x: f64, y: f64) -> Result<()> {
        self.dom.scroll_window(ScrollCommand::By { x, y }).await
    }

    pub async fn scroll_to_top(&self) -> Result<()> {
        self.dom.scroll_window(ScrollCommand::Top).await
    }

    pub async fn scroll_to_bottom(&self) -> Result<()> {
        self.dom.scroll_window(ScrollCommand::Bottom).await
    }

    pub async fn scroll_page_down(&self) -> Result<()> {
        self.dom.scroll_window(ScrollCommand::PageDown).await
    }

    pub async fn scroll_page_up(&self) -> Result<()> {
        self.dom.scroll_window(ScrollCommand::PageUp).await
    }

    pub async fn scroll_to_element(&self, selector: &str, options: ScrollOptions) -> Result<()> {
        self.scroll_element(ActionKind::ScrollToElement, selector, options)
            .await
    }

    pub async fn scroll_to_element_top(&self, selector: &str, options: ScrollOptions) -> Result<()> {
        self.scroll_element(
            ActionKind::ScrollToElementTop,
            selector,
            options.with_block(ScrollAlign::Start),
        )
        .await
    }

    pub async fn scroll_to_element_bottom(
        &self,
        selector: &str,
        options: ScrollOptions,
    ) -> Result<()> {
        self.scroll_element(
            ActionKind::ScrollToElementBottom,
            selector,
            options.with_block(ScrollAlign::End),
        )
        .await
    }

    async fn scroll_element(
        &self,
        action: ActionKind,
        selector: &str,
        options: ScrollOptions,
    ) -> Result<()> {
        present(
            action,
            selector,
            self.dom.scroll_into_view(selector, options).await?,
        )
    }

    pub async fn focus(&self, selector: &str) -> Result<()> {
        present(
            ActionKind::Focus,
            selector,
            self.dom.focus(selector).await?,
        )
    }

    pub async fn blur(&self, selector: &str) -> Result<()> {
        present(ActionKind::Blur, selector, self.dom.blur(selector).await?)
    }

    async fn write(&self, action: ActionKind, selector: &str, value: &str) -> Result<()> {
        present(action, selector, self.dom.write_value(selector, value).await?)
    }

    async fn fire(&self, action: ActionKind, selector: &str, event: DomEvent) -> Result<()> {
        present(action, selector, self.dom.dispatch(selector, event).await?)
    }
}

fn not_found(action: ActionKind, selector: &str) -> Error {
    Error::ElementNotFound {
        action,
        selector: selector.to_string(),
    }
}

/// The element vanished between steps.
fn present(action: ActionKind, selector: &str, found: bool) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(not_found(action, selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ScrollBehavior;
    use crate::dom::{Element, MemoryDom};

    #[tokio::test]
    async fn click_focuses_then_dispatches() {
        let dom = MemoryDom::new();
        let button = dom.append(dom.body(), Element::new("button").id("go").text("Go"));
        let actor = Actor::new(dom.clone());

        actor.click("#go").await.unwrap();
        assert_eq!(dom.focused(), Some(button));
        let clicks = dom.events_for(button, DomEvent::Click);
        assert_eq!(clicks.len(), 1);
        assert!(clicks[0].bubbles && clicks[0].cancelable);
    }

    #[tokio::test]
    async fn click_on_plain_element_skips_focus() {
        let dom = MemoryDom::new();
        let div = dom.append(dom.body(), Element::new("div").attr("role", "button").id("d"));
        let actor = Actor::new(dom.clone());
        actor.click("#d").await.unwrap();
        assert_eq!(dom.focused(), None);
        assert_eq!(dom.events_for(div, DomEvent::Click).len(), 1);
    }

    #[tokio::test]
    async fn missing_element_is_reported() {
        let actor = Actor::new(MemoryDom::new());
        let err = actor.click("[data-id=\"gone\"]").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ElementNotFound {
                action: ActionKind::Click,
                ..
            }
        ));
        assert!(err.to_string().contains("gone"));

        assert!(matches!(
            actor.focus("#nope").await,
            Err(Error::ElementNotFound { action: ActionKind::Focus, .. })
        ));
        assert!(matches!(
            actor.scroll_to_element("#nope", ScrollOptions::default()).await,
            Err(Error::ElementNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn typing_into_a_button_is_unsupported() {
        let dom = MemoryDom::new();
        dom.append(dom.body(), Element::new("button").id("b"));
        let actor = Actor::new(dom);
        let err = actor.type_fast("#b", "x").await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedElement { ref tag, .. } if tag == "button"
        ));
        assert!(matches!(
            actor.clear("#b").await,
            Err(Error::UnsupportedElement { .. })
        ));
    }

    #[tokio::test]
    async fn contenteditable_gets_input_but_no_change() {
        let dom = MemoryDom::new();
        let ed = dom.append(dom.body(), Element::new("div").id("ed").attr("contenteditable", "true"));
        let actor = Actor::new(dom.clone());

        actor.type_text("#ed", "hi", true).await.unwrap();
        assert_eq!(dom.text_content(ed), "hi");
        let inputs = dom.events_for(ed, DomEvent::Input);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].value, "h");
        assert_eq!(inputs[1].value, "hi");
        assert!(dom.events_for(ed, DomEvent::Change).is_empty());

        actor.clear("#ed").await.unwrap();
        assert_eq!(dom.text_content(ed), "");
        assert!(dom.events_for(ed, DomEvent::Change).is_empty());
    }

    #[tokio::test]
    async fn simulated_typing_replaces_existing_value() {
        let dom = MemoryDom::new();
        let input = dom.append(dom.body(), Element::new("input").id("q").value("old"));
        let actor = Actor::new(dom.clone());

        let started = Instant::now();
        actor.type_text("#q", "ab", true).await.unwrap();
        assert!(started.elapsed() >= TYPING_DELAY * 2);
        assert_eq!(dom.value(input), "ab");
        let values: Vec<String> = dom
            .events_for(input, DomEvent::Input)
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, ["a", "ab"]);
    }

    #[tokio::test]
    async fn execute_validates_before_touching_the_page() {
        let dom = MemoryDom::new();
        let input = dom.append(dom.body(), Element::new("input").id("q"));
        let actor = Actor::new(dom.clone());

        let err = actor
            .execute(&ActionRequest::new(ActionKind::Type).selector("#q"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { param: "text", .. }));
        assert!(dom.events().is_empty());

        let report = actor
            .execute(
                &ActionRequest::new(ActionKind::TypeFast)
                    .selector("#q")
                    .text("done"),
            )
            .await
            .unwrap();
        assert_eq!(report.action, ActionKind::TypeFast);
        assert_eq!(report.selector.as_deref(), Some("#q"));
        assert_eq!(dom.value(input), "done");
    }

    #[tokio::test]
    async fn element_scrolls_align_block() {
        let dom = MemoryDom::new().with_viewport(1000.0, 500.0);
        dom.set_page_size(1000.0, 3000.0);
        dom.append(
            dom.body(),
            Element::new("section").id("s").bbox(0.0, 1000.0, 1000.0, 100.0),
        );
        let actor = Actor::new(dom.clone());
        let opts = ScrollOptions {
            behavior: ScrollBehavior::Instant,
            ..ScrollOptions::default()
        };

        actor.scroll_to_element_top("#s", opts).await.unwrap();
        assert_eq!(dom.scroll_position().1, 1000.0);
        actor.scroll_to_element_bottom("#s", opts).await.unwrap();
        assert_eq!(dom.scroll_position().1, 600.0);
        actor.scroll_to_element("#s", opts).await.unwrap();
        assert_eq!(dom.scroll_position().1, 800.0);
    }

    #[tokio::test]
    async fn page_scrolls() {
        let dom = MemoryDom::new().with_viewport(1000.0, 500.0);
        dom.set_page_size(1000.0, 3000.0);
        let actor = Actor::new(dom.clone());

        actor.scroll_page_down().await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 500.0));
        actor.scroll_by(0.0, 250.0).await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 750.0));
        actor.scroll_page_up().await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 250.0));
        actor.scroll_to_bottom().await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 2500.0));
        actor.scroll_to(0.0, 100.0).await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 100.0));
        actor.scroll_to_top().await.unwrap();
        assert_eq!(dom.scroll_position(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn focus_and_blur() {
        let dom = MemoryDom::new();
        let input = dom.append(dom.body(), Element::new("input").id("q"));
        let actor = Actor::new(dom.clone());
        actor.focus("#q").await.unwrap();
        assert_eq!(dom.focused(), Some(input));
        actor.blur("#q").await.unwrap();
        assert_eq!(dom.focused(), None);
    }

    #[tokio::test]
    async fn wait_uses_configured_default() {
        let dom = MemoryDom::new();
        let actor = Actor::new(dom).with_wait_timeout(Duration::from_millis(20));
        let err = actor.wait_for_element("#never", None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { timeout_ms: 20, .. }));
    }
}
