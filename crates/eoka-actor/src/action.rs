//! Action requests and their validated, typed form.
//!
//! An [`ActionRequest`] is the wire shape handed over by the orchestration
//! layer. [`ActionRequest::validate`] turns it into an [`Action`], which is
//! the only thing the [`Actor`](crate::Actor) runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// The closed set of actions the executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Click,
    Type,
    TypeFast,
    Clear,
    WaitForElement,
    ScrollTo,
    ScrollToTop,
    ScrollToBottom,
    ScrollBy,
    ScrollToElement,
    ScrollToElementTop,
    ScrollToElementBottom,
    ScrollPageDown,
    ScrollPageUp,
    Focus,
    Blur,
}

impl ActionKind {
    pub const ALL: [ActionKind; 16] = [
        Self::Click,
        Self::Type,
        Self::TypeFast,
        Self::Clear,
        Self::WaitForElement,
        Self::ScrollTo,
        Self::ScrollToTop,
        Self::ScrollToBottom,
        Self::ScrollBy,
        Self::ScrollToElement,
        Self::ScrollToElementTop,
        Self::ScrollToElementBottom,
        Self::ScrollPageDown,
        Self::ScrollPageUp,
        Self::Focus,
        Self::Blur,
    ];

    /// Wire name, as used in `actorMethod`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::TypeFast => "typeFast",
            Self::Clear => "clear",
            Self::WaitForElement => "waitForElement",
            Self::ScrollTo => "scrollTo",
            Self::ScrollToTop => "scrollToTop",
            Self::ScrollToBottom => "scrollToBottom",
            Self::ScrollBy => "scrollBy",
            Self::ScrollToElement => "scrollToElement",
            Self::ScrollToElementTop => "scrollToElementTop",
            Self::ScrollToElementBottom => "scrollToElementBottom",
            Self::ScrollPageDown => "scrollPageDown",
            Self::ScrollPageUp => "scrollPageUp",
            Self::Focus => "focus",
            Self::Blur => "blur",
        }
    }

    /// Whether the action addresses one element and needs a selector.
    pub fn requires_selector(self) -> bool {
        matches!(
            self,
            Self::Click
                | Self::Type
                | Self::TypeFast
                | Self::Clear
                | Self::WaitForElement
                | Self::ScrollToElement
                | Self::ScrollToElementTop
                | Self::ScrollToElementBottom
                | Self::Focus
                | Self::Blur
        )
    }

    pub fn requires_text(self) -> bool {
        matches!(self, Self::Type | Self::TypeFast)
    }

    /// Actions that activate an element (buttons, links, inputs).
    pub fn is_click_like(self) -> bool {
        matches!(self, Self::Click | Self::Focus)
    }

    /// Actions that write into a text control.
    pub fn is_type_like(self) -> bool {
        matches!(self, Self::Type | Self::TypeFast | Self::Clear)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownAction(s.to_string()))
    }
}

/// `behavior` of `scrollIntoView`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Auto,
    #[default]
    Smooth,
    Instant,
}

/// `block` / `inline` alignment of `scrollIntoView`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAlign {
    Start,
    #[default]
    Center,
    End,
    Nearest,
}

impl ScrollBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Smooth => "smooth",
            Self::Instant => "instant",
        }
    }
}

impl ScrollAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Center => "center",
            Self::End => "end",
            Self::Nearest => "nearest",
        }
    }
}

/// Options for scrolling an element into view. Defaults to smooth/center/center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollOptions {
    pub behavior: ScrollBehavior,
    pub block: ScrollAlign,
    pub inline: ScrollAlign,
}

impl ScrollOptions {
    /// Same options with a different block alignment.
    pub fn with_block(mut self, block: ScrollAlign) -> Self {
        self.block = block;
        self
    }
}

/// One action as requested by the orchestration layer.
///
/// Self-contained: the executor needs nothing beyond these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Milliseconds, `waitForElement` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulate_typing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_options: Option<ScrollOptions>,
}

impl ActionRequest {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            selector: None,
            text: None,
            x: None,
            y: None,
            timeout: None,
            simulate_typing: None,
            scroll_options: None,
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn simulate_typing(mut self, simulate: bool) -> Self {
        self.simulate_typing = Some(simulate);
        self
    }

    pub fn scroll_options(mut self, options: ScrollOptions) -> Self {
        self.scroll_options = Some(options);
        self
    }

    /// `scrollTo` with a selector means scrolling that element into view.
    pub fn normalize(mut self) -> Self {
        if self.action == ActionKind::ScrollTo && self.selector.is_some() {
            self.action = ActionKind::ScrollToElement;
        }
        self
    }

    /// Check parameters and produce the typed action. No DOM access happens here.
    pub fn validate(&self) -> Result<Action> {
        let kind = self.action;
        let selector = || -> Result<String> {
            match self.selector.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => Ok(s.to_string()),
                _ => Err(Error::MissingParameter {
                    action: kind,
                    param: "selector",
                }),
            }
        };
        let text = || -> Result<String> {
            match self.text.as_deref() {
                Some(t) if !t.is_empty() => Ok(t.to_string()),
                _ => Err(Error::MissingParameter {
                    action: kind,
                    param: "text",
                }),
            }
        };
        let options = self.scroll_options.unwrap_or_default();
        let x = self.x.unwrap_or(0.0);
        let y = self.y.unwrap_or(0.0);

        Ok(match kind {
            ActionKind::Click => Action::Click {
                selector: selector()?,
            },
            ActionKind::Type => Action::Type {
                selector: selector()?,
                text: text()?,
                simulate: self.simulate_typing.unwrap_or(true),
            },
            ActionKind::TypeFast => Action::TypeFast {
                selector: selector()?,
                text: text()?,
            },
            ActionKind::Clear => Action::Clear {
                selector: selector()?,
            },
            ActionKind::WaitForElement => Action::WaitForElement {
                selector: selector()?,
                timeout: self.timeout.map(Duration::from_millis),
            },
            ActionKind::ScrollTo => Action::ScrollTo { x, y },
            ActionKind::ScrollToTop => Action::ScrollToTop,
            ActionKind::ScrollToBottom => Action::ScrollToBottom,
            ActionKind::ScrollBy => Action::ScrollBy { x, y },
            ActionKind::ScrollToElement => Action::ScrollToElement {
                selector: selector()?,
                options,
            },
            ActionKind::ScrollToElementTop => Action::ScrollToElementTop {
                selector: selector()?,
                options: options.with_block(ScrollAlign::Start),
            },
            ActionKind::ScrollToElementBottom => Action::ScrollToElementBottom {
                selector: selector()?,
                options: options.with_block(ScrollAlign::End),
            },
            ActionKind::ScrollPageDown => Action::ScrollPageDown,
            ActionKind::ScrollPageUp => Action::ScrollPageUp,
            ActionKind::Focus => Action::Focus {
                selector: selector()?,
            },
            ActionKind::Blur => Action::Blur {
                selector: selector()?,
            },
        })
    }
}

/// A validated action, one variant per [`ActionKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { selector: String },
    Type { selector: String, text: String, simulate: bool },
    TypeFast { selector: String, text: String },
    Clear { selector: String },
    WaitForElement { selector: String, timeout: Option<Duration> },
    ScrollTo { x: f64, y: f64 },
    ScrollToTop,
    ScrollToBottom,
    ScrollBy { x: f64, y: f64 },
    ScrollToElement { selector: String, options: ScrollOptions },
    ScrollToElementTop { selector: String, options: ScrollOptions },
    ScrollToElementBottom { selector: String, options: ScrollOptions },
    ScrollPageDown,
    ScrollPageUp,
    Focus { selector: String },
    Blur { selector: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Click { .. } => ActionKind::Click,
            Self::Type { .. } => ActionKind::Type,
            Self::TypeFast { .. } => ActionKind::TypeFast,
            Self::Clear { .. } => ActionKind::Clear,
            Self::WaitForElement { .. } => ActionKind::WaitForElement,
            Self::ScrollTo { .. } => ActionKind::ScrollTo,
            Self::ScrollToTop => ActionKind::ScrollToTop,
            Self::ScrollToBottom => ActionKind::ScrollToBottom,
            Self::ScrollBy { .. } => ActionKind::ScrollBy,
            Self::ScrollToElement { .. } => ActionKind::ScrollToElement,
            Self::ScrollToElementTop { .. } => ActionKind::ScrollToElementTop,
            Self::ScrollToElementBottom { .. } => ActionKind::ScrollToElementBottom,
            Self::ScrollPageDown => ActionKind::ScrollPageDown,
            Self::ScrollPageUp => ActionKind::ScrollPageUp,
            Self::Focus { .. } => ActionKind::Focus,
            Self::Blur { .. } => ActionKind::Blur,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Click { selector }
            | Self::Type { selector, .. }
            | Self::TypeFast { selector, .. }
            | Self::Clear { selector }
            | Self::WaitForElement { selector, .. }
            | Self::ScrollToElement { selector, .. }
            | Self::ScrollToElementTop { selector, .. }
            | Self::ScrollToElementBottom { selector, .. }
            | Self::Focus { selector }
            | Self::Blur { selector } => Some(selector),
            _ => None,
        }
    }
}

impl From<&Action> for ActionRequest {
    /// Normalized request: defaults made explicit, irrelevant fields dropped.
    fn from(action: &Action) -> Self {
        let mut req = ActionRequest::new(action.kind());
        req.selector = action.selector().map(str::to_string);
        match action {
            Action::Type {
                text, simulate, ..
            } => {
                req.text = Some(text.clone());
                req.simulate_typing = Some(*simulate);
            }
            Action::TypeFast { text, .. } => {
                req.text = Some(text.clone());
                req.simulate_typing = Some(false);
            }
            Action::WaitForElement { timeout, .. } => {
                req.timeout = timeout.map(|t| t.as_millis() as u64);
            }
            Action::ScrollTo { x, y } | Action::ScrollBy { x, y } => {
                req.x = Some(*x);
                req.y = Some(*y);
            }
            Action::ScrollToElement { options, .. }
            | Action::ScrollToElementTop { options, .. }
            | Action::ScrollToElementBottom { options, .. } => {
                req.scroll_options = Some(*options);
            }
            _ => {}
        }
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.name().parse::<ActionKind>().unwrap(), kind);
        }
        assert!(matches!(
            "doubleClick".parse::<ActionKind>(),
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ActionKind::ScrollToElementBottom).unwrap();
        assert_eq!(json, "\"scrollToElementBottom\"");
        let kind: ActionKind = serde_json::from_str("\"typeFast\"").unwrap();
        assert_eq!(kind, ActionKind::TypeFast);
    }

    #[test]
    fn parse_request_json() {
        let req: ActionRequest = serde_json::from_str(
            r#"{"action":"type","selector":"[data-id=\"a1\"]","text":"hi","simulateTyping":false}"#,
        )
        .unwrap();
        assert_eq!(req.action, ActionKind::Type);
        assert_eq!(req.simulate_typing, Some(false));
        assert!(req.scroll_options.is_none());
    }

    #[test]
    fn selector_required_for_element_actions() {
        for kind in ActionKind::ALL.into_iter().filter(|k| k.requires_selector()) {
            let err = ActionRequest::new(kind).text("x").validate().unwrap_err();
            assert!(
                matches!(err, Error::MissingParameter { param: "selector", .. }),
                "{kind}: {err}"
            );
        }
    }

    #[test]
    fn page_scrolls_need_no_selector() {
        for kind in [
            ActionKind::ScrollTo,
            ActionKind::ScrollToTop,
            ActionKind::ScrollToBottom,
            ActionKind::ScrollBy,
            ActionKind::ScrollPageDown,
            ActionKind::ScrollPageUp,
        ] {
            assert!(ActionRequest::new(kind).validate().is_ok(), "{kind}");
        }
    }

    #[test]
    fn type_requires_non_empty_text() {
        let err = ActionRequest::new(ActionKind::Type)
            .selector("#q")
            .text("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { param: "text", .. }));

        let err = ActionRequest::new(ActionKind::TypeFast)
            .selector("#q")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { param: "text", .. }));
    }

    #[test]
    fn blank_selector_counts_as_missing() {
        let err = ActionRequest::new(ActionKind::Click)
            .selector("   ")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { .. }));
    }

    #[test]
    fn type_simulates_by_default() {
        let action = ActionRequest::new(ActionKind::Type)
            .selector("#q")
            .text("abc")
            .validate()
            .unwrap();
        assert_eq!(
            action,
            Action::Type {
                selector: "#q".into(),
                text: "abc".into(),
                simulate: true
            }
        );
    }

    #[test]
    fn element_scroll_aliases_pin_block_alignment() {
        let top = ActionRequest::new(ActionKind::ScrollToElementTop)
            .selector("#s")
            .validate()
            .unwrap();
        let Action::ScrollToElementTop { options, .. } = top else {
            panic!("Expected ScrollToElementTop");
        };
        assert_eq!(options.block, ScrollAlign::Start);
        assert_eq!(options.behavior, ScrollBehavior::Smooth);
        assert_eq!(options.inline, ScrollAlign::Center);

        let bottom = ActionRequest::new(ActionKind::ScrollToElementBottom)
            .selector("#s")
            .validate()
            .unwrap();
        let Action::ScrollToElementBottom { options, .. } = bottom else {
            panic!("Expected ScrollToElementBottom");
        };
        assert_eq!(options.block, ScrollAlign::End);
    }

    #[test]
    fn normalized_request_keeps_kind_and_defaults() {
        let action = ActionRequest::new(ActionKind::ScrollBy)
            .validate()
            .unwrap();
        let req = ActionRequest::from(&action);
        assert_eq!(req.action, ActionKind::ScrollBy);
        assert_eq!(req.x, Some(0.0));
        assert_eq!(req.y, Some(0.0));
        assert_eq!(req.validate().unwrap(), action);
    }
}
