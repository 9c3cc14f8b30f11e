//! # eoka-actor
//!
//! Lets an assistant act on the page it is embedded in: inventory the
//! interactive elements ("affordances"), bind a user request to one of them,
//! and run a browser action against it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_actor::{collect, match_target, resolve, ActionRequest, Actor, IntentCatalog, MemoryDom};
//! use eoka_actor::dom::Element;
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_actor::Result<()> {
//! let dom = MemoryDom::new();
//! dom.append(dom.body(), Element::new("button").text("Submit"));
//!
//! // Collect → resolve → match → act
//! let affordances = collect(&dom, 400).await?;
//! let catalog = IntentCatalog::builtin()?;
//! let resolution = resolve(&catalog, "click the submit button", None);
//! let command = resolution.as_command().expect("heuristic command");
//! let found = match_target(command.target.as_deref().unwrap_or(""), command.action, &affordances);
//!
//! if let Some(m) = found.best() {
//!     let actor = Actor::new(dom.clone());
//!     actor.execute(&ActionRequest::new(command.action).selector(&m.selector)).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod actor;
pub mod affordance;
pub mod dom;
pub mod guard;
pub mod intent;
pub mod matcher;
pub mod tools;

pub use action::{Action, ActionKind, ActionRequest, ScrollAlign, ScrollBehavior, ScrollOptions};
pub use actor::{ActionReport, Actor, TYPING_DELAY};
pub use affordance::{affordance_list, collect, Affordance, BBox, DEFAULT_MAX_AFFORDANCES};
pub use dom::{Dom, MemoryDom, PageDom};
pub use guard::{ActionId, ActionState, Dispatch, DispatchGuard};
pub use intent::{resolve, Command, Confidence, IntentCatalog, Resolution, StructuredIntent};
pub use matcher::{match_target, MatchOutcome, SelectorMatch};
pub use tools::{ToolKit, ToolLog, ToolLogSink, ToolName, TracingSink};

/// Result type for eoka-actor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while collecting, planning or executing actions.
///
/// "No match" and intent validation failures are not errors; they are
/// ordinary values ([`MatchOutcome::NoMatch`], [`intent::Validation`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{action}: element not found: {selector}")]
    ElementNotFound { action: ActionKind, selector: String },

    #[error("{action}: element {selector} is <{tag}>, expected an input, textarea or contenteditable")]
    UnsupportedElement {
        action: ActionKind,
        selector: String,
        tag: String,
    },

    #[error("{action}: missing parameter '{param}'")]
    MissingParameter {
        action: ActionKind,
        param: &'static str,
    },

    #[error("{action}: timed out after {timeout_ms}ms waiting for {selector}")]
    Timeout {
        action: ActionKind,
        selector: String,
        timeout_ms: u64,
    },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_action_and_selector() {
        let e = Error::ElementNotFound {
            action: ActionKind::Click,
            selector: "[data-id=\"x1\"]".into(),
        };
        assert_eq!(e.to_string(), "click: element not found: [data-id=\"x1\"]");

        let e = Error::Timeout {
            action: ActionKind::WaitForElement,
            selector: "#late".into(),
            timeout_ms: 100,
        };
        assert!(e.to_string().contains("waitForElement"));
        assert!(e.to_string().contains("100ms"));

        let e = Error::MissingParameter {
            action: ActionKind::Type,
            param: "text",
        };
        assert_eq!(e.to_string(), "type: missing parameter 'text'");
    }
}
