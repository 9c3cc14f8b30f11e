//! Tool boundary with the orchestration layer.
//!
//! Tools take and return JSON. They never touch the page: `plan_action`
//! only describes what the executor should run. Every call, successful or
//! not, produces a [`ToolLog`] for the injected [`ToolLogSink`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::action::{ActionKind, ActionRequest};
use crate::affordance::Affordance;
use crate::intent::{resolve, IntentCatalog, Resolution};
use crate::matcher::{match_target, MatchOutcome};
use crate::{Error, Result};

/// The closed set of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ResolveIntent,
    MatchSelector,
    PlanAction,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [Self::ResolveIntent, Self::MatchSelector, Self::PlanAction];

    pub fn name(self) -> &'static str {
        match self {
            Self::ResolveIntent => "resolve_intent",
            Self::MatchSelector => "match_selector",
            Self::PlanAction => "plan_action",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown tool '{}'", s)))
    }
}

/// Input of `resolve_intent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIntentInput {
    pub user_request: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Input of `match_selector`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSelectorInput {
    /// Target description.
    pub intent: String,
    pub action: ActionKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub affordances_context: Vec<Affordance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failure,
}

/// One tool invocation, as handed to the log sink.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolLog {
    pub tool: ToolName,
    pub input: Value,
    pub output: Value,
    pub duration_ms: u64,
    pub status: ToolStatus,
}

/// Receiver of tool-call logs, with an explicit lifecycle.
pub trait ToolLogSink: Send + Sync {
    fn connect(&self) -> Result<()>;
    fn is_ready(&self) -> bool;
    fn record(&self, log: &ToolLog);
    fn close(&self);
}

/// Emits each tool log as a structured `tracing` event.
#[derive(Debug, Default)]
pub struct TracingSink {
    connected: AtomicBool,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ToolLogSink for TracingSink {
    fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn record(&self, log: &ToolLog) {
        info!(
            tool = %log.tool,
            status = ?log.status,
            duration_ms = log.duration_ms,
            input = %log.input,
            output = %log.output,
            "tool call"
        );
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Runs tools against an intent catalog and logs every call.
#[derive(Clone)]
pub struct ToolKit {
    catalog: Arc<IntentCatalog>,
    sink: Arc<dyn ToolLogSink>,
}

impl ToolKit {
    pub fn new(catalog: IntentCatalog, sink: Arc<dyn ToolLogSink>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            sink,
        }
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    /// Run `tool` on `input`. Always returns a payload with `success`.
    pub fn call(&self, tool: ToolName, input: Value) -> Value {
        let started = Instant::now();
        let output = self
            .run(tool, &input)
            .unwrap_or_else(|e| json!({ "success": false, "error": e.to_string() }));
        let status = if output["success"] == Value::Bool(true) {
            ToolStatus::Success
        } else {
            ToolStatus::Failure
        };

        let log = ToolLog {
            tool,
            input,
            output,
            duration_ms: started.elapsed().as_millis() as u64,
            status,
        };
        if self.sink.is_ready() {
            self.sink.record(&log);
        } else {
            debug!("log sink not ready, dropping log for {}", tool);
        }
        log.output
    }

    fn run(&self, tool: ToolName, input: &Value) -> Result<Value> {
        match tool {
            ToolName::ResolveIntent => {
                let input: ResolveIntentInput = serde_json::from_value(input.clone())?;
                Ok(self.resolve_intent(&input))
            }
            ToolName::MatchSelector => {
                let input: MatchSelectorInput = serde_json::from_value(input.clone())?;
                Ok(match_selector(&input))
            }
            ToolName::PlanAction => {
                let request: ActionRequest = serde_json::from_value(input.clone())?;
                plan_action(&request)
            }
        }
    }

    fn resolve_intent(&self, input: &ResolveIntentInput) -> Value {
        match resolve(&self.catalog, &input.user_request, input.category.as_deref()) {
            Resolution::Structured(s) => json!({
                "success": true,
                "intentType": "structured",
                "category": s.category,
                "intent": s.intent,
                "action": s.action,
                "fields": s.fields,
                "validation": s.validation,
                "missingFields": s.validation.missing_fields,
                "confidence": s.confidence,
                "score": s.score,
            }),
            Resolution::NaturalLanguage(cmd) => {
                let mut out = json!({
                    "success": true,
                    "intentType": "natural_language",
                    "action": cmd.action,
                    "target": cmd.target,
                    "confidence": cmd.confidence,
                });
                if let Some(text) = cmd.text {
                    out["text"] = json!(text);
                }
                if let Some(delta) = cmd.delta {
                    out["y"] = json!(delta);
                }
                out
            }
            Resolution::NoMatch { suggestion } => json!({
                "success": false,
                "error": "no matching intent",
                "suggestion": suggestion,
            }),
        }
    }
}

fn match_selector(input: &MatchSelectorInput) -> Value {
    match match_target(&input.intent, input.action, &input.affordances_context) {
        MatchOutcome::Match(m) => {
            let mut out = json!({
                "success": true,
                "selectedElement": m,
                "confidence": m.confidence,
                "matchScore": m.score,
                "action": input.action,
            });
            if let Some(ref text) = input.text {
                out["text"] = json!(text);
            }
            out
        }
        MatchOutcome::NoMatch { suggestion } => json!({
            "success": false,
            "error": "no matching element",
            "suggestion": suggestion,
        }),
    }
}

/// Describe what the executor must run. `scrollTo` with a selector means
/// scrolling that element into view.
pub fn plan_action(request: &ActionRequest) -> Result<Value> {
    let action = request.clone().normalize().validate()?;
    let normalized = ActionRequest::from(&action);

    let mut params = serde_json::to_value(&normalized)?;
    if let Some(obj) = params.as_object_mut() {
        obj.remove("action");
    }
    Ok(json!({
        "success": true,
        "executable": true,
        "actorMethod": action.kind().name(),
        "actorParams": params,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        ready: AtomicBool,
        logs: Mutex<Vec<ToolLog>>,
    }

    impl ToolLogSink for Recording {
        fn connect(&self) -> Result<()> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
        fn record(&self, log: &ToolLog) {
            self.logs.lock().unwrap().push(log.clone());
        }
        fn close(&self) {
            self.ready.store(false, Ordering::SeqCst);
        }
    }

    fn kit() -> (ToolKit, Arc<Recording>) {
        let sink = Arc::new(Recording::default());
        sink.connect().unwrap();
        let kit = ToolKit::new(IntentCatalog::builtin().unwrap(), sink.clone());
        (kit, sink)
    }

    #[test]
    fn tool_names() {
        for tool in ToolName::ALL {
            assert_eq!(tool.name().parse::<ToolName>().unwrap(), tool);
        }
        assert!("execute".parse::<ToolName>().is_err());
    }

    #[test]
    fn resolve_intent_payloads() {
        let (kit, sink) = kit();
        let out = kit.call(
            ToolName::ResolveIntent,
            json!({ "userRequest": "click the submit button" }),
        );
        assert_eq!(out["success"], true);
        assert_eq!(out["intentType"], "natural_language");
        assert_eq!(out["action"], "click");
        assert_eq!(out["target"], "submit");
        assert_eq!(out["confidence"], "medium");

        let out = kit.call(
            ToolName::ResolveIntent,
            json!({ "userRequest": "newsletter signup please" }),
        );
        assert_eq!(out["intentType"], "structured");
        assert_eq!(out["intent"], "newsletter_signup");
        assert_eq!(out["missingFields"], json!(["email"]));
        assert_eq!(out["validation"]["missingFields"], json!(["email"]));

        let out = kit.call(ToolName::ResolveIntent, json!({ "userRequest": "" }));
        assert_eq!(out["success"], false);
        assert!(out["suggestion"].is_string());

        let logs = sink.logs.lock().unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].status, ToolStatus::Success);
        assert_eq!(logs[2].status, ToolStatus::Failure);
        assert_eq!(logs[0].input["userRequest"], "click the submit button");
    }

    #[test]
    fn match_selector_payloads() {
        let (kit, _) = kit();
        let affordances = json!([
            { "name": "Cancel", "tag": "a", "selector": "[data-id=\"c1\"]" },
            { "name": "Submit", "tag": "BUTTON", "selector": "[data-id=\"x1\"]" },
        ]);
        let out = kit.call(
            ToolName::MatchSelector,
            json!({ "intent": "submit", "action": "click", "affordancesContext": affordances }),
        );
        assert_eq!(out["success"], true);
        assert_eq!(out["selectedElement"]["name"], "Submit");
        assert_eq!(out["selectedElement"]["selector"], "[data-id=\"x1\"]");
        assert_eq!(out["matchScore"], 110);
        assert_eq!(out["confidence"], "high");

        let out = kit.call(
            ToolName::MatchSelector,
            json!({ "intent": "shopping cart", "action": "click", "affordancesContext": affordances }),
        );
        assert_eq!(out["success"], false);
        assert!(out["suggestion"].as_str().unwrap().contains("more specific"));
    }

    #[test]
    fn plan_action_payloads() {
        let out = plan_action(
            &serde_json::from_value(json!({ "action": "type", "selector": "#q", "text": "hi" }))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(out["executable"], true);
        assert_eq!(out["actorMethod"], "type");
        assert_eq!(out["actorParams"]["selector"], "#q");
        assert_eq!(out["actorParams"]["simulateTyping"], true);
        assert!(out["actorParams"].get("action").is_none());

        let out = plan_action(
            &serde_json::from_value(json!({ "action": "scrollTo", "selector": "#pricing" }))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(out["actorMethod"], "scrollToElement");
        assert_eq!(out["actorParams"]["scrollOptions"]["block"], "center");

        let out = plan_action(&ActionRequest::new(ActionKind::ScrollTo).at(0.0, 300.0)).unwrap();
        assert_eq!(out["actorMethod"], "scrollTo");
        assert_eq!(out["actorParams"]["y"], 300.0);
    }

    #[test]
    fn failures_become_payloads() {
        let (kit, sink) = kit();
        let out = kit.call(ToolName::PlanAction, json!({ "action": "click" }));
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().contains("selector"));

        let out = kit.call(ToolName::PlanAction, json!({ "action": "doubleClick", "selector": "#x" }));
        assert_eq!(out["success"], false);

        let out = kit.call(ToolName::MatchSelector, json!("not an object"));
        assert_eq!(out["success"], false);

        assert!(sink
            .logs
            .lock()
            .unwrap()
            .iter()
            .all(|l| l.status == ToolStatus::Failure));
    }

    #[test]
    fn closed_sink_receives_nothing() {
        let (kit, sink) = kit();
        sink.close();
        kit.call(ToolName::ResolveIntent, json!({ "userRequest": "scroll down" }));
        assert!(sink.logs.lock().unwrap().is_empty());
    }
}
