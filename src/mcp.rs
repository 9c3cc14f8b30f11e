use eoka::{Browser, Page};
use eoka_actor::{
    affordance_list, collect, ActionId, ActionRequest, Actor, Affordance, Dispatch, Dom,
    DispatchGuard, PageDom, ToolKit, ToolLogSink, ToolName, TracingSink,
};
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::Config;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NavigateRequest {
    #[schemars(description = "URL to navigate to")]
    pub url: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIntentRequest {
    #[schemars(description = "The user's request, verbatim")]
    pub user_request: String,
    #[schemars(description = "Restrict structured matching to one intent category")]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchSelectorRequest {
    #[schemars(description = "Description of the target element, e.g. 'submit' or 'email'")]
    pub intent: String,
    #[schemars(description = "Action to perform on it (click, type, typeFast, clear, focus, ...)")]
    pub action: String,
    #[schemars(description = "Text to type, passed through to the result")]
    pub text: Option<String>,
    #[schemars(
        description = "Affordances to match against. Defaults to the last collect_affordances result."
    )]
    pub affordances_context: Option<Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionParams {
    #[schemars(
        description = "click, type, typeFast, clear, waitForElement, scrollTo, scrollToTop, \
                       scrollToBottom, scrollBy, scrollToElement, scrollToElementTop, \
                       scrollToElementBottom, scrollPageDown, scrollPageUp, focus, blur"
    )]
    pub action: String,
    #[schemars(description = "CSS selector of the element, usually from match_selector")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[schemars(description = "Text for type/typeFast")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[schemars(description = "waitForElement timeout in milliseconds")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[schemars(description = "Type one character at a time (default true)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulate_typing: Option<bool>,
    #[schemars(description = "scrollIntoView options for scrollToElement*")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_options: Option<ScrollOptionsParam>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ScrollOptionsParam {
    #[schemars(description = "auto, smooth (default) or instant")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[schemars(description = "start, center (default), end or nearest")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
    #[schemars(description = "start, center (default), end or nearest")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteActionRequest {
    #[serde(flatten)]
    pub params: ActionParams,
    #[schemars(
        description = "Id of the assistant message issuing the action. With it, the action runs at most once."
    )]
    pub message_id: Option<String>,
    #[schemars(description = "Position of the action within its message (default 0)")]
    pub index: Option<usize>,
}

impl ActionParams {
    fn to_request(&self) -> eoka_actor::Result<ActionRequest> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value::<ActionRequest>(value)?.normalize())
    }
}

/// Run one requested action and describe the outcome as a tool payload.
/// With a `messageId` the action goes through `guard`, so a repeated
/// message is reported as skipped instead of running again.
async fn execute<D: Dom>(
    actor: &Actor<D>,
    guard: &DispatchGuard,
    req: &ExecuteActionRequest,
) -> Value {
    let request = match req.params.to_request() {
        Ok(request) => request,
        Err(e) => {
            return json!({
                "success": false,
                "error": e.to_string(),
                "action": req.params.action,
            })
        }
    };

    let result = match req.message_id {
        Some(ref message_id) => {
            let id = ActionId::new(message_id.as_str(), req.index.unwrap_or(0));
            guard.observe(&id);
            match guard.dispatch(id, actor.execute(&request)).await {
                Dispatch::Ran(result) => result,
                Dispatch::Skipped(state) => {
                    return json!({
                        "success": true,
                        "skipped": state,
                        "action": request.action,
                    })
                }
            }
        }
        None => actor.execute(&request).await,
    };

    match result {
        Ok(report) => {
            let mut out = json!({ "success": true });
            if let (Some(out), Ok(Value::Object(report))) =
                (out.as_object_mut(), serde_json::to_value(&report))
            {
                out.extend(report);
            }
            out
        }
        Err(e) => json!({
            "success": false,
            "error": e.to_string(),
            "action": request.action,
            "selector": request.selector,
        }),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

fn err(e: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(e.to_string(), None::<Value>)
}

fn text_ok(s: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(s.into())]))
}

fn json_ok(v: &Value) -> Result<CallToolResult, ErrorData> {
    text_ok(serde_json::to_string_pretty(v).map_err(err)?)
}

fn no_page() -> ErrorData {
    ErrorData::internal_error("No page open. Use navigate first.", None::<Value>)
}

struct Session {
    browser: Browser,
    page: Arc<Page>,
}

#[derive(Clone)]
pub struct AssistServer {
    config: Arc<Config>,
    session: Arc<Mutex<Option<Session>>>,
    affordances: Arc<Mutex<Vec<Affordance>>>,
    tools: ToolKit,
    guard: DispatchGuard,
    tool_router: ToolRouter<Self>,
}

impl AssistServer {
    /// The open page, without keeping the session locked. Long actions
    /// (waits, simulated typing) then do not block other tools.
    async fn page(&self) -> Result<Arc<Page>, ErrorData> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(no_page)?;
        Ok(Arc::clone(&session.page))
    }

    async fn ensure_session(&self) -> Result<(), ErrorData> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            info!(
                "Launching browser (headless: {})",
                self.config.browser.headless
            );
            let browser = Browser::launch_with_config(self.config.browser.stealth())
                .await
                .map_err(err)?;
            let page = browser.new_page("about:blank").await.map_err(err)?;
            *guard = Some(Session {
                browser,
                page: Arc::new(page),
            });
        }
        Ok(())
    }
}

#[tool_router]
impl AssistServer {
    pub fn new(config: Config, tools: ToolKit) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(Mutex::new(None)),
            affordances: Arc::new(Mutex::new(Vec::new())),
            tools,
            guard: DispatchGuard::new(),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Navigate to a URL. Launches browser on first call.")]
    async fn navigate(
        &self,
        req: Parameters<NavigateRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.ensure_session().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(no_page)?;
        session.page.goto(&req.0.url).await.map_err(err)?;
        self.affordances.lock().await.clear();
        let url = session.page.url().await.map_err(err)?;
        let title = session.page.title().await.map_err(err)?;
        text_ok(format!("Navigated to: {}\nTitle: {}", url, title))
    }

    #[tool(
        description = "List the interactive elements of the page. Each entry ends with a stable selector. Re-collecting does not change selectors of elements still on the page."
    )]
    async fn collect_affordances(&self) -> Result<CallToolResult, ErrorData> {
        let page = self.page().await?;
        let dom = PageDom::new(&page);
        let list = collect(&dom, self.config.collector.max_affordances)
            .await
            .map_err(err)?;
        let out = if list.is_empty() {
            "No interactive elements found.".to_string()
        } else {
            affordance_list(&list)
        };
        *self.affordances.lock().await = list;
        text_ok(out)
    }

    #[tool(
        description = "Resolve a user request into either a structured intent (category, intent, fields) or a browser command (action, target, text)."
    )]
    async fn resolve_intent(
        &self,
        req: Parameters<ResolveIntentRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let input = json!({
            "userRequest": req.0.user_request,
            "category": req.0.category,
        });
        json_ok(&self.tools.call(ToolName::ResolveIntent, input))
    }

    #[tool(
        description = "Pick the element best matching a target description. Returns its selector, match score and confidence."
    )]
    async fn match_selector(
        &self,
        req: Parameters<MatchSelectorRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = req.0;
        let context = match req.affordances_context {
            Some(list) => Value::Array(list),
            None => serde_json::to_value(&*self.affordances.lock().await).map_err(err)?,
        };
        let input = json!({
            "intent": req.intent,
            "action": req.action,
            "text": req.text,
            "affordancesContext": context,
        });
        json_ok(&self.tools.call(ToolName::MatchSelector, input))
    }

    #[tool(
        description = "Check an action request and describe the executor call it maps to, without running it."
    )]
    async fn plan_action(
        &self,
        req: Parameters<ActionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let input = serde_json::to_value(&req.0).map_err(err)?;
        json_ok(&self.tools.call(ToolName::PlanAction, input))
    }

    #[tool(
        description = "Run an action on the page. Pass messageId (and index) so that repeating the same message never repeats the action."
    )]
    async fn execute_action(
        &self,
        req: Parameters<ExecuteActionRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let page = self.page().await?;
        let actor = Actor::new(PageDom::new(&page))
            .with_wait_timeout(self.config.actor.wait_timeout());
        json_ok(&execute(&actor, &self.guard, &req.0).await)
    }

    #[tool(description = "Close the browser and release resources.")]
    async fn close(&self) -> Result<CallToolResult, ErrorData> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            session.browser.close().await.map_err(err)?;
        }
        self.affordances.lock().await.clear();
        self.guard.reset();
        text_ok("Browser closed.")
    }
}

#[tool_handler]
impl ServerHandler for AssistServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "eoka-assist".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Page-acting assistant. Use 'navigate' to open a URL, 'collect_affordances' to list \
                 interactive elements, 'resolve_intent' to interpret the user's request, \
                 'match_selector' to bind its target to an element, then 'execute_action' with \
                 the returned selector. 'plan_action' checks a request without running it."
                    .into(),
            ),
        }
    }
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    let sink = Arc::new(TracingSink::new());
    sink.connect()?;
    let tools = ToolKit::new(config.catalog()?, sink.clone());

    let server = AssistServer::new(config, tools);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    sink.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoka_actor::dom::{DomEvent, Element};
    use eoka_actor::{ActionKind, MemoryDom, ScrollAlign, ScrollBehavior};

    fn params(json: Value) -> ActionParams {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_action_params_to_request() {
        let req = params(json!({"action": "typeFast", "selector": "#q", "text": "hi"}))
            .to_request()
            .unwrap();
        assert_eq!(req.action, ActionKind::TypeFast);
        assert_eq!(req.selector.as_deref(), Some("#q"));
        assert_eq!(req.text.as_deref(), Some("hi"));

        let req = params(json!({"action": "scrollTo", "selector": "#footer"}))
            .to_request()
            .unwrap();
        assert_eq!(req.action, ActionKind::ScrollToElement);

        assert!(params(json!({"action": "hover"})).to_request().is_err());
    }

    #[test]
    fn test_scroll_options_pass_through() {
        let req = params(json!({
            "action": "scrollToElement",
            "selector": "#footer",
            "scrollOptions": {"behavior": "instant", "block": "start"},
        }))
        .to_request()
        .unwrap();
        let options = req.scroll_options.unwrap();
        assert_eq!(options.behavior, ScrollBehavior::Instant);
        assert_eq!(options.block, ScrollAlign::Start);
        assert_eq!(options.inline, ScrollAlign::Center);

        let bad = params(json!({
            "action": "scrollToElement",
            "selector": "#footer",
            "scrollOptions": {"block": "middle"},
        }));
        assert!(bad.to_request().is_err());
    }

    fn execute_request(json: Value) -> ExecuteActionRequest {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_execute_repeated_message_is_skipped() {
        let dom = MemoryDom::new();
        let button = dom.append(dom.body(), Element::new("button").id("go"));
        let clicks = dom.listen(button, DomEvent::Click);
        let actor = Actor::new(dom.clone());
        let guard = DispatchGuard::new();
        let req = execute_request(json!({
            "action": "click",
            "selector": "#go",
            "messageId": "m-1",
        }));

        let first = execute(&actor, &guard, &req).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["action"], "click");
        assert_eq!(first["selector"], "#go");

        let second = execute(&actor, &guard, &req).await;
        assert_eq!(second["success"], true);
        assert_eq!(second["skipped"], "completed");
        assert_eq!(clicks.count(), 1);

        // Another position in the same message still runs.
        let mut next = req;
        next.index = Some(1);
        assert!(execute(&actor, &guard, &next).await.get("skipped").is_none());
        assert_eq!(clicks.count(), 2);
    }

    #[tokio::test]
    async fn test_execute_failures_are_payloads() {
        let dom = MemoryDom::new();
        let actor = Actor::new(dom.clone());
        let guard = DispatchGuard::new();

        let missing = execute(
            &actor,
            &guard,
            &execute_request(json!({"action": "click", "selector": "#nope"})),
        )
        .await;
        assert_eq!(missing["success"], false);
        assert_eq!(missing["action"], "click");
        assert!(missing["error"].as_str().unwrap().contains("element not found"));

        let unknown = execute(&actor, &guard, &execute_request(json!({"action": "hover"}))).await;
        assert_eq!(unknown["success"], false);
        assert_eq!(unknown["action"], "hover");

        let timeout = execute(
            &actor,
            &guard,
            &execute_request(json!({
                "action": "waitForElement",
                "selector": "#late",
                "timeout": 20,
                "messageId": "m-2",
            })),
        )
        .await;
        assert_eq!(timeout["success"], false);
        assert!(timeout["error"].as_str().unwrap().contains("timed out"));
    }

    #[test]
    fn test_execute_request_flattens_params() {
        let req: ExecuteActionRequest = serde_json::from_value(json!({
            "action": "click",
            "selector": "[data-id=\"a1b2c3d4\"]",
            "messageId": "m-7",
            "index": 2,
        }))
        .unwrap();
        assert_eq!(req.params.action, "click");
        assert_eq!(req.message_id.as_deref(), Some("m-7"));
        assert_eq!(req.index, Some(2));
    }
}
