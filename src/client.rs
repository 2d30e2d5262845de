//! WebDriver protocol client
//!
//! [`WebDriverClient`] owns at most one remote session and turns typed
//! operations into HTTP command/response exchanges. Every command other than
//! session creation fails locally with [`Error::NoActiveSession`] when no
//! session exists; nothing is retried.

use crate::selectors::{find_all_script, find_one_script, parse_selector};
use crate::transport::{HttpTransport, Method, Transport, WireResponse};
use crate::wait::{
    element_state_condition, ElementState, Poller, WaitUntil, DOM_CONTENT_LOADED_CONDITION,
    LOAD_COMPLETE_CONDITION,
};
use crate::{
    BestEffort, CancelToken, Cookie, DriverConfig, ElementRef, Error, Result, ScriptValue,
};
use serde_json::{json, Map, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A live remote session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub capabilities: Map<String, Value>,
}

const CLICK_SCRIPT: &str = r#"
var element = arguments[0];
if (!element) {
    return {success: false, error: "Element not found"};
}
var info = {
    tagName: element.tagName,
    id: element.id,
    className: element.className,
    text: element.textContent ? element.textContent.substring(0, 50) : "",
    visible: element.offsetWidth > 0 && element.offsetHeight > 0,
    disabled: element.disabled,
    type: element.type
};
element.scrollIntoView({behavior: 'instant', block: 'center', inline: 'center'});
try {
    element.click();
    return {success: true, info: info};
} catch (e) {
    return {success: false, error: e.toString(), info: info};
}
"#;

const TEXT_CONTENT_SCRIPT: &str = r#"
var element = arguments[0];
if (!element) return null;
return element.textContent;
"#;

/// Blocking client bound to one WebDriver endpoint
pub struct WebDriverClient {
    transport: Arc<dyn Transport>,
    config: DriverConfig,
    session: RwLock<Option<Session>>,
    cancel: Option<CancelToken>,
}

impl WebDriverClient {
    /// Client speaking HTTP to `config.base_url`. No request is made yet.
    pub fn new(config: DriverConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport<T: Transport + 'static>(config: DriverConfig, transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            session: RwLock::new(None),
            cancel: None,
        }
    }

    /// Attach a token checked before every command and on every wait tick.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    pub fn session_id(&self) -> Option<String> {
        self.session().map(|s| s.session_id)
    }

    pub fn has_session(&self) -> bool {
        self.session_id().is_some()
    }

    fn poller(&self) -> Poller {
        Poller::from_config(&self.config, self.cancel.clone())
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(t) if t.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    pub(crate) fn active_session_id(&self) -> Result<String> {
        self.check_cancelled()?;
        self.session_id().ok_or(Error::NoActiveSession)
    }

    fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    /// Send a session-scoped command; non-2xx becomes `Error::Protocol`.
    fn command(
        &self,
        command: &'static str,
        method: Method,
        suffix: &str,
        body: Option<&Value>,
    ) -> Result<WireResponse> {
        self.command_within(command, method, suffix, body, None)
    }

    fn command_within(
        &self,
        command: &'static str,
        method: Method,
        suffix: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<WireResponse> {
        let id = self.active_session_id()?;
        let path = format!("/session/{}{}", id, suffix);
        let res = match timeout {
            Some(t) => self.transport.send_within(command, method, &path, body, t)?,
            None => self.transport.send(command, method, &path, body)?,
        };
        if !res.is_success() {
            return Err(Error::Protocol {
                command,
                status: res.status,
                message: res.error_message(),
            });
        }
        Ok(res)
    }

    fn command_value(
        &self,
        command: &'static str,
        method: Method,
        suffix: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.command(command, method, suffix, body)?.value(command)
    }

    /// `POST /session`; the returned id becomes this client's session.
    pub fn create_session(&self, capabilities: Map<String, Value>) -> Result<Session> {
        self.check_cancelled()?;
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let res = self
            .transport
            .send("new session", Method::Post, "/session", Some(&body))?;

        if !res.is_success() {
            return Err(Error::SessionCreation(match res.error_message() {
                Some(m) => format!("status {}: {}", res.status, m),
                None => format!("status {}", res.status),
            }));
        }

        let envelope: Value = serde_json::from_slice(&res.body)
            .map_err(|e| Error::SessionCreation(format!("undecodable response: {}", e)))?;
        let session = decode_session(&envelope).ok_or_else(|| {
            Error::SessionCreation("response carries no session id".to_string())
        })?;

        if let Some(previous) = self.session_id() {
            log::warn!("replacing session {} without deleting it", previous);
        }
        log::info!("created WebDriver session {}", session.session_id);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    /// `DELETE /session/{id}`. Never fails the caller: without a session this
    /// is a logged no-op, and the local id is cleared whatever the remote end
    /// answers.
    pub fn delete_session(&self) -> BestEffort {
        let id = match self.session_id() {
            Some(id) => id,
            None => return BestEffort::skipped("delete session", "no active session"),
        };

        let res = self
            .transport
            .send("delete session", Method::Delete, &format!("/session/{}", id), None);
        self.set_session(None);

        let outcome = res.and_then(|r| {
            if r.is_success() {
                Ok(())
            } else {
                Err(Error::Protocol {
                    command: "delete session",
                    status: r.status,
                    message: r.error_message(),
                })
            }
        });
        if outcome.is_ok() {
            log::info!("deleted WebDriver session {}", id);
        }
        BestEffort::from_result("delete session", outcome)
    }

    /// Navigate and wait according to `wait_until`.
    ///
    /// The navigate command already blocks until `load`; the other modes poll
    /// `document.readyState` afterwards.
    pub fn navigate(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
        self.command("navigate", Method::Post, "/url", Some(&json!({ "url": url })))?;

        match wait_until {
            WaitUntil::Load => Ok(()),
            WaitUntil::DomContentLoaded => self.wait_for_condition(
                "DOMContentLoaded",
                DOM_CONTENT_LOADED_CONDITION,
            ),
            WaitUntil::NetworkIdle => {
                self.wait_for_condition("load", LOAD_COMPLETE_CONDITION)?;
                std::thread::sleep(Duration::from_millis(self.config.network_idle_settle_ms));
                Ok(())
            }
        }
    }

    /// Poll a boolean condition script until it returns `true`.
    pub fn wait_for_condition(&self, what: &str, script: &str) -> Result<()> {
        self.active_session_id()?;
        self.poller()
            .until_true(what, |budget| self.execute_script_within(script, budget))
    }

    /// Wait for `selector` to reach `state`.
    pub fn wait_for_selector(&self, selector: &str, state: ElementState) -> Result<()> {
        self.active_session_id()?;
        let script = element_state_condition(selector, state);
        let what = format!("selector '{}' to be {}", selector, state.as_str());
        self.poller()
            .until_true(&what, |budget| self.execute_script_within(&script, budget))
    }

    pub fn current_url(&self) -> Result<String> {
        let v = self.command_value("get current url", Method::Get, "/url", None)?;
        as_string("get current url", v)
    }

    pub fn title(&self) -> Result<String> {
        let v = self.command_value("get title", Method::Get, "/title", None)?;
        as_string("get title", v)
    }

    /// Run `script` synchronously in the page. `args` is always sent, empty
    /// or not.
    pub fn execute_script(&self, script: &str, args: &[ScriptValue]) -> Result<ScriptValue> {
        let body = json!({
            "script": script,
            "args": args.iter().map(ScriptValue::to_json).collect::<Vec<_>>(),
        });
        let v = self.command_value("execute script", Method::Post, "/execute/sync", Some(&body))?;
        Ok(v.into())
    }

    /// Argument-less script bounded by `budget`, for condition checks.
    fn execute_script_within(&self, script: &str, budget: Duration) -> Result<ScriptValue> {
        let body = json!({ "script": script, "args": [] });
        let v = self
            .command_within(
                "execute script",
                Method::Post,
                "/execute/sync",
                Some(&body),
                Some(budget),
            )?
            .value("execute script")?;
        Ok(v.into())
    }

    /// Resolve `selector` to a single element.
    pub fn find_element(&self, selector: &str) -> Result<ElementRef> {
        let parsed = parse_selector(selector);
        if parsed.is_native {
            return self.find_element_native(parsed.strategy.as_str(), &parsed.value, selector);
        }

        self.active_session_id()?;
        let script = find_one_script(parsed.strategy, &parsed.value);
        let found = self.execute_script(&script, &[])?;
        if found.is_null() {
            return Err(Error::ElementNotFound(selector.to_string()));
        }
        found.as_element_ref().ok_or_else(|| {
            Error::decode("find element", "script returned an invalid element reference")
        })
    }

    fn find_element_native(&self, using: &str, value: &str, selector: &str) -> Result<ElementRef> {
        let body = json!({ "using": using, "value": value });
        match self.command_value("find element", Method::Post, "/element", Some(&body)) {
            Ok(v) => {
                ElementRef::from_wire(&v).ok_or_else(|| Error::ElementNotFound(selector.to_string()))
            }
            // The remote end signals a miss with 404 "no such element".
            Err(Error::Protocol { status: 404, .. }) => {
                Err(Error::ElementNotFound(selector.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `selector` to every match. No match is an empty vector.
    pub fn find_all_elements(&self, selector: &str) -> Result<Vec<ElementRef>> {
        let parsed = parse_selector(selector);
        if parsed.is_native {
            let body = json!({ "using": parsed.strategy.as_str(), "value": parsed.value });
            let v = self.command_value("find elements", Method::Post, "/elements", Some(&body))?;
            return match v {
                Value::Array(items) => Ok(items.iter().filter_map(ElementRef::from_wire).collect()),
                Value::Null => Ok(Vec::new()),
                other => Err(Error::decode(
                    "find elements",
                    format!("expected an array, got {}", other),
                )),
            };
        }

        self.active_session_id()?;
        let script = find_all_script(parsed.strategy, &parsed.value);
        match self.execute_script(&script, &[])? {
            ScriptValue::Array(items) => {
                Ok(items.iter().filter_map(ScriptValue::as_element_ref).collect())
            }
            ScriptValue::Null => Ok(Vec::new()),
            other => Err(Error::decode(
                "find elements",
                format!("expected an array, got {}", other.to_json()),
            )),
        }
    }

    pub fn find_elements_count(&self, selector: &str) -> Result<usize> {
        Ok(self.find_all_elements(selector)?.len())
    }

    /// Scroll into view and click through a page script; a script-side failure
    /// comes back as `Error::Script` with the element diagnostics logged.
    pub fn click_element(&self, element: &ElementRef) -> Result<()> {
        let result = self.execute_script(CLICK_SCRIPT, &[ScriptValue::from(element)])?;

        let info = result.get("info").map(|i| i.to_json());
        if result.get("success").and_then(ScriptValue::as_bool) == Some(false) {
            let message = result
                .get("error")
                .and_then(ScriptValue::as_str)
                .unwrap_or("unknown error")
                .to_string();
            log::warn!("click on {} failed; element info: {:?}", element, info);
            return Err(Error::Script(format!("click failed: {}", message)));
        }
        log::debug!("clicked {}; element info: {:?}", element, info);
        Ok(())
    }

    /// `POST /session/{id}/element/{eid}/value`. Text is sent in one command.
    pub fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        let suffix = format!("/element/{}/value", element.id());
        self.command("send keys", Method::Post, &suffix, Some(&json!({ "text": text })))?;
        Ok(())
    }

    pub fn element_text(&self, element: &ElementRef) -> Result<Option<String>> {
        let v = self.execute_script(TEXT_CONTENT_SCRIPT, &[ScriptValue::from(element)])?;
        match v {
            ScriptValue::Null => Ok(None),
            ScriptValue::String(s) => Ok(Some(s)),
            other => Err(Error::decode(
                "text content",
                format!("expected a string, got {:?}", other),
            )),
        }
    }

    /// `GET /session/{id}/screenshot`, base64-decoded. No cropping.
    pub fn take_full_screenshot(&self) -> Result<Vec<u8>> {
        use base64::Engine as _;

        let v = self.command_value("take screenshot", Method::Get, "/screenshot", None)?;
        let encoded = as_string("take screenshot", v)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::decode("take screenshot", format!("invalid base64: {}", e)))
    }

    pub fn set_window_size(&self, width: u32, height: u32) -> Result<()> {
        let body = json!({ "width": width, "height": height });
        self.command("set window rect", Method::Post, "/window/rect", Some(&body))?;
        Ok(())
    }

    pub fn get_all_cookies(&self) -> Result<Vec<Cookie>> {
        let v = self.command_value("get all cookies", Method::Get, "/cookie", None)?;
        serde_json::from_value(v).map_err(|e| Error::decode("get all cookies", e))
    }
}

fn as_string(command: &'static str, v: Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(Error::decode(command, format!("expected a string, got {}", other))),
    }
}

// W3C answers `{value: {sessionId, capabilities}}`; older drivers put the id
// at the top level next to a bare capabilities `value`.
fn decode_session(envelope: &Value) -> Option<Session> {
    let value = envelope.get("value")?;
    let (id, caps) = match value.get("sessionId").and_then(Value::as_str) {
        Some(id) => (id, value.get("capabilities")),
        None => (envelope.get("sessionId")?.as_str()?, Some(value)),
    };
    if id.is_empty() {
        return None;
    }
    Some(Session {
        session_id: id.to_string(),
        capabilities: caps
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}
