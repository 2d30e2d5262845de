//! Minimal WebDriver endpoint on tiny_http for integration tests

#![allow(dead_code)]

use base64::Engine as _;
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};
use tiny_http::{Header, Response, Server};

pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub body: Value,
}

pub struct FakeDriver {
    pub base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl FakeDriver {
    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.hits().into_iter().map(|h| format!("{} {}", h.method, h.path)).collect()
    }

    pub fn last_script(&self) -> Option<String> {
        self.hits()
            .into_iter()
            .rev()
            .find(|h| h.path.ends_with("/execute/sync"))
            .and_then(|h| h.body["script"].as_str().map(str::to_string))
    }
}

pub fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// 40x30 capture with a 20x15 red top-left quadrant; the page reports a
/// 10x5 viewport at DPR 2.
pub fn capture() -> Vec<u8> {
    png(40, 30, |x, y| {
        if x < 20 && y < 15 {
            [255, 0, 0, 255]
        } else {
            [255, 255, 255, 255]
        }
    })
}

fn reply(status: u16, value: Value) -> (u16, Value) {
    (status, json!({ "value": value }))
}

fn route(method: &str, path: &str, body: &Value) -> (u16, Value) {
    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match (method, parts.as_slice()) {
        ("POST", ["session"]) => reply(
            200,
            json!({ "sessionId": "fake-1", "capabilities": { "browserName": "Safari" } }),
        ),
        ("DELETE", ["session", _]) => reply(200, Value::Null),
        ("POST", ["session", _, "url"]) => reply(200, Value::Null),
        ("GET", ["session", _, "url"]) => reply(200, json!("https://example.test/home")),
        ("GET", ["session", _, "title"]) => reply(200, json!("Fake Home")),
        ("POST", ["session", _, "window", "rect"]) => {
            reply(200, json!({ "x": 0, "y": 0, "width": body["width"], "height": body["height"] }))
        }
        ("GET", ["session", _, "cookie"]) => reply(
            200,
            json!([{ "name": "sid", "value": "abc", "path": "/", "httpOnly": true }]),
        ),
        ("GET", ["session", _, "screenshot"]) => reply(
            200,
            json!(base64::engine::general_purpose::STANDARD.encode(capture())),
        ),
        ("POST", ["session", _, "element"]) => {
            if body["value"] == "#missing" {
                reply(
                    404,
                    json!({ "error": "no such element", "message": "Unable to locate element" }),
                )
            } else {
                reply(200, json!({ ELEMENT_KEY: "native-1" }))
            }
        }
        ("POST", ["session", _, "elements"]) => reply(
            200,
            json!([{ ELEMENT_KEY: "native-1" }, { ELEMENT_KEY: "native-2" }]),
        ),
        ("POST", ["session", _, "element", _, "value"]) => reply(200, Value::Null),
        ("POST", ["session", _, "execute", "sync"]) => execute(body),
        _ => reply(
            404,
            json!({ "error": "unknown command", "message": format!("{} {}", method, path) }),
        ),
    }
}

fn execute(body: &Value) -> (u16, Value) {
    let script = body["script"].as_str().unwrap_or_default();
    if script.contains("throw") {
        return reply(
            500,
            json!({ "error": "javascript error", "message": "Error: scripted failure" }),
        );
    }
    if script.contains("innerWidth") {
        return reply(200, json!({ "width": 10, "height": 5, "devicePixelRatio": 2 }));
    }
    if script.contains("readyState") || script.starts_with("var element = ") {
        return reply(200, json!(true));
    }
    if script.contains("element.click()") {
        return reply(200, json!({ "success": true, "info": { "tagName": "BUTTON" } }));
    }
    if script.contains("element.textContent") {
        return reply(200, json!("Hello, world"));
    }
    if script.contains("Nowhere") {
        return reply(200, Value::Null);
    }
    if script.starts_with("return Array.from(") {
        return reply(200, json!([{ ELEMENT_KEY: "custom-1" }, { "ELEMENT": "custom-2" }]));
    }
    if script.starts_with("var matches") || script.starts_with("return document.querySelector(") {
        return reply(200, json!({ ELEMENT_KEY: "custom-1" }));
    }
    reply(200, json!(script.len()))
}

/// Start a fake driver on an ephemeral port.
pub fn start() -> FakeDriver {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&hits);

    std::thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut raw = String::new();
            let _ = request.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let method = request.method().as_str().to_string();
            let path = request.url().to_string();

            let (status, payload) = route(&method, &path, &body);
            log.lock().unwrap().push(Hit { method, path, body });

            let resp = Response::from_string(payload.to_string())
                .with_status_code(status)
                .with_header("Content-Type: application/json".parse::<Header>().unwrap());
            let _ = request.respond(resp);
        }
    });

    FakeDriver {
        base_url: format!("http://{}", addr),
        hits,
    }
}
