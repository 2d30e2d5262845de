//! Scripted transport for unit tests

use crate::transport::{Method, Transport, WireResponse};
use crate::Result;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request as seen by [`StubTransport`]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Per-request deadline handed to `send_within`
    pub timeout: Option<Duration>,
}

type Responder = Box<dyn Fn(&Recorded) -> Result<WireResponse> + Send + Sync>;

/// Transport that answers from a queue of canned responses (falling back to a
/// responder closure) and records every request.
#[derive(Clone)]
pub struct StubTransport {
    calls: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<Recorded>>>,
    queue: Arc<Mutex<VecDeque<Result<WireResponse>>>>,
    fallback: Arc<Responder>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(ok(Value::Null)))
    }

    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&Recorded) -> Result<WireResponse> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Box::new(f)),
        }
    }

    pub fn push(&self, res: Result<WireResponse>) -> &Self {
        self.queue.lock().unwrap().push_back(res);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }
}

impl StubTransport {
    fn answer(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<WireResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rec = Recorded {
            method,
            path: path.to_string(),
            body: body.cloned(),
            timeout,
        };
        self.log.lock().unwrap().push(rec.clone());
        match self.queue.lock().unwrap().pop_front() {
            Some(res) => res,
            None => (self.fallback)(&rec),
        }
    }
}

impl Transport for StubTransport {
    fn send(
        &self,
        _command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<WireResponse> {
        self.answer(method, path, body, None)
    }

    fn send_within(
        &self,
        _command: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<WireResponse> {
        self.answer(method, path, body, Some(timeout))
    }
}

/// `200 {"value": value}`
pub fn ok(value: Value) -> WireResponse {
    status(200, serde_json::json!({ "value": value }))
}

pub fn status(code: u16, body: Value) -> WireResponse {
    WireResponse {
        status: code,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

/// Encode an RGBA image as PNG bytes.
pub fn png(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y)));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
