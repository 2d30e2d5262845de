use crate::client::{Session, WebDriverClient};
use crate::{BestEffort, DriverConfig, ElementRef, Error, Result, ScriptValue, WaitUntil};
use serde_json::{Map, Value};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    CreateSession(Map<String, Value>, oneshot::Sender<Result<Session>>),
    Navigate(String, WaitUntil, oneshot::Sender<Result<()>>),
    Title(oneshot::Sender<Result<String>>),
    ExecuteScript(String, Vec<ScriptValue>, oneshot::Sender<Result<ScriptValue>>),
    FindElement(String, oneshot::Sender<Result<ElementRef>>),
    Screenshot(oneshot::Sender<Result<Vec<u8>>>),
    DeleteSession(oneshot::Sender<BestEffort>),
    Close(oneshot::Sender<BestEffort>),
}

/// An async-friendly protocol client backed by a dedicated worker thread.
///
/// The worker thread owns a blocking [`WebDriverClient`] and executes commands
/// sent from async tasks, so blocking HTTP and poll sleeps never run on the
/// async runtime's threads.
#[derive(Clone)]
pub struct AsyncClient {
    cmd_tx: Sender<Command>,
}

impl AsyncClient {
    /// Create a client (spawns a background thread that owns it).
    pub async fn new(config: DriverConfig) -> Result<Self> {
        Self::spawn(move || WebDriverClient::new(config)).await
    }

    /// Like [`AsyncClient::new`] with a caller-built client. `make` runs on the
    /// worker thread.
    pub async fn spawn<F>(make: F) -> Result<Self>
    where
        F: FnOnce() -> Result<WebDriverClient> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            // The blocking HTTP client must be created off the async runtime.
            let client = match make() {
                Ok(c) => c,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::CreateSession(caps, resp) => {
                        let _ = resp.send(client.create_session(caps));
                    }
                    Command::Navigate(url, wait_until, resp) => {
                        let _ = resp.send(client.navigate(&url, wait_until));
                    }
                    Command::Title(resp) => {
                        let _ = resp.send(client.title());
                    }
                    Command::ExecuteScript(script, args, resp) => {
                        let _ = resp.send(client.execute_script(&script, &args));
                    }
                    Command::FindElement(selector, resp) => {
                        let _ = resp.send(client.find_element(&selector));
                    }
                    Command::Screenshot(resp) => {
                        let _ = resp.send(client.take_screenshot());
                    }
                    Command::DeleteSession(resp) => {
                        let _ = resp.send(client.delete_session());
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(client.delete_session());
                        break;
                    }
                }
            }
            log::debug!("async client worker exiting");
        });

        init_rx
            .await
            .map_err(|e| Error::Worker(format!("init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    async fn call<T>(
        &self,
        what: &str,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::Worker(format!("{}: worker stopped", what)))?;
        rx.await
            .map_err(|e| Error::Worker(format!("{} canceled: {}", what, e)))
    }

    pub async fn create_session(&self, capabilities: Map<String, Value>) -> Result<Session> {
        self.call("create session", |tx| Command::CreateSession(capabilities, tx))
            .await?
    }

    pub async fn navigate(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
        let url = url.to_string();
        self.call("navigate", |tx| Command::Navigate(url, wait_until, tx))
            .await?
    }

    pub async fn title(&self) -> Result<String> {
        self.call("get title", Command::Title).await?
    }

    pub async fn execute_script(&self, script: &str, args: Vec<ScriptValue>) -> Result<ScriptValue> {
        let script = script.to_string();
        self.call("execute script", |tx| Command::ExecuteScript(script, args, tx))
            .await?
    }

    pub async fn find_element(&self, selector: &str) -> Result<ElementRef> {
        let selector = selector.to_string();
        self.call("find element", |tx| Command::FindElement(selector, tx))
            .await?
    }

    /// Viewport-cropped PNG capture
    pub async fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.call("take screenshot", Command::Screenshot).await?
    }

    pub async fn delete_session(&self) -> BestEffort {
        match self.call("delete session", Command::DeleteSession).await {
            Ok(outcome) => outcome,
            Err(e) => BestEffort::from_result::<()>("delete session", Err(e)),
        }
    }

    /// Delete any session and stop the worker. Other clones of this handle
    /// fail with `Error::Worker` afterwards.
    pub async fn close(self) -> BestEffort {
        match self.call("close", Command::Close).await {
            Ok(outcome) => outcome,
            Err(e) => BestEffort::from_result::<()>("close", Err(e)),
        }
    }
}
