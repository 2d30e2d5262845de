//! Driver daemon supervision
//!
//! Reference-counted ownership of the external automation daemon. The
//! protocol client only needs "something answers at the base URL"; hosts that
//! want the daemon started on demand call [`DriverProcess::acquire`] before
//! creating sessions and [`DriverProcess::release`] after closing them.

use crate::{Error, Result};
use std::net::{SocketAddr, TcpStream};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Port the default daemon listens on
pub const DEFAULT_DRIVER_PORT: u16 = 4444;
/// How long a freshly spawned daemon gets to open its port
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_INTERVAL: Duration = Duration::from_millis(100);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Default)]
struct State {
    // Only set when this process spawned the daemon.
    child: Option<Child>,
    refs: usize,
}

pub struct DriverProcess {
    program: String,
    args: Vec<String>,
    port: u16,
    ready_timeout: Duration,
    state: Mutex<State>,
}

impl DriverProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            args,
            port,
            ready_timeout: READY_TIMEOUT,
            state: Mutex::new(State::default()),
        }
    }

    /// `safaridriver --port 4444`
    pub fn safaridriver() -> Self {
        Self::new(
            "safaridriver",
            vec!["--port".to_string(), DEFAULT_DRIVER_PORT.to_string()],
            DEFAULT_DRIVER_PORT,
        )
    }

    /// Process-wide safaridriver manager.
    pub fn global() -> &'static DriverProcess {
        static GLOBAL: OnceLock<DriverProcess> = OnceLock::new();
        GLOBAL.get_or_init(DriverProcess::safaridriver)
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ref_count(&self) -> usize {
        self.state.lock().map(|s| s.refs).unwrap_or(0)
    }

    /// Whether this manager spawned (and will reap) the daemon.
    pub fn owns_child(&self) -> bool {
        self.state.lock().map(|s| s.child.is_some()).unwrap_or(false)
    }

    fn addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }

    pub fn is_port_in_use(&self) -> bool {
        TcpStream::connect_timeout(&self.addr(), CONNECT_TIMEOUT).is_ok()
    }

    /// Take a reference, starting the daemon if nothing listens on the port.
    pub fn acquire(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("driver state lock poisoned")))?;

        if state.child.is_some() || state.refs > 0 {
            state.refs += 1;
            return Ok(());
        }

        if self.is_port_in_use() {
            log::info!(
                "port {} already in use, assuming an externally managed driver",
                self.port
            );
            state.refs += 1;
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        log::info!("started {} (pid {})", self.program, child.id());

        if let Err(e) = self.wait_for_port() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        state.child = Some(child);
        state.refs = 1;
        Ok(())
    }

    fn wait_for_port(&self) -> Result<()> {
        let start = Instant::now();
        let deadline = start + self.ready_timeout;
        loop {
            if self.is_port_in_use() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    what: format!("{} to listen on port {}", self.program, self.port),
                    after_ms: now.duration_since(start).as_millis() as u64,
                });
            }
            std::thread::sleep(PROBE_INTERVAL.min(deadline - now));
        }
    }

    /// Drop a reference. The last one stops the daemon if it was spawned here.
    pub fn release(&self) {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return,
        };
        if state.refs == 0 {
            return;
        }
        state.refs -= 1;
        if state.refs > 0 {
            return;
        }
        if let Some(mut child) = state.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            log::info!("stopped {}", self.program);
        }
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if let Some(child) = state.child.as_mut() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn external_daemon_is_only_counted() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let d = DriverProcess::new("definitely-not-installed-driver", vec![], port);

        d.acquire().unwrap();
        d.acquire().unwrap();
        assert_eq!(d.ref_count(), 2);
        assert!(!d.owns_child());

        d.release();
        d.release();
        d.release();
        assert_eq!(d.ref_count(), 0);
    }

    #[test]
    fn spawn_failure_is_io_error() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let d = DriverProcess::new("definitely-not-installed-driver", vec![], port);
        assert!(matches!(d.acquire(), Err(Error::Io(_))));
        assert_eq!(d.ref_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn daemon_that_never_listens_is_killed() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let d = DriverProcess::new("sleep", vec!["5".to_string()], port)
            .with_ready_timeout(Duration::from_millis(300));
        let start = Instant::now();
        assert!(matches!(d.acquire(), Err(Error::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!d.owns_child());
        assert_eq!(d.ref_count(), 0);
    }

    #[test]
    fn global_targets_safaridriver() {
        assert_eq!(DriverProcess::global().port(), DEFAULT_DRIVER_PORT);
    }
}
