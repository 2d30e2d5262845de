//! Condition polling on top of a stateless request/response protocol.
//!
//! A wait repeatedly runs a boolean remote-script condition on a fixed
//! interval. Script failures while polling are transient (the page may be
//! mid-navigation); only the deadline or a tripped [`CancelToken`] ends a
//! wait unsuccessfully.

use crate::selectors::{lookup_expression, parse_selector};
use crate::{CancelToken, DriverConfig, Error, Result, ScriptValue};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Interval between condition checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Hard cap on any single wait
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(30);
/// Settle delay applied after `document.readyState === 'complete'` for
/// `networkidle` navigation. A heuristic, not real network monitoring.
pub const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);

pub const DOM_CONTENT_LOADED_CONDITION: &str =
    "return document.readyState === 'interactive' || document.readyState === 'complete';";
pub const LOAD_COMPLETE_CONDITION: &str = "return document.readyState === 'complete';";

/// Navigation completion semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The navigate command itself blocks until `load`
    #[default]
    Load,
    DomContentLoaded,
    /// `load` plus a fixed settle delay
    NetworkIdle,
}

impl FromStr for WaitUntil {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "load" => Ok(WaitUntil::Load),
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            other => Err(Error::InvalidArgument(format!(
                "invalid waitUntil option: {}",
                other
            ))),
        }
    }
}

/// Element state a selector wait can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    Attached,
    Detached,
    #[default]
    Visible,
    Hidden,
}

impl ElementState {
    /// Parse a state name. Unknown names mean `Visible`.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "attached" => ElementState::Attached,
            "detached" => ElementState::Detached,
            "hidden" => ElementState::Hidden,
            "visible" => ElementState::Visible,
            // Unknown names get the full visible check, opacity test included.
            other => {
                log::debug!("unknown element state '{}', waiting for visible", other);
                ElementState::Visible
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
        }
    }
}

/// Condition script that returns `true` once `selector` is in `state`.
pub fn element_state_condition(selector: &str, state: ElementState) -> String {
    let lookup = lookup_expression(&parse_selector(selector));
    let check = match state {
        ElementState::Attached => "return element !== null && element !== undefined;",
        ElementState::Detached => "return element === null || element === undefined;",
        ElementState::Visible => {
            "if (!element) return false;\n\
             if (element.offsetWidth === 0 || element.offsetHeight === 0) return false;\n\
             var style = window.getComputedStyle(element);\n\
             return style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0';"
        }
        ElementState::Hidden => {
            "if (!element) return true;\n\
             if (element.offsetWidth === 0 || element.offsetHeight === 0) return true;\n\
             var style = window.getComputedStyle(element);\n\
             return style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0';"
        }
    };
    format!("var element = {};\n{}", lookup, check)
}

/// Bounded poll loop
#[derive(Debug, Clone)]
pub struct Poller {
    pub interval: Duration,
    pub timeout: Duration,
    cancel: Option<CancelToken>,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            timeout: WAIT_TIMEOUT,
            cancel: None,
        }
    }
}

impl Poller {
    pub fn from_config(config: &DriverConfig, cancel: Option<CancelToken>) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_millis(config.wait_timeout_ms),
            cancel,
        }
    }

    /// Run `check` until it yields `true`.
    ///
    /// `check` receives the time left before the deadline and must not run
    /// longer than that. Returns `Timeout` no earlier than `timeout` after the
    /// start and no later than one interval past it; no check is started once
    /// the deadline has passed. Check errors are swallowed and polling
    /// continues.
    pub fn until_true<F>(&self, what: &str, mut check: F) -> Result<()>
    where
        F: FnMut(Duration) -> Result<ScriptValue>,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let timed_out = |now: Instant| Error::Timeout {
            what: what.to_string(),
            after_ms: now.duration_since(start).as_millis() as u64,
        };

        loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(Error::Cancelled);
            }

            let budget = deadline.saturating_duration_since(Instant::now());
            match check(budget) {
                Ok(v) if v.as_bool() == Some(true) => return Ok(()),
                Ok(_) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => log::debug!("condition check for {} failed, retrying: {}", what, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(now));
            }
            std::thread::sleep(self.interval.min(deadline - now));

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(now));
            }
        }
    }
}
