//! Per-action lifecycle: idle -> loading -> success/error -> idle.

use std::cell::RefCell;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

use super::timer::{TimerId, TimerQueue};

/// Shown when an action fails without a usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Operation failed";

/// Shown when an action panics.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Loading,
    Success,
    Error(String),
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Idle => "idle",
            OperationState::Loading => "loading",
            OperationState::Success => "success",
            OperationState::Error(_) => "error",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            OperationState::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationState::Error(message) => write!(f, "error: {message}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// How long success and error states stay visible before returning to idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetDelays {
    pub success: Duration,
    pub error: Duration,
}

impl Default for ResetDelays {
    fn default() -> Self {
        Self {
            success: Duration::from_millis(2000),
            error: Duration::from_millis(4000),
        }
    }
}

type Listener = Rc<dyn Fn(&OperationState)>;

struct Inner {
    state: OperationState,
    generation: u64,
    pending_reset: Option<TimerId>,
    listeners: Vec<Listener>,
}

/// State machine for one UI action. Instances never share state or timers;
/// dropping one cancels its pending auto-reset.
pub struct Operation {
    label: String,
    timers: Rc<TimerQueue>,
    delays: ResetDelays,
    inner: Rc<RefCell<Inner>>,
}

impl Operation {
    pub fn new(label: impl Into<String>, timers: Rc<TimerQueue>, delays: ResetDelays) -> Self {
        Self {
            label: label.into(),
            timers,
            delays,
            inner: Rc::new(RefCell::new(Inner {
                state: OperationState::Idle,
                generation: 0,
                pending_reset: None,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> OperationState {
        self.inner.borrow().state.clone()
    }

    pub fn has_pending_reset(&self) -> bool {
        self.inner.borrow().pending_reset.is_some()
    }

    /// Observe every state transition of this operation.
    pub fn subscribe(&self, listener: impl Fn(&OperationState) + 'static) {
        self.inner.borrow_mut().listeners.push(Rc::new(listener));
    }

    /// Run `action`, moving through loading into success or error.
    ///
    /// A pending auto-reset is cancelled first. If the action triggers this
    /// operation again before settling, the older settlement is discarded.
    /// Errors and panics never escape; they become the error state.
    pub fn trigger<F, E>(&self, action: F) -> OperationState
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        self.cancel_reset();
        let generation = {
            let mut inner = self.inner.borrow_mut();
            inner.generation += 1;
            inner.generation
        };
        set_state(&self.label, &self.inner, OperationState::Loading);

        let outcome = panic::catch_unwind(AssertUnwindSafe(action));

        if self.inner.borrow().generation != generation {
            warn!(operation = %self.label, "discarding result of superseded trigger");
            return self.state();
        }

        let (next, delay) = match outcome {
            Ok(Ok(())) => (OperationState::Success, self.delays.success),
            Ok(Err(err)) => (OperationState::Error(error_text(&err)), self.delays.error),
            Err(payload) => {
                warn!(operation = %self.label, panic = panic_text(payload.as_ref()), "action panicked");
                (
                    OperationState::Error(UNEXPECTED_ERROR_MESSAGE.to_string()),
                    self.delays.error,
                )
            }
        };
        set_state(&self.label, &self.inner, next);
        // A listener may have triggered again while observing the settlement.
        if self.inner.borrow().generation != generation {
            debug!(operation = %self.label, "settlement superseded by listener");
            return self.state();
        }
        self.schedule_reset(generation, delay);
        self.state()
    }

    fn schedule_reset(&self, generation: u64, delay: Duration) {
        let weak: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
        let label = self.label.clone();
        let id = self.timers.schedule(delay, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut guard = inner.borrow_mut();
                if guard.generation != generation {
                    return;
                }
                guard.pending_reset = None;
            }
            set_state(&label, &inner, OperationState::Idle);
        });
        self.inner.borrow_mut().pending_reset = Some(id);
    }

    fn cancel_reset(&self) {
        let pending = self.inner.borrow_mut().pending_reset.take();
        if let Some(id) = pending {
            self.timers.cancel(id);
            debug!(operation = %self.label, "cancelled pending reset");
        }
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        self.cancel_reset();
    }
}

fn set_state(label: &str, inner: &RefCell<Inner>, state: OperationState) {
    let listeners = {
        let mut guard = inner.borrow_mut();
        guard.state = state.clone();
        guard.listeners.clone()
    };
    debug!(operation = label, state = state.as_str(), "state transition");
    for listener in listeners {
        listener(&state);
    }
}

fn error_text(err: &dyn Display) -> String {
    let text = err.to_string();
    if text.trim().is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        text
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text
    } else {
        "non-string panic payload"
    }
}
