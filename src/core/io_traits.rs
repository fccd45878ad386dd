//! I/O traits for the trainer session
//!
//! The session talks to the overlay host only through `Transport`, so the
//! same session code runs over the socket, the in-process host callbacks,
//! or the mock used by tests.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde_json::Value;

use crate::core::protocol::{EventKind, OverlayCall, PushEvent};

// =============================================================================
// CONNECTION STATUS
// =============================================================================

/// Connection status of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Torn down, nothing will be delivered
    Disconnected,
    /// Waiting for the first open / for the host to become ready
    Connecting,
    /// Outbound messages go straight to the host
    Connected,
    /// Connection lost, attempting to reconnect
    Reconnecting,
}

// =============================================================================
// CALL RESULTS
// =============================================================================

/// Why a call produced no response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The connection closed before the response arrived
    Abandoned,
    /// The transport was dropped
    Closed,
    /// The response payload was not valid JSON
    Malformed(String),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Abandoned => write!(f, "Connection closed before the response arrived"),
            CallError::Closed => write!(f, "Transport closed"),
            CallError::Malformed(e) => write!(f, "Malformed response: {}", e),
        }
    }
}

impl std::error::Error for CallError {}

/// Response payload, `None` when the host answered with nothing
pub type CallResult = Result<Option<Value>, CallError>;

/// Completion side of a call, consumed by resolving it
#[derive(Debug)]
pub struct CallResolver {
    tx: Sender<CallResult>,
}

impl CallResolver {
    pub fn resolve(self, result: CallResult) {
        // Receiver may already be gone; nobody is waiting then
        let _ = self.tx.try_send(result);
    }
}

/// Caller side of a call
#[derive(Debug)]
pub struct PendingCall {
    rx: Receiver<CallResult>,
    outcome: Option<CallResult>,
}

impl PendingCall {
    /// Create a linked resolver / pending pair
    pub fn channel() -> (CallResolver, PendingCall) {
        let (tx, rx) = bounded(1);
        (
            CallResolver { tx },
            PendingCall { rx, outcome: None },
        )
    }

    /// Non-blocking check, `None` while still pending
    pub fn try_result(&mut self) -> Option<CallResult> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(result) => self.outcome = Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.outcome = Some(Err(CallError::Closed)),
            }
        }
        self.outcome.clone()
    }

    /// Block up to `timeout` for the result
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<CallResult> {
        if self.outcome.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(result) => self.outcome = Some(result),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.outcome = Some(Err(CallError::Closed))
                }
            }
        }
        self.outcome.clone()
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_result().is_some()
    }
}

// =============================================================================
// PUSH HANDLERS
// =============================================================================

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

pub type PushHandler = Box<dyn FnMut(&PushEvent)>;

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// Message channel to the overlay host
///
/// Messages submitted before the transport is ready are queued and flushed
/// in submission order once it is. Push events are delivered to handlers
/// from `poll()`, on the caller's thread.
pub trait Transport {
    fn status(&self) -> ConnectionStatus;

    fn is_ready(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Fire-and-forget
    fn send(&mut self, call: OverlayCall);

    /// Request with a response
    fn call(&mut self, call: OverlayCall) -> PendingCall;

    /// Register a handler for one event kind
    fn subscribe(&mut self, kind: EventKind, handler: PushHandler) -> HandlerId;

    /// Remove a handler, false if the id is unknown
    fn unsubscribe(&mut self, id: HandlerId) -> bool;

    /// Ask the host to start pushing every subscribed kind
    fn start_events(&mut self);

    /// Pump connection events, returns the number of inbound messages handled
    fn poll(&mut self) -> usize;
}

// =============================================================================
// MOCK IMPLEMENTATIONS FOR TESTING
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================
