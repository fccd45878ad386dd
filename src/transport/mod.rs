//! Transports to the overlay host
//!
//! Two implementations of `core::io_traits::Transport`:
//! - `socket::SocketTransport`: JSON frames over a websocket, responses
//!   correlated by sequence number, reconnects forever
//! - `host::HostTransport`: in-process host with a string call-with-callback
//!   primitive and a single event callback slot
//!
//! Both share the outbound queue and the push dispatch table defined here.

pub mod host;
pub mod socket;

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::core::io_traits::{HandlerId, PushHandler};
use crate::core::protocol::{EventKind, PushEvent};

pub use host::{HostTransport, OverlayHost};
pub use socket::{SocketLink, SocketTransport, WsLink};

// =============================================================================
// OUTBOUND QUEUE
// =============================================================================

/// FIFO buffer for messages submitted before the channel is ready
///
/// Armed: `offer` keeps the item. Retired (after `open`): `offer` hands the
/// item back so the caller sends it directly.
#[derive(Debug)]
pub struct OutboundQueue<T> {
    pending: Option<VecDeque<T>>,
}

impl<T> OutboundQueue<T> {
    pub fn new() -> Self {
        Self {
            pending: Some(VecDeque::new()),
        }
    }

    pub fn is_retired(&self) -> bool {
        self.pending.is_none()
    }

    pub fn len(&self) -> usize {
        self.pending.as_ref().map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer the item, or return it if the queue is retired
    pub fn offer(&mut self, item: T) -> Option<T> {
        match self.pending.as_mut() {
            Some(queue) => {
                queue.push_back(item);
                None
            }
            None => Some(item),
        }
    }

    /// Retire the queue and return its contents in submission order
    pub fn open(&mut self) -> Vec<T> {
        self.pending
            .take()
            .map(|queue| queue.into_iter().collect())
            .unwrap_or_default()
    }

    /// Start buffering again from empty, returns the number of items dropped
    pub fn rearm(&mut self) -> usize {
        let dropped = self.len();
        self.pending = Some(VecDeque::new());
        dropped
    }
}

impl<T> Default for OutboundQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// PUSH DISPATCH
// =============================================================================

/// Event kind → handlers, called in registration order
pub struct PushDispatcher {
    handlers: BTreeMap<EventKind, Vec<(HandlerId, PushHandler)>>,
    next_id: u64,
    started: bool,
}

impl PushDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            next_id: 0,
            started: false,
        }
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: PushHandler) -> HandlerId {
        if self.started {
            warn!(
                kind = kind.as_str(),
                "[TRANSPORT] Listener registered after event delivery started, earlier events are not replayed"
            );
        }
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let mut removed = false;
        for list in self.handlers.values_mut() {
            let before = list.len();
            list.retain(|(h, _)| *h != id);
            removed |= list.len() != before;
        }
        self.handlers.retain(|_, list| !list.is_empty());
        removed
    }

    /// Kinds with at least one handler, in stable order
    pub fn subscribed_kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Deliver to every handler of the event's kind, returns how many ran
    pub fn dispatch(&mut self, event: &PushEvent) -> usize {
        let Some(list) = self.handlers.get_mut(&event.kind()) else {
            return 0;
        };
        for (_, handler) in list.iter_mut() {
            handler(event);
        }
        list.len()
    }
}

impl Default for PushDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RETRY TIMER
// =============================================================================

/// Fixed-interval gate for retry loops driven from `poll()`
#[derive(Debug, Clone)]
pub struct RetryTimer {
    interval: Duration,
    next_at: Option<Instant>,
}

impl RetryTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_at: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True on the first check and then once per interval
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_at {
            Some(at) if now < at => false,
            _ => {
                self.next_at = Some(now + self.interval);
                true
            }
        }
    }
}

// =============================================================================
// TRANSPORT SELECTION
// =============================================================================

/// Query parameter naming the socket endpoint
pub const OVERLAY_WS_PARAM: &str = "OVERLAY_WS";

/// Which transport the overlay should use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportChoice {
    Socket(String),
    Host,
    /// No telemetry, hotbar input only
    Manual,
}

/// Pick a transport from the overlay page query string
///
/// An `OVERLAY_WS=<url>` parameter wins, then an available host API.
pub fn select_transport(query: &str, host_available: bool) -> TransportChoice {
    let socket_url = query
        .split(['?', '&'])
        .skip(1)
        .find_map(|param| param.strip_prefix(OVERLAY_WS_PARAM)?.strip_prefix('='))
        .filter(|url| !url.is_empty());

    match socket_url {
        Some(url) => TransportChoice::Socket(url.to_string()),
        None if host_available => TransportChoice::Host,
        None => TransportChoice::Manual,
    }
}

// =============================================================================
// TESTS
// =============================================================================
