//! In-process overlay host transport
//!
//! The host exposes a string call-with-callback primitive and a single
//! event callback slot. It may not be ready when the overlay starts, so
//! readiness is re-checked on a fixed interval from `poll()` and messages
//! queue until then.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::{OutboundQueue, PushDispatcher, RetryTimer};
use crate::core::constants::HOST_POLL_INTERVAL;
use crate::core::io_traits::{
    CallError, CallResult, ConnectionStatus, HandlerId, PendingCall, PushHandler, Transport,
};
use crate::core::protocol::{EventKind, OverlayCall, PushEvent};

/// Response continuation handed to the host; `None` means no payload
pub type HostCallback = Box<dyn FnOnce(Option<String>) + Send>;

/// Receives every pushed event as a JSON string
pub type HostEventSink = Box<dyn FnMut(String) + Send>;

/// Host-side API surface
pub trait OverlayHost {
    fn is_ready(&self) -> bool;

    /// Deliver a JSON request; the host invokes `callback` once with its answer
    fn call_handler(&mut self, payload: String, callback: HostCallback);

    /// Install the push event slot, replacing any previous one
    fn set_event_callback(&mut self, sink: HostEventSink);
}

/// Transport over an `OverlayHost`
pub struct HostTransport<H> {
    host: H,
    queue: OutboundQueue<(String, HostCallback)>,
    events_tx: Sender<String>,
    events_rx: Receiver<String>,
    dispatcher: PushDispatcher,
    status: ConnectionStatus,
    readiness: RetryTimer,
}

impl<H: OverlayHost> HostTransport<H> {
    pub fn new(host: H) -> Self {
        Self::with_poll_interval(host, HOST_POLL_INTERVAL)
    }

    pub fn with_poll_interval(host: H, interval: Duration) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            host,
            queue: OutboundQueue::new(),
            events_tx,
            events_rx,
            dispatcher: PushDispatcher::new(),
            status: ConnectionStatus::Connecting,
            readiness: RetryTimer::new(interval),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Delay between readiness checks while the host is not ready
    pub fn poll_interval(&self) -> Duration {
        self.readiness.interval()
    }

    fn submit(&mut self, payload: String, callback: HostCallback) {
        if let Some((payload, callback)) = self.queue.offer((payload, callback)) {
            self.host.call_handler(payload, callback);
        }
    }

    fn submit_call(&mut self, call: &OverlayCall, callback: HostCallback) {
        match serde_json::to_string(call) {
            Ok(payload) => self.submit(payload, callback),
            Err(e) => {
                error!(error = %e, "[HOST] Failed to encode message");
                callback(None);
            }
        }
    }

    fn check_ready(&mut self) {
        if self.status == ConnectionStatus::Connected {
            return;
        }
        if !self.readiness.due(Instant::now()) || !self.host.is_ready() {
            return;
        }

        self.status = ConnectionStatus::Connected;
        let tx = self.events_tx.clone();
        self.host.set_event_callback(Box::new(move |text| {
            let _ = tx.send(text);
        }));

        let queued = self.queue.open();
        info!(queued = queued.len(), "[HOST] Overlay API ready");
        for (payload, callback) in queued {
            self.host.call_handler(payload, callback);
        }
    }
}

/// Turn the host's raw answer into a call result
fn parse_response(data: Option<String>) -> CallResult {
    match data {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| CallError::Malformed(e.to_string())),
    }
}

impl<H: OverlayHost> Transport for HostTransport<H> {
    fn status(&self) -> ConnectionStatus {
        self.status
    }

    fn send(&mut self, call: OverlayCall) {
        self.submit_call(&call, Box::new(|_| {}));
    }

    fn call(&mut self, call: OverlayCall) -> PendingCall {
        let (resolver, pending) = PendingCall::channel();
        self.submit_call(
            &call,
            Box::new(move |data| resolver.resolve(parse_response(data))),
        );
        pending
    }

    fn subscribe(&mut self, kind: EventKind, handler: PushHandler) -> HandlerId {
        self.dispatcher.subscribe(kind, handler)
    }

    fn unsubscribe(&mut self, id: HandlerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    fn start_events(&mut self) {
        self.dispatcher.mark_started();
        let events = self.dispatcher.subscribed_kinds();
        self.send(OverlayCall::Subscribe { events });
    }

    fn poll(&mut self) -> usize {
        self.check_ready();

        let mut handled = 0;
        while let Ok(text) = self.events_rx.try_recv() {
            handled += 1;
            match serde_json::from_str::<PushEvent>(&text) {
                Ok(event) => {
                    self.dispatcher.dispatch(&event);
                }
                Err(e) => debug!(error = %e, "[HOST] Ignoring unhandled event"),
            }
        }
        handled
    }
}

// =============================================================================
// MOCK IMPLEMENTATIONS FOR TESTING
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::mocks::MockHost;
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn transport() -> HostTransport<MockHost> {
        HostTransport::with_poll_interval(MockHost::new(), Duration::ZERO)
    }

    // -------------------------------------------------------------------------
    // Readiness
    // -------------------------------------------------------------------------

    #[test]
    fn test_queue_until_host_ready() {
        let mut transport = transport();
        transport.send(OverlayCall::GetLanguage);
        transport.send(OverlayCall::Subscribe {
            events: vec![EventKind::LogLine],
        });
        transport.poll();
        assert_eq!(transport.status(), ConnectionStatus::Connecting);
        assert!(transport.host().calls.is_empty());
        assert_eq!(transport.queued(), 2);

        transport.host_mut().ready = true;
        transport.poll();
        assert!(transport.is_ready());
        let payloads = transport.host().payloads();
        assert_eq!(payloads[0]["call"], "getLanguage");
        assert_eq!(payloads[1]["call"], "subscribe");
        assert!(transport.host().sink.is_some());

        transport.send(OverlayCall::GetLanguage);
        assert_eq!(transport.host().calls.len(), 3);
    }

    #[test]
    fn test_readiness_checked_on_interval() {
        let mut transport =
            HostTransport::with_poll_interval(MockHost::new(), Duration::from_secs(3600));
        transport.poll();
        transport.host_mut().ready = true;
        transport.poll();
        // Next check is an hour away
        assert_eq!(transport.status(), ConnectionStatus::Connecting);
        assert_eq!(transport.poll_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_default_poll_interval() {
        let transport = HostTransport::new(MockHost::new());
        assert_eq!(transport.poll_interval(), HOST_POLL_INTERVAL);
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    #[test]
    fn test_call_parses_response() {
        let mut transport = transport();
        transport.host_mut().ready = true;
        transport.poll();

        let mut call = transport.call(OverlayCall::GetLanguage);
        assert!(call.try_result().is_none());
        transport
            .host_mut()
            .answer(0, Some(r#"{"language": "French"}"#));
        assert_eq!(
            call.try_result(),
            Some(Ok(Some(json!({"language": "French"}))))
        );
    }

    #[test]
    fn test_null_payload_resolves_to_none() {
        let mut transport = transport();
        transport.host_mut().ready = true;
        transport.poll();

        let mut call = transport.call(OverlayCall::GetLanguage);
        transport.host_mut().answer(0, None);
        assert_eq!(call.try_result(), Some(Ok(None)));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let mut transport = transport();
        transport.host_mut().ready = true;
        transport.poll();

        let mut call = transport.call(OverlayCall::GetLanguage);
        transport.host_mut().answer(0, Some("<html>"));
        assert!(matches!(
            call.try_result(),
            Some(Err(CallError::Malformed(_)))
        ));
    }

    #[test]
    fn test_queued_call_keeps_its_callback() {
        let mut transport = transport();
        let mut call = transport.call(OverlayCall::GetLanguage);
        transport.host_mut().ready = true;
        transport.poll();

        transport.host_mut().answer(0, Some("{}"));
        assert_eq!(call.try_result(), Some(Ok(Some(json!({})))));
    }

    // -------------------------------------------------------------------------
    // Push events
    // -------------------------------------------------------------------------

    #[test]
    fn test_events_dispatched_on_poll() {
        let mut transport = transport();
        let players = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&players);
        transport.subscribe(
            EventKind::ChangePrimaryPlayer,
            Box::new(move |event: &PushEvent| {
                if let PushEvent::ChangePrimaryPlayer { char_id, .. } = event {
                    sink.borrow_mut().push(*char_id);
                }
            }),
        );
        transport.start_events();
        transport.host_mut().ready = true;
        transport.poll();

        assert_eq!(
            transport.host().payloads()[0],
            json!({"call": "subscribe", "events": ["ChangePrimaryPlayer"]})
        );

        transport
            .host_mut()
            .emit(r#"{"type": "ChangePrimaryPlayer", "charID": 42, "charName": "A"}"#);
        transport.host_mut().emit("garbage");
        // Delivered on the caller's thread, not inside the host callback
        assert!(players.borrow().is_empty());

        assert_eq!(transport.poll(), 2);
        assert_eq!(*players.borrow(), vec![42]);
    }
}
