//! Websocket transport to the overlay host
//!
//! `WsLink` owns the I/O thread (connect, read loop, fixed-delay reconnect)
//! and reports connection events over a channel. `SocketTransport` sits on
//! the caller's thread: it queues messages until the link opens, stamps
//! calls with sequence numbers, resolves responses and dispatches pushed
//! events.
//!
//! Every frame handed to the link carries an increasing frame id. The link
//! reports a watermark with `Opened` and `Closed`: every frame below it was
//! consumed by a connection that is now gone, or discarded before a new one
//! opened. Only calls whose frame is below the watermark are abandoned, so a
//! call that already reached the next connection keeps waiting for its answer.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use serde_json::Value;
use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

use super::{OutboundQueue, PushDispatcher};
use crate::core::io_traits::{
    CallError, CallResolver, ConnectionStatus, HandlerId, PendingCall, PushHandler, Transport,
};
use crate::core::protocol::{Envelope, EventKind, OverlayCall, PushEvent, SEQUENCE_FIELD};

// =============================================================================
// LINK
// =============================================================================

/// Connection events reported by a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connection established; frames below `watermark` were discarded
    Opened { watermark: u64 },
    /// Text frame received
    Frame(String),
    /// Open connection lost, a reconnect follows; frames below `watermark`
    /// went to the lost connection
    Closed { reason: String, watermark: u64 },
    /// Connection attempt failed, a retry follows
    Failed(String),
    /// Link is gone for good, nothing follows
    Stopped,
}

/// Raw frame channel underneath `SocketTransport`
pub trait SocketLink {
    /// Hand a frame to the link; `frame` ids increase with every call
    fn send_text(&mut self, frame: u64, text: String);

    /// Next connection event, non-blocking
    fn poll_event(&mut self) -> Option<LinkEvent>;
}

/// Commands (caller thread -> WS thread)
#[derive(Debug)]
enum LinkCommand {
    Send { frame: u64, text: String },
    Shutdown,
}

/// Websocket link backed by a dedicated I/O thread
pub struct WsLink {
    tx: Sender<LinkCommand>,
    rx: Option<Receiver<LinkEvent>>,
    thread_handle: Option<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
}

impl WsLink {
    /// Start connecting in the background
    pub fn spawn(url: String, reconnect_delay: Duration) -> Self {
        let (command_tx, command_rx) = bounded::<LinkCommand>(256);
        let (event_tx, event_rx) = bounded::<LinkEvent>(256);
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let thread_flag = Arc::clone(&shutdown_flag);
        let handle = thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                link_thread(&url, reconnect_delay, &command_rx, &event_tx, &thread_flag);
            }));

            if let Err(panic_info) = result {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("WS thread panic: {}", s)
                } else {
                    "WS thread panic".to_string()
                };
                error!("{}", msg);
            }
        });

        Self {
            tx: command_tx,
            rx: Some(event_rx),
            thread_handle: Some(handle),
            shutdown_flag,
        }
    }
}

impl SocketLink for WsLink {
    fn send_text(&mut self, frame: u64, text: String) {
        if let Err(e) = self.tx.try_send(LinkCommand::Send { frame, text }) {
            warn!("[WS] Failed to queue message: {}", e);
        }
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        match self.rx.as_ref()?.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(LinkEvent::Stopped)
            }
        }
    }
}

impl Drop for WsLink {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = self.tx.try_send(LinkCommand::Shutdown);
        // Unblocks a thread waiting on a full event channel
        self.rx = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// WEBSOCKET THREAD
// =============================================================================

fn link_thread(
    url: &str,
    reconnect_delay: Duration,
    command_rx: &Receiver<LinkCommand>,
    event_tx: &Sender<LinkEvent>,
    shutdown_flag: &AtomicBool,
) {
    // One past the highest frame id taken off the command channel
    let mut watermark = 0u64;

    loop {
        if shutdown_flag.load(Ordering::SeqCst) {
            break;
        }

        info!(url = %url, "[WS] Connecting...");
        match connect(url) {
            Ok((mut socket, _)) => {
                info!("[WS] Connected");

                // Frames issued while the previous connection was dying were
                // meant for it; the watermark tells the transport they are gone
                let mut drained = 0u32;
                while let Ok(command) = command_rx.try_recv() {
                    match command {
                        LinkCommand::Shutdown => {
                            let _ = socket.close(None);
                            return;
                        }
                        LinkCommand::Send { frame, .. } => {
                            watermark = watermark.max(frame + 1);
                            drained += 1;
                        }
                    }
                }
                if drained > 0 {
                    info!(count = drained, "[WS] Drained stale outgoing messages");
                }

                if event_tx.send(LinkEvent::Opened { watermark }).is_err() {
                    let _ = socket.close(None);
                    return;
                }

                let result = message_loop(
                    &mut socket,
                    command_rx,
                    event_tx,
                    shutdown_flag,
                    &mut watermark,
                );
                let _ = socket.close(None);

                match result {
                    Ok(()) => break,
                    Err(reason) => {
                        info!(reason = %reason, "[WS] Disconnected");
                        if shutdown_flag.load(Ordering::SeqCst)
                            || event_tx
                                .send(LinkEvent::Closed { reason, watermark })
                                .is_err()
                        {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "[WS] Connection failed");
                if event_tx.send(LinkEvent::Failed(e.to_string())).is_err() {
                    break;
                }
            }
        }

        if shutdown_flag.load(Ordering::SeqCst) {
            break;
        }

        info!(delay_ms = reconnect_delay.as_millis() as u64, "[WS] Trying to reconnect...");
        thread::sleep(reconnect_delay);
    }

    debug!("[WS] Link thread stopped");
}

/// Pump frames until shutdown (`Ok`) or connection loss (`Err`)
fn message_loop(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    command_rx: &Receiver<LinkCommand>,
    event_tx: &Sender<LinkEvent>,
    shutdown_flag: &AtomicBool,
    watermark: &mut u64,
) -> Result<(), String> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_nonblocking(true);
        }
        MaybeTlsStream::NativeTls(tls) => {
            let _ = tls.get_ref().set_nonblocking(true);
        }
        _ => {}
    }

    loop {
        if shutdown_flag.load(Ordering::SeqCst) {
            return Ok(());
        }

        loop {
            match command_rx.try_recv() {
                Ok(LinkCommand::Send { frame, text }) => {
                    *watermark = (*watermark).max(frame + 1);
                    socket
                        .send(Message::Text(text))
                        .map_err(|e| format!("Send: {}", e))?;
                }
                Ok(LinkCommand::Shutdown) => return Ok(()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => {
                if event_tx.send(LinkEvent::Frame(text)).is_err() {
                    return Ok(());
                }
                continue;
            }
            Ok(Message::Close(_)) => return Err("Server closed".to_string()),
            Ok(_) => continue,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(format!("Read error: {}", e)),
        }

        thread::sleep(Duration::from_millis(10));
    }
}

// =============================================================================
// SOCKET TRANSPORT
// =============================================================================

/// Outstanding call: its resolver and the frame that carried it, once sent
struct InFlight {
    resolver: CallResolver,
    frame: Option<u64>,
}

/// Sequence-correlated transport over a `SocketLink`
pub struct SocketTransport<L> {
    link: L,
    /// Encoded frames with the call sequence they carry, if any
    queue: OutboundQueue<(String, Option<u64>)>,
    pending: HashMap<u64, InFlight>,
    /// Never reset, so a response from a dead connection cannot match a new call
    next_sequence: u64,
    next_frame: u64,
    dispatcher: PushDispatcher,
    status: ConnectionStatus,
}

impl SocketTransport<WsLink> {
    /// Connect to `url` on a background thread
    pub fn connect(url: &str, reconnect_delay: Duration) -> Self {
        Self::with_link(WsLink::spawn(url.to_string(), reconnect_delay))
    }
}

impl<L: SocketLink> SocketTransport<L> {
    pub fn with_link(link: L) -> Self {
        Self {
            link,
            queue: OutboundQueue::new(),
            pending: HashMap::new(),
            next_sequence: 0,
            next_frame: 0,
            dispatcher: PushDispatcher::new(),
            status: ConnectionStatus::Connecting,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Calls still waiting for a response
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn submit(&mut self, text: String, sequence: Option<u64>) {
        if let Some((text, sequence)) = self.queue.offer((text, sequence)) {
            self.transmit(text, sequence);
        }
    }

    fn transmit(&mut self, text: String, sequence: Option<u64>) {
        let frame = self.next_frame;
        self.next_frame += 1;
        if let Some(call) = sequence.and_then(|seq| self.pending.get_mut(&seq)) {
            call.frame = Some(frame);
        }
        self.link.send_text(frame, text);
    }

    fn subscribe_frame(&self) -> Option<String> {
        let call = OverlayCall::Subscribe {
            events: self.dispatcher.subscribed_kinds(),
        };
        encode(&Envelope::fire_and_forget(call))
    }

    /// Reject every call whose frame is below `watermark`
    fn abandon_before(&mut self, watermark: u64) -> usize {
        let lost: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, call)| call.frame.is_some_and(|frame| frame < watermark))
            .map(|(&sequence, _)| sequence)
            .collect();
        for sequence in &lost {
            if let Some(call) = self.pending.remove(sequence) {
                call.resolver.resolve(Err(CallError::Abandoned));
            }
        }
        lost.len()
    }

    fn handle_open(&mut self, watermark: u64) {
        self.status = ConnectionStatus::Connected;
        let discarded = self.abandon_before(watermark);
        let queued = self.queue.open();
        info!(queued = queued.len(), discarded, "[WS] Connected!");
        for (text, sequence) in queued {
            self.transmit(text, sequence);
        }
    }

    fn handle_close(&mut self, reason: &str, watermark: u64) {
        self.status = ConnectionStatus::Reconnecting;
        let dropped = self.queue.rearm();
        let abandoned = self.abandon_before(watermark);
        info!(
            reason = %reason,
            dropped,
            abandoned,
            "[WS] Connection lost, trying to reconnect..."
        );

        // The host forgets subscriptions with the connection
        if self.dispatcher.is_started() {
            if let Some(text) = self.subscribe_frame() {
                self.queue.offer((text, None));
            }
        }
    }

    fn handle_stop(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        for (_, call) in self.pending.drain() {
            call.resolver.resolve(Err(CallError::Closed));
        }
        warn!("[WS] Link stopped, no more messages will be delivered");
    }

    fn handle_frame(&mut self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "[WS] Invalid message received");
                return;
            }
        };

        if let Some(sequence) = value.get(SEQUENCE_FIELD).and_then(Value::as_u64) {
            if let Some(call) = self.pending.remove(&sequence) {
                call.resolver.resolve(Ok(Some(value)));
                return;
            }
        }

        match serde_json::from_value::<PushEvent>(value) {
            Ok(event) => {
                self.dispatcher.dispatch(&event);
            }
            Err(e) => debug!(error = %e, "[WS] Ignoring unhandled message"),
        }
    }
}

fn encode(envelope: &Envelope) -> Option<String> {
    match serde_json::to_string(envelope) {
        Ok(text) => Some(text),
        Err(e) => {
            error!(error = %e, "[WS] Failed to encode message");
            None
        }
    }
}

impl<L: SocketLink> Transport for SocketTransport<L> {
    fn status(&self) -> ConnectionStatus {
        self.status
    }

    fn send(&mut self, call: OverlayCall) {
        if let Some(text) = encode(&Envelope::fire_and_forget(call)) {
            self.submit(text, None);
        }
    }

    fn call(&mut self, call: OverlayCall) -> PendingCall {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let (resolver, pending) = PendingCall::channel();
        match encode(&Envelope::correlated(call, sequence)) {
            Some(text) => {
                self.pending.insert(
                    sequence,
                    InFlight {
                        resolver,
                        frame: None,
                    },
                );
                self.submit(text, Some(sequence));
            }
            None => resolver.resolve(Err(CallError::Malformed(
                "request could not be encoded".to_string(),
            ))),
        }
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
        if let Some(text) = self.subscribe_frame() {
            self.submit(text, None);
        }
    }

    fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.link.poll_event() {
            handled += 1;
            match event {
                LinkEvent::Opened { watermark } => self.handle_open(watermark),
                LinkEvent::Frame(text) => self.handle_frame(&text),
                LinkEvent::Closed { reason, watermark } => self.handle_close(&reason, watermark),
                LinkEvent::Stopped => self.handle_stop(),
                LinkEvent::Failed(reason) => {
                    // Never opened: the queue is kept for the next attempt
                    debug!(reason = %reason, "[WS] Connection attempt failed");
                    if self.status != ConnectionStatus::Connecting {
                        self.status = ConnectionStatus::Reconnecting;
                    }
                }
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
    use super::mocks::MockLink;
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn transport() -> SocketTransport<MockLink> {
        SocketTransport::with_link(MockLink::new())
    }

    fn push(transport: &mut SocketTransport<MockLink>, event: LinkEvent) {
        transport.link_mut().events.push_back(event);
        transport.poll();
    }

    /// Link reports everything sent so far as consumed
    fn open(transport: &mut SocketTransport<MockLink>) {
        let watermark = transport.link().sent.len() as u64;
        push(transport, LinkEvent::Opened { watermark });
    }

    fn close(transport: &mut SocketTransport<MockLink>) {
        let watermark = transport.link().sent.len() as u64;
        push(
            transport,
            LinkEvent::Closed {
                reason: "reset".into(),
                watermark,
            },
        );
    }

    fn frame(value: Value) -> LinkEvent {
        LinkEvent::Frame(value.to_string())
    }

    // -------------------------------------------------------------------------
    // Queueing
    // -------------------------------------------------------------------------

    #[test]
    fn test_messages_queued_until_open() {
        let mut transport = transport();
        transport.send(OverlayCall::GetLanguage);
        transport.send(OverlayCall::Subscribe {
            events: vec![EventKind::LogLine],
        });
        assert!(transport.link().sent.is_empty());
        assert_eq!(transport.queued(), 2);
        assert_eq!(transport.status(), ConnectionStatus::Connecting);

        open(&mut transport);
        assert!(transport.is_ready());
        let sent = transport.link().sent_json();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["call"], "getLanguage");
        assert_eq!(sent[1]["call"], "subscribe");

        // Direct once open
        transport.send(OverlayCall::GetLanguage);
        assert_eq!(transport.link().sent.len(), 3);
    }

    #[test]
    fn test_failed_attempt_keeps_queue() {
        let mut transport = transport();
        transport.send(OverlayCall::GetLanguage);
        push(&mut transport, LinkEvent::Failed("refused".into()));
        push(&mut transport, LinkEvent::Failed("refused".into()));
        assert_eq!(transport.queued(), 1);

        open(&mut transport);
        assert_eq!(transport.link().sent.len(), 1);
    }

    #[test]
    fn test_close_resets_queue_and_reconnects() {
        let mut transport = transport();
        open(&mut transport);
        close(&mut transport);
        assert_eq!(transport.status(), ConnectionStatus::Reconnecting);

        transport.send(OverlayCall::GetLanguage);
        assert_eq!(transport.queued(), 1);
        assert!(transport.link().sent.is_empty());

        open(&mut transport);
        assert_eq!(transport.link().sent.len(), 1);
    }

    // -------------------------------------------------------------------------
    // Correlation
    // -------------------------------------------------------------------------

    #[test]
    fn test_call_resolves_by_sequence() {
        let mut transport = transport();
        open(&mut transport);

        let mut first = transport.call(OverlayCall::GetLanguage);
        let mut second = transport.call(OverlayCall::GetLanguage);
        let sent = transport.link().sent_json();
        assert_eq!(sent[0]["rseq"], 0);
        assert_eq!(sent[1]["rseq"], 1);
        assert_eq!(transport.pending_calls(), 2);

        push(&mut transport, frame(json!({"rseq": 1, "language": "German"})));
        assert!(first.try_result().is_none());
        let result = second.try_result().unwrap().unwrap().unwrap();
        assert_eq!(result["language"], "German");
        assert_eq!(transport.pending_calls(), 1);

        // A second response with the same number is not a response anymore
        push(&mut transport, frame(json!({"rseq": 1, "language": "German"})));
        assert_eq!(transport.pending_calls(), 1);
    }

    #[test]
    fn test_fire_and_forget_has_no_sequence() {
        let mut transport = transport();
        open(&mut transport);
        transport.send(OverlayCall::GetLanguage);
        assert!(transport.link().sent_json()[0].get("rseq").is_none());
    }

    #[test]
    fn test_close_abandons_pending_calls() {
        let mut transport = transport();
        open(&mut transport);
        let mut call = transport.call(OverlayCall::GetLanguage);

        close(&mut transport);
        assert_eq!(call.try_result(), Some(Err(CallError::Abandoned)));
        assert_eq!(transport.pending_calls(), 0);
    }

    #[test]
    fn test_sequence_continues_across_reconnect() {
        let mut transport = transport();
        open(&mut transport);
        let _ = transport.call(OverlayCall::GetLanguage);
        close(&mut transport);
        open(&mut transport);

        let mut call = transport.call(OverlayCall::GetLanguage);
        let sent = transport.link().sent_json();
        assert_eq!(sent.last().unwrap()["rseq"], 1);

        // Late answer for the abandoned call matches nothing
        push(&mut transport, frame(json!({"rseq": 0})));
        assert!(call.try_result().is_none());
    }

    #[test]
    fn test_call_on_new_connection_survives_late_close() {
        let mut transport = transport();
        open(&mut transport);
        let mut lost = transport.call(OverlayCall::GetLanguage);

        // The link already reconnected; the caller has not polled yet
        transport.link_mut().events.push_back(LinkEvent::Closed {
            reason: "reset".into(),
            watermark: 1,
        });
        transport
            .link_mut()
            .events
            .push_back(LinkEvent::Opened { watermark: 1 });
        let mut fresh = transport.call(OverlayCall::GetLanguage);
        assert_eq!(transport.link().frames, vec![0, 1]);
        transport.poll();

        assert_eq!(lost.try_result(), Some(Err(CallError::Abandoned)));
        assert!(fresh.try_result().is_none());
        assert_eq!(transport.pending_calls(), 1);

        push(&mut transport, frame(json!({"rseq": 1, "language": "French"})));
        let result = fresh.try_result().unwrap().unwrap().unwrap();
        assert_eq!(result["language"], "French");
    }

    #[test]
    fn test_call_drained_during_reconnect_abandoned_on_open() {
        let mut transport = transport();
        open(&mut transport);

        // Sent after the connection dropped, discarded by the next connect
        transport.link_mut().events.push_back(LinkEvent::Closed {
            reason: "reset".into(),
            watermark: 0,
        });
        let mut call = transport.call(OverlayCall::GetLanguage);
        transport
            .link_mut()
            .events
            .push_back(LinkEvent::Opened { watermark: 1 });
        transport.poll();

        assert_eq!(call.try_result(), Some(Err(CallError::Abandoned)));
        assert_eq!(transport.pending_calls(), 0);
        assert!(transport.is_ready());
    }

    #[test]
    fn test_stopped_link_closes_calls() {
        let mut transport = transport();
        open(&mut transport);
        let mut call = transport.call(OverlayCall::GetLanguage);
        push(&mut transport, LinkEvent::Stopped);
        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
        assert!(!transport.is_ready());
        assert_eq!(call.try_result(), Some(Err(CallError::Closed)));
    }

    #[test]
    fn test_dropping_transport_closes_calls() {
        let mut transport = transport();
        let mut call = transport.call(OverlayCall::GetLanguage);
        drop(transport);
        assert_eq!(call.try_result(), Some(Err(CallError::Closed)));
    }

    // -------------------------------------------------------------------------
    // Push events
    // -------------------------------------------------------------------------

    #[test]
    fn test_push_event_dispatched() {
        let mut transport = transport();
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        transport.subscribe(
            EventKind::LogLine,
            Box::new(move |event: &PushEvent| {
                if let PushEvent::LogLine { line, .. } = event {
                    sink.borrow_mut().push(line.clone());
                }
            }),
        );
        open(&mut transport);
        push(
            &mut transport,
            frame(json!({"type": "LogLine", "line": ["21", "ts"], "rawLine": "21|ts"})),
        );
        assert_eq!(*lines.borrow(), vec![vec!["21".to_string(), "ts".to_string()]]);
    }

    #[test]
    fn test_invalid_frames_skipped() {
        let mut transport = transport();
        let hits = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&hits);
        transport.subscribe(
            EventKind::ChangeZone,
            Box::new(move |_: &PushEvent| *sink.borrow_mut() += 1),
        );
        open(&mut transport);
        push(&mut transport, LinkEvent::Frame("{not json".into()));
        push(&mut transport, frame(json!({"type": "Unknown"})));
        push(&mut transport, frame(json!({"type": "ChangeZone", "zoneID": 1})));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_start_events_subscribes_registered_kinds() {
        let mut transport = transport();
        transport.subscribe(EventKind::ChangePrimaryPlayer, Box::new(|_: &PushEvent| {}));
        transport.subscribe(EventKind::LogLine, Box::new(|_: &PushEvent| {}));
        transport.start_events();
        open(&mut transport);

        let sent = transport.link().sent_json();
        assert_eq!(
            sent[0],
            json!({"call": "subscribe", "events": ["LogLine", "ChangePrimaryPlayer"]})
        );
    }

    #[test]
    fn test_subscription_renewed_after_reconnect() {
        let mut transport = transport();
        transport.subscribe(EventKind::LogLine, Box::new(|_: &PushEvent| {}));
        transport.start_events();
        open(&mut transport);
        close(&mut transport);
        open(&mut transport);

        let sent = transport.link().sent_json();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1]["call"], "subscribe");
    }

    #[test]
    fn test_poll_counts_events() {
        let mut transport = transport();
        transport
            .link_mut()
            .events
            .push_back(LinkEvent::Opened { watermark: 0 });
        transport
            .link_mut()
            .events
            .push_back(frame(json!({"type": "ChangeZone", "zoneID": 1})));
        assert_eq!(transport.poll(), 2);
        assert_eq!(transport.poll(), 0);
    }
}
