//! WebSocket Transport
//!
//! Production [`Transport`] over tokio-tungstenite. The socket is split
//! into a writer task fed by an mpsc channel and a reader task that
//! routes inbound frames: replies carrying a correlation id complete the
//! matching in-flight call, push frames go to the event slots.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::auth::ClientConfig;
use crate::network::protocol::{ClientFrame, OpCode, ServerFrame};
use crate::network::transport::{
    EventSlot, PushEvent, SessionHandle, Transport, TransportError,
};

/// Outbound channel depth. Senders get backpressure past this.
const OUTGOING_BUFFER: usize = 100;

type PendingReply = oneshot::Sender<Result<ServerFrame, TransportError>>;

/// WebSocket-backed transport session.
pub struct WsTransport {
    out_tx: mpsc::Sender<String>,
    pending: Arc<Mutex<BTreeMap<u32, PendingReply>>>,
    next_cid: AtomicU32,
    /// Single-subscriber slot for op-coded match payloads.
    pub on_match_data: Arc<EventSlot<PushEvent>>,
    /// Single-subscriber slot for matched notifications.
    pub on_matchmaker_matched: Arc<EventSlot<PushEvent>>,
}

impl WsTransport {
    /// Connect the realtime channel, authenticating with the session
    /// token obtained from the host at login.
    pub async fn connect(config: &ClientConfig, token: &str) -> Result<Self, TransportError> {
        let url = config.socket_url(token);
        info!("Connecting to {}:{}...", config.host, config.port);

        let (ws_stream, _) = connect_async(&url).await?;
        info!("Realtime channel connected");

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTGOING_BUFFER);

        let pending: Arc<Mutex<BTreeMap<u32, PendingReply>>> =
            Arc::new(Mutex::new(BTreeMap::new()));
        let on_match_data = Arc::new(EventSlot::new());
        let on_matchmaker_matched = Arc::new(EventSlot::new());

        // Writer task: drain the outbound channel onto the socket.
        tokio::spawn(async move {
            while let Some(json) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(json)).await {
                    error!("WebSocket write error: {}", e);
                    break;
                }
            }
            debug!("Writer task ended");
        });

        // Reader task: route replies and pushes.
        let reader_pending = pending.clone();
        let reader_match_data = on_match_data.clone();
        let reader_matched = on_matchmaker_matched.clone();
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match ServerFrame::from_json(&text) {
                        Ok(frame) => {
                            Self::route_frame(
                                frame,
                                &reader_pending,
                                &reader_match_data,
                                &reader_matched,
                            );
                        }
                        Err(e) => {
                            warn!("Failed to parse server frame: {} - {}", e, text);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("Host closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            // Dropping the reply senders fails every in-flight call
            // with ConnectionClosed.
            reader_pending.lock().expect("pending map poisoned").clear();
            debug!("Reader task ended");
        });

        Ok(Self {
            out_tx,
            pending,
            next_cid: AtomicU32::new(1),
            on_match_data,
            on_matchmaker_matched,
        })
    }

    /// Funnel both push slots into one channel for a single drain loop.
    /// Subscribing replaces any handlers installed earlier.
    pub fn events(&self) -> mpsc::UnboundedReceiver<PushEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let matched_tx = tx.clone();
        self.on_match_data.subscribe(move |event| {
            let _ = tx.send(event);
        });
        self.on_matchmaker_matched.subscribe(move |event| {
            let _ = matched_tx.send(event);
        });
        rx
    }

    fn route_frame(
        frame: ServerFrame,
        pending: &Mutex<BTreeMap<u32, PendingReply>>,
        match_data: &EventSlot<PushEvent>,
        matched: &EventSlot<PushEvent>,
    ) {
        match frame {
            ServerFrame::MatchData {
                match_id,
                op_code,
                data,
            } => {
                let delivered = match_data.emit(PushEvent::MatchData {
                    match_id,
                    op_code,
                    data,
                });
                if !delivered {
                    warn!("Match data dropped: no subscriber");
                }
            }
            ServerFrame::MatchmakerMatched { ticket, match_ref } => {
                let delivered = matched.emit(PushEvent::MatchmakerMatched { ticket, match_ref });
                if !delivered {
                    warn!("Matched notification dropped: no subscriber");
                }
            }
            ServerFrame::Error {
                cid: Some(cid),
                message,
            } => {
                Self::complete(pending, cid, Err(TransportError::Rejected(message)));
            }
            ServerFrame::Error { cid: None, message } => {
                warn!("Host error: {}", message);
            }
            ServerFrame::Ack { cid } => {
                Self::complete(pending, cid, Ok(ServerFrame::Ack { cid }));
            }
            ServerFrame::MatchmakerTicket { cid, ref ticket } => {
                let reply = ServerFrame::MatchmakerTicket {
                    cid,
                    ticket: ticket.clone(),
                };
                Self::complete(pending, cid, Ok(reply));
            }
            ServerFrame::MatchJoined { cid, ref match_id } => {
                let reply = ServerFrame::MatchJoined {
                    cid,
                    match_id: match_id.clone(),
                };
                Self::complete(pending, cid, Ok(reply));
            }
        }
    }

    fn complete(
        pending: &Mutex<BTreeMap<u32, PendingReply>>,
        cid: u32,
        result: Result<ServerFrame, TransportError>,
    ) {
        let waiter = pending.lock().expect("pending map poisoned").remove(&cid);
        match waiter {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => warn!("Reply for unknown cid {}", cid),
        }
    }

    /// Issue a request/response call and await the host's reply.
    async fn call<F>(&self, build: F) -> Result<ServerFrame, TransportError>
    where
        F: FnOnce(u32) -> ClientFrame,
    {
        let cid = self.next_cid.fetch_add(1, Ordering::Relaxed);
        let frame = build(cid);
        let json = frame.to_json()?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending map poisoned")
            .insert(cid, tx);

        if self.out_tx.send(json).await.is_err() {
            self.pending
                .lock()
                .expect("pending map poisoned")
                .remove(&cid);
            return Err(TransportError::ConnectionClosed);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn matchmaker_add(
        &self,
        min_count: u32,
        max_count: u32,
    ) -> Result<String, TransportError> {
        let reply = self
            .call(|cid| ClientFrame::MatchmakerAdd {
                cid,
                min_count,
                max_count,
            })
            .await?;

        match reply {
            ServerFrame::MatchmakerTicket { ticket, .. } => Ok(ticket),
            other => Err(TransportError::Rejected(format!(
                "unexpected reply to matchmaker_add: {:?}",
                other
            ))),
        }
    }

    async fn matchmaker_remove(&self, ticket: &str) -> Result<(), TransportError> {
        self.call(|cid| ClientFrame::MatchmakerRemove {
            cid,
            ticket: ticket.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn join(&self, match_ref: &str) -> Result<SessionHandle, TransportError> {
        let reply = self
            .call(|cid| ClientFrame::MatchJoin {
                cid,
                match_ref: match_ref.to_string(),
            })
            .await?;

        match reply {
            ServerFrame::MatchJoined { match_id, .. } => Ok(SessionHandle { match_id }),
            other => Err(TransportError::Rejected(format!(
                "unexpected reply to join: {:?}",
                other
            ))),
        }
    }

    async fn leave(&self, match_id: &str) -> Result<(), TransportError> {
        self.call(|cid| ClientFrame::MatchLeave {
            cid,
            match_id: match_id.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn send(
        &self,
        match_id: &str,
        op_code: OpCode,
        payload: String,
    ) -> Result<(), TransportError> {
        let frame = ClientFrame::MatchData {
            match_id: match_id.to_string(),
            op_code: op_code.as_i64(),
            data: payload,
        };
        let json = frame.to_json()?;
        self.out_tx
            .send(json)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Transport wired to a local channel instead of a live socket. The
    /// test plays the host by draining the channel and routing frames
    /// back through `route_frame`.
    fn bench_transport() -> (WsTransport, mpsc::Receiver<String>) {
        let (out_tx, out_rx) = mpsc::channel(8);
        let transport = WsTransport {
            out_tx,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
            next_cid: AtomicU32::new(1),
            on_match_data: Arc::new(EventSlot::new()),
            on_matchmaker_matched: Arc::new(EventSlot::new()),
        };
        (transport, out_rx)
    }

    #[tokio::test]
    async fn test_match_data_push_reaches_subscriber() {
        let (transport, _out_rx) = bench_transport();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        transport
            .on_match_data
            .subscribe(move |event| sink.lock().unwrap().push(event));

        WsTransport::route_frame(
            ServerFrame::MatchData {
                match_id: "m1".to_string(),
                op_code: 2,
                data: "{}".to_string(),
            },
            &transport.pending,
            &transport.on_match_data,
            &transport.on_matchmaker_matched,
        );

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(matches!(
            &received[0],
            PushEvent::MatchData { match_id, op_code: 2, .. } if match_id == "m1"
        ));
    }

    #[tokio::test]
    async fn test_matched_push_routed_to_its_slot() {
        let (transport, _out_rx) = bench_transport();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        transport
            .on_matchmaker_matched
            .subscribe(move |event| sink.lock().unwrap().push(event));

        WsTransport::route_frame(
            ServerFrame::MatchmakerMatched {
                ticket: "t1".to_string(),
                match_ref: "m1".to_string(),
            },
            &transport.pending,
            &transport.on_match_data,
            &transport.on_matchmaker_matched,
        );

        let received = received.lock().unwrap();
        assert!(matches!(
            &received[0],
            PushEvent::MatchmakerMatched { ticket, .. } if ticket == "t1"
        ));
    }

    #[tokio::test]
    async fn test_reply_completes_matching_call() {
        let (transport, mut out_rx) = bench_transport();
        let pending = transport.pending.clone();
        let match_data = transport.on_match_data.clone();
        let matched = transport.on_matchmaker_matched.clone();

        tokio::spawn(async move {
            let json = out_rx.recv().await.unwrap();
            let ClientFrame::MatchmakerAdd {
                cid,
                min_count,
                max_count,
            } = serde_json::from_str(&json).unwrap()
            else {
                panic!("unexpected outbound frame: {}", json);
            };
            assert_eq!((min_count, max_count), (2, 2));
            WsTransport::route_frame(
                ServerFrame::MatchmakerTicket {
                    cid,
                    ticket: "ticket-7".to_string(),
                },
                &pending,
                &match_data,
                &matched,
            );
        });

        let ticket = transport.matchmaker_add(2, 2).await.unwrap();
        assert_eq!(ticket, "ticket-7");
        assert!(transport.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_reply_rejects_call() {
        let (transport, mut out_rx) = bench_transport();
        let pending = transport.pending.clone();
        let match_data = transport.on_match_data.clone();
        let matched = transport.on_matchmaker_matched.clone();

        tokio::spawn(async move {
            let json = out_rx.recv().await.unwrap();
            let ClientFrame::MatchJoin { cid, .. } = serde_json::from_str(&json).unwrap() else {
                panic!("unexpected outbound frame: {}", json);
            };
            WsTransport::route_frame(
                ServerFrame::Error {
                    cid: Some(cid),
                    message: "match gone".to_string(),
                },
                &pending,
                &match_data,
                &matched,
            );
        });

        let err = transport.join("match-1").await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(msg) if msg == "match gone"));
        assert!(transport.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_cid_and_unsubscribed_push_are_dropped() {
        let (transport, _out_rx) = bench_transport();

        // Neither of these has a waiter or a subscriber; both are
        // logged and dropped without touching state.
        WsTransport::route_frame(
            ServerFrame::Ack { cid: 42 },
            &transport.pending,
            &transport.on_match_data,
            &transport.on_matchmaker_matched,
        );
        WsTransport::route_frame(
            ServerFrame::MatchData {
                match_id: "m1".to_string(),
                op_code: 2,
                data: "{}".to_string(),
            },
            &transport.pending,
            &transport.on_match_data,
            &transport.on_matchmaker_matched,
        );

        assert!(transport.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_channel_fails_call_and_cleans_pending() {
        let (transport, out_rx) = bench_transport();
        drop(out_rx);

        let err = transport.matchmaker_add(2, 2).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
        assert!(transport.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_funnels_both_push_kinds() {
        let (transport, _out_rx) = bench_transport();
        let mut events = transport.events();

        WsTransport::route_frame(
            ServerFrame::MatchData {
                match_id: "m1".to_string(),
                op_code: 2,
                data: "{}".to_string(),
            },
            &transport.pending,
            &transport.on_match_data,
            &transport.on_matchmaker_matched,
        );
        WsTransport::route_frame(
            ServerFrame::MatchmakerMatched {
                ticket: "t1".to_string(),
                match_ref: "m1".to_string(),
            },
            &transport.pending,
            &transport.on_match_data,
            &transport.on_matchmaker_matched,
        );

        assert!(matches!(
            events.recv().await,
            Some(PushEvent::MatchData { .. })
        ));
        assert!(matches!(
            events.recv().await,
            Some(PushEvent::MatchmakerMatched { .. })
        ));
    }
}
