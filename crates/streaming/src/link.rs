//! Peer Link: one directed, multiplexed logical channel to a remote node
//! (§4.3).
//!
//! A link owns a single socket split into a writer and reader half running
//! in one task (`tokio::select!` between outbound sends and inbound
//! frames). Requests that expect a reply (`replicate`, `read`, `write`,
//! `SnapshotRequest`) register a `oneshot` sender keyed by request id;
//! everything else (`identify`, `heartbeat`, `node_failure`) is handed to
//! the link's owner via an `Unsolicited` channel instead.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::warn;

use corelib::node::NodeId;

use crate::codec::{decode, encode, frame};
use crate::error::{Result, StreamingError};
use crate::protocol::{Envelope, PeerMessage, RequestId};

/// Per-request fan-out timeout (§4.3, fixed at 3 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Identified,
    Live,
    Closed,
}

/// Messages that don't correlate to a pending request, handed to whatever
/// owns this link (the failure detector, the node-membership handler).
#[derive(Debug, Clone)]
pub enum Unsolicited {
    Identify { node_id: NodeId, address: SocketAddr },
    Heartbeat { node_id: NodeId, timestamp: u64 },
    NodeFailure { failed_node_id: NodeId, reporter: NodeId, ts: u64 },
}

/// Lets a request handler reply to an inbound `replicate`/`read`/`write`/
/// `SnapshotRequest` without holding onto the whole link.
#[derive(Clone)]
pub struct ReplyHandle {
    id: RequestId,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl ReplyHandle {
    pub fn send(&self, message: PeerMessage) -> Result<()> {
        self.outbound
            .send(Envelope::request(self.id, message))
            .map_err(|_| StreamingError::Closed)
    }
}

/// An inbound request awaiting an application-level reply.
#[derive(Debug)]
pub struct IncomingRequest {
    pub message: PeerMessage,
    pub reply: ReplyHandleDebug,
}

/// `ReplyHandle` wrapper that's `Debug` so `IncomingRequest` can derive it.
#[derive(Clone)]
pub struct ReplyHandleDebug(pub ReplyHandle);

impl std::fmt::Debug for ReplyHandleDebug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReplyHandle(id={})", self.0.id)
    }
}

impl IncomingRequest {
    pub fn reply(&self, message: PeerMessage) -> Result<()> {
        self.reply.0.send(message)
    }
}

struct Inner {
    state: RwLock<LinkState>,
    remote_id: RwLock<Option<NodeId>>,
    next_id: AtomicU64,
    pending: DashMap<RequestId, oneshot::Sender<PeerMessage>>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl Inner {
    /// Dispatches one decoded frame. Rejects everything but `identify`
    /// while the link hasn't identified yet (§4.3's `connecting →
    /// identified` gate) — a reply to a request we sent is still matched
    /// first, since the remote may answer before its own `identify` is
    /// even flushed.
    fn dispatch(
        &self,
        envelope: Envelope,
        unsolicited: &mpsc::UnboundedSender<Unsolicited>,
        requests: &mpsc::UnboundedSender<IncomingRequest>,
    ) -> Result<()> {
        let Envelope { id, message } = envelope;

        if id != 0 {
            if let Some((_, sender)) = self.pending.remove(&id) {
                let _ = sender.send(message);
                return Ok(());
            }
        }

        if *self.state.read() == LinkState::Connecting && !matches!(message, PeerMessage::Identify { .. }) {
            return Err(StreamingError::NotIdentified);
        }

        match message {
            PeerMessage::Identify { node_id, address } => {
                *self.remote_id.write() = Some(node_id.clone());
                if *self.state.read() == LinkState::Connecting {
                    *self.state.write() = LinkState::Identified;
                }
                let _ = unsolicited.send(Unsolicited::Identify { node_id, address });
            }
            PeerMessage::Heartbeat { node_id, timestamp } => {
                let mut state = self.state.write();
                if *state != LinkState::Closed {
                    *state = LinkState::Live;
                }
                drop(state);
                let _ = unsolicited.send(Unsolicited::Heartbeat { node_id, timestamp });
            }
            PeerMessage::NodeFailure { failed_node_id, reporter, ts } => {
                let _ = unsolicited.send(Unsolicited::NodeFailure {
                    failed_node_id,
                    reporter,
                    ts,
                });
            }
            // replicate/read/write/SnapshotRequest arriving from the other
            // side: not a reply to anything we sent (no pending entry
            // matched above), so it's a request for us to answer.
            message if id != 0 && message.expects_reply() => {
                let reply = ReplyHandleDebug(ReplyHandle {
                    id,
                    outbound: self.outbound.clone(),
                });
                let _ = requests.send(IncomingRequest { message, reply });
            }
            // A reply with no matching pending request (late, duplicate) is dropped.
            _ => {}
        }
        Ok(())
    }
}

/// Handle to a live peer channel. Cheap to clone; clones share the same
/// underlying socket and pending-request table.
#[derive(Clone)]
pub struct PeerLink {
    inner: Arc<Inner>,
}

impl PeerLink {
    /// Opens a new TCP connection to `addr` and spawns its link task.
    pub async fn connect(
        addr: SocketAddr,
        unsolicited: mpsc::UnboundedSender<Unsolicited>,
        requests: mpsc::UnboundedSender<IncomingRequest>,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::spawn(stream, unsolicited, requests))
    }

    /// Wraps an already-accepted socket (inbound connection) in a link.
    /// `requests` receives every inbound `replicate`/`read`/`write`/
    /// `SnapshotRequest` this link doesn't already have a pending reply for.
    pub fn spawn(
        stream: TcpStream,
        unsolicited: mpsc::UnboundedSender<Unsolicited>,
        requests: mpsc::UnboundedSender<IncomingRequest>,
    ) -> Self {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let inner = Arc::new(Inner {
            state: RwLock::new(LinkState::Connecting),
            remote_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
            outbound: outbound_tx,
        });

        let task_inner = inner.clone();
        tokio::spawn(async move {
            let mut io = frame(stream);
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        let Some(envelope) = outgoing else { break };
                        let bytes = match encode(&envelope) {
                            Ok(b) => b,
                            Err(e) => { warn!("peer link encode failed: {e}"); continue; }
                        };
                        if io.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    incoming = io.next() => {
                        match incoming {
                            Some(Ok(bytes)) => {
                                match decode(bytes) {
                                    Ok(envelope) => {
                                        if let Err(e) = task_inner.dispatch(envelope, &unsolicited, &requests) {
                                            warn!("peer link dropped message: {e}");
                                        }
                                    }
                                    Err(e) => warn!("peer link decode failed: {e}"),
                                }
                            }
                            _ => break,
                        }
                    }
                }
            }
            *task_inner.state.write() = LinkState::Closed;
        });

        Self { inner }
    }

    pub fn state(&self) -> LinkState {
        *self.inner.state.read()
    }

    pub fn remote_id(&self) -> Option<NodeId> {
        self.inner.remote_id.read().clone()
    }

    pub fn send_identify(&self, node_id: NodeId, address: SocketAddr) -> Result<()> {
        self.send_fire_and_forget(PeerMessage::Identify { node_id, address })
    }

    pub fn send_heartbeat(&self, node_id: NodeId, timestamp: u64) -> Result<()> {
        self.send_fire_and_forget(PeerMessage::Heartbeat { node_id, timestamp })
    }

    pub fn gossip_node_failure(&self, failed_node_id: NodeId, reporter: NodeId, ts: u64) -> Result<()> {
        self.send_fire_and_forget(PeerMessage::NodeFailure {
            failed_node_id,
            reporter,
            ts,
        })
    }

    fn send_fire_and_forget(&self, message: PeerMessage) -> Result<()> {
        if self.state() == LinkState::Closed {
            return Err(StreamingError::Closed);
        }
        self.inner
            .outbound
            .send(Envelope::fire_and_forget(message))
            .map_err(|_| StreamingError::Closed)
    }

    /// Sends `message` and awaits its correlated reply, failing with
    /// `StreamingError::Timeout` after the default 3-second deadline.
    pub async fn request(&self, message: PeerMessage) -> Result<PeerMessage> {
        self.request_with_timeout(message, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    pub async fn request_with_timeout(
        &self,
        message: PeerMessage,
        deadline: Duration,
    ) -> Result<PeerMessage> {
        if self.state() == LinkState::Closed {
            return Err(StreamingError::Closed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        if self
            .inner
            .outbound
            .send(Envelope::request(id, message))
            .is_err()
        {
            self.inner.pending.remove(&id);
            return Err(StreamingError::Closed);
        }

        match timeout(deadline, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(StreamingError::Closed),
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(StreamingError::Timeout(deadline))
            }
        }
    }

    /// Marks the link closed. Does not sever the underlying socket
    /// immediately, but further sends are rejected and the reader loop
    /// exits on its next poll.
    pub fn close(&self) {
        *self.inner.state.write() = LinkState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::node::NodeId;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = tokio::net::TcpStream::connect(addr);
        let (client, server) = tokio::join!(connect, listener.accept());
        (client.unwrap(), server.unwrap().0)
    }

    #[tokio::test]
    async fn messages_before_identify_are_dropped() {
        let (client, server) = connected_pair().await;

        let (client_unsolicited_tx, _client_unsolicited_rx) = mpsc::unbounded_channel();
        let (client_requests_tx, _client_requests_rx) = mpsc::unbounded_channel();
        let client_link = PeerLink::spawn(client, client_unsolicited_tx, client_requests_tx);

        let (server_unsolicited_tx, mut server_unsolicited_rx) = mpsc::unbounded_channel();
        let (server_requests_tx, _server_requests_rx) = mpsc::unbounded_channel();
        let _server_link = PeerLink::spawn(server, server_unsolicited_tx, server_requests_tx);

        client_link.send_heartbeat(NodeId::new("A"), 123).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            server_unsolicited_rx.try_recv().is_err(),
            "a heartbeat arriving before identify must not reach the link's owner"
        );

        client_link
            .send_identify(NodeId::new("A"), "127.0.0.1:9999".parse().unwrap())
            .unwrap();
        let event = timeout(Duration::from_secs(1), server_unsolicited_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Unsolicited::Identify { .. }));

        client_link.send_heartbeat(NodeId::new("A"), 456).unwrap();
        let event = timeout(Duration::from_secs(1), server_unsolicited_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Unsolicited::Heartbeat { .. }));
    }
}
