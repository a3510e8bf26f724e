//! Peer transport boundary.
//!
//! The real network layer (discovery, sessions, reliable delivery) lives
//! outside this crate. The pipeline only needs two things from it: the set
//! of connected peers and a best-effort "send this text to everyone".
//!
//! ```text
//!   SessionState ──> Broadcaster ──> dyn PeerTransport ──> peers
//!                                          ▲
//!                        LoopbackEndpoint ─┘   (in-process, tests + demo)
//! ```
//!
//! Inbound text reaches the pipeline through `SessionHandle::deliver`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::error::SyncError;
use crate::scene::PeerId;

/// Peers currently reachable, excluding this device.
pub type PeerSet = BTreeSet<PeerId>;

/// Failure reported by the external transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport disconnected")]
    Disconnected,
    #[error("send rejected: {0}")]
    Rejected(String),
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::Transport(err.to_string())
    }
}

/// Contract of the external peer transport.
pub trait PeerTransport: Send + Sync {
    fn connected_peers(&self) -> PeerSet;

    /// Send `text` to every connected peer, best effort.
    fn broadcast(&self, text: &str) -> std::result::Result<(), TransportError>;
}

/// What happened to one outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent { peers: usize },
    /// Nobody connected; nothing was sent.
    NoPeers,
    /// The transport refused; logged and dropped.
    Failed,
}

/// Outbound side of the protocol.
///
/// Never fails towards the caller: with zero peers the send is skipped and
/// transport failures are logged, matching the pipeline's "drop and keep
/// going" policy.
#[derive(Clone)]
pub struct Broadcaster {
    transport: Arc<dyn PeerTransport>,
}

impl Broadcaster {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self { transport }
    }

    pub fn connected_peers(&self) -> PeerSet {
        self.transport.connected_peers()
    }

    pub fn send(&self, text: &str) -> Delivery {
        let peers = self.transport.connected_peers().len();
        if peers == 0 {
            debug!("{}; dropping outbound message", SyncError::TransportUnavailable);
            return Delivery::NoPeers;
        }

        trace!(peers, "broadcast: {}", text);
        match self.transport.broadcast(text) {
            Ok(()) => Delivery::Sent { peers },
            Err(err) => {
                warn!("Broadcast failed: {}", SyncError::from(err));
                Delivery::Failed
            }
        }
    }
}

/// Event seen by a member of a [`LoopbackHub`].
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Message { from: PeerId, text: String },
    /// Full set of other members after a join or leave.
    PeersChanged(Vec<PeerId>),
}

/// In-process transport connecting several sessions.
///
/// Member queues are unbounded so a broadcast never blocks while the hub
/// lock is held.
pub struct LoopbackHub {
    members: Mutex<BTreeMap<PeerId, Sender<HubEvent>>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            members: Mutex::new(BTreeMap::new()),
        })
    }

    /// Add a member. Returns its transport endpoint and inbound queue.
    ///
    /// Every member, including the new one, receives the updated peer set.
    pub fn join(self: &Arc<Self>, peer: PeerId) -> (LoopbackEndpoint, Receiver<HubEvent>) {
        let (tx, rx) = unbounded();
        {
            let mut members = self.members.lock();
            members.insert(peer.clone(), tx);
            Self::notify_peers_changed(&members);
        }
        info!("Loopback hub: {} joined", peer);

        let endpoint = LoopbackEndpoint {
            hub: Arc::clone(self),
            peer,
        };
        (endpoint, rx)
    }

    /// Remove a member; its inbound queue disconnects.
    pub fn leave(&self, peer: &PeerId) {
        let mut members = self.members.lock();
        if members.remove(peer).is_some() {
            Self::notify_peers_changed(&members);
            info!("Loopback hub: {} left", peer);
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    fn notify_peers_changed(members: &BTreeMap<PeerId, Sender<HubEvent>>) {
        for (peer, tx) in members.iter() {
            let others: Vec<PeerId> = members.keys().filter(|p| *p != peer).cloned().collect();
            // A member whose receiver is gone will be removed by its own leave().
            let _ = tx.send(HubEvent::PeersChanged(others));
        }
    }

    fn others(&self, me: &PeerId) -> PeerSet {
        self.members.lock().keys().filter(|p| *p != me).cloned().collect()
    }

    fn deliver_from(&self, me: &PeerId, text: &str) -> std::result::Result<(), TransportError> {
        let members = self.members.lock();
        if !members.contains_key(me) {
            return Err(TransportError::Disconnected);
        }
        for (peer, tx) in members.iter() {
            if peer == me {
                continue;
            }
            let event = HubEvent::Message {
                from: me.clone(),
                text: text.to_string(),
            };
            if tx.send(event).is_err() {
                return Err(TransportError::Rejected(format!("{peer} is not receiving")));
            }
        }
        Ok(())
    }
}

/// One member's view of a [`LoopbackHub`].
#[derive(Clone)]
pub struct LoopbackEndpoint {
    hub: Arc<LoopbackHub>,
    peer: PeerId,
}

impl LoopbackEndpoint {
    pub fn peer_id(&self) -> &PeerId {
        &self.peer
    }

    pub fn leave(&self) {
        self.hub.leave(&self.peer);
    }
}

impl PeerTransport for LoopbackEndpoint {
    fn connected_peers(&self) -> PeerSet {
        self.hub.others(&self.peer)
    }

    fn broadcast(&self, text: &str) -> std::result::Result<(), TransportError> {
        self.hub.deliver_from(&self.peer, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingTransport;

    impl PeerTransport for FailingTransport {
        fn connected_peers(&self) -> PeerSet {
            [PeerId::new("somebody")].into_iter().collect()
        }

        fn broadcast(&self, _text: &str) -> std::result::Result<(), TransportError> {
            Err(TransportError::Rejected("radio off".into()))
        }
    }

    fn drain(rx: &Receiver<HubEvent>) -> Vec<HubEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_zero_peers_is_a_noop() {
        let hub = LoopbackHub::new();
        let (alone, rx) = hub.join(PeerId::new("a"));
        let broadcaster = Broadcaster::new(Arc::new(alone));

        assert_eq!(broadcaster.send("addNode sphereNode 0"), Delivery::NoPeers);
        assert!(drain(&rx)
            .iter()
            .all(|event| matches!(event, HubEvent::PeersChanged(_))));
    }

    #[test]
    fn test_failure_is_swallowed() {
        let broadcaster = Broadcaster::new(Arc::new(FailingTransport));
        assert_eq!(broadcaster.send("hello"), Delivery::Failed);
    }

    #[test]
    fn test_join_and_leave_notify_members() {
        let hub = LoopbackHub::new();
        let (_a, rx_a) = hub.join(PeerId::new("a"));
        assert_eq!(drain(&rx_a), vec![HubEvent::PeersChanged(vec![])]);

        let (b, rx_b) = hub.join(PeerId::new("b"));
        assert_eq!(
            drain(&rx_a),
            vec![HubEvent::PeersChanged(vec![PeerId::new("b")])]
        );
        assert_eq!(
            drain(&rx_b),
            vec![HubEvent::PeersChanged(vec![PeerId::new("a")])]
        );

        b.leave();
        assert_eq!(drain(&rx_a), vec![HubEvent::PeersChanged(vec![])]);
        assert_eq!(hub.member_count(), 1);
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_sender() {
        let hub = LoopbackHub::new();
        let (a, rx_a) = hub.join(PeerId::new("a"));
        let (_b, rx_b) = hub.join(PeerId::new("b"));
        let (_c, rx_c) = hub.join(PeerId::new("c"));
        drain(&rx_a);
        drain(&rx_b);
        drain(&rx_c);

        let broadcaster = Broadcaster::new(Arc::new(a));
        assert_eq!(broadcaster.send("ping"), Delivery::Sent { peers: 2 });

        let expected = HubEvent::Message {
            from: PeerId::new("a"),
            text: "ping".into(),
        };
        assert!(drain(&rx_a).is_empty());
        assert_eq!(drain(&rx_b), vec![expected.clone()]);
        assert_eq!(drain(&rx_c), vec![expected]);
    }

    #[test]
    fn test_departed_endpoint_is_disconnected() {
        let hub = LoopbackHub::new();
        let (a, _rx_a) = hub.join(PeerId::new("a"));
        let (_b, _rx_b) = hub.join(PeerId::new("b"));
        a.leave();
        assert_eq!(a.broadcast("late"), Err(TransportError::Disconnected));
        assert!(a.connected_peers().contains(&PeerId::new("b")));
    }
}
