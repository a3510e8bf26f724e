//! Peer synchronization: wire codec and transport boundary.

pub mod codec;
pub mod transport;

pub use codec::{decode, encode, matrix_from_transform, transform_from_matrix, WireMessage};
pub use transport::{
    Broadcaster, Delivery, HubEvent, LoopbackEndpoint, LoopbackHub, PeerSet, PeerTransport,
    TransportError,
};
