//! Length-delimited framing for `Envelope`s over any `AsyncRead + AsyncWrite`.
//!
//! A 4-byte big-endian length prefix precedes each `bincode`-encoded
//! envelope; `tokio_util`'s `LengthDelimitedCodec` handles the prefix, this
//! module handles the payload.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{Result, StreamingError};
use crate::protocol::Envelope;

pub type WireFrame<T> = Framed<T, LengthDelimitedCodec>;

pub fn frame<T: AsyncRead + AsyncWrite + Unpin>(io: T) -> WireFrame<T> {
    Framed::new(io, LengthDelimitedCodec::new())
}

pub fn encode(envelope: &Envelope) -> Result<Bytes> {
    let bytes = bincode::serialize(envelope)?;
    Ok(Bytes::from(bytes))
}

pub fn decode(buf: BytesMut) -> Result<Envelope> {
    bincode::deserialize(&buf).map_err(StreamingError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PeerMessage;
    use corelib::node::NodeId;
    use std::net::SocketAddr;

    #[test]
    fn round_trips_an_envelope() {
        let envelope = Envelope::fire_and_forget(PeerMessage::Identify {
            node_id: NodeId::new("A"),
            address: "127.0.0.1:9001".parse::<SocketAddr>().unwrap(),
        });
        let bytes = encode(&envelope).unwrap();
        let decoded = decode(BytesMut::from(&bytes[..])).unwrap();
        match decoded.message {
            PeerMessage::Identify { node_id, .. } => assert_eq!(node_id, NodeId::new("A")),
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
