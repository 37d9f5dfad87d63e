use std::io;

use thiserror::Error;

use super::handshake::HandshakeState;
use super::protocol::MessageType;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("datagram truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("buffer too small: need {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("fragment {index} of {count} does not fit in a nibble")]
    FragmentOutOfRange { count: u8, index: u8 },
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake verification mismatch: {received:#010x}")]
    VerificationMismatch { received: u32 },
    #[error("unexpected message during handshake: {0:?}")]
    UnexpectedMessage(MessageType),
    #[error("malformed handshake datagram: {0}")]
    Malformed(#[from] DecodeError),
    #[error("{operation} is not valid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: HandshakeState,
    },
    #[error("handshake send failed: {0}")]
    Send(io::Error),
    #[error("handshake receive failed: {0}")]
    Recv(io::Error),
    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for HandshakeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Send(e) => Self::Send(e),
            TransportError::Recv(e) => Self::Recv(e),
            other => Self::Transport(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(io::Error),
    #[error("receive failed: {0}")]
    Recv(io::Error),
    #[error("packet of {size} bytes exceeds limit of {limit}")]
    OversizePacket { size: usize, limit: usize },
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
}
