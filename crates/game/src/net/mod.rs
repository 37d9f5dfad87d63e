mod endpoint;
mod error;
mod handshake;
mod protocol;
mod sequence;
mod session;
mod simulator;
mod stats;
mod transport;

pub use endpoint::UdpTransport;
pub use error::{DecodeError, EncodeError, HandshakeError, TransportError};
pub use handshake::{HandshakeState, SharedSettings, resolve_online_colours, resolve_secondary};
pub use protocol::{
    FRAGMENT_DATA_MAX_SIZE, HANDSHAKE_ACK_LEN, HANDSHAKE_LEN, HANDSHAKE_VERIFICATION, HEADER_LEN,
    Handshake, HandshakeAck, MAX_FRAGMENTS, MAX_PACKET_SIZE, Message, MessageHeader, MessageType,
    RECV_BUFFER_SIZE, SEND_BUFFER_SIZE, StateKind, StatePacket, THROWN_WEAPON_LEN, TeamColours,
    WEAPON_POSITION_SCALE, WEAPON_VELOCITY_SCALE,
};
pub use sequence::{
    SEQUENCE_SLACK, SequenceGuard, SequencePolicy, SequenceVerdict, sequence_greater_than,
};
pub use session::{
    EventDrain, FillResult, NetworkTransport, ReceiveReport, SendReport, StateExchange, StateSend,
};
pub use simulator::{PacketLossSimulation, SimulatedTransport};
pub use stats::{NetworkStats, TransportCounters};
pub use transport::{LoopbackPeer, LoopbackTransport, PeerTransport, SendMode};
