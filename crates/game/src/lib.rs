pub mod config;
pub mod event;
pub mod input;
pub mod net;

pub use config::SyncConfig;
pub use event::{EventFlags, EventQueue, EventSignals, MAX_WEAPONS, SpecialEvent, ThrownWeapon};
pub use input::{
    InputBatch, InputBuffer, InputFrame, JitterBuffer, JitterConfig, LocalInputHandle,
    RemoteStateFeed,
};
pub use net::{
    HandshakeError, HandshakeState, LoopbackTransport, MAX_PACKET_SIZE, Message, MessageType,
    NetworkStats, NetworkTransport, PacketLossSimulation, PeerTransport, ReceiveReport, SendMode,
    SendReport, SequencePolicy, SharedSettings, SimulatedTransport, StateExchange, TeamColours,
    TransportError, UdpTransport,
};
