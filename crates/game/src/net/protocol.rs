use glam::Vec2;
use strum::FromRepr;

use super::error::{DecodeError, EncodeError};
use crate::event::{SpecialEvent, ThrownWeapon};

/// Largest datagram the unreliable channel will carry.
pub const MAX_PACKET_SIZE: usize = 1200;
pub const SEND_BUFFER_SIZE: usize = 16 * 1024;
pub const RECV_BUFFER_SIZE: usize = 4 * 1024;

pub const FRAGMENT_DATA_MAX_SIZE: usize = 1024;
pub const MAX_FRAGMENTS: usize = 4;

/// Fixed value carried by every start-game handshake.
pub const HANDSHAKE_VERIFICATION: u32 = 0x1988_1337;

pub const HEADER_LEN: usize = 6;
pub const HANDSHAKE_LEN: usize = 10;
pub const HANDSHAKE_ACK_LEN: usize = 2;
pub const THROWN_WEAPON_LEN: usize = 20;

pub const WEAPON_POSITION_SCALE: f32 = 50.0;
pub const WEAPON_VELOCITY_SCALE: f32 = 100.0;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum MessageType {
    NotSet = 0,
    StartGameHandshake = 1,
    StartGameAck = 2,
    GamePacketStandard = 3,
    GamePacketFullStateUpdate = 4,
    GamePacketFragment = 5,
    GoalTop = 6,
    GoalBottom = 7,
    WeaponThrow = 8,
    Halftime = 9,
    Rematch = 10,
    ReviveHome = 11,
    ReviveAway = 12,
}

/// Flat wire header. The `auxiliary` byte is overloaded per message type;
/// outside this module it is only reachable through [`Message`].
///
/// Offsets (bytes):
/// - 0     message type
/// - 1     auxiliary
/// - 2..4  packet sequence (u16 LE)
/// - 4..6  last input sequence received (u16 LE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub message_type: u8,
    pub auxiliary: u8,
    pub sequence: u16,
    pub last_input_ack: u16,
}

impl MessageHeader {
    pub const LEN: usize = HEADER_LEN;

    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type: message_type as u8,
            ..Default::default()
        }
    }

    pub fn encode_into(&self, out: &mut [u8; HEADER_LEN]) {
        out[0] = self.message_type;
        out[1] = self.auxiliary;
        out[2..4].copy_from_slice(&self.sequence.to_le_bytes());
        out[4..6].copy_from_slice(&self.last_input_ack.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; HEADER_LEN] = buf
            .get(..HEADER_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::Truncated {
                needed: HEADER_LEN,
                actual: buf.len(),
            })?;

        Ok(Self {
            message_type: bytes[0],
            auxiliary: bytes[1],
            sequence: u16::from_le_bytes([bytes[2], bytes[3]]),
            last_input_ack: u16::from_le_bytes([bytes[4], bytes[5]]),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeamColours {
    pub primary: u8,
    pub secondary: u8,
}

impl TeamColours {
    pub fn new(primary: u8, secondary: u8) -> Self {
        Self { primary, secondary }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub verification: u32,
    /// Reserved for game mode negotiation, always sent as 0.
    pub game_type: u32,
    pub colours: TeamColours,
}

impl Handshake {
    pub fn new(colours: TeamColours) -> Self {
        Self {
            verification: HANDSHAKE_VERIFICATION,
            game_type: 0,
            colours,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification == HANDSHAKE_VERIFICATION
    }

    fn encode_into(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.verification.to_le_bytes());
        out[4..8].copy_from_slice(&self.game_type.to_le_bytes());
        out[8] = self.colours.primary;
        out[9] = self.colours.secondary;
    }

    fn decode(body: &[u8]) -> Self {
        Self {
            verification: read_u32_le(body, 0),
            game_type: read_u32_le(body, 4),
            colours: TeamColours::new(body[8], body[9]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeAck {
    pub colours: TeamColours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Standard,
    FullState,
}

impl StateKind {
    pub fn is_full(self) -> bool {
        matches!(self, Self::FullState)
    }

    pub fn message_type(self) -> MessageType {
        match self {
            Self::Standard => MessageType::GamePacketStandard,
            Self::FullState => MessageType::GamePacketFullStateUpdate,
        }
    }
}

/// A state packet as seen by the input-serialization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePacket<'a> {
    pub kind: StateKind,
    pub sequence: u16,
    /// Newest input sequence of ours the sender has consumed.
    pub remote_ack: u16,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message<'a> {
    Handshake(Handshake),
    HandshakeAck(HandshakeAck),
    State(StatePacket<'a>),
    /// Reserved, never produced by this crate. Both fields are 4-bit, 0..16.
    Fragment { count: u8, index: u8 },
    Event(SpecialEvent),
}

impl<'a> Message<'a> {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Handshake(_) => MessageType::StartGameHandshake,
            Self::HandshakeAck(_) => MessageType::StartGameAck,
            Self::State(state) => state.kind.message_type(),
            Self::Fragment { .. } => MessageType::GamePacketFragment,
            Self::Event(event) => event.message_type(),
        }
    }

    /// Size of header plus body on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + match self {
                Self::Handshake(_) => HANDSHAKE_LEN,
                Self::HandshakeAck(_) => HANDSHAKE_ACK_LEN,
                Self::State(state) => state.payload.len(),
                Self::Event(SpecialEvent::WeaponThrow(_)) => THROWN_WEAPON_LEN,
                Self::Fragment { .. } | Self::Event(_) => 0,
            }
    }

    /// Writes the message at the start of `out` and returns the byte count.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        let len = self.encoded_len();
        if out.len() < len {
            return Err(EncodeError::BufferTooSmall {
                needed: len,
                capacity: out.len(),
            });
        }

        let mut header = MessageHeader::new(self.message_type());
        let body = &mut out[HEADER_LEN..len];

        match self {
            Self::Handshake(handshake) => handshake.encode_into(body),
            Self::HandshakeAck(ack) => {
                body[0] = ack.colours.primary;
                body[1] = ack.colours.secondary;
            }
            Self::State(state) => {
                header.sequence = state.sequence;
                header.last_input_ack = state.remote_ack;
                body.copy_from_slice(state.payload);
            }
            Self::Fragment { count, index } => {
                if *count > 0x0F || *index > 0x0F {
                    return Err(EncodeError::FragmentOutOfRange {
                        count: *count,
                        index: *index,
                    });
                }
                header.auxiliary = (*count << 4) | *index;
            }
            Self::Event(event) => match event {
                SpecialEvent::GoalTop { next_kickoff }
                | SpecialEvent::GoalBottom { next_kickoff } => header.auxiliary = *next_kickoff,
                SpecialEvent::ReviveHome { revived } | SpecialEvent::ReviveAway { revived } => {
                    header.auxiliary = *revived
                }
                SpecialEvent::WeaponThrow(weapon) => encode_weapon(weapon, body),
                SpecialEvent::Halftime | SpecialEvent::Rematch => {}
            },
        }

        let mut hbuf = [0u8; HEADER_LEN];
        header.encode_into(&mut hbuf);
        out[..HEADER_LEN].copy_from_slice(&hbuf);
        Ok(len)
    }

    /// Decodes one datagram. The body is read only when the buffer holds the
    /// full fixed body for the message type.
    pub fn decode(buf: &'a [u8]) -> Result<Self, DecodeError> {
        let header = MessageHeader::decode(buf)?;
        let message_type = MessageType::from_repr(header.message_type)
            .filter(|t| *t != MessageType::NotSet)
            .ok_or(DecodeError::UnknownMessageType(header.message_type))?;
        let body = &buf[HEADER_LEN..];

        let body_len = match message_type {
            MessageType::StartGameHandshake => HANDSHAKE_LEN,
            MessageType::StartGameAck => HANDSHAKE_ACK_LEN,
            MessageType::WeaponThrow => THROWN_WEAPON_LEN,
            _ => 0,
        };
        if body.len() < body_len {
            return Err(DecodeError::Truncated {
                needed: HEADER_LEN + body_len,
                actual: buf.len(),
            });
        }

        let aux = header.auxiliary;
        let message = match message_type {
            MessageType::NotSet => {
                return Err(DecodeError::UnknownMessageType(header.message_type));
            }
            MessageType::StartGameHandshake => Self::Handshake(Handshake::decode(body)),
            MessageType::StartGameAck => Self::HandshakeAck(HandshakeAck {
                colours: TeamColours::new(body[0], body[1]),
            }),
            MessageType::GamePacketStandard | MessageType::GamePacketFullStateUpdate => {
                Self::State(StatePacket {
                    kind: if message_type == MessageType::GamePacketFullStateUpdate {
                        StateKind::FullState
                    } else {
                        StateKind::Standard
                    },
                    sequence: header.sequence,
                    remote_ack: header.last_input_ack,
                    payload: body,
                })
            }
            MessageType::GamePacketFragment => Self::Fragment {
                count: aux >> 4,
                index: aux & 0x0F,
            },
            MessageType::GoalTop => Self::Event(SpecialEvent::GoalTop { next_kickoff: aux }),
            MessageType::GoalBottom => {
                Self::Event(SpecialEvent::GoalBottom { next_kickoff: aux })
            }
            MessageType::WeaponThrow => {
                Self::Event(SpecialEvent::WeaponThrow(decode_weapon(body)))
            }
            MessageType::Halftime => Self::Event(SpecialEvent::Halftime),
            MessageType::Rematch => Self::Event(SpecialEvent::Rematch),
            MessageType::ReviveHome => Self::Event(SpecialEvent::ReviveHome { revived: aux }),
            MessageType::ReviveAway => Self::Event(SpecialEvent::ReviveAway { revived: aux }),
        };

        Ok(message)
    }
}

fn encode_weapon(weapon: &ThrownWeapon, out: &mut [u8]) {
    let fields = [
        weapon.index,
        (weapon.position.x * WEAPON_POSITION_SCALE) as i32,
        (weapon.position.y * WEAPON_POSITION_SCALE) as i32,
        (weapon.velocity.x * WEAPON_VELOCITY_SCALE) as i32,
        (weapon.velocity.y * WEAPON_VELOCITY_SCALE) as i32,
    ];
    for (chunk, value) in out.chunks_exact_mut(4).zip(fields) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
}

fn decode_weapon(body: &[u8]) -> ThrownWeapon {
    let field = |i: usize| read_u32_le(body, i * 4) as i32;
    ThrownWeapon {
        index: field(0),
        position: Vec2::new(
            field(1) as f32 / WEAPON_POSITION_SCALE,
            field(2) as f32 / WEAPON_POSITION_SCALE,
        ),
        velocity: Vec2::new(
            field(3) as f32 / WEAPON_VELOCITY_SCALE,
            field(4) as f32 / WEAPON_VELOCITY_SCALE,
        ),
    }
}

// Callers check the body length first.
fn read_u32_le(buf: &[u8], start: usize) -> u32 {
    u32::from_le_bytes([buf[start], buf[start + 1], buf[start + 2], buf[start + 3]])
}
