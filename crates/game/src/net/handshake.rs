use std::sync::atomic::{AtomicU8, Ordering};

use super::error::{DecodeError, HandshakeError};
use super::protocol::{Handshake, HandshakeAck, Message, MessageType, TeamColours};
use super::session::{NetworkTransport, StateExchange};
use super::transport::{PeerTransport, SendMode};

/// What the handshake poll found in one datagram.
enum Inbound {
    Handshake(Handshake),
    Ack(HandshakeAck),
    Other(MessageType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    HandshakeSent,
    HandshakeAckWaiting,
    Synchronized,
}

/// Team colour settings shared with the menu and renderer threads.
///
/// `colours` is what the local player picked. `online_colours` is what the
/// match is played with once the handshake has resolved clashes.
#[derive(Debug, Default)]
pub struct SharedSettings {
    primary: AtomicU8,
    secondary: AtomicU8,
    primary_online: AtomicU8,
    secondary_online: AtomicU8,
}

impl SharedSettings {
    pub fn new(colours: TeamColours) -> Self {
        Self {
            primary: AtomicU8::new(colours.primary),
            secondary: AtomicU8::new(colours.secondary),
            primary_online: AtomicU8::new(colours.primary),
            secondary_online: AtomicU8::new(colours.secondary),
        }
    }

    pub fn colours(&self) -> TeamColours {
        TeamColours::new(
            self.primary.load(Ordering::Acquire),
            self.secondary.load(Ordering::Acquire),
        )
    }

    pub fn set_colours(&self, colours: TeamColours) {
        self.primary.swap(colours.primary, Ordering::AcqRel);
        self.secondary.swap(colours.secondary, Ordering::AcqRel);
    }

    pub fn set_secondary(&self, secondary: u8) {
        self.secondary.swap(secondary, Ordering::AcqRel);
    }

    pub fn online_colours(&self) -> TeamColours {
        TeamColours::new(
            self.primary_online.load(Ordering::Acquire),
            self.secondary_online.load(Ordering::Acquire),
        )
    }

    pub fn set_online_colours(&self, colours: TeamColours) {
        self.primary_online.swap(colours.primary, Ordering::AcqRel);
        self.secondary_online.swap(colours.secondary, Ordering::AcqRel);
    }
}

/// Colours to play with after seeing the remote handshake.
///
/// Matching primaries keep the local selection. Otherwise the remote
/// primary is adopted and the local primary becomes the secondary.
pub fn resolve_online_colours(local: TeamColours, remote: TeamColours) -> TeamColours {
    if local.primary == remote.primary {
        local
    } else {
        TeamColours::new(remote.primary, local.primary)
    }
}

/// Local secondary colour after seeing the remote ack.
pub fn resolve_secondary(local: TeamColours, remote: TeamColours) -> u8 {
    if local.primary == remote.primary {
        remote.secondary
    } else {
        remote.primary
    }
}

impl<T: PeerTransport, S: StateExchange> NetworkTransport<T, S> {
    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake
    }

    pub fn is_synchronized(&self) -> bool {
        self.handshake == HandshakeState::Synchronized
    }

    /// Sends our colours to the opponent. May be repeated until the remote
    /// handshake has been seen.
    pub fn send_start_game_handshake(&mut self) -> Result<(), HandshakeError> {
        self.expect_state(
            "send_start_game_handshake",
            &[HandshakeState::Idle, HandshakeState::HandshakeSent],
        )?;

        let message = Message::Handshake(Handshake::new(self.settings.colours()));
        self.send_message(&message, SendMode::Reliable)?;

        log::debug!("sent start game handshake to {:?}", self.opponent);
        self.handshake = HandshakeState::HandshakeSent;
        Ok(())
    }

    /// Polls for the opponent's handshake. `Ok(false)` means nothing usable
    /// has arrived yet; call again next tick.
    pub fn recv_start_game_handshake(&mut self) -> Result<bool, HandshakeError> {
        self.expect_state(
            "recv_start_game_handshake",
            &[HandshakeState::Idle, HandshakeState::HandshakeSent],
        )?;
        if self.remote_handshake.is_some() {
            return Ok(true);
        }

        while let Some(len) = self.next_datagram()? {
            let handshake = match self.decode_handshake_message(len)? {
                Some(Inbound::Handshake(handshake)) => handshake,
                Some(Inbound::Ack(_)) => {
                    self.counters.record_protocol_error();
                    log::error!("handshake ack arrived before the handshake");
                    return Err(HandshakeError::UnexpectedMessage(MessageType::StartGameAck));
                }
                Some(Inbound::Other(kind)) => {
                    log::debug!("ignoring {kind:?} while waiting for handshake");
                    continue;
                }
                None => continue,
            };

            if !handshake.is_verified() {
                self.counters.record_protocol_error();
                log::error!(
                    "handshake verification mismatch: {:#010x}",
                    handshake.verification
                );
                return Err(HandshakeError::VerificationMismatch {
                    received: handshake.verification,
                });
            }

            let online = resolve_online_colours(self.settings.colours(), handshake.colours);
            self.settings.set_online_colours(online);
            self.remote_handshake = Some(handshake);

            log::debug!(
                "handshake from {:?}: game type {}, online colours {}/{}",
                self.opponent,
                handshake.game_type,
                online.primary,
                online.secondary
            );
            return Ok(true);
        }

        Ok(false)
    }

    pub fn send_handshake_ack(&mut self) -> Result<(), HandshakeError> {
        self.expect_state("send_handshake_ack", &[HandshakeState::HandshakeSent])?;
        if self.remote_handshake.is_none() {
            return Err(HandshakeError::InvalidState {
                operation: "send_handshake_ack",
                state: self.handshake,
            });
        }

        let message = Message::HandshakeAck(HandshakeAck {
            colours: self.settings.colours(),
        });
        self.send_message(&message, SendMode::Reliable)?;

        log::debug!("sent handshake ack to {:?}", self.opponent);
        self.handshake = HandshakeState::HandshakeAckWaiting;
        Ok(())
    }

    /// Polls for the opponent's ack. On success the session is synchronized
    /// and state packets may flow.
    pub fn recv_handshake_ack(&mut self) -> Result<bool, HandshakeError> {
        if self.handshake == HandshakeState::Synchronized {
            return Ok(true);
        }
        self.expect_state("recv_handshake_ack", &[HandshakeState::HandshakeAckWaiting])?;

        while let Some(len) = self.next_datagram()? {
            let ack = match self.decode_handshake_message(len)? {
                Some(Inbound::Ack(ack)) => ack,
                Some(Inbound::Handshake(_)) => {
                    log::debug!("ignoring repeated handshake while waiting for ack");
                    continue;
                }
                Some(Inbound::Other(kind)) => {
                    log::debug!("ignoring {kind:?} while waiting for ack");
                    continue;
                }
                None => continue,
            };

            let local = self.settings.colours();
            let secondary = resolve_secondary(local, ack.colours);
            self.settings.set_secondary(secondary);
            self.handshake = HandshakeState::Synchronized;

            log::debug!(
                "handshake ack from {:?}, secondary colour {secondary}",
                self.opponent
            );
            return Ok(true);
        }

        Ok(false)
    }

    /// Decodes the datagram in the receive buffer. Truncated datagrams are
    /// counted and skipped; unknown types fail the handshake.
    fn decode_handshake_message(&mut self, len: usize) -> Result<Option<Inbound>, HandshakeError> {
        match Message::decode(&self.recv_buffer[..len]) {
            Ok(Message::Handshake(handshake)) => Ok(Some(Inbound::Handshake(handshake))),
            Ok(Message::HandshakeAck(ack)) => Ok(Some(Inbound::Ack(ack))),
            Ok(other) => Ok(Some(Inbound::Other(other.message_type()))),
            Err(DecodeError::Truncated { needed, actual }) => {
                self.counters.record_corrupt();
                log::warn!("corrupt datagram during handshake: {actual} of {needed} bytes");
                Ok(None)
            }
            Err(err) => {
                self.counters.record_protocol_error();
                log::error!("protocol error during handshake: {err}");
                Err(HandshakeError::Malformed(err))
            }
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[HandshakeState],
    ) -> Result<(), HandshakeError> {
        if allowed.contains(&self.handshake) {
            Ok(())
        } else {
            Err(HandshakeError::InvalidState {
                operation,
                state: self.handshake,
            })
        }
    }
}
