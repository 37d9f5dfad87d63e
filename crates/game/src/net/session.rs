use std::sync::Arc;

use crate::event::{EventSignals, SpecialEvent};

use super::error::{DecodeError, TransportError};
use super::handshake::{HandshakeState, SharedSettings};
use super::protocol::{
    HEADER_LEN, Handshake, MAX_PACKET_SIZE, Message, MessageHeader, RECV_BUFFER_SIZE,
    SEND_BUFFER_SIZE, StateKind, StatePacket,
};
use super::sequence::{SequenceGuard, SequencePolicy, SequenceVerdict};
use super::stats::{NetworkStats, TransportCounters};
use super::transport::{PeerTransport, SendMode};

/// What the serializer wrote into the state part of the send buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillResult {
    pub bytes_written: usize,
    pub full_state: bool,
}

impl FillResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The input/state serializer that sits above the transport.
pub trait StateExchange {
    /// Writes as much local input or state as fits into `buf`.
    fn fill_send_buffer(&mut self, buf: &mut [u8]) -> FillResult;

    /// Hands over an accepted state packet from the opponent.
    fn parse_recv_buffer(&mut self, packet: StatePacket<'_>);

    /// Newest remote input sequence consumed, echoed back in every header.
    fn last_received_sequence(&self) -> u16;

    fn pop_special_event(&mut self) -> Option<SpecialEvent>;

    /// Forgets per-match state. Called from [`NetworkTransport::reset_session`].
    fn reset(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventDrain {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSend {
    Sent { sequence: u16, bytes: usize },
    /// The serializer had nothing new.
    Skipped,
    /// The transport refused the datagram. The next tick supersedes it.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub events: EventDrain,
    pub state: StateSend,
}

/// Tally of one `receive_data` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveReport {
    pub states: usize,
    pub events: usize,
    pub stale: usize,
    pub ignored: usize,
    pub corrupt: usize,
    pub rejected_events: usize,
    pub protocol_errors: usize,
}

impl ReceiveReport {
    pub fn received_state(&self) -> bool {
        self.states > 0
    }
}

/// Per-match connection to the opponent.
///
/// Owns the send and receive buffers, so every call must come from the
/// network thread. Counters, event signals and settings are shared through
/// `Arc`s with the simulation thread.
pub struct NetworkTransport<T: PeerTransport, S: StateExchange> {
    pub(super) transport: T,
    pub(super) exchange: S,
    pub(super) opponent: T::Peer,
    pub(super) send_buffer: Box<[u8]>,
    pub(super) recv_buffer: Box<[u8]>,
    pub(super) guard: SequenceGuard,
    pub(super) counters: Arc<TransportCounters>,
    pub(super) signals: Arc<EventSignals>,
    pub(super) settings: Arc<SharedSettings>,
    pub(super) handshake: HandshakeState,
    pub(super) remote_handshake: Option<Handshake>,
}

impl<T: PeerTransport, S: StateExchange> NetworkTransport<T, S> {
    pub fn new(
        transport: T,
        exchange: S,
        opponent: T::Peer,
        settings: Arc<SharedSettings>,
        policy: SequencePolicy,
    ) -> Self {
        Self {
            transport,
            exchange,
            opponent,
            send_buffer: vec![0u8; SEND_BUFFER_SIZE].into_boxed_slice(),
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
            guard: SequenceGuard::new(policy),
            counters: Arc::new(TransportCounters::new()),
            signals: Arc::new(EventSignals::new()),
            settings,
            handshake: HandshakeState::Idle,
            remote_handshake: None,
        }
    }

    pub fn opponent(&self) -> T::Peer {
        self.opponent
    }

    pub fn counters(&self) -> Arc<TransportCounters> {
        Arc::clone(&self.counters)
    }

    pub fn signals(&self) -> Arc<EventSignals> {
        Arc::clone(&self.signals)
    }

    pub fn settings(&self) -> Arc<SharedSettings> {
        Arc::clone(&self.settings)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn exchange(&self) -> &S {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut S {
        &mut self.exchange
    }

    /// Answers an incoming session request. Only the opponent is let in.
    pub fn accept_session_request(&self, requester: T::Peer) -> bool {
        if requester == self.opponent {
            log::info!("accepting session with opponent {requester:?}");
            true
        } else {
            log::warn!("denying session request from {requester:?}, not our opponent");
            false
        }
    }

    /// The layer below could not reach the opponent. Its own timeout decides
    /// when the session is dead.
    pub fn on_session_connect_fail(&self, peer: T::Peer) {
        log::warn!("failed to reach {peer:?}, waiting on session timeout");
    }

    /// Sends every queued local event as its own reliable packet. Failures
    /// are logged and the event is dropped.
    pub fn send_special_events(&mut self) -> EventDrain {
        let mut drain = EventDrain::default();

        while let Some(event) = self.exchange.pop_special_event() {
            log::debug!("sending special event {:?}", event.message_type());
            match self.send_message(&Message::Event(event), SendMode::Reliable) {
                Ok(_) => drain.sent += 1,
                Err(err) => {
                    drain.failed += 1;
                    log::warn!("failed to send {:?}: {err}", event.message_type());
                }
            }
        }

        drain
    }

    /// One network tick of outbound traffic: queued events first, then at
    /// most one unreliable state packet.
    ///
    /// Only an oversized state packet is an error. Nothing is sent for it.
    pub fn send_data(&mut self) -> Result<SendReport, TransportError> {
        let events = self.send_special_events();

        self.send_buffer.fill(0);
        let fill = self
            .exchange
            .fill_send_buffer(&mut self.send_buffer[HEADER_LEN..]);
        if fill.bytes_written == 0 {
            return Ok(SendReport {
                events,
                state: StateSend::Skipped,
            });
        }

        let size = HEADER_LEN + fill.bytes_written;
        let limit = MAX_PACKET_SIZE.min(self.send_buffer.len());
        if size > limit {
            log::error!("state packet of {size} bytes exceeds limit of {limit}, not sent");
            return Err(TransportError::OversizePacket { size, limit });
        }

        let kind = if fill.full_state {
            StateKind::FullState
        } else {
            StateKind::Standard
        };
        let sequence = self.counters.next_packet_sequence();
        let header = MessageHeader {
            message_type: kind.message_type() as u8,
            auxiliary: 0,
            sequence,
            last_input_ack: self.exchange.last_received_sequence(),
        };
        let mut header_bytes = [0u8; HEADER_LEN];
        header.encode_into(&mut header_bytes);
        self.send_buffer[..HEADER_LEN].copy_from_slice(&header_bytes);

        let state = match self
            .transport
            .send(self.opponent, &self.send_buffer[..size], SendMode::Unreliable)
        {
            Ok(()) => {
                self.counters.add_bytes_sent(size);
                StateSend::Sent {
                    sequence,
                    bytes: size,
                }
            }
            Err(err) => {
                log::warn!("state packet {sequence} send failed: {err}");
                StateSend::Failed
            }
        };

        Ok(SendReport { events, state })
    }

    /// Drains every datagram the transport has queued.
    pub fn receive_data(&mut self) -> Result<ReceiveReport, TransportError> {
        let mut report = ReceiveReport::default();

        while let Some(len) = self.next_datagram()? {
            let message = match Message::decode(&self.recv_buffer[..len]) {
                Ok(message) => message,
                Err(DecodeError::Truncated { needed, actual }) => {
                    self.counters.record_corrupt();
                    report.corrupt += 1;
                    log::warn!("corrupt datagram: {actual} of {needed} bytes");
                    continue;
                }
                Err(err) => {
                    self.counters.record_protocol_error();
                    report.protocol_errors += 1;
                    log::error!("protocol error from {:?}: {err}", self.opponent);
                    continue;
                }
            };

            match message {
                Message::State(packet) => {
                    match self.guard.check(packet.sequence) {
                        SequenceVerdict::Stale => {
                            self.counters.record_stale();
                            report.stale += 1;
                            log::trace!(
                                "dropping out of order packet {}, last was {}",
                                packet.sequence,
                                self.guard.last_received()
                            );
                            continue;
                        }
                        SequenceVerdict::Reset => {
                            log::debug!("sequence window reset at {}", packet.sequence);
                        }
                        SequenceVerdict::Accepted => {}
                    }

                    self.counters
                        .set_last_packet_received(self.guard.last_received());
                    self.exchange.parse_recv_buffer(packet);
                    report.states += 1;
                }
                Message::Event(event) => {
                    if self.signals.apply(&event) {
                        report.events += 1;
                    } else {
                        report.rejected_events += 1;
                        log::warn!("ignoring {event:?}: weapon index out of range");
                    }
                }
                Message::Handshake(_) | Message::HandshakeAck(_) | Message::Fragment { .. } => {
                    report.ignored += 1;
                }
            }
        }

        Ok(report)
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.counters.total_bytes_sent()
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.counters.total_bytes_received()
    }

    pub fn stats(&self) -> NetworkStats {
        self.counters.snapshot()
    }

    pub fn reset_send_receive_counters(&self) {
        self.counters.reset_byte_counters();
    }

    /// Forgets the last received sequence so the next state packet is taken
    /// whatever its number.
    pub fn reset(&mut self) {
        self.guard.reset();
        self.counters.set_last_packet_received(0);
    }

    /// Starts a new match on the same connection. The handshake result is
    /// kept.
    pub fn reset_session(&mut self) {
        self.reset();
        self.counters.reset();
        self.signals.clear();
        self.exchange.reset();
        log::debug!("session with {:?} reset", self.opponent);
    }

    /// Encodes `message` into the send buffer and sends it to the opponent.
    pub(super) fn send_message(
        &mut self,
        message: &Message<'_>,
        mode: SendMode,
    ) -> Result<usize, TransportError> {
        self.send_buffer.fill(0);
        let size = message.encode(&mut self.send_buffer)?;
        if size > MAX_PACKET_SIZE {
            log::error!("{:?} of {size} bytes exceeds MTU", message.message_type());
            return Err(TransportError::OversizePacket {
                size,
                limit: MAX_PACKET_SIZE,
            });
        }

        self.transport
            .send(self.opponent, &self.send_buffer[..size], mode)
            .map_err(TransportError::Send)?;
        self.counters.add_bytes_sent(size);
        Ok(size)
    }

    /// Reads the next datagram from the opponent into the receive buffer and
    /// returns its length. Oversized datagrams and other senders are skipped.
    pub(super) fn next_datagram(&mut self) -> Result<Option<usize>, TransportError> {
        while let Some(size) = self.transport.pending().map_err(TransportError::Recv)? {
            self.counters.add_bytes_received(size);
            self.recv_buffer.fill(0);

            let (len, from) = self
                .transport
                .recv(&mut self.recv_buffer)
                .map_err(TransportError::Recv)?;

            if size > self.recv_buffer.len() {
                self.counters.record_corrupt();
                log::error!(
                    "discarding {size} byte datagram from {from:?}, receive buffer is {}",
                    self.recv_buffer.len()
                );
                continue;
            }

            if from != self.opponent {
                self.counters.record_foreign();
                log::trace!("dropping {len} byte datagram from {from:?}");
                continue;
            }

            return Ok(Some(len));
        }

        Ok(None)
    }
}
