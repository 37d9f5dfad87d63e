use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec2;
use kickoff::event::{EventFlags, MAX_WEAPONS};
use kickoff::net::{
    FillResult, Handshake, HandshakeAck, HandshakeError, HandshakeState, HEADER_LEN,
    LoopbackTransport, MAX_PACKET_SIZE, Message, PacketLossSimulation, PeerTransport,
    SendMode, SequencePolicy, SharedSettings, SimulatedTransport, StateExchange, StateKind,
    StatePacket, StateSend, TeamColours, TransportError,
};
use kickoff::{InputBuffer, NetworkTransport, SpecialEvent, SyncConfig, ThrownWeapon};

const HOME: u64 = 1;
const AWAY: u64 = 2;

#[derive(Debug, Default)]
struct Scripted {
    events: VecDeque<SpecialEvent>,
    payload: Vec<u8>,
    full_state: bool,
    ack: u16,
    parsed: Vec<(u16, StateKind, Vec<u8>)>,
    resets: usize,
}

impl StateExchange for Scripted {
    fn fill_send_buffer(&mut self, buf: &mut [u8]) -> FillResult {
        let len = self.payload.len().min(buf.len());
        buf[..len].copy_from_slice(&self.payload[..len]);
        FillResult {
            bytes_written: len,
            full_state: self.full_state,
        }
    }

    fn parse_recv_buffer(&mut self, packet: StatePacket<'_>) {
        self.parsed
            .push((packet.sequence, packet.kind, packet.payload.to_vec()));
    }

    fn last_received_sequence(&self) -> u16 {
        self.ack
    }

    fn pop_special_event(&mut self) -> Option<SpecialEvent> {
        self.events.pop_front()
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

type Session = NetworkTransport<LoopbackTransport, Scripted>;

fn session_pair(home: TeamColours, away: TeamColours) -> (Session, Session) {
    let (a, b) = LoopbackTransport::pair(HOME, AWAY);
    (
        NetworkTransport::new(
            a,
            Scripted::default(),
            AWAY,
            Arc::new(SharedSettings::new(home)),
            SequencePolicy::SlackWindow,
        ),
        NetworkTransport::new(
            b,
            Scripted::default(),
            HOME,
            Arc::new(SharedSettings::new(away)),
            SequencePolicy::SlackWindow,
        ),
    )
}

fn synchronize(home: &mut Session, away: &mut Session) {
    home.send_start_game_handshake().unwrap();
    away.send_start_game_handshake().unwrap();

    assert!(home.recv_start_game_handshake().unwrap());
    assert!(away.recv_start_game_handshake().unwrap());

    home.send_handshake_ack().unwrap();
    away.send_handshake_ack().unwrap();

    assert!(home.recv_handshake_ack().unwrap());
    assert!(away.recv_handshake_ack().unwrap());
}

/// Sends an already-encoded message from `from` to its opponent, bypassing
/// the session logic.
fn inject(from: &mut Session, message: &Message<'_>, mode: SendMode) {
    let mut buf = vec![0u8; message.encoded_len()];
    message.encode(&mut buf).unwrap();
    let to = from.opponent();
    from.transport_mut().send(to, &buf, mode).unwrap();
}

fn state(sequence: u16, payload: &[u8]) -> Message<'_> {
    Message::State(StatePacket {
        kind: StateKind::Standard,
        sequence,
        remote_ack: 0,
        payload,
    })
}

#[test]
fn handshake_with_matching_primary_keeps_local_colours() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    synchronize(&mut home, &mut away);

    assert_eq!(home.handshake_state(), HandshakeState::Synchronized);
    assert_eq!(away.handshake_state(), HandshakeState::Synchronized);
    assert_eq!(home.settings().online_colours(), TeamColours::new(0, 1));
    assert_eq!(home.settings().colours(), TeamColours::new(0, 1));
}

#[test]
fn handshake_with_clashing_primary_adopts_remote() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(2, 3));
    synchronize(&mut home, &mut away);

    assert_eq!(home.settings().online_colours(), TeamColours::new(2, 0));
    assert_eq!(away.settings().online_colours(), TeamColours::new(0, 2));

    // The ack round moves each side's secondary onto the other's primary.
    assert_eq!(home.settings().colours(), TeamColours::new(0, 2));
    assert_eq!(away.settings().colours(), TeamColours::new(2, 0));
}

#[test]
fn handshake_poll_without_traffic_is_not_an_error() {
    let (mut home, _away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.send_start_game_handshake().unwrap();
    assert!(!home.recv_start_game_handshake().unwrap());
    assert_eq!(home.handshake_state(), HandshakeState::HandshakeSent);
}

#[test]
fn handshake_verification_mismatch_fails() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let forged = Handshake {
        verification: 0xDEAD_BEEF,
        ..Handshake::new(TeamColours::new(0, 1))
    };
    inject(&mut away, &Message::Handshake(forged), SendMode::Reliable);

    let err = home.recv_start_game_handshake().unwrap_err();
    assert!(matches!(
        err,
        HandshakeError::VerificationMismatch {
            received: 0xDEAD_BEEF
        }
    ));
    assert_eq!(home.stats().protocol_errors, 1);
}

#[test]
fn ack_before_handshake_is_unexpected() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let ack = HandshakeAck {
        colours: TeamColours::new(0, 1),
    };
    inject(&mut away, &Message::HandshakeAck(ack), SendMode::Reliable);

    assert!(matches!(
        home.recv_start_game_handshake(),
        Err(HandshakeError::UnexpectedMessage(_))
    ));
}

#[test]
fn handshake_poll_stops_at_first_valid_packet() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    away.send_start_game_handshake().unwrap();
    let ack = HandshakeAck {
        colours: TeamColours::new(0, 1),
    };
    inject(&mut away, &Message::HandshakeAck(ack), SendMode::Reliable);

    assert!(home.recv_start_game_handshake().unwrap());
    assert_eq!(home.transport().queued(), 1);
}

#[test]
fn handshake_ignores_gameplay_and_foreign_packets() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let mut stranger = LoopbackTransport::new(9);
    stranger.connect(home.transport());

    let mut buf = [0u8; 64];
    let len = Message::Handshake(Handshake::new(TeamColours::new(5, 5)))
        .encode(&mut buf)
        .unwrap();
    stranger.send(HOME, &buf[..len], SendMode::Reliable).unwrap();
    inject(&mut away, &Message::Event(SpecialEvent::Halftime), SendMode::Reliable);

    assert!(!home.recv_start_game_handshake().unwrap());
    assert_eq!(home.stats().foreign_dropped, 1);
    assert_eq!(home.settings().online_colours(), TeamColours::new(0, 1));
}

#[test]
fn resent_handshake_does_not_break_the_ack_wait() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(2, 3));
    home.send_start_game_handshake().unwrap();
    home.send_start_game_handshake().unwrap();
    away.send_start_game_handshake().unwrap();

    assert!(home.recv_start_game_handshake().unwrap());
    assert!(away.recv_start_game_handshake().unwrap());
    home.send_handshake_ack().unwrap();
    away.send_handshake_ack().unwrap();

    assert!(home.recv_handshake_ack().unwrap());
    assert!(away.recv_handshake_ack().unwrap());
    assert!(away.is_synchronized());
    assert_eq!(away.settings().colours(), TeamColours::new(2, 0));
    assert_eq!(away.stats().protocol_errors, 0);
}

#[test]
fn ack_out_of_order_is_an_invalid_state() {
    let (mut home, _away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    assert!(matches!(
        home.send_handshake_ack(),
        Err(HandshakeError::InvalidState { .. })
    ));
    assert!(matches!(
        home.recv_handshake_ack(),
        Err(HandshakeError::InvalidState { .. })
    ));
}

#[test]
fn events_drain_before_skipped_state() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.exchange_mut().events.extend([
        SpecialEvent::GoalTop { next_kickoff: 1 },
        SpecialEvent::Halftime,
        SpecialEvent::Rematch,
    ]);

    let report = home.send_data().unwrap();
    assert_eq!(report.events.sent, 3);
    assert_eq!(report.state, StateSend::Skipped);

    let transport = away.transport_mut();
    assert_eq!(transport.queued(), 3);
    for _ in 0..3 {
        let (from, mode, _) = transport.take_raw().unwrap();
        assert_eq!(from, HOME);
        assert_eq!(mode, SendMode::Reliable);
    }
}

#[test]
fn events_precede_the_unreliable_state_packet() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.exchange_mut().events.extend([
        SpecialEvent::Halftime,
        SpecialEvent::ReviveHome { revived: 2 },
        SpecialEvent::Rematch,
    ]);
    home.exchange_mut().payload = vec![7; 32];
    home.exchange_mut().ack = 41;

    let report = home.send_data().unwrap();
    assert_eq!(
        report.state,
        StateSend::Sent {
            sequence: 0,
            bytes: HEADER_LEN + 32
        }
    );

    let transport = away.transport_mut();
    let modes: Vec<SendMode> = std::iter::from_fn(|| transport.take_raw())
        .map(|(_, mode, data)| {
            if mode == SendMode::Unreliable {
                let Ok(Message::State(packet)) = Message::decode(&data) else {
                    panic!("expected a state packet");
                };
                assert_eq!(packet.remote_ack, 41);
                assert_eq!(packet.payload, &[7; 32]);
            }
            mode
        })
        .collect();
    assert_eq!(
        modes,
        [
            SendMode::Reliable,
            SendMode::Reliable,
            SendMode::Reliable,
            SendMode::Unreliable
        ]
    );
}

#[test]
fn full_state_flag_selects_message_type() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.exchange_mut().payload = vec![1, 2, 3];
    home.exchange_mut().full_state = true;
    home.send_data().unwrap();

    away.receive_data().unwrap();
    assert_eq!(away.exchange().parsed, [(0, StateKind::FullState, vec![1, 2, 3])]);
}

#[test]
fn oversize_state_packet_never_reaches_transport() {
    let (mut home, away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.exchange_mut().events.push_back(SpecialEvent::Halftime);
    home.exchange_mut().payload = vec![0; MAX_PACKET_SIZE - HEADER_LEN + 1];

    let err = home.send_data().unwrap_err();
    assert!(matches!(
        err,
        TransportError::OversizePacket {
            size: 1201,
            limit: MAX_PACKET_SIZE
        }
    ));

    // The event still went out; the state packet did not and used no
    // sequence number.
    assert_eq!(away.transport().queued(), 1);
    assert_eq!(home.stats().packets_sent, 0);
}

#[test]
fn packet_at_mtu_is_sent() {
    let (mut home, away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.exchange_mut().payload = vec![0; MAX_PACKET_SIZE - HEADER_LEN];

    let report = home.send_data().unwrap();
    assert!(matches!(report.state, StateSend::Sent { bytes: MAX_PACKET_SIZE, .. }));
    assert_eq!(away.transport().queued(), 1);
    assert_eq!(home.total_bytes_sent(), MAX_PACKET_SIZE as u64);
}

#[test]
fn sequence_window_drops_stale_and_resets_on_jumps() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    for sequence in [100, 99, 101, 101, 1000] {
        inject(&mut away, &state(sequence, &[sequence as u8]), SendMode::Unreliable);
    }

    let report = home.receive_data().unwrap();
    assert_eq!(report.states, 4);
    assert_eq!(report.stale, 1);

    let accepted: Vec<u16> = home.exchange().parsed.iter().map(|p| p.0).collect();
    assert_eq!(accepted, [100, 101, 101, 1000]);
    assert_eq!(home.stats().last_packet_received, 1000);
    assert_eq!(home.stats().stale_dropped, 1);
}

#[test]
fn remote_counter_wrap_is_accepted() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    for sequence in [65_534, 65_535, 0, 1] {
        inject(&mut away, &state(sequence, &[1]), SendMode::Unreliable);
    }

    assert_eq!(home.receive_data().unwrap().states, 4);
}

#[test]
fn reset_accepts_any_next_sequence() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    inject(&mut away, &state(30, &[1]), SendMode::Unreliable);
    home.receive_data().unwrap();

    home.reset();
    inject(&mut away, &state(5, &[1]), SendMode::Unreliable);
    assert_eq!(home.receive_data().unwrap().states, 1);
}

#[test]
fn events_raise_signals() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let weapon = ThrownWeapon {
        index: 3,
        position: Vec2::new(1.5, -2.0),
        velocity: Vec2::new(0.25, 4.0),
    };
    away.exchange_mut().events.extend([
        SpecialEvent::GoalBottom { next_kickoff: 1 },
        SpecialEvent::WeaponThrow(weapon),
        SpecialEvent::Rematch,
        SpecialEvent::ReviveAway { revived: 2 },
    ]);
    away.send_data().unwrap();

    let report = home.receive_data().unwrap();
    assert_eq!(report.events, 4);

    let signals = home.signals();
    assert!(signals.take(EventFlags::GOAL_BOTTOM));
    assert!(!signals.take(EventFlags::GOAL_BOTTOM));
    assert_eq!(signals.next_kickoff(), 1);
    assert_eq!(signals.take_weapon_throw(3), Some(weapon));
    assert!(signals.take(EventFlags::REMATCH));
    assert!(signals.opponent_wants_rematch());
    assert!(signals.take(EventFlags::REVIVE_AWAY));
    assert_eq!(signals.players_revived(), 2);
}

#[test]
fn out_of_range_weapon_is_ignored() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let weapon = ThrownWeapon {
        index: MAX_WEAPONS as i32,
        position: Vec2::ZERO,
        velocity: Vec2::ZERO,
    };
    inject(&mut away, &Message::Event(SpecialEvent::WeaponThrow(weapon)), SendMode::Reliable);

    let report = home.receive_data().unwrap();
    assert_eq!(report.events, 0);
    assert_eq!(report.rejected_events, 1);
    assert!(home.signals().pending().is_empty());
}

#[test]
fn receive_path_ignores_handshake_and_fragments() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    inject(
        &mut away,
        &Message::Handshake(Handshake::new(TeamColours::new(4, 4))),
        SendMode::Reliable,
    );
    inject(
        &mut away,
        &Message::Fragment { count: 2, index: 1 },
        SendMode::Unreliable,
    );

    let report = home.receive_data().unwrap();
    assert_eq!(report.ignored, 2);
    assert_eq!(home.settings().online_colours(), TeamColours::new(0, 1));
}

#[test]
fn bad_datagrams_are_counted_not_fatal() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let transport = away.transport_mut();
    // Unknown message type.
    transport.send(HOME, &[0xEE, 0, 0, 0, 0, 0], SendMode::Unreliable).unwrap();
    // Weapon throw with a short body.
    transport.send(HOME, &[8, 0, 0, 0, 0, 0, 1, 2], SendMode::Reliable).unwrap();
    // Shorter than a header.
    transport.send(HOME, &[3, 0], SendMode::Unreliable).unwrap();
    // Larger than the receive buffer.
    transport.send(HOME, &vec![3; 5000], SendMode::Unreliable).unwrap();
    inject(&mut away, &state(1, &[9]), SendMode::Unreliable);

    let report = home.receive_data().unwrap();
    assert_eq!(report.protocol_errors, 1);
    assert_eq!(report.corrupt, 2);
    assert_eq!(report.states, 1);

    let stats = home.stats();
    assert_eq!(stats.protocol_errors, 1);
    assert_eq!(stats.corrupt_dropped, 3);
    assert_eq!(stats.bytes_received, (6 + 8 + 2 + 5000 + HEADER_LEN + 1) as u64);
}

#[test]
fn foreign_packets_count_bytes_but_are_dropped() {
    let (mut home, _away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    let mut stranger = LoopbackTransport::new(9);
    stranger.connect(home.transport());

    let mut buf = [0u8; 16];
    let len = state(0, &[1, 2]).encode(&mut buf).unwrap();
    stranger.send(HOME, &buf[..len], SendMode::Unreliable).unwrap();

    let report = home.receive_data().unwrap();
    assert_eq!(report.states, 0);
    assert!(home.exchange().parsed.is_empty());
    assert_eq!(home.stats().foreign_dropped, 1);
    assert_eq!(home.total_bytes_received(), len as u64);
}

#[test]
fn failed_sends_are_reported_and_not_retried() {
    let (mut home, away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    home.exchange_mut().events.extend([SpecialEvent::Halftime, SpecialEvent::Rematch]);
    home.exchange_mut().payload = vec![1; 8];
    home.transport_mut().set_fail_sends(true);

    let report = home.send_data().unwrap();
    assert_eq!(report.events.failed, 2);
    assert_eq!(report.events.sent, 0);
    assert_eq!(report.state, StateSend::Failed);
    assert_eq!(home.total_bytes_sent(), 0);

    // No redelivery: the events are gone once their send failed.
    home.transport_mut().set_fail_sends(false);
    let report = home.send_data().unwrap();
    assert_eq!(report.events.sent, 0);
    assert!(matches!(report.state, StateSend::Sent { sequence: 1, .. }));
    assert_eq!(away.transport().queued(), 1);
}

#[test]
fn lossy_link_still_delivers_events() {
    let (a, b) = LoopbackTransport::pair(HOME, AWAY);
    let lossy = PacketLossSimulation {
        enabled: true,
        loss_percent: 100.0,
        ..Default::default()
    };
    let mut home = NetworkTransport::new(
        SimulatedTransport::seeded(a, lossy, 11),
        Scripted::default(),
        AWAY,
        Arc::new(SharedSettings::new(TeamColours::new(0, 1))),
        SequencePolicy::SlackWindow,
    );
    home.exchange_mut().events.push_back(SpecialEvent::GoalTop { next_kickoff: 0 });
    home.exchange_mut().payload = vec![1; 8];

    for _ in 0..5 {
        home.send_data().unwrap();
    }

    assert_eq!(home.transport().dropped(), 5);
    assert_eq!(b.queued(), 1);
}

#[test]
fn counters_reset_between_matches() {
    let (mut home, mut away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    synchronize(&mut home, &mut away);
    home.exchange_mut().payload = vec![1; 8];
    home.send_data().unwrap();
    away.receive_data().unwrap();
    away.signals().raise(EventFlags::HALFTIME);

    assert!(away.total_bytes_received() > 0);
    away.reset_send_receive_counters();
    assert_eq!(away.total_bytes_received(), 0);

    home.reset_session();
    away.reset_session();
    assert_eq!(home.stats().packets_sent, 0);
    assert!(away.signals().pending().is_empty());
    assert_eq!(away.exchange().resets, 1);
    assert!(home.is_synchronized());
}

#[test]
fn only_the_opponent_may_open_a_session() {
    let (home, _away) = session_pair(TeamColours::new(0, 1), TeamColours::new(0, 1));
    assert!(home.accept_session_request(AWAY));
    assert!(!home.accept_session_request(9));
    home.on_session_connect_fail(AWAY);
}

#[test]
fn event_burst_from_the_simulation_is_sent_in_full() {
    let (link, mut peer) = LoopbackTransport::pair(HOME, AWAY);
    let (buffer, input, _feed) = InputBuffer::new(&SyncConfig::default());
    let mut session = NetworkTransport::new(
        link,
        buffer,
        AWAY,
        Arc::new(SharedSettings::new(TeamColours::new(0, 1))),
        SequencePolicy::SlackWindow,
    );

    for _ in 0..40 {
        assert!(input.queue_event(SpecialEvent::Halftime));
    }

    let drain = session.send_special_events();
    assert_eq!(drain.sent, 40);
    assert_eq!(drain.failed, 0);
    assert_eq!(peer.queued(), 40);
    assert_eq!(session.exchange().pending_events(), 0);
    assert!(peer.take_raw().is_some());
}
