use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kickoff::net::{SharedSettings, StateSend, TeamColours, UdpTransport};
use kickoff::{
    EventFlags, InputBuffer, InputFrame, JitterConfig, LocalInputHandle, NetworkTransport,
    RemoteStateFeed, SpecialEvent, SyncConfig,
};

type Session = NetworkTransport<UdpTransport, InputBuffer>;

struct Peer {
    session: Session,
    input: LocalInputHandle,
    feed: RemoteStateFeed,
}

fn config() -> SyncConfig {
    SyncConfig {
        jitter: JitterConfig {
            target_depth: 0,
            max_depth: 16,
        },
        ..Default::default()
    }
}

fn peers() -> (Peer, Peer) {
    let home_socket = UdpTransport::bind("127.0.0.1:0").unwrap();
    let away_socket = UdpTransport::bind("127.0.0.1:0").unwrap();
    let home_addr = home_socket.local_addr();
    let away_addr = away_socket.local_addr();

    let make = |socket: UdpTransport, opponent: SocketAddr, colours: TeamColours| {
        let config = config();
        let (buffer, input, feed) = InputBuffer::new(&config);
        let session = NetworkTransport::new(
            socket,
            buffer,
            opponent,
            Arc::new(SharedSettings::new(colours)),
            config.sequence_policy,
        );
        Peer {
            session,
            input,
            feed,
        }
    };

    (
        make(home_socket, away_addr, TeamColours::new(0, 1)),
        make(away_socket, home_addr, TeamColours::new(3, 4)),
    )
}

fn poll_until(mut step: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        if step() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn handshake(home: &mut Session, away: &mut Session) {
    home.send_start_game_handshake().unwrap();
    away.send_start_game_handshake().unwrap();
    assert!(poll_until(|| home.recv_start_game_handshake().unwrap()));
    assert!(poll_until(|| away.recv_start_game_handshake().unwrap()));

    home.send_handshake_ack().unwrap();
    away.send_handshake_ack().unwrap();
    assert!(poll_until(|| home.recv_handshake_ack().unwrap()));
    assert!(poll_until(|| away.recv_handshake_ack().unwrap()));
}

#[test]
fn handshake_over_udp() {
    let (mut home, mut away) = peers();
    handshake(&mut home.session, &mut away.session);

    assert!(home.session.is_synchronized());
    assert_eq!(
        home.session.settings().online_colours(),
        TeamColours::new(3, 0)
    );
    assert_eq!(
        away.session.settings().online_colours(),
        TeamColours::new(0, 3)
    );
}

#[test]
fn inputs_and_events_flow_over_udp() {
    let (mut home, mut away) = peers();
    handshake(&mut home.session, &mut away.session);

    for frame in 0..3 {
        home.input.submit_input(InputFrame::new(frame, 1 << frame, [0, 0]));
    }
    home.input.queue_event(SpecialEvent::GoalTop { next_kickoff: 1 });

    let report = home.session.send_data().unwrap();
    assert_eq!(report.events.sent, 1);
    assert!(matches!(report.state, StateSend::Sent { sequence: 0, .. }));

    let mut states = 0;
    assert!(poll_until(|| {
        states += away.session.receive_data().unwrap().states;
        states > 0 && away.session.signals().pending().contains(EventFlags::GOAL_TOP)
    }));

    let frames: Vec<u32> = (0..3).map(|_| away.feed.next_state().frame).collect();
    assert_eq!(frames, [0, 1, 2]);
    assert_eq!(away.session.signals().next_kickoff(), 1);

    // The away side acknowledges on its next send, which trims home's history.
    assert!(matches!(
        away.session.send_data().unwrap().state,
        StateSend::Sent { .. }
    ));
    assert!(poll_until(|| {
        home.session.receive_data().unwrap();
        home.session.exchange().unacked() == 0
    }));
    assert_eq!(home.session.stats().bytes_received, home.session.total_bytes_received());
    assert!(away.session.total_bytes_sent() > 0);
}
