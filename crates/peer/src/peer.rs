use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use glam::Vec2;
use kickoff::net::{LoopbackTransport, StateSend};
use kickoff::{
    EventFlags, InputBuffer, InputFrame, LocalInputHandle, MAX_WEAPONS, NetworkStats,
    NetworkTransport, PeerTransport, RemoteStateFeed, SharedSettings, SimulatedTransport,
    SpecialEvent, TeamColours, ThrownWeapon, UdpTransport,
};

use crate::config::PeerConfig;

const HOME: u64 = 1;
const AWAY: u64 = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct MatchSummary {
    pub ticks: u32,
    pub states_received: usize,
    pub events_received: usize,
    pub oversize_packets: usize,
    pub stats: NetworkStats,
    pub online_colours: TeamColours,
}

/// Drives one side of a match: handshake, then a fixed-rate tick loop with
/// synthetic local input.
pub struct PeerRunner<T: PeerTransport> {
    session: NetworkTransport<SimulatedTransport<T>, InputBuffer>,
    input: LocalInputHandle,
    feed: RemoteStateFeed,
    config: PeerConfig,
    running: Arc<AtomicBool>,
    summary: MatchSummary,
}

impl<T: PeerTransport> PeerRunner<T> {
    pub fn new(
        transport: T,
        opponent: T::Peer,
        config: PeerConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        let transport = match config.seed {
            Some(seed) => SimulatedTransport::seeded(transport, config.packet_loss(), seed),
            None => SimulatedTransport::new(transport, config.packet_loss()),
        };
        let (buffer, input, feed) = InputBuffer::new(&config.sync);
        let session = NetworkTransport::new(
            transport,
            buffer,
            opponent,
            Arc::new(SharedSettings::new(config.colours)),
            config.sync.sequence_policy,
        );

        Self {
            session,
            input,
            feed,
            config,
            running,
            summary: MatchSummary::default(),
        }
    }

    pub fn handshake(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.handshake_timeout;
        let session = &mut self.session;

        session.send_start_game_handshake()?;
        poll_until(deadline, &self.running, || session.recv_start_game_handshake())
            .context("waiting for opponent handshake")?;

        session.send_handshake_ack()?;
        poll_until(deadline, &self.running, || session.recv_handshake_ack())
            .context("waiting for handshake ack")?;

        let online = session.settings().online_colours();
        log::info!(
            "synchronized with {:?}, playing in colours {}/{}",
            session.opponent(),
            online.primary,
            online.secondary
        );
        Ok(())
    }

    pub fn run(mut self) -> Result<MatchSummary> {
        self.handshake()?;

        let tick_duration = self.config.tick_duration();
        let mut last_tick_time = Instant::now();
        let mut accumulator = Duration::ZERO;
        let mut tick = 0u32;

        while self.running.load(Ordering::SeqCst)
            && (self.config.ticks == 0 || tick < self.config.ticks)
        {
            let now = Instant::now();
            accumulator += now - last_tick_time;
            last_tick_time = now;

            while accumulator >= tick_duration {
                accumulator -= tick_duration;
                self.tick(tick)?;
                tick += 1;
            }
            thread::sleep(Duration::from_millis(1));
        }

        self.summary.ticks = tick;
        self.summary.stats = self.session.stats();
        self.summary.online_colours = self.session.settings().online_colours();
        Ok(self.summary)
    }

    fn tick(&mut self, tick: u32) -> Result<()> {
        self.input.submit_input(synthetic_input(tick));
        if let Some(event) = scripted_event(tick) {
            self.input.queue_event(event);
        }

        match self.session.send_data() {
            Ok(report) => {
                if report.state == StateSend::Failed {
                    log::debug!("tick {tick}: state packet lost at send");
                }
            }
            Err(err) => {
                self.summary.oversize_packets += 1;
                log::error!("tick {tick}: {err}");
            }
        }

        let report = self.session.receive_data()?;
        self.summary.states_received += report.states;
        self.summary.events_received += report.events;

        let remote = self.feed.next_state();
        log::trace!("tick {tick}: remote frame {} buttons {:#06x}", remote.frame, remote.buttons);

        let signals = self.session.signals();
        let raised = signals.take_all();
        if raised.intersects(EventFlags::GOAL_TOP | EventFlags::GOAL_BOTTOM) {
            log::info!("opponent scored, team {} kicks off", signals.next_kickoff());
        }
        if raised.contains(EventFlags::HALFTIME) {
            log::info!("halftime");
        }
        if raised.intersects(EventFlags::REVIVE_HOME | EventFlags::REVIVE_AWAY) {
            log::info!("{} players revived", signals.players_revived());
        }
        if raised.contains(EventFlags::REMATCH) {
            log::info!("opponent wants a rematch");
        }
        for index in 0..MAX_WEAPONS {
            if let Some(weapon) = signals.take_weapon_throw(index) {
                log::debug!("weapon {} thrown from {}", weapon.index, weapon.position);
            }
        }

        if tick % self.config.tick_rate.max(1) == 0 {
            let stats = self.session.stats();
            log::debug!(
                "sent {} B, received {} B, stale {}, buffered {}",
                stats.bytes_sent,
                stats.bytes_received,
                stats.stale_dropped,
                self.feed.buffered()
            );
        }
        Ok(())
    }
}

fn poll_until<E>(
    deadline: Instant,
    running: &AtomicBool,
    mut poll: impl FnMut() -> Result<bool, E>,
) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    while Instant::now() < deadline {
        if !running.load(Ordering::SeqCst) {
            bail!("stopped");
        }
        if poll()? {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(1));
    }
    Err(anyhow!("timed out"))
}

fn synthetic_input(tick: u32) -> InputFrame {
    let angle = tick as f32 * 0.05;
    InputFrame::new(
        tick,
        (tick / 15 % 16) as u16,
        [(angle.cos() * 127.0) as i8, (angle.sin() * 127.0) as i8],
    )
}

fn scripted_event(tick: u32) -> Option<SpecialEvent> {
    if tick == 0 {
        return None;
    }
    match tick % 600 {
        0 => Some(SpecialEvent::Halftime),
        300 => Some(SpecialEvent::GoalTop {
            next_kickoff: (tick / 600 % 2) as u8,
        }),
        _ if tick % 90 == 0 => Some(SpecialEvent::WeaponThrow(ThrownWeapon {
            index: (tick / 90) as i32 % MAX_WEAPONS as i32,
            position: Vec2::new(tick as f32 % 40.0, 12.5),
            velocity: Vec2::new(3.0, -1.5),
        })),
        _ => None,
    }
}

/// Plays one side over UDP against a remote process.
pub fn run_udp(bind: &str, remote: &str, config: PeerConfig) -> Result<MatchSummary> {
    let transport = UdpTransport::bind(bind).with_context(|| format!("binding {bind}"))?;
    let opponent: SocketAddr = remote
        .parse()
        .with_context(|| format!("parsing remote address {remote}"))?;
    log::info!("bound {}, opponent {opponent}", transport.local_addr());

    let running = transport.running();
    PeerRunner::new(transport, opponent, config, running).run()
}

/// Plays both sides in this process over an in-memory link.
pub fn run_loopback(config: PeerConfig) -> Result<(MatchSummary, MatchSummary)> {
    let (home_link, away_link) = LoopbackTransport::pair(HOME, AWAY);
    let running = Arc::new(AtomicBool::new(true));

    let away_config = PeerConfig {
        colours: TeamColours::new(
            config.colours.primary.wrapping_add(1),
            config.colours.secondary,
        ),
        seed: config.seed.map(|seed| seed.wrapping_add(1)),
        ..config.clone()
    };

    let away_running = Arc::clone(&running);
    let away = thread::Builder::new()
        .name("away-peer".into())
        .spawn(move || PeerRunner::new(away_link, HOME, away_config, away_running).run())?;

    let home = PeerRunner::new(home_link, AWAY, config, Arc::clone(&running)).run();
    if home.is_err() {
        running.store(false, Ordering::SeqCst);
    }

    let away = away
        .join()
        .map_err(|_| anyhow!("away peer thread panicked"))?;
    Ok((home?, away?))
}
