use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::transport::{PeerTransport, SendMode};

#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    /// Drop probability in percent, 0 to 100.
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.random::<f32>() * 100.0 < self.loss_percent
    }

    pub fn delay_ms(&self, rng: &mut impl Rng) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let jitter = if self.jitter_ms > 0 {
            rng.random_range(0..=self.jitter_ms)
        } else {
            0
        };
        self.min_latency_ms + rng.random_range(0..=range) + jitter
    }
}

#[derive(Debug)]
struct DelayedDatagram<P> {
    release_time: Instant,
    peer: P,
    data: Vec<u8>,
}

impl<P> PartialEq for DelayedDatagram<P> {
    fn eq(&self, other: &Self) -> bool {
        self.release_time == other.release_time
    }
}

impl<P> Eq for DelayedDatagram<P> {}

impl<P> PartialOrd for DelayedDatagram<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for DelayedDatagram<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.release_time.cmp(&self.release_time)
    }
}

/// Wraps a transport and degrades its unreliable channel. Reliable sends
/// pass straight through.
pub struct SimulatedTransport<T: PeerTransport> {
    inner: T,
    config: PacketLossSimulation,
    rng: StdRng,
    outbound: BinaryHeap<DelayedDatagram<T::Peer>>,
    dropped: u64,
}

impl<T: PeerTransport> SimulatedTransport<T> {
    pub fn new(inner: T, config: PacketLossSimulation) -> Self {
        Self::with_rng(inner, config, StdRng::from_os_rng())
    }

    pub fn seeded(inner: T, config: PacketLossSimulation, seed: u64) -> Self {
        Self::with_rng(inner, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: T, config: PacketLossSimulation, rng: StdRng) -> Self {
        Self {
            inner,
            config,
            rng,
            outbound: BinaryHeap::new(),
            dropped: 0,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn set_config(&mut self, config: PacketLossSimulation) {
        self.config = config;
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn delayed(&self) -> usize {
        self.outbound.len()
    }

    /// Sends every delayed datagram whose release time has passed.
    pub fn flush(&mut self) -> io::Result<()> {
        let now = Instant::now();
        while self.outbound.peek().is_some_and(|d| d.release_time <= now) {
            if let Some(delayed) = self.outbound.pop() {
                self.inner
                    .send(delayed.peer, &delayed.data, SendMode::Unreliable)?;
            }
        }
        Ok(())
    }

    fn release_due(&mut self) {
        if let Err(err) = self.flush() {
            self.dropped += 1;
            log::warn!("delayed datagram lost: {err}");
        }
    }
}

impl<T: PeerTransport> PeerTransport for SimulatedTransport<T> {
    type Peer = T::Peer;

    fn send(&mut self, peer: Self::Peer, data: &[u8], mode: SendMode) -> io::Result<()> {
        self.release_due();

        if mode == SendMode::Reliable {
            return self.inner.send(peer, data, mode);
        }

        if self.config.should_drop(&mut self.rng) {
            self.dropped += 1;
            log::trace!("simulated loss of {} byte datagram", data.len());
            return Ok(());
        }

        let delay = self.config.delay_ms(&mut self.rng);
        if delay == 0 {
            return self.inner.send(peer, data, mode);
        }

        self.outbound.push(DelayedDatagram {
            release_time: Instant::now() + Duration::from_millis(delay as u64),
            peer,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn pending(&mut self) -> io::Result<Option<usize>> {
        self.release_due();
        self.inner.pending()
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, Self::Peer)> {
        self.inner.recv(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::LoopbackTransport;

    fn lossy(percent: f32) -> PacketLossSimulation {
        PacketLossSimulation {
            enabled: true,
            loss_percent: percent,
            ..Default::default()
        }
    }

    #[test]
    fn total_loss_spares_reliable_sends() {
        let (a, mut b) = LoopbackTransport::pair(1, 2);
        let mut sim = SimulatedTransport::seeded(a, lossy(100.0), 7);

        for _ in 0..10 {
            sim.send(2, &[0], SendMode::Unreliable).unwrap();
        }
        sim.send(2, &[1], SendMode::Reliable).unwrap();

        assert_eq!(sim.dropped(), 10);
        assert_eq!(b.queued(), 1);
        assert_eq!(b.take_raw(), Some((1, SendMode::Reliable, vec![1])));
    }

    #[test]
    fn disabled_simulation_is_transparent() {
        let (a, b) = LoopbackTransport::pair(1, 2);
        let mut sim = SimulatedTransport::seeded(a, PacketLossSimulation::default(), 7);

        for _ in 0..5 {
            sim.send(2, &[0], SendMode::Unreliable).unwrap();
        }
        assert_eq!(sim.dropped(), 0);
        assert_eq!(b.queued(), 5);
    }

    #[test]
    fn latency_holds_datagrams_until_release() {
        let (a, b) = LoopbackTransport::pair(1, 2);
        let config = PacketLossSimulation {
            enabled: true,
            min_latency_ms: 20,
            max_latency_ms: 20,
            ..Default::default()
        };
        let mut sim = SimulatedTransport::seeded(a, config, 7);

        sim.send(2, &[0], SendMode::Unreliable).unwrap();
        assert_eq!(sim.delayed(), 1);
        assert_eq!(b.queued(), 0);

        std::thread::sleep(Duration::from_millis(30));
        sim.flush().unwrap();
        assert_eq!(sim.delayed(), 0);
        assert_eq!(b.queued(), 1);
    }

    #[test]
    fn undeliverable_delayed_datagram_is_counted_as_lost() {
        let (a, b) = LoopbackTransport::pair(1, 2);
        let config = PacketLossSimulation {
            enabled: true,
            min_latency_ms: 5,
            max_latency_ms: 5,
            ..Default::default()
        };
        let mut sim = SimulatedTransport::seeded(a, config, 7);

        sim.send(2, &[0], SendMode::Unreliable).unwrap();
        drop(b);
        std::thread::sleep(Duration::from_millis(15));

        assert_eq!(sim.pending().unwrap(), None);
        assert_eq!(sim.delayed(), 0);
        assert_eq!(sim.dropped(), 1);
    }

    #[test]
    fn loss_rate_is_roughly_honoured() {
        let mut rng = StdRng::seed_from_u64(42);
        let sim = lossy(25.0);
        let dropped = (0..10_000).filter(|_| sim.should_drop(&mut rng)).count();
        assert!((2_000..3_000).contains(&dropped), "dropped {dropped}");
    }
}
