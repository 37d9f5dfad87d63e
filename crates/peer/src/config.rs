use std::time::Duration;

use kickoff::{PacketLossSimulation, SyncConfig, TeamColours};

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub tick_rate: u32,
    /// Ticks to play after the handshake. 0 runs until stopped.
    pub ticks: u32,
    pub colours: TeamColours,
    pub handshake_timeout: Duration,
    pub packet_loss: Option<PacketLossSimulation>,
    pub seed: Option<u64>,
    pub sync: SyncConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            ticks: 600,
            colours: TeamColours::new(0, 1),
            handshake_timeout: Duration::from_secs(5),
            packet_loss: None,
            seed: None,
            sync: SyncConfig::default(),
        }
    }
}

impl PeerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn packet_loss(&self) -> PacketLossSimulation {
        self.packet_loss.clone().unwrap_or_default()
    }
}
