mod config;
mod peer;

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use config::PeerConfig;
use kickoff::{JitterConfig, PacketLossSimulation, SequencePolicy, SyncConfig, TeamColours};
use peer::MatchSummary;

#[derive(Parser)]
#[command(name = "kickoff-peer")]
#[command(about = "Headless peer for the kickoff sync layer")]
struct Args {
    #[arg(long, help = "Local UDP address; omit with --remote to run both peers in-process")]
    bind: Option<String>,

    #[arg(long, help = "Opponent UDP address")]
    remote: Option<String>,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short = 'n', long, default_value_t = 600, help = "Ticks to play, 0 for no limit")]
    ticks: u32,

    #[arg(long, default_value_t = 0)]
    primary_colour: u8,

    #[arg(long, default_value_t = 1)]
    secondary_colour: u8,

    #[arg(long, default_value_t = 5, help = "Handshake timeout in seconds")]
    handshake_timeout: u64,

    #[arg(long, help = "Order state packets with circular 16-bit comparison")]
    circular_sequences: bool,

    #[arg(long, default_value_t = 2, help = "Remote inputs buffered before playback")]
    jitter_depth: usize,

    #[arg(long, help = "Enable packet loss simulation on state packets")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, help = "Seed for the loss simulation")]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let packet_loss = args.simulate_packet_loss.then(|| PacketLossSimulation {
        enabled: true,
        loss_percent: args.loss_percent,
        min_latency_ms: args.min_latency,
        max_latency_ms: args.max_latency,
        jitter_ms: args.jitter,
    });

    let defaults = SyncConfig::default();
    let config = PeerConfig {
        tick_rate: args.tick_rate,
        ticks: args.ticks,
        colours: TeamColours::new(args.primary_colour, args.secondary_colour),
        handshake_timeout: Duration::from_secs(args.handshake_timeout),
        packet_loss,
        seed: args.seed,
        sync: SyncConfig {
            sequence_policy: if args.circular_sequences {
                SequencePolicy::Circular
            } else {
                SequencePolicy::SlackWindow
            },
            jitter: JitterConfig {
                target_depth: args.jitter_depth,
                max_depth: defaults.jitter.max_depth.max(args.jitter_depth * 4),
            },
            ..defaults
        },
    };

    match (args.bind.as_deref(), args.remote.as_deref()) {
        (Some(bind), Some(remote)) => {
            let summary = peer::run_udp(bind, remote, config)?;
            report("local", &summary);
        }
        (None, None) => {
            let (home, away) = peer::run_loopback(config)?;
            report("home", &home);
            report("away", &away);
        }
        _ => bail!("--bind and --remote must be given together"),
    }

    Ok(())
}

fn report(side: &str, summary: &MatchSummary) {
    let stats = &summary.stats;
    log::info!(
        "{side}: {} ticks, {} states and {} events received, colours {}/{}",
        summary.ticks,
        summary.states_received,
        summary.events_received,
        summary.online_colours.primary,
        summary.online_colours.secondary
    );
    log::info!(
        "{side}: {} B sent, {} B received, {} stale, {} foreign, {} corrupt, {} protocol errors",
        stats.bytes_sent,
        stats.bytes_received,
        stats.stale_dropped,
        stats.foreign_dropped,
        stats.corrupt_dropped,
        stats.protocol_errors
    );
}
