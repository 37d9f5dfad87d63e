use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, Ordering};

/// Per-session counters written by the network thread.
///
/// Every field is an independent atomic. A reader sees each value whole,
/// but two fields read one after the other may straddle an update.
#[derive(Debug, Default)]
pub struct TransportCounters {
    packets_sent: AtomicU16,
    last_packet_received: AtomicU32,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    stale_dropped: AtomicU64,
    foreign_dropped: AtomicU64,
    corrupt_dropped: AtomicU64,
    protocol_errors: AtomicU64,
}

/// Plain copy of [`TransportCounters`], taken field by field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u16,
    pub last_packet_received: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub stale_dropped: u64,
    pub foreign_dropped: u64,
    pub corrupt_dropped: u64,
    pub protocol_errors: u64,
}

impl TransportCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sequence for the next state packet and advances the
    /// counter, wrapping at `u16::MAX`.
    pub fn next_packet_sequence(&self) -> u16 {
        self.packets_sent.fetch_add(1, Ordering::Relaxed)
    }

    pub fn packets_sent(&self) -> u16 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    pub fn set_last_packet_received(&self, sequence: u32) {
        self.last_packet_received.swap(sequence, Ordering::AcqRel);
    }

    pub fn last_packet_received(&self) -> u32 {
        self.last_packet_received.load(Ordering::Acquire)
    }

    pub fn add_bytes_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn add_bytes_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn total_bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn record_stale(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_foreign(&self) {
        self.foreign_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corrupt(&self) {
        self.corrupt_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset_byte_counters(&self) {
        self.bytes_sent.swap(0, Ordering::Relaxed);
        self.bytes_received.swap(0, Ordering::Relaxed);
    }

    /// Zeroes everything. Used when a new match starts on the same session.
    pub fn reset(&self) {
        self.packets_sent.swap(0, Ordering::Relaxed);
        self.last_packet_received.swap(0, Ordering::AcqRel);
        self.reset_byte_counters();
        self.stale_dropped.swap(0, Ordering::Relaxed);
        self.foreign_dropped.swap(0, Ordering::Relaxed);
        self.corrupt_dropped.swap(0, Ordering::Relaxed);
        self.protocol_errors.swap(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NetworkStats {
        NetworkStats {
            packets_sent: self.packets_sent(),
            last_packet_received: self.last_packet_received(),
            bytes_sent: self.total_bytes_sent(),
            bytes_received: self.total_bytes_received(),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
            foreign_dropped: self.foreign_dropped.load(Ordering::Relaxed),
            corrupt_dropped: self.corrupt_dropped.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
        }
    }
}
