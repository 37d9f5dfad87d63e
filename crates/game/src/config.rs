use crate::input::JitterConfig;
use crate::net::{HEADER_LEN, MAX_PACKET_SIZE, SequencePolicy};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub sequence_policy: SequencePolicy,
    pub jitter: JitterConfig,
    /// Local inputs kept for resending until the opponent acknowledges them.
    pub max_unacked_inputs: usize,
    /// Upper bound for the serialized input batch in one state packet.
    pub max_payload: usize,
    pub event_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sequence_policy: SequencePolicy::SlackWindow,
            jitter: JitterConfig::default(),
            max_unacked_inputs: 64,
            max_payload: MAX_PACKET_SIZE - HEADER_LEN,
            event_queue_capacity: 32,
        }
    }
}
