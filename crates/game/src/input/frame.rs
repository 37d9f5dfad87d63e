use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};
use thiserror::Error;

/// One tick of controller input from one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct InputFrame {
    pub frame: u32,
    pub buttons: u16,
    pub stick: [i8; 2],
}

impl InputFrame {
    pub fn new(frame: u32, buttons: u16, stick: [i8; 2]) -> Self {
        Self {
            frame,
            buttons,
            stick,
        }
    }
}

/// Payload of a state packet: every input the opponent has not acknowledged
/// yet, oldest first, plus an optional full-state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct InputBatch {
    pub first_sequence: u16,
    pub frames: Vec<InputFrame>,
    pub full_state: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl InputBatch {
    pub fn sequence_of(&self, index: usize) -> u16 {
        self.first_sequence.wrapping_add(index as u16)
    }

    pub fn last_sequence(&self) -> Option<u16> {
        self.frames
            .len()
            .checked_sub(1)
            .map(|index| self.sequence_of(index))
    }

    pub fn serialize(&self) -> Result<AlignedVec, BatchError> {
        rkyv::to_bytes::<rancor::Error>(self).map_err(BatchError::Serialize)
    }

    /// Decodes a batch from an arbitrary slice. The bytes are copied into
    /// an aligned buffer first since packet payloads sit at odd offsets.
    pub fn deserialize(data: &[u8]) -> Result<Self, BatchError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(BatchError::Deserialize)
    }
}
