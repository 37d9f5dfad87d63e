/// Gap beyond which a sequence difference is read as a wrap or a peer reset.
pub const SEQUENCE_SLACK: i32 = 60;

const SEQUENCE_WRAP_THRESHOLD: u16 = u16::MAX / 2;

#[inline]
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

/// How incoming state-packet sequence numbers are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencePolicy {
    /// Plain numeric comparison, with any jump larger than
    /// [`SEQUENCE_SLACK`] in either direction accepted as a reset.
    ///
    /// Under sustained loss around the wrap point this can accept a stale
    /// packet or drop a fresh one. Kept as the default because both peers
    /// must agree on it.
    #[default]
    SlackWindow,
    /// Half-range circular comparison over the 16-bit space.
    Circular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    Accepted,
    /// Accepted after the window was re-anchored on this sequence.
    Reset,
    /// Older than the last accepted packet.
    Stale,
}

impl SequenceVerdict {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

#[derive(Debug, Clone)]
pub struct SequenceGuard {
    policy: SequencePolicy,
    last_received: u32,
    primed: bool,
}

impl Default for SequenceGuard {
    fn default() -> Self {
        Self::new(SequencePolicy::default())
    }
}

impl SequenceGuard {
    pub fn new(policy: SequencePolicy) -> Self {
        Self {
            policy,
            last_received: 0,
            primed: false,
        }
    }

    /// Starts the window at `last_received`, as if that packet had arrived.
    pub fn with_last_received(policy: SequencePolicy, last_received: u16) -> Self {
        Self {
            policy,
            last_received: last_received as u32,
            primed: true,
        }
    }

    pub fn policy(&self) -> SequencePolicy {
        self.policy
    }

    pub fn last_received(&self) -> u32 {
        self.last_received
    }

    pub fn reset(&mut self) {
        self.last_received = 0;
        self.primed = false;
    }

    /// Checks `sequence` and records it when accepted. Equal sequences pass.
    pub fn check(&mut self, sequence: u16) -> SequenceVerdict {
        let verdict = match self.policy {
            SequencePolicy::SlackWindow => self.check_slack(sequence),
            SequencePolicy::Circular => self.check_circular(sequence),
        };

        if verdict.is_accepted() {
            self.last_received = sequence as u32;
            self.primed = true;
        }
        verdict
    }

    fn check_slack(&self, sequence: u16) -> SequenceVerdict {
        let diff = self.last_received as i32 - sequence as i32;
        if !(-SEQUENCE_SLACK..=SEQUENCE_SLACK).contains(&diff) {
            return SequenceVerdict::Reset;
        }
        if (sequence as u32) < self.last_received {
            SequenceVerdict::Stale
        } else {
            SequenceVerdict::Accepted
        }
    }

    fn check_circular(&self, sequence: u16) -> SequenceVerdict {
        if !self.primed {
            return SequenceVerdict::Reset;
        }
        let last = self.last_received as u16;
        if sequence == last || sequence_greater_than(sequence, last) {
            SequenceVerdict::Accepted
        } else {
            SequenceVerdict::Stale
        }
    }
}
