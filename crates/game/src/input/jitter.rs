use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterConfig {
    /// States held back before playback starts or resumes.
    pub target_depth: usize,
    /// Above this the oldest states are dropped back down to `target_depth`,
    /// never below the newest state.
    pub max_depth: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            target_depth: 2,
            max_depth: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitterStats {
    pub pushed: u64,
    pub played: u64,
    pub held: u64,
    pub underruns: u64,
    pub trimmed: u64,
}

/// Turns bursty remote arrivals into one state per local tick.
///
/// `next_state` never blocks. While the buffer refills it repeats the last
/// state it handed out, starting from `S::default()`.
#[derive(Debug)]
pub struct JitterBuffer<S> {
    queue: VecDeque<S>,
    last: S,
    buffering: bool,
    config: JitterConfig,
    stats: JitterStats,
}

impl<S: Clone + Default> JitterBuffer<S> {
    pub fn new(config: JitterConfig) -> Self {
        let config = JitterConfig {
            target_depth: config.target_depth,
            max_depth: config.max_depth.max(config.target_depth).max(1),
        };
        Self {
            queue: VecDeque::with_capacity(config.max_depth + 1),
            last: S::default(),
            buffering: true,
            config,
            stats: JitterStats::default(),
        }
    }

    pub fn push(&mut self, state: S) {
        self.queue.push_back(state);
        self.stats.pushed += 1;

        if self.queue.len() > self.config.max_depth {
            let excess = self.queue.len() - self.config.target_depth.max(1);
            self.queue.drain(..excess);
            self.stats.trimmed += excess as u64;
            log::trace!("jitter buffer over {}, dropped {excess}", self.config.max_depth);
        }
    }

    pub fn next_state(&mut self) -> S {
        if self.buffering {
            if self.queue.len() < self.config.target_depth {
                self.stats.held += 1;
                return self.last.clone();
            }
            self.buffering = false;
        }

        match self.queue.pop_front() {
            Some(state) => {
                self.last = state;
                self.stats.played += 1;
            }
            None => {
                self.buffering = true;
                self.stats.underruns += 1;
                self.stats.held += 1;
            }
        }
        self.last.clone()
    }

    /// Most recent state handed out by `next_state`.
    pub fn latest(&self) -> &S {
        &self.last
    }

    pub fn depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn stats(&self) -> JitterStats {
        self.stats
    }

    pub fn config(&self) -> JitterConfig {
        self.config
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last = S::default();
        self.buffering = true;
    }
}
