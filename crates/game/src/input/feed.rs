use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::event::SpecialEvent;

use super::frame::InputFrame;
use super::jitter::{JitterBuffer, JitterConfig, JitterStats};

#[derive(Debug)]
pub(super) enum LocalItem {
    Input(InputFrame),
    Event(SpecialEvent),
    FullState(Vec<u8>),
}

#[derive(Debug)]
pub(super) enum RemoteItem {
    Input(InputFrame),
    FullState(Vec<u8>),
}

/// Simulation-thread side of the outbound path.
#[derive(Debug, Clone)]
pub struct LocalInputHandle {
    tx: Sender<LocalItem>,
}

impl LocalInputHandle {
    pub(super) fn new(tx: Sender<LocalItem>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the network side has been dropped.
    pub fn submit_input(&self, frame: InputFrame) -> bool {
        self.tx.send(LocalItem::Input(frame)).is_ok()
    }

    pub fn queue_event(&self, event: SpecialEvent) -> bool {
        self.tx.send(LocalItem::Event(event)).is_ok()
    }

    /// Sends `snapshot` once, in the next state packet, flagged as a full
    /// state update.
    pub fn submit_full_state(&self, snapshot: Vec<u8>) -> bool {
        self.tx.send(LocalItem::FullState(snapshot)).is_ok()
    }
}

/// Simulation-thread side of the inbound path.
#[derive(Debug)]
pub struct RemoteStateFeed {
    rx: Receiver<RemoteItem>,
    jitter: JitterBuffer<InputFrame>,
    full_state: Option<Vec<u8>>,
    disconnected: bool,
}

impl RemoteStateFeed {
    pub(super) fn new(rx: Receiver<RemoteItem>, config: JitterConfig) -> Self {
        Self {
            rx,
            jitter: JitterBuffer::new(config),
            full_state: None,
            disconnected: false,
        }
    }

    /// Remote input for this tick. Call exactly once per simulation tick.
    pub fn next_state(&mut self) -> InputFrame {
        self.pump();
        self.jitter.next_state()
    }

    /// Newest full-state snapshot from the opponent, if one arrived since
    /// the last call.
    pub fn take_full_state(&mut self) -> Option<Vec<u8>> {
        self.pump();
        self.full_state.take()
    }

    pub fn latest(&self) -> &InputFrame {
        self.jitter.latest()
    }

    pub fn buffered(&self) -> usize {
        self.jitter.depth()
    }

    pub fn stats(&self) -> JitterStats {
        self.jitter.stats()
    }

    /// True once the network side has gone away and nothing is left queued.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn pump(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(RemoteItem::Input(frame)) => self.jitter.push(frame),
                Ok(RemoteItem::FullState(snapshot)) => self.full_state = Some(snapshot),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
    }
}
