use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::config::SyncConfig;
use crate::event::{EventQueue, SpecialEvent};
use crate::net::{FillResult, StateExchange, StatePacket, sequence_greater_than};

use super::feed::{LocalInputHandle, LocalItem, RemoteItem, RemoteStateFeed};
use super::frame::{InputBatch, InputFrame};

/// Network-thread input serializer.
///
/// Every state packet carries all local inputs the opponent has not
/// acknowledged, so a lost packet is covered by the next one. Inputs are
/// numbered from 1; the opponent's ack of 0 means it has seen nothing yet.
#[derive(Debug)]
pub struct InputBuffer {
    local_rx: Receiver<LocalItem>,
    remote_tx: Sender<RemoteItem>,
    history: VecDeque<(u16, InputFrame)>,
    next_sequence: u16,
    last_received: u16,
    received_any: bool,
    ack_sent: Option<u16>,
    pending_full_state: Option<Vec<u8>>,
    events: EventQueue,
    max_unacked: usize,
    max_payload: usize,
    overflowed: u64,
}

impl InputBuffer {
    pub fn new(config: &SyncConfig) -> (Self, LocalInputHandle, RemoteStateFeed) {
        let (local_tx, local_rx) = crossbeam_channel::unbounded();
        let (remote_tx, remote_rx) = crossbeam_channel::unbounded();

        let buffer = Self {
            local_rx,
            remote_tx,
            history: VecDeque::with_capacity(config.max_unacked_inputs),
            next_sequence: 1,
            last_received: 0,
            received_any: false,
            ack_sent: None,
            pending_full_state: None,
            events: EventQueue::new(config.event_queue_capacity),
            max_unacked: config.max_unacked_inputs.max(1),
            max_payload: config.max_payload,
            overflowed: 0,
        };

        (
            buffer,
            LocalInputHandle::new(local_tx),
            RemoteStateFeed::new(remote_rx, config.jitter),
        )
    }

    pub fn unacked(&self) -> usize {
        self.history.len()
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Inputs dropped unsent because the opponent stopped acknowledging.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    fn pump(&mut self) {
        loop {
            match self.local_rx.try_recv() {
                Ok(LocalItem::Input(frame)) => self.record_input(frame),
                Ok(LocalItem::Event(event)) => self.events.push(event),
                Ok(LocalItem::FullState(snapshot)) => self.pending_full_state = Some(snapshot),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn record_input(&mut self, frame: InputFrame) {
        self.history.push_back((self.next_sequence, frame));
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if self.history.len() > self.max_unacked {
            self.history.pop_front();
            self.overflowed += 1;
            log::trace!("unacked input history full at {}", self.max_unacked);
        }
    }

    fn acknowledge(&mut self, ack: u16) {
        while let Some(&(sequence, _)) = self.history.front() {
            if sequence == ack || sequence_greater_than(ack, sequence) {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    fn batch(&self) -> InputBatch {
        InputBatch {
            first_sequence: self
                .history
                .front()
                .map_or(self.next_sequence, |&(sequence, _)| sequence),
            frames: self.history.iter().map(|&(_, frame)| frame).collect(),
            full_state: None,
        }
    }
}

impl StateExchange for InputBuffer {
    fn fill_send_buffer(&mut self, buf: &mut [u8]) -> FillResult {
        self.pump();

        let ack_pending = self.received_any && self.ack_sent != Some(self.last_received);
        if self.history.is_empty() && self.pending_full_state.is_none() && !ack_pending {
            return FillResult::empty();
        }

        let limit = self.max_payload.min(buf.len());
        let mut batch = self.batch();
        batch.full_state = self.pending_full_state.take();

        loop {
            let bytes = match batch.serialize() {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("input batch serialization failed: {err}");
                    return FillResult::empty();
                }
            };

            if bytes.len() <= limit {
                buf[..bytes.len()].copy_from_slice(&bytes);
                self.ack_sent = Some(self.last_received);
                return FillResult {
                    bytes_written: bytes.len(),
                    full_state: batch.full_state.is_some(),
                };
            }

            if !batch.frames.is_empty() {
                batch.frames.remove(0);
                batch.first_sequence = batch.first_sequence.wrapping_add(1);
            } else if let Some(snapshot) = batch.full_state.take() {
                log::error!(
                    "full state of {} bytes does not fit in {limit}, dropped",
                    snapshot.len()
                );
                batch = self.batch();
            } else {
                log::error!("empty input batch exceeds {limit} bytes");
                return FillResult::empty();
            }
        }
    }

    fn parse_recv_buffer(&mut self, packet: StatePacket<'_>) {
        self.acknowledge(packet.remote_ack);

        let batch = match InputBatch::deserialize(packet.payload) {
            Ok(batch) => batch,
            Err(err) => {
                log::warn!("undecodable input batch in packet {}: {err}", packet.sequence);
                return;
            }
        };

        for (index, frame) in batch.frames.iter().enumerate() {
            let sequence = batch.sequence_of(index);
            if self.received_any && !sequence_greater_than(sequence, self.last_received) {
                continue;
            }
            self.last_received = sequence;
            self.received_any = true;

            if self.remote_tx.send(RemoteItem::Input(*frame)).is_err() {
                log::trace!("remote feed dropped, discarding input {sequence}");
            }
        }

        if let Some(snapshot) = batch.full_state {
            if !packet.kind.is_full() {
                log::warn!("full state in standard packet {}", packet.sequence);
            }
            if self.remote_tx.send(RemoteItem::FullState(snapshot)).is_err() {
                log::trace!("remote feed dropped, discarding full state");
            }
        }
    }

    fn last_received_sequence(&self) -> u16 {
        self.last_received
    }

    fn pop_special_event(&mut self) -> Option<SpecialEvent> {
        self.pump();
        self.events.pop()
    }

    fn reset(&mut self) {
        while self.local_rx.try_recv().is_ok() {}
        self.history.clear();
        self.events.clear();
        self.next_sequence = 1;
        self.last_received = 0;
        self.received_any = false;
        self.ack_sent = None;
        self.pending_full_state = None;
    }
}
