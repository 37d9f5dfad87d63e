use std::fmt;
use std::io;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendMode {
    /// Best effort. May be dropped, duplicated or reordered.
    Unreliable,
    /// Delivered in order by the transport.
    Reliable,
}

/// Datagram transport between this peer and others.
///
/// One `send` arrives as at most one datagram on the other side, never
/// split or merged.
pub trait PeerTransport {
    type Peer: Copy + Eq + fmt::Debug;

    fn send(&mut self, peer: Self::Peer, data: &[u8], mode: SendMode) -> io::Result<()>;

    /// Size of the next inbound datagram, or `None` when nothing is queued.
    fn pending(&mut self) -> io::Result<Option<usize>>;

    /// Reads the next datagram into `buf`. Bytes beyond `buf.len()` are lost.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, Self::Peer)>;
}

impl<T: PeerTransport + ?Sized> PeerTransport for &mut T {
    type Peer = T::Peer;

    fn send(&mut self, peer: Self::Peer, data: &[u8], mode: SendMode) -> io::Result<()> {
        (**self).send(peer, data, mode)
    }

    fn pending(&mut self) -> io::Result<Option<usize>> {
        (**self).pending()
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, Self::Peer)> {
        (**self).recv(buf)
    }
}

pub type LoopbackPeer = u64;

#[derive(Debug)]
struct Datagram {
    from: LoopbackPeer,
    mode: SendMode,
    data: Vec<u8>,
}

/// In-process transport. Each endpoint owns one inbox; `pair` wires two
/// endpoints to each other and `connect` adds more senders.
#[derive(Debug)]
pub struct LoopbackTransport {
    id: LoopbackPeer,
    inbox: Receiver<Datagram>,
    inbox_tx: Sender<Datagram>,
    peers: Vec<(LoopbackPeer, Sender<Datagram>)>,
    head: Option<Datagram>,
    fail_sends: bool,
}

impl LoopbackTransport {
    pub fn new(id: LoopbackPeer) -> Self {
        let (inbox_tx, inbox) = crossbeam_channel::unbounded();
        Self {
            id,
            inbox,
            inbox_tx,
            peers: Vec::new(),
            head: None,
            fail_sends: false,
        }
    }

    pub fn pair(a: LoopbackPeer, b: LoopbackPeer) -> (Self, Self) {
        let mut left = Self::new(a);
        let mut right = Self::new(b);
        left.connect(&right);
        right.connect(&left);
        (left, right)
    }

    /// Lets this endpoint send to `other`.
    pub fn connect(&mut self, other: &LoopbackTransport) {
        self.peers.push((other.id, other.inbox_tx.clone()));
    }

    pub fn id(&self) -> LoopbackPeer {
        self.id
    }

    /// Makes every later `send` fail, for exercising error paths.
    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    /// Number of datagrams waiting in the inbox.
    pub fn queued(&self) -> usize {
        self.inbox.len() + usize::from(self.head.is_some())
    }

    /// Removes and returns the next inbound datagram with its send mode.
    pub fn take_raw(&mut self) -> Option<(LoopbackPeer, SendMode, Vec<u8>)> {
        self.fill_head();
        self.head.take().map(|d| (d.from, d.mode, d.data))
    }

    fn fill_head(&mut self) {
        if self.head.is_none() {
            match self.inbox.try_recv() {
                Ok(datagram) => self.head = Some(datagram),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
        }
    }
}

impl PeerTransport for LoopbackTransport {
    type Peer = LoopbackPeer;

    fn send(&mut self, peer: Self::Peer, data: &[u8], mode: SendMode) -> io::Result<()> {
        if self.fail_sends {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sends disabled"));
        }

        let (_, tx) = self
            .peers
            .iter()
            .find(|(id, _)| *id == peer)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "unknown peer"))?;

        tx.send(Datagram {
            from: self.id,
            mode,
            data: data.to_vec(),
        })
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
    }

    fn pending(&mut self) -> io::Result<Option<usize>> {
        self.fill_head();
        Ok(self.head.as_ref().map(|d| d.data.len()))
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, Self::Peer)> {
        self.fill_head();
        let datagram = self
            .head
            .take()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;

        let len = datagram.data.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram.data[..len]);
        Ok((len, datagram.from))
    }
}
