use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::transport::{PeerTransport, SendMode};

/// Largest datagram a UDP socket can hand back.
const MAX_DATAGRAM: usize = 65_507;

/// Non-blocking UDP socket as a [`PeerTransport`].
///
/// Both send modes go out as plain datagrams, so "reliable" here only holds
/// on links that do not lose packets (LAN, loopback).
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peek_buffer: Box<[u8]>,
    running: Arc<AtomicBool>,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            peek_buffer: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl PeerTransport for UdpTransport {
    type Peer = SocketAddr;

    fn send(&mut self, peer: SocketAddr, data: &[u8], mode: SendMode) -> io::Result<()> {
        let sent = self.socket.send_to(data, peer)?;
        if sent != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short {mode:?} send: {sent} of {} bytes", data.len()),
            ));
        }
        Ok(())
    }

    fn pending(&mut self) -> io::Result<Option<usize>> {
        match self.socket.peek_from(&mut self.peek_buffer) {
            Ok((size, _)) => Ok(Some(size)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }
}
