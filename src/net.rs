//!
//! The UDP/IPv6 datagram endpoint: open, bind/remember-destination, receive,
//! send, and the best-effort multicast join.
//!
//! Grounded on the teacher's `net_sender.rs`/`net_receiver.rs`, which already
//! wrap `tokio::net::UdpSocket` behind a small handle type; generalized here
//! to the single bidirectional `NetHandle` used throughout this crate, and
//! ported from `original_source/src/net.c`'s `nethandle`/`netopen`/
//! `netlisten`/`netsend`/`netmulticast`.
//!

use std::net::SocketAddr;

use log::warn;
use tokio::net::{lookup_host, UdpSocket};

use crate::config::BUFF_SIZE;
use crate::error::DhtError;

/// Whether an endpoint binds to receive, or just remembers a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Listen,
    Send,
}

/// A UDP/IPv6 datagram endpoint plus a reusable receive buffer, mirroring
/// `original_source/include/net.h`'s `nethandle` struct.
pub struct NetHandle {
    socket: Option<UdpSocket>,
    destination: SocketAddr,
    buffer: Vec<u8>,
}

impl NetHandle {
    /// Resolves `host:port` to an IPv6 socket address and opens an endpoint.
    ///
    /// `host = None` (or empty) with `mode = Listen` passively binds
    /// `[::]:<port>`. Fails `ResolveFailed` if resolution yields nothing,
    /// `NoUsableAddress` if every candidate fails `socket()`/`bind()`.
    pub async fn open(host: Option<&str>, port: u16, mode: OpenMode) -> Result<Self, DhtError> {
        let candidates = Self::resolve(host, port).await?;

        match mode {
            OpenMode::Listen => {
                for addr in &candidates {
                    if let Ok(socket) = UdpSocket::bind(addr).await {
                        return Ok(NetHandle {
                            socket: Some(socket),
                            destination: *addr,
                            buffer: vec![0u8; BUFF_SIZE],
                        });
                    }
                }
                Err(DhtError::NoUsableAddress(
                    host.unwrap_or("[::]").to_string(),
                ))
            }
            OpenMode::Send => {
                let destination = candidates[0];
                let local: SocketAddr = "[::]:0".parse().expect("valid unspecified IPv6 addr");
                let socket = UdpSocket::bind(local)
                    .await
                    .map_err(|e| DhtError::NoUsableAddress(e.to_string()))?;
                Ok(NetHandle {
                    socket: Some(socket),
                    destination,
                    buffer: vec![0u8; BUFF_SIZE],
                })
            }
        }
    }

    async fn resolve(host: Option<&str>, port: u16) -> Result<Vec<SocketAddr>, DhtError> {
        let host = host.filter(|h| !h.is_empty()).unwrap_or("::");
        let query = format!("{host}:{port}");
        let resolved: Vec<SocketAddr> = lookup_host(&query)
            .await
            .map_err(|e| DhtError::ResolveFailed(e.to_string()))?
            .filter(|a| a.is_ipv6())
            .collect();

        if resolved.is_empty() {
            return Err(DhtError::ResolveFailed(query));
        }
        Ok(resolved)
    }

    /// Synthesizes a send-capable handle addressed at `peer`, used to reply
    /// to or gossip back at a datagram's sender without binding a new port.
    fn addressed_at(peer: SocketAddr) -> Self {
        NetHandle {
            socket: None,
            destination: peer,
            buffer: Vec::new(),
        }
    }

    /// Reads one datagram into the internal buffer. Returns the byte count
    /// and a send-capable handle addressed at the sender. Rejects non-IPv6
    /// senders by looping (a malformed peer must not kill the receive loop).
    /// A zero-byte datagram is treated as the socket having closed.
    pub async fn receive(&mut self) -> Result<(usize, NetHandle), DhtError> {
        let socket = self.socket.as_ref().ok_or(DhtError::SocketClosed)?;
        loop {
            let (len, from) = socket
                .recv_from(&mut self.buffer)
                .await
                .map_err(|e| DhtError::RecvFailed(e.to_string()))?;

            if !from.is_ipv6() {
                warn!("dropping datagram from non-IPv6 sender {from}");
                continue;
            }
            if len == 0 {
                return Err(DhtError::SocketClosed);
            }
            return Ok((len, Self::addressed_at(from)));
        }
    }

    /// The bytes most recently read by `receive`.
    pub fn payload(&self) -> &[u8] {
        &self.buffer
    }

    /// Sends raw bytes to this handle's destination.
    pub async fn send(&self, bytes: &[u8]) -> Result<usize, DhtError> {
        let socket = self.socket.as_ref().ok_or(DhtError::SocketClosed)?;
        socket
            .send_to(bytes, self.destination)
            .await
            .map_err(|e| DhtError::SendFailed(e.to_string()))
    }

    /// Sends a UTF-8 string to this handle's destination.
    pub async fn send_text(&self, text: &str) -> Result<usize, DhtError> {
        self.send(text.as_bytes()).await
    }

    /// Idempotent close: drops the socket, freeing the fd and the buffer.
    pub fn close(&mut self) {
        self.socket.take();
        self.buffer.clear();
    }

    /// The local address this handle is bound to, if its socket is open.
    /// Mainly useful for tests that need to discover an OS-assigned
    /// ephemeral port before handing it to a peer.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Best-effort `IPV6_JOIN_GROUP` for the hard-coded group
    /// `ff01::1`, matching `original_source/src/net.c`'s `netmulticast`.
    /// Failure is logged and returned as `MulticastUnavailable`; callers
    /// must not treat it as fatal.
    pub fn join_multicast_v6(&self, interface_index: u32) -> Result<(), DhtError> {
        use std::net::Ipv6Addr;

        let socket = self
            .socket
            .as_ref()
            .ok_or(DhtError::MulticastUnavailable("socket closed".to_string()))?;

        let group: Ipv6Addr = "ff01::1".parse().expect("valid multicast literal");
        socket
            .join_multicast_v6(&group, interface_index)
            .map_err(|e| DhtError::MulticastUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_listen_and_send_roundtrip() {
        let mut listener = NetHandle::open(Some("::1"), 0, OpenMode::Listen)
            .await
            .unwrap();
        let bound_port = listener.local_addr().unwrap().port();

        let sender = NetHandle::open(Some("::1"), bound_port, OpenMode::Send)
            .await
            .unwrap();
        sender.send_text("put deadbeef ::1").await.unwrap();

        let (len, reply_to) = listener.receive().await.unwrap();
        assert_eq!(&listener.payload()[..len], b"put deadbeef ::1");
        assert!(reply_to.socket.is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut handle = NetHandle::open(Some("::1"), 0, OpenMode::Listen)
            .await
            .unwrap();
        handle.close();
        handle.close();
        assert!(matches!(
            handle.receive().await,
            Err(DhtError::SocketClosed)
        ));
    }

    #[tokio::test]
    async fn test_resolve_failed_on_bad_host() {
        let err = NetHandle::open(Some("this-host-does-not-resolve.invalid"), 1234, OpenMode::Send)
            .await
            .unwrap_err();
        assert!(matches!(err, DhtError::ResolveFailed(_)));
    }
}
