//!
//! The error taxonomy used throughout this binary.
//!
//! The teacher crate this was grown from used a single opaque `Error { msg:
//! String }` struct; we need to distinguish error kinds (a `BadArgument`
//! must drop a datagram silently, a `ResolveFailed` at startup must be
//! fatal), so this is an enum instead. It still implements `std::error::Error`
//! by hand, the way the teacher does, rather than pulling in `thiserror`.
//!

use std::fmt;

#[derive(Debug)]
pub enum DhtError {
    /// A command referenced a missing or empty hash/ip, or one exceeding
    /// `MAX_FIELD_LEN`.
    BadArgument(String),
    /// The host resolver returned no candidates at all.
    ResolveFailed(String),
    /// Every resolved candidate failed `socket()`/`bind()`.
    NoUsableAddress(String),
    /// `sendto` failed.
    SendFailed(String),
    /// `recvfrom` failed.
    RecvFailed(String),
    /// A zero-byte datagram was read, treated as the socket going away.
    SocketClosed,
    /// The table failed to grow its backing storage.
    AllocFailed,
    /// The best-effort multicast join did not succeed.
    MulticastUnavailable(String),
}

impl fmt::Display for DhtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhtError::BadArgument(msg) => write!(f, "bad argument: {msg}"),
            DhtError::ResolveFailed(host) => write!(f, "failed to resolve '{host}'"),
            DhtError::NoUsableAddress(host) => {
                write!(f, "no usable address for '{host}' (IPv6+UDP required)")
            }
            DhtError::SendFailed(msg) => write!(f, "send failed: {msg}"),
            DhtError::RecvFailed(msg) => write!(f, "recv failed: {msg}"),
            DhtError::SocketClosed => write!(f, "socket closed"),
            DhtError::AllocFailed => write!(f, "failed to grow the hash table"),
            DhtError::MulticastUnavailable(msg) => write!(f, "multicast unavailable: {msg}"),
        }
    }
}

impl std::error::Error for DhtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
