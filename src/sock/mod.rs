//! Socket types, one per protocol shape.
//!
//! [`StreamSocket`] is a connected TCP endpoint, [`ListenerSocket`] its
//! accepting counterpart, [`DatagramSocket`] a UDP endpoint, and
//! [`RawSocket`] a placeholder for raw IP access. All of them share the
//! lifecycle machinery in [`lifecycle`]: one owned descriptor, one phase,
//! idempotent close.

pub(crate) mod lifecycle;

mod datagram;
mod listener;
mod raw;
mod stream;

pub use self::datagram::{DatagramSocket, UdpSocket, UdpSocketV6};
pub use self::listener::{DEFAULT_BACKLOG, ListenerSocket, TcpListener, TcpListenerV6};
pub use self::raw::RawSocket;
pub use self::stream::{StreamSocket, TcpSocket, TcpSocketV6};

/// Which direction(s) of a connection `shutdown` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

/// MSG_NOSIGNAL turns a dead-peer send into EPIPE instead of SIGPIPE.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) const SEND_FLAGS: libc::c_int = 0;
