//! Connection-state-aware socket types over raw OS descriptors.
//!
//! Every socket here knows where it is in its life (unbound, bound,
//! connected, listening, closed) and refuses operations that do not fit
//! that phase with a precise error instead of an opaque OS errno. Closed
//! is terminal and `close` is idempotent; the descriptor is released
//! exactly once.
//!
//! ```no_run
//! use sockstate::{SocketAddrV4, TcpListener, TcpSocket};
//!
//! # fn main() -> sockstate::Result<()> {
//! let listener = TcpListener::new()?;
//! listener.bind(SocketAddrV4::loopback(0), None)?;
//!
//! let client = TcpSocket::new()?;
//! client.set_timeout(Some(5.0))?;
//! client.connect(listener.local_endpoint()?)?;
//! client.send_all(b"hello")?;
//! # Ok(())
//! # }
//! ```
//!
//! Socket options are typed: each level (socket-generic, IP, IPv6, TCP)
//! contributes a trait of accessors backed by a declarative registry, see
//! [`options`].

pub mod addr;
mod error;
pub mod options;
pub mod sock;

pub use self::addr::{Domain, Ipv4, Ipv6, SocketAddrV4, SocketAddrV6};
pub use self::error::{Result, SockError, errno, is_timeout, timeout_errnos};
pub use self::options::{
    IpLevelOptions, Ipv6LevelOptions, MulticastV4, MulticastV6, OptionDesc, OptionTarget,
    OptionValue, SocketLevelOptions, TcpLevelOptions,
};
pub use self::sock::{
    DEFAULT_BACKLOG, DatagramSocket, ListenerSocket, RawSocket, Shutdown, StreamSocket, TcpListener,
    TcpListenerV6, TcpSocket, TcpSocketV6, UdpSocket, UdpSocketV6,
};
