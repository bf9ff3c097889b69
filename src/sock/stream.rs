use std::marker::PhantomData;
use std::os::fd::{OwnedFd, RawFd};

use crate::Result;
use crate::addr::{Domain, Ipv4, Ipv6};
use crate::error::{SockError, errno, is_timeout};
use crate::options::{
    IpLevelOptions, Ipv6LevelOptions, OptionTarget, SocketLevelOptions, TcpLevelOptions,
};

use super::lifecycle::{Lifecycle, Phase};
use super::{SEND_FLAGS, Shutdown};

/// A TCP endpoint, parameterized on the address family.
///
/// Fresh sockets start unbound; `connect` (optionally preceded by `bind`)
/// makes them usable for I/O. Sockets handed out by
/// [`ListenerSocket::accept`](super::ListenerSocket::accept) arrive already
/// connected.
///
/// With a timeout configured, a `recv` that sees nothing in time returns an
/// empty buffer, while a `send` that cannot make progress in time fails
/// with [`SockError::Timeout`]. An empty `recv` result with data requested
/// never means end-of-stream; the peer hanging up is its own error,
/// [`SockError::PeerClosed`].
pub struct StreamSocket<D: Domain = Ipv4> {
    life: Lifecycle,
    _domain: PhantomData<D>,
}

/// IPv4 TCP socket.
pub type TcpSocket = StreamSocket<Ipv4>;
/// IPv6 TCP socket.
pub type TcpSocketV6 = StreamSocket<Ipv6>;

impl<D: Domain> StreamSocket<D> {
    /// Creates a new, unbound TCP socket.
    pub fn new() -> Result<Self> {
        Ok(Self {
            life: Lifecycle::new(D::raw(), libc::SOCK_STREAM, libc::IPPROTO_TCP)?,
            _domain: PhantomData,
        })
    }

    /// Wraps a descriptor the kernel already connected (the accept path).
    pub(crate) fn from_accepted(fd: OwnedFd) -> Self {
        Self {
            life: Lifecycle::from_accepted(fd),
            _domain: PhantomData,
        }
    }

    /// Binds the local endpoint. Optional: `connect` on an unbound socket
    /// picks an ephemeral local endpoint.
    pub fn bind(&self, addr: impl Into<D::Addr>) -> Result<()> {
        self.life.bind(&addr.into())
    }

    /// Connects to a remote endpoint. With a timeout configured, a connect
    /// that does not complete in time fails with [`SockError::Timeout`].
    pub fn connect(&self, addr: impl Into<D::Addr>) -> Result<()> {
        self.life.connect(&addr.into())
    }

    /// Receives up to `max_len` bytes.
    ///
    /// Returns an empty buffer when a configured timeout expires with
    /// nothing received; fails with [`SockError::PeerClosed`] when the peer
    /// has shut down its sending side.
    pub fn recv(&self, max_len: usize) -> Result<Vec<u8>> {
        self.life.with_connected_fd(|fd| {
            if max_len == 0 {
                return Ok(Vec::new());
            }
            let mut buf = vec![0u8; max_len];
            let n = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
            match n {
                -1 => {
                    let e = errno();
                    if is_timeout(e) {
                        Ok(Vec::new())
                    } else {
                        Err(SockError::Socket { errno: e })
                    }
                }
                0 => Err(SockError::PeerClosed),
                n => {
                    buf.truncate(n as usize);
                    Ok(buf)
                }
            }
        })?
    }

    /// Sends as much of `data` as the kernel will take, returning the byte
    /// count. With a timeout configured, no progress in time is
    /// [`SockError::Timeout`].
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        self.life.with_connected_fd(|fd| {
            let n = unsafe {
                libc::send(
                    fd,
                    data.as_ptr() as *const libc::c_void,
                    data.len(),
                    SEND_FLAGS,
                )
            };
            if n == -1 {
                let e = errno();
                if is_timeout(e) {
                    Err(SockError::Timeout)
                } else if e == libc::EPIPE {
                    Err(SockError::PeerClosed)
                } else {
                    Err(SockError::Socket { errno: e })
                }
            } else {
                Ok(n as usize)
            }
        })?
    }

    /// Sends all of `data`, looping over partial writes.
    pub fn send_all(&self, data: &[u8]) -> Result<()> {
        let mut sent = 0;
        while sent < data.len() {
            sent += self.send(&data[sent..])?;
        }
        Ok(())
    }

    /// Half-closes the connection in the given direction(s).
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.life.shutdown(how)
    }

    /// Releases the descriptor. Idempotent; every later operation fails
    /// with [`SockError::Closed`].
    pub fn close(&self) {
        self.life.close();
    }

    pub fn is_closed(&self) -> bool {
        self.life.is_closed()
    }

    pub fn is_bound(&self) -> bool {
        self.life.is_bound()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.life.phase(), Ok(Phase::Connected))
    }

    /// The local endpoint; fails with [`SockError::NotBound`] before bind
    /// or connect.
    pub fn local_endpoint(&self) -> Result<D::Addr> {
        self.life.local_endpoint()
    }

    /// The remote endpoint; fails with [`SockError::NotConnected`] before
    /// connect.
    pub fn remote_endpoint(&self) -> Result<D::Addr> {
        self.life.remote_endpoint()
    }

    /// The configured operation timeout in seconds; `None` is blocking
    /// forever, `Some(0.0)` non-blocking.
    pub fn timeout(&self) -> Result<Option<f64>> {
        self.life.timeout()
    }

    pub fn set_timeout(&self, timeout: Option<f64>) -> Result<()> {
        self.life.set_timeout(timeout)
    }

    pub fn blocking(&self) -> Result<bool> {
        self.life.blocking()
    }

    pub fn set_blocking(&self, blocking: bool) -> Result<()> {
        self.life.set_blocking(blocking)
    }

    /// The raw descriptor, while open.
    pub fn fileno(&self) -> Result<RawFd> {
        self.life.fileno()
    }
}

impl<D: Domain> std::fmt::Debug for StreamSocket<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.life.debug_fmt("StreamSocket", f)
    }
}

impl<D: Domain> OptionTarget for StreamSocket<D> {
    fn with_option_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        self.life.with_fd(f)
    }
}

impl<D: Domain> SocketLevelOptions for StreamSocket<D> {}
impl<D: Domain> TcpLevelOptions for StreamSocket<D> {}
impl IpLevelOptions for StreamSocket<Ipv4> {}
impl Ipv6LevelOptions for StreamSocket<Ipv6> {}
