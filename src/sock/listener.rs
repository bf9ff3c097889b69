use std::marker::PhantomData;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::Result;
use crate::addr::{Domain, FromSockAddr, Ipv4, Ipv6};
use crate::error::{SockError, errno, is_timeout};
use crate::options::{
    IpLevelOptions, Ipv6LevelOptions, OptionTarget, SocketLevelOptions, TcpLevelOptions,
};

use super::lifecycle::{Lifecycle, Phase};
use super::stream::StreamSocket;

/// Default accept-queue depth for a listener.
pub const DEFAULT_BACKLOG: i32 = 4;

/// An accepting TCP endpoint, parameterized on the address family.
///
/// `bind` both binds the local endpoint and starts listening, so a bound
/// listener is always accept-ready. The queue depth can be changed later
/// with [`set_backlog`](Self::set_backlog).
pub struct ListenerSocket<D: Domain = Ipv4> {
    life: Lifecycle,
    _domain: PhantomData<D>,
}

/// IPv4 TCP listener.
pub type TcpListener = ListenerSocket<Ipv4>;
/// IPv6 TCP listener.
pub type TcpListenerV6 = ListenerSocket<Ipv6>;

impl<D: Domain> ListenerSocket<D> {
    /// Creates a new, unbound listener.
    pub fn new() -> Result<Self> {
        Ok(Self {
            life: Lifecycle::new(D::raw(), libc::SOCK_STREAM, libc::IPPROTO_TCP)?,
            _domain: PhantomData,
        })
    }

    /// Binds the local endpoint and starts listening with the given queue
    /// depth (or [`DEFAULT_BACKLOG`]).
    pub fn bind(&self, addr: impl Into<D::Addr>, backlog: Option<i32>) -> Result<()> {
        self.life.bind(&addr.into())?;
        self.life.listen(backlog.unwrap_or(DEFAULT_BACKLOG))
    }

    /// Resizes the accept queue of a bound listener.
    pub fn set_backlog(&self, backlog: i32) -> Result<()> {
        self.life.listen(backlog)
    }

    /// Accepts one queued connection, returning the connected stream and
    /// the peer endpoint. With a timeout configured, an empty queue in time
    /// is [`SockError::Timeout`].
    pub fn accept(&self) -> Result<(StreamSocket<D>, D::Addr)> {
        self.life.with_listening_fd(|fd| {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let addr_ptr = &mut storage as *mut _ as *mut libc::sockaddr;
            #[cfg(any(target_os = "linux", target_os = "android"))]
            let conn = unsafe { libc::accept4(fd, addr_ptr, &mut len, libc::SOCK_CLOEXEC) };
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            let conn = unsafe { libc::accept(fd, addr_ptr, &mut len) };
            if conn == -1 {
                let e = errno();
                return if is_timeout(e) {
                    Err(SockError::Timeout)
                } else {
                    Err(SockError::Accept { errno: e })
                };
            }
            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            unsafe {
                libc::fcntl(conn, libc::F_SETFD, libc::FD_CLOEXEC);
            }
            log::debug!("connection accepted (fd = {conn})");
            let conn = unsafe { OwnedFd::from_raw_fd(conn) };
            let peer = unsafe {
                D::Addr::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len)
            }
            .ok_or(SockError::InvalidAddress { reason: "unexpected peer address family" })?;
            Ok((StreamSocket::from_accepted(conn), peer))
        })?
    }

    /// Releases the descriptor. Idempotent.
    pub fn close(&self) {
        self.life.close();
    }

    pub fn is_closed(&self) -> bool {
        self.life.is_closed()
    }

    pub fn is_bound(&self) -> bool {
        self.life.is_bound()
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.life.phase(), Ok(Phase::Listening))
    }

    /// The local endpoint; fails with [`SockError::NotBound`] before bind.
    pub fn local_endpoint(&self) -> Result<D::Addr> {
        self.life.local_endpoint()
    }

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

impl<D: Domain> std::fmt::Debug for ListenerSocket<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.life.debug_fmt("ListenerSocket", f)
    }
}

impl<D: Domain> OptionTarget for ListenerSocket<D> {
    fn with_option_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        self.life.with_fd(f)
    }
}

impl<D: Domain> SocketLevelOptions for ListenerSocket<D> {}
impl<D: Domain> TcpLevelOptions for ListenerSocket<D> {}
impl IpLevelOptions for ListenerSocket<Ipv4> {}
impl Ipv6LevelOptions for ListenerSocket<Ipv6> {}
