use std::marker::PhantomData;
use std::os::fd::RawFd;

use crate::Result;
use crate::addr::{Domain, FromSockAddr, Ipv4, Ipv6, ToSockAddr};
use crate::error::{SockError, errno, is_timeout};
use crate::options::{
    IpLevelOptions, Ipv6LevelOptions, MulticastV4, MulticastV6, OptionTarget, SocketLevelOptions,
};

use super::SEND_FLAGS;
use super::lifecycle::Lifecycle;

/// A UDP endpoint, parameterized on the address family.
///
/// Binding is optional: `send_to` from an unbound socket picks an ephemeral
/// local endpoint. With a timeout configured, a `recv_from` that sees
/// nothing in time returns an empty buffer and no source endpoint, while a
/// `send_to` that cannot make progress in time fails with
/// [`SockError::Timeout`].
pub struct DatagramSocket<D: Domain = Ipv4> {
    life: Lifecycle,
    _domain: PhantomData<D>,
}

/// IPv4 UDP socket.
pub type UdpSocket = DatagramSocket<Ipv4>;
/// IPv6 UDP socket.
pub type UdpSocketV6 = DatagramSocket<Ipv6>;

impl<D: Domain> DatagramSocket<D> {
    /// Creates a new, unbound UDP socket.
    pub fn new() -> Result<Self> {
        Ok(Self {
            life: Lifecycle::new(D::raw(), libc::SOCK_DGRAM, libc::IPPROTO_UDP)?,
            _domain: PhantomData,
        })
    }

    /// Binds the local endpoint, making the socket receivable at a known
    /// address.
    pub fn bind(&self, addr: impl Into<D::Addr>) -> Result<()> {
        self.life.bind(&addr.into())
    }

    /// Sends one datagram to `addr`, returning the byte count.
    pub fn send_to(&self, data: &[u8], addr: impl Into<D::Addr>) -> Result<usize> {
        let addr = addr.into();
        self.life.with_fd(|fd| {
            let n = addr.with_raw(|ptr, len| unsafe {
                libc::sendto(
                    fd,
                    data.as_ptr() as *const libc::c_void,
                    data.len(),
                    SEND_FLAGS,
                    ptr,
                    len,
                )
            });
            if n == -1 {
                let e = errno();
                if is_timeout(e) {
                    Err(SockError::Timeout)
                } else {
                    Err(SockError::Socket { errno: e })
                }
            } else {
                Ok(n as usize)
            }
        })?
    }

    /// Receives one datagram of up to `max_len` bytes, with the source
    /// endpoint. Returns `(empty, None)` when a configured timeout expires
    /// with nothing received.
    pub fn recv_from(&self, max_len: usize) -> Result<(Vec<u8>, Option<D::Addr>)> {
        self.life.with_fd(|fd| {
            let mut buf = vec![0u8; max_len];
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let n = unsafe {
                libc::recvfrom(
                    fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                    &mut storage as *mut _ as *mut libc::sockaddr,
                    &mut len,
                )
            };
            if n == -1 {
                let e = errno();
                return if is_timeout(e) {
                    Ok((Vec::new(), None))
                } else {
                    Err(SockError::Socket { errno: e })
                };
            }
            buf.truncate(n as usize);
            let from = unsafe {
                D::Addr::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len)
            };
            Ok((buf, from))
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

impl<D: Domain> std::fmt::Debug for DatagramSocket<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.life.debug_fmt("DatagramSocket", f)
    }
}

impl<D: Domain> OptionTarget for DatagramSocket<D> {
    fn with_option_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        self.life.with_fd(f)
    }
}

impl<D: Domain> SocketLevelOptions for DatagramSocket<D> {}
impl IpLevelOptions for DatagramSocket<Ipv4> {}
impl MulticastV4 for DatagramSocket<Ipv4> {}
impl Ipv6LevelOptions for DatagramSocket<Ipv6> {}
impl MulticastV6 for DatagramSocket<Ipv6> {}
