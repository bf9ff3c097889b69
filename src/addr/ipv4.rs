use std::net::Ipv4Addr;

use crate::addr::{Domain, ToSockAddr};

/// IPv4 address family marker.
pub struct Ipv4;

impl Domain for Ipv4 {
    type Addr = SocketAddrV4;

    #[inline]
    fn raw() -> libc::c_int {
        libc::AF_INET
    }
}

/// IPv4 endpoint (IP + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddrV4 {
    ip: Ipv4Addr,
    port: u16,
}

impl SocketAddrV4 {
    /// Creates a new IPv4 endpoint.
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Loopback endpoint (127.0.0.1) on the given port.
    pub fn loopback(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    /// Wildcard endpoint (0.0.0.0) on the given port. Port 0 asks the OS
    /// for an ephemeral port.
    pub fn any(port: u16) -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, port)
    }

    /// Creates from raw sockaddr_in.
    pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> Self {
        Self {
            ip: Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes()),
            port: u16::from_be(raw.sin_port),
        }
    }

    /// Returns the IP address.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Converts to the raw sockaddr_in for syscalls.
    pub(crate) fn to_raw(&self) -> libc::sockaddr_in {
        libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: self.port.to_be(),
            sin_addr: libc::in_addr {
                // Octets are already network order.
                s_addr: u32::from_ne_bytes(self.ip.octets()),
            },
            sin_zero: [0; 8],
        }
    }
}

impl std::fmt::Display for SocketAddrV4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl From<std::net::SocketAddrV4> for SocketAddrV4 {
    fn from(addr: std::net::SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl ToSockAddr for SocketAddrV4 {
    fn with_raw<F, R>(&self, f: F) -> R
    where
        F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
    {
        // sockaddr_in lives on this frame; the closure runs while it is alive.
        let raw = self.to_raw();
        let ptr = &raw as *const _ as *const libc::sockaddr;
        let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        f(ptr, len)
    }
}
