use std::net::Ipv6Addr;

use crate::addr::{Domain, ToSockAddr};

/// IPv6 address family marker.
pub struct Ipv6;

impl Domain for Ipv6 {
    type Addr = SocketAddrV6;

    #[inline]
    fn raw() -> libc::c_int {
        libc::AF_INET6
    }
}

/// IPv6 endpoint (IP + port + scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketAddrV6 {
    ip: Ipv6Addr,
    port: u16,
    /// Scope ID for link-local addresses (identifies the network interface).
    /// Usually 0 unless using link-local addresses like fe80::.
    scope_id: u32,
}

impl SocketAddrV6 {
    /// Creates a new IPv6 endpoint.
    pub fn new(ip: Ipv6Addr, port: u16) -> Self {
        Self { ip, port, scope_id: 0 }
    }

    /// Creates with explicit scope ID, for link-local addresses.
    pub fn with_scope(ip: Ipv6Addr, port: u16, scope_id: u32) -> Self {
        Self { ip, port, scope_id }
    }

    /// Loopback endpoint (::1) on the given port.
    pub fn loopback(port: u16) -> Self {
        Self::new(Ipv6Addr::LOCALHOST, port)
    }

    /// Wildcard endpoint (::) on the given port.
    pub fn any(port: u16) -> Self {
        Self::new(Ipv6Addr::UNSPECIFIED, port)
    }

    /// Returns the IP address.
    pub fn ip(&self) -> Ipv6Addr {
        self.ip
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the scope ID.
    pub fn scope_id(&self) -> u32 {
        self.scope_id
    }

    /// Converts to the raw sockaddr_in6 for syscalls.
    pub(crate) fn to_raw(&self) -> libc::sockaddr_in6 {
        libc::sockaddr_in6 {
            sin6_family: libc::AF_INET6 as libc::sa_family_t,
            sin6_port: self.port.to_be(),
            sin6_flowinfo: 0,
            sin6_addr: libc::in6_addr {
                s6_addr: self.ip.octets(),
            },
            sin6_scope_id: self.scope_id,
        }
    }

    /// Creates from raw sockaddr_in6.
    pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> Self {
        Self {
            ip: Ipv6Addr::from(raw.sin6_addr.s6_addr),
            port: u16::from_be(raw.sin6_port),
            scope_id: raw.sin6_scope_id,
        }
    }
}

impl std::fmt::Display for SocketAddrV6 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]:{}", self.ip, self.port)
    }
}

impl From<std::net::SocketAddrV6> for SocketAddrV6 {
    fn from(addr: std::net::SocketAddrV6) -> Self {
        Self::with_scope(*addr.ip(), addr.port(), addr.scope_id())
    }
}

impl ToSockAddr for SocketAddrV6 {
    fn with_raw<F, R>(&self, f: F) -> R
    where
        F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
    {
        let raw = self.to_raw();
        let ptr = &raw as *const _ as *const libc::sockaddr;
        let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
        f(ptr, len)
    }
}
