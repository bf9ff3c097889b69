//! Address families and endpoint types.
//!
//! Two families are supported:
//! - `Ipv4` — Internet Protocol version 4
//! - `Ipv6` — Internet Protocol version 6
//!
//! Each family marker carries its endpoint type (`SocketAddrV4` /
//! `SocketAddrV6`) through the `Domain::Addr` associated type, so a socket
//! parameterized on a family only ever binds, connects, or reports
//! endpoints of the matching shape.

mod ipv4;
mod ipv6;
pub use self::ipv4::{Ipv4, SocketAddrV4};
pub use self::ipv6::{Ipv6, SocketAddrV6};

/// Trait for address family markers.
///
/// Each type implementing this trait represents an address family
/// that can be passed to the `socket()` syscall.
pub trait Domain {
    /// The endpoint type for this family.
    type Addr: ToSockAddr + FromSockAddr + std::fmt::Display;
    /// Returns the libc constant for this address family.
    fn raw() -> libc::c_int;
}

/// Trait for endpoint types that can be converted to a raw sockaddr for
/// syscalls.
pub trait ToSockAddr {
    /// Calls the provided closure with a pointer to the raw sockaddr and its
    /// size. The raw struct lives on this frame, so the pointer is only valid
    /// inside the closure.
    fn with_raw<F, R>(&self, f: F) -> R
    where
        F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

/// Trait for endpoint types that can be read back from a raw sockaddr.
pub trait FromSockAddr: Sized {
    /// Creates an endpoint from raw sockaddr storage.
    ///
    /// # Safety
    /// `addr` must point to at least `len` readable bytes.
    unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

impl FromSockAddr for SocketAddrV4 {
    unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
        if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
            return None;
        }
        let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
        if raw.sin_family != libc::AF_INET as libc::sa_family_t {
            return None;
        }
        Some(Self::from_raw(raw))
    }
}

impl FromSockAddr for SocketAddrV6 {
    unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
        if len < std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t {
            return None;
        }
        let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
        if raw.sin6_family != libc::AF_INET6 as libc::sa_family_t {
            return None;
        }
        Some(Self::from_raw(raw))
    }
}
