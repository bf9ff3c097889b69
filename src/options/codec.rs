//! Wire codecs for socket option payloads.
//!
//! Each option kind has a pure `encode_*`/`decode_*` pair translating
//! between a typed Rust value and the kernel ABI struct for this platform,
//! and `get_*`/`set_*` wrappers that run the actual `getsockopt`/
//! `setsockopt` call. Field widths follow the host ABI through the `libc`
//! struct definitions (`linger`, `timeval`, `ip_mreq`, `ipv6_mreq`).
//! Winsock diverges on two of these layouts — `linger` as a pair of u16 and
//! timeouts as a single millisecond integer — but this crate, like the rest
//! of the syscall surface here, targets Unix.
//!
//! Every failure, whether from the OS call or from an unexpected payload
//! shape, is reported as `SockError::Option` with the errno and the option
//! name attached; no raw OS error escapes this module.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::fd::RawFd;

use crate::error::{SockError, errno};
use crate::Result;

/// Upper bound for uninterpreted option payloads.
pub const MAX_OPTION_LEN: usize = 1024;

fn option_error(option: &'static str) -> SockError {
    SockError::Option { errno: errno(), option }
}

/// Payload of the wrong size for its codec, in either direction.
fn bad_payload(option: &'static str) -> SockError {
    SockError::Option { errno: libc::EINVAL, option }
}

/// Copies a C struct out as bytes.
fn struct_bytes<T: Copy>(value: &T) -> Vec<u8> {
    let ptr = value as *const T as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, std::mem::size_of::<T>()) }.to_vec()
}

/// Reads a C struct back from bytes, failing if the payload is short.
fn read_struct<T: Copy>(bytes: &[u8], option: &'static str) -> Result<T> {
    if bytes.len() < std::mem::size_of::<T>() {
        return Err(bad_payload(option));
    }
    Ok(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) })
}

//
// pure codecs
//

/// Encodes a boolean as a platform integer (nonzero = true).
pub fn encode_bool(value: bool) -> Vec<u8> {
    encode_int(value as libc::c_int)
}

/// Decodes a platform integer as a boolean.
pub fn decode_bool(bytes: &[u8], option: &'static str) -> Result<bool> {
    decode_int(bytes, option).map(|v| v != 0)
}

/// Encodes a fixed-width platform integer, no transformation.
pub fn encode_int(value: libc::c_int) -> Vec<u8> {
    value.to_ne_bytes().to_vec()
}

/// Decodes a fixed-width platform integer.
pub fn decode_int(bytes: &[u8], option: &'static str) -> Result<libc::c_int> {
    read_struct::<libc::c_int>(bytes, option)
}

/// Encodes the linger pair: `None` → {0, 0}, `Some(n)` → {1, n}.
pub fn encode_linger(value: Option<u32>) -> Vec<u8> {
    let raw = match value {
        None => libc::linger { l_onoff: 0, l_linger: 0 },
        Some(seconds) => libc::linger {
            l_onoff: 1,
            l_linger: seconds as libc::c_int,
        },
    };
    struct_bytes(&raw)
}

/// Decodes the linger pair: inactive flag → `None`, else `Some(seconds)`.
pub fn decode_linger(bytes: &[u8], option: &'static str) -> Result<Option<u32>> {
    let raw: libc::linger = read_struct(bytes, option)?;
    if raw.l_onoff == 0 {
        Ok(None)
    } else {
        Ok(Some(raw.l_linger as u32))
    }
}

/// Encodes a floating-point seconds value as a `timeval`, truncating to
/// microsecond precision.
pub fn encode_timeout(seconds: f64) -> Vec<u8> {
    let sec = seconds.trunc();
    let usec = (seconds - sec) * 1e6;
    let raw = libc::timeval {
        tv_sec: sec as libc::time_t,
        tv_usec: usec as libc::suseconds_t,
    };
    struct_bytes(&raw)
}

/// Decodes a `timeval` to floating-point seconds (`sec + usec/1e6`).
pub fn decode_timeout(bytes: &[u8], option: &'static str) -> Result<f64> {
    let raw: libc::timeval = read_struct(bytes, option)?;
    Ok(raw.tv_sec as f64 + raw.tv_usec as f64 / 1e6)
}

fn in_addr(ip: Ipv4Addr) -> libc::in_addr {
    // Octets are already network order.
    libc::in_addr {
        s_addr: u32::from_ne_bytes(ip.octets()),
    }
}

/// Encodes an IPv4 membership pair (multicast group, interface address).
pub fn encode_mreq_v4(group: Ipv4Addr, interface: Ipv4Addr) -> Vec<u8> {
    let raw = libc::ip_mreq {
        imr_multiaddr: in_addr(group),
        imr_interface: in_addr(interface),
    };
    struct_bytes(&raw)
}

/// Decodes an IPv4 membership pair.
///
/// `getsockopt(IP_MULTICAST_IF)` replies with a bare 4-byte `in_addr` on
/// Linux rather than the full `ip_mreq`; that shape decodes as an interface
/// address with an unspecified group.
pub fn decode_mreq_v4(bytes: &[u8], option: &'static str) -> Result<(Ipv4Addr, Ipv4Addr)> {
    if bytes.len() < std::mem::size_of::<libc::ip_mreq>() {
        let raw: libc::in_addr = read_struct(bytes, option)?;
        return Ok((Ipv4Addr::UNSPECIFIED, Ipv4Addr::from(raw.s_addr.to_ne_bytes())));
    }
    let raw: libc::ip_mreq = read_struct(bytes, option)?;
    Ok((
        Ipv4Addr::from(raw.imr_multiaddr.s_addr.to_ne_bytes()),
        Ipv4Addr::from(raw.imr_interface.s_addr.to_ne_bytes()),
    ))
}

/// Encodes an IPv6 membership pair (multicast group, interface index).
pub fn encode_mreq_v6(group: Ipv6Addr, interface: u32) -> Vec<u8> {
    let raw = libc::ipv6_mreq {
        ipv6mr_multiaddr: libc::in6_addr {
            s6_addr: group.octets(),
        },
        ipv6mr_interface: interface as libc::c_uint,
    };
    struct_bytes(&raw)
}

/// Decodes an IPv6 membership pair.
pub fn decode_mreq_v6(bytes: &[u8], option: &'static str) -> Result<(Ipv6Addr, u32)> {
    let raw: libc::ipv6_mreq = read_struct(bytes, option)?;
    Ok((
        Ipv6Addr::from(raw.ipv6mr_multiaddr.s6_addr),
        raw.ipv6mr_interface as u32,
    ))
}

//
// syscall wrappers
//

fn getsockopt_raw(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    buf: &mut [u8],
) -> Result<usize> {
    let mut len = buf.len() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            level,
            id,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
        )
    };
    if rc == -1 {
        Err(option_error(option))
    } else {
        Ok(len as usize)
    }
}

fn setsockopt_raw(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    bytes: &[u8],
) -> Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            id,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len() as libc::socklen_t,
        )
    };
    if rc == -1 {
        Err(option_error(option))
    } else {
        Ok(())
    }
}

macro_rules! getter {
    ($name:ident, $decode:ident, $buf_ty:ty, $value:ty) => {
        pub fn $name(
            fd: RawFd,
            level: libc::c_int,
            id: libc::c_int,
            option: &'static str,
        ) -> Result<$value> {
            let mut buf = [0u8; std::mem::size_of::<$buf_ty>()];
            let n = getsockopt_raw(fd, level, id, option, &mut buf)?;
            $decode(&buf[..n], option)
        }
    };
}

getter!(get_bool, decode_bool, libc::c_int, bool);
getter!(get_int, decode_int, libc::c_int, libc::c_int);
getter!(get_linger, decode_linger, libc::linger, Option<u32>);
getter!(get_timeout, decode_timeout, libc::timeval, f64);
getter!(get_mreq_v4, decode_mreq_v4, libc::ip_mreq, (Ipv4Addr, Ipv4Addr));
getter!(get_mreq_v6, decode_mreq_v6, libc::ipv6_mreq, (Ipv6Addr, u32));

pub fn get_raw(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_OPTION_LEN];
    let n = getsockopt_raw(fd, level, id, option, &mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

pub fn set_bool(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    value: bool,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &encode_bool(value))
}

pub fn set_int(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    value: libc::c_int,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &encode_int(value))
}

pub fn set_linger(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    value: Option<u32>,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &encode_linger(value))
}

pub fn set_timeout(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    seconds: f64,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &encode_timeout(seconds))
}

pub fn set_mreq_v4(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    group: Ipv4Addr,
    interface: Ipv4Addr,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &encode_mreq_v4(group, interface))
}

/// Writes a bare 4-byte `in_addr`. `IP_MULTICAST_IF` takes this layout on
/// the set side; handing it the membership layout makes Linux read the
/// group slot as the interface.
pub fn set_interface_v4(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    interface: Ipv4Addr,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &struct_bytes(&in_addr(interface)))
}

pub fn set_mreq_v6(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    group: Ipv6Addr,
    interface: u32,
) -> Result<()> {
    setsockopt_raw(fd, level, id, option, &encode_mreq_v6(group, interface))
}

pub fn set_raw(
    fd: RawFd,
    level: libc::c_int,
    id: libc::c_int,
    option: &'static str,
    bytes: &[u8],
) -> Result<()> {
    if bytes.len() > MAX_OPTION_LEN {
        return Err(bad_payload(option));
    }
    setsockopt_raw(fd, level, id, option, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_round_trip() {
        for v in [true, false] {
            assert_eq!(decode_bool(&encode_bool(v), "t").unwrap(), v);
        }
        // Any nonzero integer reads back as true.
        assert!(decode_bool(&encode_int(17), "t").unwrap());
    }

    #[test]
    fn int_round_trip() {
        for v in [0, 1, -1, 4096, libc::c_int::MAX] {
            assert_eq!(decode_int(&encode_int(v), "t").unwrap(), v);
        }
    }

    #[test]
    fn linger_round_trip() {
        assert_eq!(decode_linger(&encode_linger(None), "t").unwrap(), None);
        for v in [0, 1, 30, 7200] {
            assert_eq!(
                decode_linger(&encode_linger(Some(v)), "t").unwrap(),
                Some(v)
            );
        }
    }

    #[test]
    fn linger_inactive_flag_wins_over_seconds() {
        let raw = libc::linger { l_onoff: 0, l_linger: 55 };
        let bytes = struct_bytes(&raw);
        assert_eq!(decode_linger(&bytes, "t").unwrap(), None);
    }

    #[test]
    fn timeout_round_trip() {
        for v in [0.0, 0.05, 1.5, 3600.0] {
            let got = decode_timeout(&encode_timeout(v), "t").unwrap();
            assert!((got - v).abs() < 1e-6, "{} decoded as {}", v, got);
        }
    }

    #[test]
    fn mreq_v4_round_trip() {
        let group = Ipv4Addr::new(224, 0, 0, 251);
        let iface = Ipv4Addr::new(192, 168, 1, 7);
        assert_eq!(
            decode_mreq_v4(&encode_mreq_v4(group, iface), "t").unwrap(),
            (group, iface)
        );
    }

    #[test]
    fn mreq_v4_accepts_bare_interface_reply() {
        let iface = Ipv4Addr::new(10, 0, 0, 1);
        let bytes = iface.octets().to_vec();
        assert_eq!(
            decode_mreq_v4(&bytes, "t").unwrap(),
            (Ipv4Addr::UNSPECIFIED, iface)
        );
    }

    #[test]
    fn mreq_v6_round_trip() {
        let group: Ipv6Addr = "ff02::fb".parse().unwrap();
        assert_eq!(
            decode_mreq_v6(&encode_mreq_v6(group, 3), "t").unwrap(),
            (group, 3)
        );
    }

    #[test]
    fn short_payloads_are_rejected() {
        assert!(decode_int(&[0u8; 2], "t").is_err());
        assert!(decode_linger(&[0u8; 3], "t").is_err());
        assert!(decode_timeout(&[0u8; 5], "t").is_err());
        assert!(decode_mreq_v6(&[0u8; 10], "t").is_err());
    }

    #[test]
    fn oversized_raw_payloads_are_rejected_before_the_os_call() {
        let big = vec![0u8; MAX_OPTION_LEN + 1];
        // fd -1 would fail with EBADF if the call went through; the size
        // check fires first.
        assert!(matches!(
            set_raw(-1, libc::SOL_SOCKET, libc::SO_DEBUG, "t", &big),
            Err(SockError::Option { errno: libc::EINVAL, .. })
        ));
    }
}
