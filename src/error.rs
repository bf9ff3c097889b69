use std::sync::OnceLock;

/// The closed set of errors this crate produces.
///
/// Every OS-level failure is intercepted at the call site and re-raised as
/// exactly one of these variants; raw errnos only appear as payload. The
/// `Timeout` variant is special-cased on the read path: `recv` never returns
/// it, it returns an empty result instead.
#[derive(Debug, thiserror::Error)]
pub enum SockError {
    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    /// Generic data-path failure (send/recv/sendto/recvfrom).
    #[error("socket error: {}", errno_to_str(*.errno))]
    Socket { errno: i32 },

    #[error("operation timed out")]
    Timeout,

    #[error("socket is closed")]
    Closed,

    #[error("accept() failed: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("socket option {option}: {}", errno_to_str(*.errno))]
    Option { errno: i32, option: &'static str },

    #[error("socket is not bound")]
    NotBound,

    #[error("socket is not connected")]
    NotConnected,

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("socket is already bound")]
    AlreadyBound,

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("socket is already connected")]
    AlreadyConnected,

    /// The peer performed an orderly shutdown (zero-length read).
    #[error("connection closed by peer")]
    PeerClosed,

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    /// Reserved for the host-name resolution layer; nothing in this crate
    /// constructs it, but it is part of the error contract callers match on.
    #[error("address resolution failed: {name}")]
    Resolve { name: String },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SockError>;

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// The errno values treated as "would block / timed out" on this platform.
///
/// Resolved once, on first use, and read-only afterwards. On Linux `EAGAIN`
/// and `EWOULDBLOCK` are the same value, hence the dedup.
pub fn timeout_errnos() -> &'static [i32] {
    static TIMEOUT_ERRNOS: OnceLock<Vec<i32>> = OnceLock::new();
    TIMEOUT_ERRNOS.get_or_init(|| {
        let mut codes = vec![libc::EAGAIN, libc::EWOULDBLOCK];
        codes.sort_unstable();
        codes.dedup();
        codes
    })
}

/// True if `errno` is timeout-equivalent (see [`timeout_errnos`]).
#[inline]
pub fn is_timeout(errno: i32) -> bool {
    timeout_errnos().contains(&errno)
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOPROTOOPT => "protocol option not available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SockError> for std::io::Error {
    fn from(err: SockError) -> Self {
        let kind = match &err {
            SockError::Create { errno }
            | SockError::Socket { errno }
            | SockError::Accept { errno }
            | SockError::Option { errno, .. }
            | SockError::Bind { errno, .. }
            | SockError::Connect { errno, .. } => errno_to_kind(*errno),
            SockError::Timeout => std::io::ErrorKind::TimedOut,
            SockError::Closed
            | SockError::NotBound
            | SockError::NotConnected
            | SockError::AlreadyBound
            | SockError::AlreadyConnected => std::io::ErrorKind::NotConnected,
            SockError::PeerClosed => std::io::ErrorKind::UnexpectedEof,
            SockError::InvalidAddress { .. } => std::io::ErrorKind::InvalidInput,
            SockError::Resolve { .. } => std::io::ErrorKind::NotFound,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_set_is_deduplicated_and_stable() {
        let first = timeout_errnos();
        assert!(first.contains(&libc::EAGAIN));
        assert!(first.contains(&libc::EWOULDBLOCK));
        let mut deduped = first.to_vec();
        deduped.dedup();
        assert_eq!(deduped.len(), first.len());
        // Same slice on every call.
        assert_eq!(first.as_ptr(), timeout_errnos().as_ptr());
    }

    #[test]
    fn timeout_classification() {
        assert!(is_timeout(libc::EAGAIN));
        assert!(!is_timeout(libc::ECONNREFUSED));
        assert!(!is_timeout(0));
    }
}
