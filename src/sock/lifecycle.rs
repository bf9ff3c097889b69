use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::{Mutex, MutexGuard};

use crate::addr::{FromSockAddr, ToSockAddr};
use crate::error::{SockError, errno, is_timeout};
use crate::options::codec;
use crate::Result;

/// Where a socket is in its life.
///
/// `Closed` is not listed here: it is represented by the descriptor slot
/// being empty, so a closed socket cannot carry a stale phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Unbound,
    Bound,
    Connected,
    Listening,
}

#[derive(Debug)]
struct Inner {
    /// `None` is the terminal closed state.
    fd: Option<OwnedFd>,
    phase: Phase,
    /// Seconds; `None` means blocking forever, `Some(0.0)` non-blocking.
    timeout: Option<f64>,
}

/// The base socket: owns the descriptor and tracks the lifecycle phase.
///
/// All state lives behind one mutex, which makes `close()` atomic with
/// respect to any in-flight accessor: whoever loses the race observes the
/// empty descriptor slot and fails with `Closed` instead of touching a
/// released fd. Beyond that guard, instances are meant for one thread of
/// control at a time.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
}

/// Sets or clears `O_NONBLOCK` on a descriptor.
fn set_nonblocking(fd: RawFd, nonblocking: bool) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(SockError::Option { errno: errno(), option: "F_GETFL" });
    }
    let new_flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFL, new_flags) } == -1 {
        return Err(SockError::Option { errno: errno(), option: "O_NONBLOCK" });
    }
    Ok(())
}

impl Lifecycle {
    /// Creates a fresh, unbound socket via the `socket()` syscall.
    ///
    /// The descriptor is created close-on-exec.
    pub(crate) fn new(
        family: libc::c_int,
        sock_type: libc::c_int,
        protocol: libc::c_int,
    ) -> Result<Self> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let fd = unsafe { libc::socket(family, sock_type | libc::SOCK_CLOEXEC, protocol) };
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let fd = unsafe { libc::socket(family, sock_type, protocol) };
        if fd == -1 {
            return Err(SockError::Create { errno: errno() });
        }
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        unsafe {
            libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
        }
        log::debug!("socket created (fd = {fd})");
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self::from_parts(fd, Phase::Unbound))
    }

    /// Wraps a descriptor the OS already connected (the accept path): the
    /// normal bind/connect transitions are skipped because the kernel
    /// performed them.
    pub(crate) fn from_accepted(fd: OwnedFd) -> Self {
        Self::from_parts(fd, Phase::Connected)
    }

    fn from_parts(fd: OwnedFd, phase: Phase) -> Self {
        Self {
            inner: Mutex::new(Inner {
                fd: Some(fd),
                phase,
                timeout: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock still holds a consistent Inner: every mutation
        // below completes before anything that can panic.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` with the raw descriptor under the guard; `Closed` if the
    /// descriptor was released.
    pub(crate) fn with_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        let guard = self.lock();
        match &guard.fd {
            Some(fd) => Ok(f(fd.as_raw_fd())),
            None => Err(SockError::Closed),
        }
    }

    /// Like [`with_fd`], but requires the socket to be at least bound.
    pub(crate) fn with_bound_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        let guard = self.lock();
        match &guard.fd {
            Some(fd) if guard.phase != Phase::Unbound => Ok(f(fd.as_raw_fd())),
            Some(_) => Err(SockError::NotBound),
            None => Err(SockError::Closed),
        }
    }

    /// Like [`with_fd`], but requires an established connection.
    pub(crate) fn with_connected_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        let guard = self.lock();
        match &guard.fd {
            Some(fd) if guard.phase == Phase::Connected => Ok(f(fd.as_raw_fd())),
            Some(_) => Err(SockError::NotConnected),
            None => Err(SockError::Closed),
        }
    }

    /// Like [`with_fd`], but requires the socket to be listening.
    pub(crate) fn with_listening_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R> {
        let guard = self.lock();
        match &guard.fd {
            Some(fd) if guard.phase == Phase::Listening => Ok(f(fd.as_raw_fd())),
            Some(_) => Err(SockError::NotBound),
            None => Err(SockError::Closed),
        }
    }

    /// Releases the descriptor. Idempotent: the first call closes, later
    /// calls are no-ops. Also runs on drop.
    pub(crate) fn close(&self) {
        let mut guard = self.lock();
        if let Some(fd) = guard.fd.take() {
            log::debug!("socket closed (fd = {})", fd.as_raw_fd());
            // OwnedFd::drop performs the close(2).
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().fd.is_none()
    }

    pub(crate) fn is_bound(&self) -> bool {
        let guard = self.lock();
        guard.fd.is_some() && guard.phase != Phase::Unbound
    }

    pub(crate) fn phase(&self) -> Result<Phase> {
        let guard = self.lock();
        if guard.fd.is_some() {
            Ok(guard.phase)
        } else {
            Err(SockError::Closed)
        }
    }

    /// The raw descriptor, while open.
    pub(crate) fn fileno(&self) -> Result<RawFd> {
        self.with_fd(|fd| fd)
    }

    /// Binds to a local endpoint; legal only while unbound.
    pub(crate) fn bind<A>(&self, addr: &A) -> Result<()>
    where
        A: ToSockAddr + std::fmt::Display,
    {
        let mut guard = self.lock();
        let fd = match &guard.fd {
            Some(fd) => fd.as_raw_fd(),
            None => return Err(SockError::Closed),
        };
        if guard.phase != Phase::Unbound {
            return Err(SockError::AlreadyBound);
        }
        let rc = addr.with_raw(|ptr, len| unsafe { libc::bind(fd, ptr, len) });
        if rc == -1 {
            let e = errno();
            return if is_timeout(e) {
                Err(SockError::Timeout)
            } else {
                Err(SockError::Bind { errno: e, addr: addr.to_string() })
            };
        }
        log::debug!("socket bound to {addr} (fd = {fd})");
        guard.phase = Phase::Bound;
        Ok(())
    }

    /// Connects to a remote endpoint; legal while unbound or bound but not
    /// yet connected. A successful connect also binds the local endpoint.
    pub(crate) fn connect<A>(&self, addr: &A) -> Result<()>
    where
        A: ToSockAddr + std::fmt::Display,
    {
        let mut guard = self.lock();
        let fd = match &guard.fd {
            Some(fd) => fd.as_raw_fd(),
            None => return Err(SockError::Closed),
        };
        if guard.phase == Phase::Connected || guard.phase == Phase::Listening {
            return Err(SockError::AlreadyConnected);
        }
        let rc = addr.with_raw(|ptr, len| unsafe { libc::connect(fd, ptr, len) });
        if rc == -1 {
            let e = errno();
            // A connect racing a send timeout reports EINPROGRESS.
            return if is_timeout(e) || e == libc::EINPROGRESS {
                Err(SockError::Timeout)
            } else {
                Err(SockError::Connect { errno: e, addr: addr.to_string() })
            };
        }
        log::debug!("socket connected to {addr} (fd = {fd})");
        guard.phase = Phase::Connected;
        Ok(())
    }

    /// Starts (or resizes) the accept queue; legal once bound.
    pub(crate) fn listen(&self, backlog: i32) -> Result<()> {
        let mut guard = self.lock();
        let fd = match &guard.fd {
            Some(fd) => fd.as_raw_fd(),
            None => return Err(SockError::Closed),
        };
        if guard.phase == Phase::Unbound {
            return Err(SockError::NotBound);
        }
        if unsafe { libc::listen(fd, backlog) } == -1 {
            return Err(SockError::Socket { errno: errno() });
        }
        log::debug!("socket listening with backlog {backlog} (fd = {fd})");
        guard.phase = Phase::Listening;
        Ok(())
    }

    /// Half-closes the socket in the given direction(s).
    pub(crate) fn shutdown(&self, how: super::Shutdown) -> Result<()> {
        self.with_fd(|fd| {
            let how = match how {
                super::Shutdown::Read => libc::SHUT_RD,
                super::Shutdown::Write => libc::SHUT_WR,
                super::Shutdown::Both => libc::SHUT_RDWR,
            };
            if unsafe { libc::shutdown(fd, how) } == -1 {
                Err(SockError::Socket { errno: errno() })
            } else {
                Ok(())
            }
        })?
    }

    /// The local endpoint; knowable once bound.
    pub(crate) fn local_endpoint<A: FromSockAddr>(&self) -> Result<A> {
        self.with_bound_fd(|fd| {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let rc = unsafe {
                libc::getsockname(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
            };
            if rc == -1 {
                return Err(SockError::Socket { errno: errno() });
            }
            unsafe { A::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) }
                .ok_or(SockError::InvalidAddress { reason: "unexpected local address family" })
        })?
    }

    /// The remote endpoint; knowable once connected.
    pub(crate) fn remote_endpoint<A: FromSockAddr>(&self) -> Result<A> {
        self.with_connected_fd(|fd| {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let rc = unsafe {
                libc::getpeername(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
            };
            if rc == -1 {
                return Err(SockError::Socket { errno: errno() });
            }
            unsafe { A::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) }
                .ok_or(SockError::InvalidAddress { reason: "unexpected peer address family" })
        })?
    }

    /// The configured operation timeout in seconds. `None` means blocking
    /// forever.
    pub(crate) fn timeout(&self) -> Result<Option<f64>> {
        let guard = self.lock();
        if guard.fd.is_some() {
            Ok(guard.timeout)
        } else {
            Err(SockError::Closed)
        }
    }

    /// Configures the operation timeout.
    ///
    /// `None` restores fully blocking mode; `Some(0.0)` (or any
    /// non-positive value) switches to non-blocking; a positive value
    /// arms kernel timeouts in both directions. Legal in every phase.
    pub(crate) fn set_timeout(&self, timeout: Option<f64>) -> Result<()> {
        let mut guard = self.lock();
        let fd = match &guard.fd {
            Some(fd) => fd.as_raw_fd(),
            None => return Err(SockError::Closed),
        };
        let stored = match timeout {
            None => {
                set_nonblocking(fd, false)?;
                self.apply_kernel_timeout(fd, 0.0)?;
                None
            }
            Some(t) if t <= 0.0 => {
                set_nonblocking(fd, true)?;
                Some(0.0)
            }
            Some(t) => {
                set_nonblocking(fd, false)?;
                self.apply_kernel_timeout(fd, t)?;
                Some(t)
            }
        };
        guard.timeout = stored;
        Ok(())
    }

    fn apply_kernel_timeout(&self, fd: RawFd, seconds: f64) -> Result<()> {
        codec::set_timeout(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            "recv_timeout",
            seconds,
        )?;
        codec::set_timeout(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDTIMEO,
            "send_timeout",
            seconds,
        )
    }

    /// Whether operations block indefinitely (no timeout configured).
    pub(crate) fn blocking(&self) -> Result<bool> {
        Ok(self.timeout()?.is_none())
    }

    /// Switches between blocking-forever and non-blocking mode.
    pub(crate) fn set_blocking(&self, blocking: bool) -> Result<()> {
        if blocking {
            self.set_timeout(None)
        } else {
            self.set_timeout(Some(0.0))
        }
    }

    /// `<Name(fd = n)>` or `<Name(closed)>`, shared by the socket types'
    /// Debug impls.
    pub(crate) fn debug_fmt(
        &self,
        name: &str,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self.fileno() {
            Ok(fd) => write!(f, "<{name}(fd = {fd})>"),
            Err(_) => write!(f, "<{name}(closed)>"),
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        // Explicit close for the log line; the fd would be released by
        // OwnedFd::drop anyway.
        self.close();
    }
}
