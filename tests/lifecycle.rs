//! Tests for the socket lifecycle: phase transitions, phase-gated
//! operations, and terminal close.

use sockstate::{
    SockError, SocketAddrV4, TcpListener, TcpSocket, UdpSocket,
};

#[test]
fn fresh_socket_is_unbound() {
    let sock = TcpSocket::new().unwrap();
    assert!(!sock.is_closed());
    assert!(!sock.is_bound());
    assert!(!sock.is_connected());
}

#[test]
fn local_endpoint_before_bind_is_not_bound() {
    let sock = TcpSocket::new().unwrap();
    assert!(matches!(sock.local_endpoint(), Err(SockError::NotBound)));
}

#[test]
fn remote_endpoint_before_connect_is_not_connected() {
    let sock = TcpSocket::new().unwrap();
    assert!(matches!(
        sock.remote_endpoint(),
        Err(SockError::NotConnected)
    ));
}

#[test]
fn bind_transitions_to_bound() {
    let sock = UdpSocket::new().unwrap();
    sock.bind(SocketAddrV4::loopback(0)).unwrap();
    assert!(sock.is_bound());
    let local = sock.local_endpoint().unwrap();
    assert_ne!(local.port(), 0, "OS should assign an ephemeral port");
}

#[test]
fn double_bind_is_already_bound() {
    let sock = UdpSocket::new().unwrap();
    sock.bind(SocketAddrV4::loopback(0)).unwrap();
    assert!(matches!(
        sock.bind(SocketAddrV4::loopback(0)),
        Err(SockError::AlreadyBound)
    ));
}

#[test]
fn double_connect_is_already_connected() {
    let listener = TcpListener::new().unwrap();
    listener.bind(SocketAddrV4::loopback(0), None).unwrap();
    let target = listener.local_endpoint().unwrap();

    let sock = TcpSocket::new().unwrap();
    sock.connect(target).unwrap();
    assert!(sock.is_connected());
    assert!(matches!(
        sock.connect(target),
        Err(SockError::AlreadyConnected)
    ));
}

#[test]
fn connect_implies_bound() {
    let listener = TcpListener::new().unwrap();
    listener.bind(SocketAddrV4::loopback(0), None).unwrap();

    let sock = TcpSocket::new().unwrap();
    sock.connect(listener.local_endpoint().unwrap()).unwrap();
    assert!(sock.is_bound());
    let local = sock.local_endpoint().unwrap();
    assert_ne!(local.port(), 0);
}

#[test]
fn close_is_idempotent_and_terminal() {
    let sock = TcpSocket::new().unwrap();
    let fd = sock.fileno().unwrap();
    assert!(fd >= 0);

    sock.close();
    assert!(sock.is_closed());
    sock.close(); // second close is a no-op
    assert!(sock.is_closed());

    assert!(matches!(sock.fileno(), Err(SockError::Closed)));
    assert!(matches!(sock.local_endpoint(), Err(SockError::Closed)));
    assert!(matches!(sock.recv(16), Err(SockError::Closed)));
    assert!(matches!(sock.send(b"x"), Err(SockError::Closed)));
    assert!(matches!(sock.set_timeout(Some(1.0)), Err(SockError::Closed)));
}

#[test]
fn closed_listener_rejects_everything() {
    let listener = TcpListener::new().unwrap();
    listener.close();
    assert!(listener.is_closed());
    assert!(matches!(listener.accept(), Err(SockError::Closed)));
    assert!(matches!(
        listener.bind(SocketAddrV4::loopback(0), None),
        Err(SockError::Closed)
    ));
}

#[test]
fn accept_before_bind_is_not_bound() {
    let listener = TcpListener::new().unwrap();
    assert!(matches!(listener.accept(), Err(SockError::NotBound)));
}

#[test]
fn backlog_before_bind_is_not_bound() {
    let listener = TcpListener::new().unwrap();
    assert!(matches!(
        listener.set_backlog(16),
        Err(SockError::NotBound)
    ));
}

#[test]
fn backlog_can_grow_while_listening() {
    let listener = TcpListener::new().unwrap();
    listener.bind(SocketAddrV4::loopback(0), Some(1)).unwrap();
    assert!(listener.is_listening());
    listener.set_backlog(32).unwrap();
    assert!(listener.is_listening());
}

#[test]
fn blocking_and_timeout_interplay() {
    let sock = UdpSocket::new().unwrap();

    // Fresh sockets block forever.
    assert!(sock.blocking().unwrap());
    assert_eq!(sock.timeout().unwrap(), None);

    sock.set_timeout(Some(1.5)).unwrap();
    assert!(!sock.blocking().unwrap());
    assert_eq!(sock.timeout().unwrap(), Some(1.5));

    // Zero timeout is non-blocking mode.
    sock.set_timeout(Some(0.0)).unwrap();
    assert_eq!(sock.timeout().unwrap(), Some(0.0));
    assert!(!sock.blocking().unwrap());

    // set_blocking(true) clears the timeout.
    sock.set_blocking(true).unwrap();
    assert!(sock.blocking().unwrap());
    assert_eq!(sock.timeout().unwrap(), None);

    // set_blocking(false) is the zero timeout.
    sock.set_blocking(false).unwrap();
    assert_eq!(sock.timeout().unwrap(), Some(0.0));
}

#[test]
fn negative_timeout_is_treated_as_non_blocking() {
    let sock = UdpSocket::new().unwrap();
    sock.set_timeout(Some(-3.0)).unwrap();
    assert_eq!(sock.timeout().unwrap(), Some(0.0));
}

#[test]
fn debug_shows_fd_then_closed() {
    let sock = TcpSocket::new().unwrap();
    let fd = sock.fileno().unwrap();
    assert_eq!(format!("{sock:?}"), format!("<StreamSocket(fd = {fd})>"));
    sock.close();
    assert_eq!(format!("{sock:?}"), "<StreamSocket(closed)>");
}

#[test]
fn timeout_is_settable_in_every_phase() {
    let listener = TcpListener::new().unwrap();
    listener.set_timeout(Some(0.5)).unwrap(); // Unbound
    listener.bind(SocketAddrV4::loopback(0), None).unwrap();
    listener.set_timeout(Some(0.5)).unwrap(); // Listening

    let sock = TcpSocket::new().unwrap();
    sock.connect(listener.local_endpoint().unwrap()).unwrap();
    sock.set_timeout(Some(0.5)).unwrap(); // Connected
    sock.set_timeout(None).unwrap();
}
