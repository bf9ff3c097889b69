//! End-to-end data-path tests over loopback: stream echo, timeout
//! behavior on both directions, and datagram round trips.

use std::time::{Duration, Instant};

use sockstate::{
    SockError, SocketAddrV4, SocketLevelOptions, TcpListener, TcpListenerV6, TcpSocket,
    TcpSocketV6, UdpSocket,
};

/// A listener on an OS-assigned loopback port plus its address.
fn loopback_listener() -> (TcpListener, SocketAddrV4) {
    let listener = TcpListener::new().unwrap();
    listener.bind(SocketAddrV4::loopback(0), None).unwrap();
    let addr = listener.local_endpoint().unwrap();
    (listener, addr)
}

#[test]
fn stream_echo_both_directions() {
    let (listener, addr) = loopback_listener();

    let client = TcpSocket::new().unwrap();
    client.connect(addr).unwrap();
    let (server, peer) = listener.accept().unwrap();

    // The accept-side peer is the client's local endpoint and vice versa.
    assert_eq!(peer, client.local_endpoint().unwrap());
    assert_eq!(client.remote_endpoint().unwrap(), addr);
    assert_eq!(server.local_endpoint().unwrap(), addr);
    assert!(server.is_connected());

    client.send_all(b"hello").unwrap();
    assert_eq!(server.recv(1024).unwrap(), b"hello");

    server.send_all(b"world").unwrap();
    assert_eq!(client.recv(1024).unwrap(), b"world");
}

#[test]
fn stream_echo_over_ipv6() {
    let listener = TcpListenerV6::new().unwrap();
    listener
        .bind(sockstate::SocketAddrV6::loopback(0), None)
        .unwrap();
    let addr = listener.local_endpoint().unwrap();

    let client = TcpSocketV6::new().unwrap();
    client.connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();

    client.send_all(b"ping").unwrap();
    assert_eq!(server.recv(16).unwrap(), b"ping");
}

#[test]
fn recv_timeout_returns_empty() {
    let (listener, addr) = loopback_listener();
    let client = TcpSocket::new().unwrap();
    client.connect(addr).unwrap();
    let (_server, _) = listener.accept().unwrap();

    client.set_timeout(Some(0.05)).unwrap();
    let start = Instant::now();
    let got = client.recv(1024).unwrap();
    let elapsed = start.elapsed();

    assert!(got.is_empty(), "nothing was sent, so nothing received");
    assert!(elapsed >= Duration::from_millis(40), "returned too early");
    assert!(elapsed < Duration::from_secs(2), "timeout did not fire");
}

#[test]
fn recv_zero_bytes_is_not_peer_closed() {
    let (listener, addr) = loopback_listener();
    let client = TcpSocket::new().unwrap();
    client.connect(addr).unwrap();
    let (_server, _) = listener.accept().unwrap();

    assert_eq!(client.recv(0).unwrap(), Vec::<u8>::new());
}

#[test]
fn peer_close_is_its_own_error() {
    let (listener, addr) = loopback_listener();
    let client = TcpSocket::new().unwrap();
    client.connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();

    server.close();
    assert!(matches!(client.recv(1024), Err(SockError::PeerClosed)));
}

#[test]
fn send_timeout_fails_against_a_full_pipe() {
    let (listener, addr) = loopback_listener();
    let client = TcpSocket::new().unwrap();
    // Small buffers so the write side fills quickly with nobody reading.
    client.set_send_buffer_size(4096).unwrap();
    client.connect(addr).unwrap();
    let (_server, _) = listener.accept().unwrap();

    client.set_timeout(Some(0.05)).unwrap();
    let chunk = vec![0u8; 64 * 1024];
    let result = (0..256).try_for_each(|_| client.send_all(&chunk));
    assert!(matches!(result, Err(SockError::Timeout)));
}

#[test]
fn accept_timeout() {
    let (listener, _) = loopback_listener();
    listener.set_timeout(Some(0.05)).unwrap();
    let start = Instant::now();
    assert!(matches!(listener.accept(), Err(SockError::Timeout)));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn datagram_round_trip() {
    let receiver = UdpSocket::new().unwrap();
    receiver.bind(SocketAddrV4::loopback(0)).unwrap();
    let addr = receiver.local_endpoint().unwrap();

    let sender = UdpSocket::new().unwrap();
    sender.bind(SocketAddrV4::loopback(0)).unwrap();
    assert_eq!(sender.send_to(b"datagram", addr).unwrap(), 8);

    let (data, from) = receiver.recv_from(1024).unwrap();
    assert_eq!(data, b"datagram");
    let from = from.expect("loopback datagram carries a source endpoint");
    assert_eq!(from, sender.local_endpoint().unwrap());
}

#[test]
fn datagram_recv_timeout_returns_empty_and_no_source() {
    let receiver = UdpSocket::new().unwrap();
    receiver.bind(SocketAddrV4::loopback(0)).unwrap();
    receiver.set_timeout(Some(0.05)).unwrap();

    let start = Instant::now();
    let (data, from) = receiver.recv_from(1024).unwrap();
    assert!(data.is_empty());
    assert!(from.is_none());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn datagram_reply_to_source() {
    let receiver = UdpSocket::new().unwrap();
    receiver.bind(SocketAddrV4::loopback(0)).unwrap();
    let addr = receiver.local_endpoint().unwrap();

    let sender = UdpSocket::new().unwrap();
    sender.bind(SocketAddrV4::loopback(0)).unwrap();
    sender.send_to(b"ping", addr).unwrap();

    let (_, from) = receiver.recv_from(64).unwrap();
    receiver.send_to(b"pong", from.unwrap()).unwrap();

    let (reply, _) = sender.recv_from(64).unwrap();
    assert_eq!(reply, b"pong");
}

#[test]
fn shutdown_write_signals_end_of_stream() {
    let (listener, addr) = loopback_listener();
    let client = TcpSocket::new().unwrap();
    client.connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();

    client.send_all(b"last words").unwrap();
    client.shutdown(sockstate::Shutdown::Write).unwrap();

    assert_eq!(server.recv(64).unwrap(), b"last words");
    assert!(matches!(server.recv(64), Err(SockError::PeerClosed)));
}
