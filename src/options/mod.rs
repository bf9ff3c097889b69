//! Declarative socket option registry.
//!
//! Every option level (socket-generic, IP, IPv6, TCP) is described once, as
//! a table of `(kind, accessor names, OS option id, contract)` rows. The
//! `options_level!` macro expands each table into two coupled artifacts:
//!
//! 1. a `static <LEVEL>_OPTIONS: &[OptionDesc]` slice — the runtime
//!    registry, usable for introspection and dynamic access through
//!    [`OptionDesc::get`] / [`OptionDesc::set`]; and
//! 2. a per-level trait of typed accessors (`reuse_address()` /
//!    `set_reuse_address(..)` and so on) with default bodies over
//!    [`OptionTarget`].
//!
//! Rows are `#[cfg]`-gated per platform: an option the platform does not
//! define produces neither a table entry nor an accessor, so no generated
//! accessor can ever issue an OS call for a foreign option id. Options
//! whose payloads have no codec here (`sockaddr_in6`, `ip6_mtuinfo`,
//! `in6_pktinfo` shaped ones) are simply not listed.
//!
//! Multicast membership is deliberately not an accessor pair: join and
//! leave share one wire layout with different option ids, so they surface
//! as the two-argument operations in [`MulticastV4`] / [`MulticastV6`],
//! layered on the membership codec.

pub mod codec;

use std::net::{Ipv4Addr, Ipv6Addr};
use std::os::fd::RawFd;

use crate::error::SockError;
use crate::Result;

// Linux spells IPv6 membership IPV6_ADD/DROP_MEMBERSHIP; the BSDs and
// Apple use the RFC 3493 IPV6_JOIN/LEAVE_GROUP names.
#[cfg(any(target_os = "linux", target_os = "android"))]
use libc::{IPV6_ADD_MEMBERSHIP, IPV6_DROP_MEMBERSHIP};
#[cfg(not(any(target_os = "linux", target_os = "android")))]
use libc::{IPV6_JOIN_GROUP as IPV6_ADD_MEMBERSHIP, IPV6_LEAVE_GROUP as IPV6_DROP_MEMBERSHIP};

/// Closed-checked access to the underlying descriptor.
///
/// Implemented by every socket type in this crate; the closure runs under
/// the descriptor guard, so the fd cannot be released mid-call.
pub trait OptionTarget {
    fn with_option_fd<R>(&self, f: impl FnOnce(RawFd) -> R) -> Result<R>;
}

/// Payload kind of a socket option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionCodec {
    Bool,
    Int,
    Linger,
    Timeout,
    MulticastV4,
    MulticastV6,
    Raw,
}

/// A decoded option value, for the dynamic registry path.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Linger(Option<u32>),
    Timeout(f64),
    MulticastV4(Ipv4Addr, Ipv4Addr),
    MulticastV6(Ipv6Addr, u32),
    Raw(Vec<u8>),
}

/// One row of the registry: a logical option and where it lives.
#[derive(Debug, Clone, Copy)]
pub struct OptionDesc {
    pub name: &'static str,
    pub level: libc::c_int,
    pub id: libc::c_int,
    pub codec: OptionCodec,
    pub doc: &'static str,
}

impl OptionDesc {
    /// Reads this option from `sock` through its codec.
    pub fn get<T: OptionTarget + ?Sized>(&self, sock: &T) -> Result<OptionValue> {
        sock.with_option_fd(|fd| match self.codec {
            OptionCodec::Bool => {
                codec::get_bool(fd, self.level, self.id, self.name).map(OptionValue::Bool)
            }
            OptionCodec::Int => {
                codec::get_int(fd, self.level, self.id, self.name).map(OptionValue::Int)
            }
            OptionCodec::Linger => {
                codec::get_linger(fd, self.level, self.id, self.name).map(OptionValue::Linger)
            }
            OptionCodec::Timeout => {
                codec::get_timeout(fd, self.level, self.id, self.name).map(OptionValue::Timeout)
            }
            OptionCodec::MulticastV4 => codec::get_mreq_v4(fd, self.level, self.id, self.name)
                .map(|(g, i)| OptionValue::MulticastV4(g, i)),
            OptionCodec::MulticastV6 => codec::get_mreq_v6(fd, self.level, self.id, self.name)
                .map(|(g, i)| OptionValue::MulticastV6(g, i)),
            OptionCodec::Raw => {
                codec::get_raw(fd, self.level, self.id, self.name).map(OptionValue::Raw)
            }
        })?
    }

    /// Writes `value` to this option through its codec. The value variant
    /// must match the option's codec kind.
    pub fn set<T: OptionTarget + ?Sized>(&self, sock: &T, value: &OptionValue) -> Result<()> {
        sock.with_option_fd(|fd| match (self.codec, value) {
            (OptionCodec::Bool, OptionValue::Bool(v)) => {
                codec::set_bool(fd, self.level, self.id, self.name, *v)
            }
            (OptionCodec::Int, OptionValue::Int(v)) => {
                codec::set_int(fd, self.level, self.id, self.name, *v)
            }
            (OptionCodec::Linger, OptionValue::Linger(v)) => {
                codec::set_linger(fd, self.level, self.id, self.name, *v)
            }
            (OptionCodec::Timeout, OptionValue::Timeout(v)) => {
                codec::set_timeout(fd, self.level, self.id, self.name, *v)
            }
            (OptionCodec::MulticastV4, OptionValue::MulticastV4(g, i)) => {
                codec::set_mreq_v4(fd, self.level, self.id, self.name, *g, *i)
            }
            (OptionCodec::MulticastV6, OptionValue::MulticastV6(g, i)) => {
                codec::set_mreq_v6(fd, self.level, self.id, self.name, *g, *i)
            }
            (OptionCodec::Raw, OptionValue::Raw(v)) => {
                codec::set_raw(fd, self.level, self.id, self.name, v)
            }
            _ => Err(SockError::Option {
                errno: libc::EINVAL,
                option: self.name,
            }),
        })?
    }
}

macro_rules! options_level {
    (
        trait $trait_name:ident;
        table $table:ident;
        level $level:expr;
        {
            $( $(#[$cfg:meta])* $kind:ident $get:ident / $set:ident => $id:expr, $doc:literal; )*
        }
    ) => {
        pub static $table: &[OptionDesc] = &[
            $(
                $(#[$cfg])*
                OptionDesc {
                    name: stringify!($get),
                    level: $level,
                    id: $id,
                    codec: options_level!(@codec $kind),
                    doc: $doc,
                },
            )*
        ];

        pub trait $trait_name: OptionTarget {
            $( options_level!(@methods $(#[$cfg])* $kind, $get, $set, $level, $id, $doc); )*
        }
    };

    (@codec bool) => { OptionCodec::Bool };
    (@codec int) => { OptionCodec::Int };
    (@codec linger) => { OptionCodec::Linger };
    (@codec timeout) => { OptionCodec::Timeout };
    (@codec raw) => { OptionCodec::Raw };

    (@methods $(#[$cfg:meta])* bool, $get:ident, $set:ident, $level:expr, $id:expr, $doc:literal) => {
        $(#[$cfg])*
        #[doc = $doc]
        fn $get(&self) -> Result<bool> {
            self.with_option_fd(|fd| codec::get_bool(fd, $level, $id, stringify!($get)))?
        }
        $(#[$cfg])*
        #[doc = $doc]
        fn $set(&self, value: bool) -> Result<()> {
            self.with_option_fd(|fd| codec::set_bool(fd, $level, $id, stringify!($get), value))?
        }
    };
    (@methods $(#[$cfg:meta])* int, $get:ident, $set:ident, $level:expr, $id:expr, $doc:literal) => {
        $(#[$cfg])*
        #[doc = $doc]
        fn $get(&self) -> Result<i32> {
            self.with_option_fd(|fd| codec::get_int(fd, $level, $id, stringify!($get)))?
        }
        $(#[$cfg])*
        #[doc = $doc]
        fn $set(&self, value: i32) -> Result<()> {
            self.with_option_fd(|fd| codec::set_int(fd, $level, $id, stringify!($get), value))?
        }
    };
    (@methods $(#[$cfg:meta])* linger, $get:ident, $set:ident, $level:expr, $id:expr, $doc:literal) => {
        $(#[$cfg])*
        #[doc = $doc]
        fn $get(&self) -> Result<Option<u32>> {
            self.with_option_fd(|fd| codec::get_linger(fd, $level, $id, stringify!($get)))?
        }
        $(#[$cfg])*
        #[doc = $doc]
        fn $set(&self, value: Option<u32>) -> Result<()> {
            self.with_option_fd(|fd| codec::set_linger(fd, $level, $id, stringify!($get), value))?
        }
    };
    (@methods $(#[$cfg:meta])* timeout, $get:ident, $set:ident, $level:expr, $id:expr, $doc:literal) => {
        $(#[$cfg])*
        #[doc = $doc]
        fn $get(&self) -> Result<f64> {
            self.with_option_fd(|fd| codec::get_timeout(fd, $level, $id, stringify!($get)))?
        }
        $(#[$cfg])*
        #[doc = $doc]
        fn $set(&self, seconds: f64) -> Result<()> {
            self.with_option_fd(|fd| codec::set_timeout(fd, $level, $id, stringify!($get), seconds))?
        }
    };
    (@methods $(#[$cfg:meta])* raw, $get:ident, $set:ident, $level:expr, $id:expr, $doc:literal) => {
        $(#[$cfg])*
        #[doc = $doc]
        fn $get(&self) -> Result<Vec<u8>> {
            self.with_option_fd(|fd| codec::get_raw(fd, $level, $id, stringify!($get)))?
        }
        $(#[$cfg])*
        #[doc = $doc]
        fn $set(&self, value: &[u8]) -> Result<()> {
            self.with_option_fd(|fd| codec::set_raw(fd, $level, $id, stringify!($get), value))?
        }
    };
}

options_level! {
    trait SocketLevelOptions;
    table SOCKET_LEVEL_OPTIONS;
    level libc::SOL_SOCKET;
    {
        bool debug_mode / set_debug_mode => libc::SO_DEBUG,
            "debug mode (bool)";
        bool accept_connection / set_accept_connection => libc::SO_ACCEPTCONN,
            "whether the socket is accepting connections (bool)";
        bool reuse_address / set_reuse_address => libc::SO_REUSEADDR,
            "allow rebinding the local endpoint (bool)";
        bool keepalive / set_keepalive => libc::SO_KEEPALIVE,
            "use keepalives; idle-time and interval are TCP-level (bool)";
        bool dont_route / set_dont_route => libc::SO_DONTROUTE,
            "disable routing (bool)";
        bool broadcast / set_broadcast => libc::SO_BROADCAST,
            "allow broadcasts from this socket (bool)";
        bool oob_inline / set_oob_inline => libc::SO_OOBINLINE,
            "keep out-of-band (urgent) data in-line (bool)";
        bool reuse_port / set_reuse_port => libc::SO_REUSEPORT,
            "allow rebinding the local port (bool)";
        int send_buffer_size / set_send_buffer_size => libc::SO_SNDBUF,
            "send buffer size (int)";
        int recv_buffer_size / set_recv_buffer_size => libc::SO_RCVBUF,
            "recv buffer size (int)";
        int min_send_size / set_min_send_size => libc::SO_SNDLOWAT,
            "minimum size for send()ing (int)";
        int min_recv_size / set_min_recv_size => libc::SO_RCVLOWAT,
            "minimum size for recv()ing (int)";
        int error_state / set_error_state => libc::SO_ERROR,
            "pending error code of the socket (int)";
        int socket_type / set_socket_type => libc::SO_TYPE,
            "the type of the socket (int)";
        timeout send_timeout / set_send_timeout => libc::SO_SNDTIMEO,
            "send timeout in seconds (float)";
        timeout recv_timeout / set_recv_timeout => libc::SO_RCVTIMEO,
            "recv timeout in seconds (float)";
        linger linger / set_linger => libc::SO_LINGER,
            "linger-after-close timeout in seconds (seconds or None)";
    }
}

options_level! {
    trait IpLevelOptions;
    table IP_LEVEL_OPTIONS;
    level libc::IPPROTO_IP;
    {
        int ttl / set_ttl => libc::IP_TTL,
            "time to live (int)";
        int tos / set_tos => libc::IP_TOS,
            "type of service (int)";
        int multicast_ttl / set_multicast_ttl => libc::IP_MULTICAST_TTL,
            "multicast time to live (int)";
        bool header_included / set_header_included => libc::IP_HDRINCL,
            "include the IP header in raw sockets (bool)";
        bool multicast_loop / set_multicast_loop => libc::IP_MULTICAST_LOOP,
            "deliver multicasted packets to the sender as well (bool)";
        raw raw_options / set_raw_options => libc::IP_OPTIONS,
            "raw ip-level options in the ip header (raw)";
    }
}

/// The outgoing IPv4 multicast interface, as a registry row.
///
/// Linux answers the get with a bare `in_addr`, which the codec reports as
/// an unspecified group plus the interface address. Prefer
/// [`MulticastV4::set_multicast_interface`] for the set side; the dynamic
/// path writes the full membership layout.
pub static IP_MULTICAST_IF_OPTION: OptionDesc = OptionDesc {
    name: "multicast_interface",
    level: libc::IPPROTO_IP,
    id: libc::IP_MULTICAST_IF,
    codec: OptionCodec::MulticastV4,
    doc: "outgoing multicast interface (multicast group, interface address)",
};

options_level! {
    trait Ipv6LevelOptions;
    table IPV6_LEVEL_OPTIONS;
    level libc::IPPROTO_IPV6;
    {
        bool only_v6 / set_only_v6 => libc::IPV6_V6ONLY,
            "restrict the socket to IPv6 packets only (bool)";
        int multicast_hops / set_multicast_hops => libc::IPV6_MULTICAST_HOPS,
            "default hop limit for multicast datagrams (int)";
        int multicast_interface / set_multicast_interface => libc::IPV6_MULTICAST_IF,
            "index of the outgoing multicast interface (int)";
        bool multicast_loop / set_multicast_loop => libc::IPV6_MULTICAST_LOOP,
            "deliver multicasted packets to the sender as well (bool)";
        int unicast_hops / set_unicast_hops => libc::IPV6_UNICAST_HOPS,
            "default hop limit for unicast datagrams (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        int traffic_class / set_traffic_class => libc::IPV6_TCLASS,
            "the traffic class (0..255) of outbound packets (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        bool dont_fragment / set_dont_fragment => libc::IPV6_DONTFRAG,
            "disable fragmentation (bool)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        bool recv_traffic_class / set_recv_traffic_class => libc::IPV6_RECVTCLASS,
            "receive the traffic class of incoming packets (bool)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        bool recv_hop_limit / set_recv_hop_limit => libc::IPV6_RECVHOPLIMIT,
            "receive the inbound packet's current hop limit (bool)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        bool recv_packet_info / set_recv_packet_info => libc::IPV6_RECVPKTINFO,
            "receive the inbound packet's arrival interface and destination address (bool)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        raw destination_options / set_destination_options => libc::IPV6_DSTOPTS,
            "one or more destination options (raw)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        raw hop_options / set_hop_options => libc::IPV6_HOPOPTS,
            "one or more hop-by-hop options (raw)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        raw routing_header / set_routing_header => libc::IPV6_RTHDR,
            "the IPv6 routing header (raw)";
        // NEXTHOP, PATHMTU and PKTINFO carry sockaddr_in6 / ip6_mtuinfo /
        // in6_pktinfo payloads and have no codec yet, so they get no rows.
    }
}

options_level! {
    trait TcpLevelOptions;
    table TCP_LEVEL_OPTIONS;
    level libc::IPPROTO_TCP;
    {
        bool no_delay / set_no_delay => libc::TCP_NODELAY,
            "disable delay (AKA Nagle's algorithm) (bool)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        bool cork / set_cork => libc::TCP_CORK,
            "don't send partial frames (bool)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        bool quickack / set_quickack => libc::TCP_QUICKACK,
            "enable quick acks (bool)";
        int max_segment_size / set_max_segment_size => libc::TCP_MAXSEG,
            "max segment size (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        int keepalive_idle / set_keepalive_idle => libc::TCP_KEEPIDLE,
            "idle time before starting keepalives, in seconds (int)";
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        int keepalive_idle / set_keepalive_idle => libc::TCP_KEEPALIVE,
            "idle time before starting keepalives, in seconds (int)";
        int keepalive_interval / set_keepalive_interval => libc::TCP_KEEPINTVL,
            "interval between keepalives, in seconds (int)";
        int keepalive_count / set_keepalive_count => libc::TCP_KEEPCNT,
            "max number of keepalives before dropping the connection (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        int connect_attempts / set_connect_attempts => libc::TCP_SYNCNT,
            "max number of SYN retransmits before failing (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        int defer_accept / set_defer_accept => libc::TCP_DEFER_ACCEPT,
            "seconds to defer accept() until data arrives (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        int fin_wait_timeout / set_fin_wait_timeout => libc::TCP_LINGER2,
            "timeout for FIN_WAIT2 (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        int window_clamp / set_window_clamp => libc::TCP_WINDOW_CLAMP,
            "max TCP-window size (int)";
        #[cfg(any(target_os = "linux", target_os = "android"))]
        raw tcp_info / set_tcp_info => libc::TCP_INFO,
            "TCP metrics for this socket (raw)";
    }
}

/// IPv4 multicast group membership operations.
///
/// Join and leave share the `ip_mreq` wire layout and differ only in the
/// option id, so they are exposed as operations instead of a get/set pair.
pub trait MulticastV4: OptionTarget {
    /// Joins the given multicast group on the given interface address
    /// (`0.0.0.0` lets the kernel pick).
    fn join_group(&self, group: Ipv4Addr, interface: Ipv4Addr) -> Result<()> {
        self.with_option_fd(|fd| {
            codec::set_mreq_v4(
                fd,
                libc::IPPROTO_IP,
                libc::IP_ADD_MEMBERSHIP,
                "join_group",
                group,
                interface,
            )
        })?
    }

    /// Leaves the given multicast group.
    fn leave_group(&self, group: Ipv4Addr, interface: Ipv4Addr) -> Result<()> {
        self.with_option_fd(|fd| {
            codec::set_mreq_v4(
                fd,
                libc::IPPROTO_IP,
                libc::IP_DROP_MEMBERSHIP,
                "leave_group",
                group,
                interface,
            )
        })?
    }

    /// Reads the outgoing multicast interface address.
    fn multicast_interface(&self) -> Result<Ipv4Addr> {
        self.with_option_fd(|fd| {
            codec::get_mreq_v4(
                fd,
                libc::IPPROTO_IP,
                libc::IP_MULTICAST_IF,
                "multicast_interface",
            )
            .map(|(_, interface)| interface)
        })?
    }

    /// Selects the outgoing multicast interface by address (`0.0.0.0`
    /// restores the routing default).
    fn set_multicast_interface(&self, interface: Ipv4Addr) -> Result<()> {
        self.with_option_fd(|fd| {
            codec::set_interface_v4(
                fd,
                libc::IPPROTO_IP,
                libc::IP_MULTICAST_IF,
                "multicast_interface",
                interface,
            )
        })?
    }
}

/// IPv6 multicast group membership operations, keyed by interface index.
pub trait MulticastV6: OptionTarget {
    /// Joins the given multicast group on the given interface index
    /// (0 lets the kernel pick).
    fn join_group(&self, group: Ipv6Addr, interface: u32) -> Result<()> {
        self.with_option_fd(|fd| {
            codec::set_mreq_v6(
                fd,
                libc::IPPROTO_IPV6,
                IPV6_ADD_MEMBERSHIP,
                "join_group",
                group,
                interface,
            )
        })?
    }

    /// Leaves the given multicast group.
    fn leave_group(&self, group: Ipv6Addr, interface: u32) -> Result<()> {
        self.with_option_fd(|fd| {
            codec::set_mreq_v6(
                fd,
                libc::IPPROTO_IPV6,
                IPV6_DROP_MEMBERSHIP,
                "leave_group",
                group,
                interface,
            )
        })?
    }
}
