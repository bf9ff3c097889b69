use std::marker::PhantomData;

use crate::addr::{Domain, Ipv4};

use super::lifecycle::Lifecycle;

/// A raw IP endpoint, parameterized on the address family.
///
/// Placeholder: raw sockets need CAP_NET_RAW and a per-protocol payload
/// contract (header layouts, checksum handling) that is not settled yet,
/// so this type has no constructor. The shape is reserved so the lifecycle
/// and option machinery extend to it without API changes.
///
/// TODO: add a constructor taking the IP protocol number once the payload
/// contract for ICMP is decided.
pub struct RawSocket<D: Domain = Ipv4> {
    #[allow(dead_code)]
    life: Lifecycle,
    _domain: PhantomData<D>,
}

impl<D: Domain> std::fmt::Debug for RawSocket<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.life.debug_fmt("RawSocket", f)
    }
}
