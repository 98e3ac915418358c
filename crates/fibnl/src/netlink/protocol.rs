//! The asynchronous operation set.
//!
//! [`NetlinkProtocol`] is implemented by the kernel-backed
//! [`Connection`](super::Connection) and by the in-memory
//! `FakeConnection` (feature `fake`), so the FIB service can be written and
//! tested against the trait.
//!
//! # Contract
//!
//! * Every method returns a [`Completion`] immediately; nothing blocks.
//! * Validation failures resolve the handle with [`Error::Encoding`]
//!   before anything is written.
//! * Adds are upserts. Deleting a missing key resolves with
//!   [`Error::NotFound`].
//! * Collections are sorted: links by ifindex, addresses by
//!   `(ifindex, prefix)`, neighbors by `(ifindex, destination)`, routes by
//!   [`Route::cmp_key`] (unicast before MPLS, then protocol, then
//!   destination).
//! * A dump is a consistent snapshot; it never mixes two kernel states.
//! * Two operations are ordered only if they touch the same key, or if the
//!   caller awaits the first before submitting the second.
//!
//! [`Error::Encoding`]: super::Error::Encoding
//! [`Error::NotFound`]: super::Error::NotFound

use super::addr::IfAddress;
use super::completion::Completion;
use super::link::Link;
use super::neigh::Neighbor;
use super::route::{Route, RouteFamily, RouteFilter};

/// Route-netlink operations used for FIB programming.
pub trait NetlinkProtocol: Send + Sync {
    /// Create or update a link.
    fn add_link(&self, link: Link) -> Completion<()>;

    /// Add or replace the route keyed by `(protocol, dest)`.
    fn add_route(&self, route: Route) -> Completion<()>;

    /// Delete the route keyed by `(protocol, dest)`. Next hops are ignored.
    fn delete_route(&self, route: Route) -> Completion<()>;

    /// Routes matching `filter`.
    fn get_routes(&self, filter: RouteFilter) -> Completion<Vec<Route>>;

    /// Assign an address to an interface.
    fn add_if_address(&self, addr: IfAddress) -> Completion<()>;

    /// Remove an address from an interface.
    fn delete_if_address(&self, addr: IfAddress) -> Completion<()>;

    /// Every IPv4 and IPv6 interface address.
    fn get_all_if_addresses(&self) -> Completion<Vec<IfAddress>>;

    /// Every link.
    fn get_all_links(&self) -> Completion<Vec<Link>>;

    /// Every IPv4 and IPv6 neighbor entry.
    fn get_all_neighbors(&self) -> Completion<Vec<Neighbor>>;

    /// Every unicast and MPLS route.
    fn get_all_routes(&self) -> Completion<Vec<Route>> {
        self.get_routes(RouteFilter::all())
    }

    /// IPv4 routes installed by `protocol`.
    fn get_ipv4_routes(&self, protocol: u8) -> Completion<Vec<Route>> {
        self.get_routes(
            RouteFilter::all()
                .family(RouteFamily::Ipv4)
                .protocol(protocol),
        )
    }

    /// IPv6 routes installed by `protocol`.
    fn get_ipv6_routes(&self, protocol: u8) -> Completion<Vec<Route>> {
        self.get_routes(
            RouteFilter::all()
                .family(RouteFamily::Ipv6)
                .protocol(protocol),
        )
    }

    /// MPLS routes installed by `protocol`.
    fn get_mpls_routes(&self, protocol: u8) -> Completion<Vec<Route>> {
        self.get_routes(
            RouteFilter::all()
                .family(RouteFamily::Mpls)
                .protocol(protocol),
        )
    }
}

/// Sort a collection into the order documented on [`NetlinkProtocol`].
pub(crate) trait CollectionOrder {
    fn sort_canonical(&mut self);
}

impl CollectionOrder for Vec<Link> {
    fn sort_canonical(&mut self) {
        self.sort_by_key(|l| l.ifindex);
    }
}

impl CollectionOrder for Vec<IfAddress> {
    fn sort_canonical(&mut self) {
        self.sort_by_key(|a| (a.ifindex, a.prefix));
    }
}

impl CollectionOrder for Vec<Neighbor> {
    fn sort_canonical(&mut self) {
        self.sort_by_key(|n| (n.ifindex, n.destination));
    }
}

impl CollectionOrder for Vec<Route> {
    fn sort_canonical(&mut self) {
        self.sort_by(Route::cmp_key);
    }
}
