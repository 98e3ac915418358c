//! In-memory [`NetlinkProtocol`] for tests.
//!
//! [`FakeConnection`] keeps its state in ordered maps owned by the instance
//! and answers every operation with an already resolved [`Completion`].
//! Validation, error shapes and collection order match [`Connection`], so
//! code written against the trait behaves the same on both.
//!
//! ```ignore
//! use fibnl::{FakeConnection, Link, NetlinkProtocol, NextHop, Route};
//!
//! let fake = FakeConnection::new();
//! fake.seed_link(Link::new(1, "eth0"));
//! fake.add_route(
//!     Route::unicast("2001:db8::/64".parse()?, 99).next_hop(NextHop::dev(1)),
//! ).await?;
//! assert_eq!(fake.get_ipv6_routes(99).await?.len(), 1);
//! ```
//!
//! [`Connection`]: super::Connection

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ipnet::IpNet;

use super::addr::IfAddress;
use super::codec::Operation;
use super::completion::Completion;
use super::error::{Error, Result};
use super::link::Link;
use super::neigh::Neighbor;
use super::protocol::{CollectionOrder, NetlinkProtocol};
use super::route::{MplsLabel, Route, RouteDest, RouteFilter};

#[derive(Debug, Default)]
struct State {
    links: BTreeMap<u32, Link>,
    if_addrs: BTreeMap<u32, Vec<IfAddress>>,
    /// protocol -> destination -> route
    unicast_routes: BTreeMap<u8, BTreeMap<IpNet, Route>>,
    mpls_routes: BTreeMap<u8, BTreeMap<MplsLabel, Route>>,
    neighbors: BTreeMap<(u32, std::net::IpAddr), Neighbor>,
}

impl State {
    fn require_link(&self, op: Operation, ifindex: u32) -> Result<()> {
        if self.links.contains_key(&ifindex) {
            Ok(())
        } else {
            Err(Error::from_kernel(op, libc::ENODEV))
        }
    }

    fn add_link(&mut self, mut link: Link) -> Result<()> {
        let by_name = self
            .links
            .values()
            .find(|l| l.name == link.name)
            .map(|l| l.ifindex);

        match (link.ifindex, by_name) {
            // Lookup by name: update the existing device in place.
            (0, Some(existing)) => link.ifindex = existing,
            (0, None) => {
                link.ifindex = self.links.keys().next_back().map_or(1, |max| max + 1);
            }
            (ifindex, Some(existing)) if existing != ifindex => {
                return Err(Error::from_kernel(Operation::AddLink, libc::EEXIST));
            }
            _ => {}
        }
        self.links.insert(link.ifindex, link);
        Ok(())
    }

    fn add_route(&mut self, route: Route) -> Result<()> {
        for hop in &route.next_hops {
            if let Some(ifindex) = hop.ifindex {
                self.require_link(Operation::AddRoute, ifindex)?;
            }
        }
        match route.dest {
            RouteDest::Unicast(net) => {
                self.unicast_routes
                    .entry(route.protocol)
                    .or_default()
                    .insert(net, route);
            }
            RouteDest::Mpls(label) => {
                self.mpls_routes
                    .entry(route.protocol)
                    .or_default()
                    .insert(label, route);
            }
        }
        Ok(())
    }

    fn delete_route(&mut self, route: &Route) -> Result<()> {
        let removed = match route.dest {
            // An explicit priority must match the stored metric.
            RouteDest::Unicast(net) => self
                .unicast_routes
                .get_mut(&route.protocol)
                .filter(|routes| {
                    routes.get(&net).is_some_and(|stored| {
                        route.priority.is_none_or(|p| stored.metric() == Some(p))
                    })
                })
                .and_then(|routes| routes.remove(&net)),
            RouteDest::Mpls(label) => self
                .mpls_routes
                .get_mut(&route.protocol)
                .and_then(|routes| routes.remove(&label)),
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::from_kernel(Operation::DeleteRoute, libc::ESRCH)),
        }
    }

    fn routes(&self, filter: &RouteFilter) -> Vec<Route> {
        let unicast = self.unicast_routes.values().flat_map(|m| m.values());
        let mpls = self.mpls_routes.values().flat_map(|m| m.values());
        let mut routes: Vec<Route> = unicast
            .chain(mpls)
            .filter(|route| filter.matches(route))
            .cloned()
            .collect();
        routes.sort_canonical();
        routes
    }

    fn add_if_address(&mut self, addr: IfAddress) -> Result<()> {
        self.require_link(Operation::AddIfAddress, addr.ifindex)?;
        let addrs = self.if_addrs.entry(addr.ifindex).or_default();
        match addrs.iter_mut().find(|a| a.prefix == addr.prefix) {
            Some(existing) => *existing = addr,
            None => addrs.push(addr),
        }
        Ok(())
    }

    fn delete_if_address(&mut self, addr: &IfAddress) -> Result<()> {
        let addrs = self.if_addrs.get_mut(&addr.ifindex);
        let Some(addrs) = addrs else {
            return Err(Error::from_kernel(Operation::DeleteIfAddress, libc::EADDRNOTAVAIL));
        };
        let before = addrs.len();
        addrs.retain(|a| a.prefix != addr.prefix);
        if addrs.len() == before {
            return Err(Error::from_kernel(Operation::DeleteIfAddress, libc::EADDRNOTAVAIL));
        }
        if addrs.is_empty() {
            self.if_addrs.remove(&addr.ifindex);
        }
        Ok(())
    }
}

/// In-memory stand-in for [`Connection`](super::Connection).
#[derive(Debug, Default)]
pub struct FakeConnection {
    state: Mutex<State>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a link as-is, bypassing validation and name checks.
    pub fn seed_link(&self, link: Link) {
        self.state().links.insert(link.ifindex, link);
    }

    /// Insert a neighbor entry.
    pub fn seed_neighbor(&self, neighbor: Neighbor) {
        self.state()
            .neighbors
            .insert((neighbor.ifindex, neighbor.destination), neighbor);
    }

    fn write(&self, check: Result<()>, apply: impl FnOnce(&mut State) -> Result<()>) -> Completion<()> {
        Completion::ready(check.and_then(|()| apply(&mut self.state())))
    }
}

impl NetlinkProtocol for FakeConnection {
    fn add_link(&self, link: Link) -> Completion<()> {
        self.write(link.validate(), |state| state.add_link(link))
    }

    fn add_route(&self, route: Route) -> Completion<()> {
        self.write(route.validate(), |state| state.add_route(route))
    }

    fn delete_route(&self, route: Route) -> Completion<()> {
        self.write(route.validate_key(), |state| state.delete_route(&route))
    }

    fn get_routes(&self, filter: RouteFilter) -> Completion<Vec<Route>> {
        Completion::ready(Ok(self.state().routes(&filter)))
    }

    fn add_if_address(&self, addr: IfAddress) -> Completion<()> {
        self.write(addr.validate(), |state| state.add_if_address(addr))
    }

    fn delete_if_address(&self, addr: IfAddress) -> Completion<()> {
        self.write(addr.validate(), |state| state.delete_if_address(&addr))
    }

    fn get_all_if_addresses(&self) -> Completion<Vec<IfAddress>> {
        let mut addrs: Vec<IfAddress> = self.state().if_addrs.values().flatten().cloned().collect();
        addrs.sort_canonical();
        Completion::ready(Ok(addrs))
    }

    fn get_all_links(&self) -> Completion<Vec<Link>> {
        Completion::ready(Ok(self.state().links.values().cloned().collect()))
    }

    fn get_all_neighbors(&self) -> Completion<Vec<Neighbor>> {
        Completion::ready(Ok(self.state().neighbors.values().cloned().collect()))
    }
}
