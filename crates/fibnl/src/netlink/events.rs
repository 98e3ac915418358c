//! Kernel change notifications.
//!
//! A connection configured with [`EventGroups`] joins the matching
//! `RTNLGRP_*` multicast groups. The reactor decodes every multicast
//! datagram into [`NetlinkEvent`]s and publishes them on a broadcast
//! channel; requests never see them.
//!
//! # Example
//!
//! ```ignore
//! use fibnl::{Connection, EventGroups, NetlinkEvent, SocketConfig};
//!
//! let conn = Connection::with_config(
//!     SocketConfig::default().events(EventGroups::none().links(true).routes(true)),
//! )?;
//! let mut events = conn.subscribe();
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         NetlinkEvent::DelLink(link) => println!("{} went away", link.name),
//!         NetlinkEvent::NewRoute(route) => println!("route {}", route.dest),
//!         _ => {}
//!     }
//! }
//! ```

use super::addr::IfAddress;
use super::codec::{Decoded, Object};
use super::link::Link;
use super::neigh::Neighbor;
use super::route::Route;

/// Multicast groups for NETLINK_ROUTE.
pub mod rtnetlink_groups {
    pub const RTNLGRP_LINK: u32 = 1;
    pub const RTNLGRP_NEIGH: u32 = 3;
    pub const RTNLGRP_IPV4_IFADDR: u32 = 5;
    pub const RTNLGRP_IPV4_ROUTE: u32 = 7;
    pub const RTNLGRP_IPV6_IFADDR: u32 = 9;
    pub const RTNLGRP_IPV6_ROUTE: u32 = 11;
    pub const RTNLGRP_MPLS_ROUTE: u32 = 27;
}

use rtnetlink_groups::*;

/// Notification classes to subscribe to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventGroups {
    links: bool,
    addresses: bool,
    routes: bool,
    neighbors: bool,
}

impl EventGroups {
    /// No subscriptions.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every class the model represents.
    pub fn all() -> Self {
        Self {
            links: true,
            addresses: true,
            routes: true,
            neighbors: true,
        }
    }

    /// Subscribe to link events.
    pub fn links(mut self, enabled: bool) -> Self {
        self.links = enabled;
        self
    }

    /// Subscribe to IPv4 and IPv6 address events.
    pub fn addresses(mut self, enabled: bool) -> Self {
        self.addresses = enabled;
        self
    }

    /// Subscribe to IPv4, IPv6 and MPLS route events.
    pub fn routes(mut self, enabled: bool) -> Self {
        self.routes = enabled;
        self
    }

    /// Subscribe to neighbor events.
    pub fn neighbors(mut self, enabled: bool) -> Self {
        self.neighbors = enabled;
        self
    }

    /// Check if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }

    /// Multicast group ids to join.
    pub fn groups(&self) -> Vec<u32> {
        let mut groups = Vec::new();
        if self.links {
            groups.push(RTNLGRP_LINK);
        }
        if self.addresses {
            groups.extend([RTNLGRP_IPV4_IFADDR, RTNLGRP_IPV6_IFADDR]);
        }
        if self.routes {
            groups.extend([RTNLGRP_IPV4_ROUTE, RTNLGRP_IPV6_ROUTE, RTNLGRP_MPLS_ROUTE]);
        }
        if self.neighbors {
            groups.push(RTNLGRP_NEIGH);
        }
        groups
    }
}

/// A change announced by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetlinkEvent {
    /// A link was created or changed.
    NewLink(Link),
    DelLink(Link),
    NewAddress(IfAddress),
    DelAddress(IfAddress),
    /// A route was added or replaced.
    NewRoute(Route),
    DelRoute(Route),
    NewNeighbor(Neighbor),
    DelNeighbor(Neighbor),
}

impl NetlinkEvent {
    /// Map a decoded notification; anything else yields `None`.
    pub fn from_decoded(decoded: Decoded) -> Option<Self> {
        Some(match decoded {
            Decoded::New(Object::Link(l)) => Self::NewLink(l),
            Decoded::Deleted(Object::Link(l)) => Self::DelLink(l),
            Decoded::New(Object::IfAddress(a)) => Self::NewAddress(a),
            Decoded::Deleted(Object::IfAddress(a)) => Self::DelAddress(a),
            Decoded::New(Object::Route(r)) => Self::NewRoute(r),
            Decoded::Deleted(Object::Route(r)) => Self::DelRoute(r),
            Decoded::New(Object::Neighbor(n)) => Self::NewNeighbor(n),
            Decoded::Deleted(Object::Neighbor(n)) => Self::DelNeighbor(n),
            _ => return None,
        })
    }

    /// Returns true if this is a "new" event (add or change).
    pub fn is_new(&self) -> bool {
        matches!(
            self,
            Self::NewLink(_) | Self::NewAddress(_) | Self::NewRoute(_) | Self::NewNeighbor(_)
        )
    }

    /// Returns the interface index associated with this event, if any.
    pub fn ifindex(&self) -> Option<u32> {
        match self {
            Self::NewLink(l) | Self::DelLink(l) => Some(l.ifindex),
            Self::NewAddress(a) | Self::DelAddress(a) => Some(a.ifindex),
            Self::NewNeighbor(n) | Self::DelNeighbor(n) => Some(n.ifindex),
            Self::NewRoute(_) | Self::DelRoute(_) => None,
        }
    }

    /// Returns "new" or "del" based on the event type.
    pub fn action(&self) -> &'static str {
        if self.is_new() { "new" } else { "del" }
    }
}
