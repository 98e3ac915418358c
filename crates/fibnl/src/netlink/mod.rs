//! Route-netlink protocol socket for FIB programming.
//!
//! A [`Connection`] owns one `NETLINK_ROUTE` socket and a reactor thread
//! that multiplexes every request over it. Operations return a
//! [`Completion`] straight away; the reactor writes the request, matches
//! the kernel's acknowledgement or dump by sequence number, retries
//! transient failures and resolves the handle.
//!
//! # Quick Start
//!
//! ```ignore
//! use fibnl::netlink::{Connection, NetlinkProtocol, NextHop, Route};
//!
//! let conn = Connection::new()?;
//!
//! let route = Route::unicast("2001:db8:1::/48".parse()?, 99)
//!     .next_hop(NextHop::via("fe80::1".parse()?).ifindex(2))
//!     .next_hop(NextHop::via("fe80::2".parse()?).ifindex(3));
//! conn.add_route(route).await?;
//!
//! for route in conn.get_ipv6_routes(99).await? {
//!     println!("{} via {} hops", route.dest, route.next_hops.len());
//! }
//! ```
//!
//! # Event Monitoring
//!
//! Subscribe to kernel multicast groups through [`SocketConfig::events`]:
//!
//! ```ignore
//! use fibnl::netlink::{Connection, EventGroups, NetlinkEvent, SocketConfig};
//!
//! let conn = Connection::with_config(
//!     SocketConfig::default().events(EventGroups::none().links(true).routes(true)),
//! )?;
//! let mut events = conn.subscribe();
//!
//! while let Ok(event) = events.recv().await {
//!     if let NetlinkEvent::NewLink(link) = event {
//!         println!("link {} is {}", link.name, if link.is_up() { "up" } else { "down" });
//!     }
//! }
//! ```
//!
//! # Testing
//!
//! With the `fake` feature, `FakeConnection` implements [`NetlinkProtocol`]
//! in memory, so code generic over the trait can be tested without root.

pub mod addr;
pub mod attr;
mod builder;
pub mod codec;
mod completion;
pub mod config;
mod connection;
mod error;
pub mod events;
#[cfg(any(test, feature = "fake"))]
mod fake;
mod installed;
pub mod link;
pub mod message;
pub mod neigh;
pub mod parse;
mod pending;
mod protocol;
mod reactor;
pub mod retry;
pub mod route;
mod socket;
pub mod stats;
pub mod types;

pub use addr::IfAddress;
pub use attr::{AttrIter, NlAttr};
pub use builder::{MessageBuilder, NestToken};
pub use codec::{Operation, ResourceKey};
pub use completion::Completion;
pub use config::SocketConfig;
pub use connection::Connection;
pub use error::{Error, ErrorKind, Result};
pub use events::{EventGroups, NetlinkEvent, rtnetlink_groups};
#[cfg(any(test, feature = "fake"))]
pub use fake::FakeConnection;
pub use link::Link;
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use neigh::{Neighbor, NeighborState};
pub use parse::FromNetlink;
pub use protocol::NetlinkProtocol;
pub use retry::RetryPolicy;
pub use route::{MplsLabel, NextHop, Route, RouteDest, RouteFamily, RouteFilter, RouteType};
pub use stats::StatsSnapshot;
