//! Async route-netlink socket for programming the Linux FIB.
//!
//! This crate owns a `NETLINK_ROUTE` socket on a dedicated reactor thread
//! and exposes the operations a routing daemon needs to push its computed
//! forwarding state into the kernel: links, interface addresses, unicast
//! and MPLS routes with ECMP next hops, and neighbor entries.
//!
//! # Features
//!
//! - `fake` - In-memory [`FakeConnection`] for testing code written against
//!   [`NetlinkProtocol`]
//! - `serde` - Serialize/Deserialize for the domain model
//! - `integration` - Kernel tests that need root
//!
//! # Example
//!
//! ```ignore
//! use fibnl::{Connection, NetlinkProtocol, NextHop, Route};
//!
//! #[tokio::main]
//! async fn main() -> fibnl::Result<()> {
//!     let conn = Connection::new()?;
//!
//!     for link in conn.get_all_links().await? {
//!         println!("{}: {}", link.ifindex, link.name);
//!     }
//!
//!     let route = Route::unicast("10.20.0.0/16".parse().unwrap(), 99)
//!         .next_hop(NextHop::via("192.168.1.1".parse().unwrap()).ifindex(2));
//!     conn.add_route(route).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod netlink;
pub mod util;

// Re-export common types at crate root for convenience
pub use netlink::{
    Completion, Connection, Error, ErrorKind, EventGroups, IfAddress, Link, MplsLabel, Neighbor,
    NeighborState, NetlinkEvent, NetlinkProtocol, NextHop, Operation, Result, RetryPolicy, Route,
    RouteDest, RouteFamily, RouteFilter, RouteType, SocketConfig, StatsSnapshot,
};
#[cfg(any(test, feature = "fake"))]
pub use netlink::FakeConnection;
pub use util::MacAddr;
