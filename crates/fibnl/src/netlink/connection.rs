//! Kernel-backed [`NetlinkProtocol`] implementation.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use super::addr::IfAddress;
use super::codec::{self, Object, Reply, Request};
use super::completion::Completion;
use super::config::SocketConfig;
use super::error::{Error, Result};
use super::events::NetlinkEvent;
use super::link::Link;
use super::neigh::Neighbor;
use super::protocol::{CollectionOrder, NetlinkProtocol};
use super::reactor::{Command, Reactor, Submission};
use super::route::{Route, RouteFilter};
use super::stats::{SocketStats, StatsSnapshot};

/// Handle to a route-netlink socket served by its own reactor thread.
///
/// Cheap to clone; the reactor stops once the last clone is dropped or
/// [`close`](Self::close) is called.
///
/// # Example
///
/// ```ignore
/// use fibnl::{Connection, NetlinkProtocol, NextHop, Route};
///
/// let conn = Connection::new()?;
/// let route = Route::unicast("10.1.0.0/16".parse()?, 99)
///     .next_hop(NextHop::via("192.168.1.1".parse()?).ifindex(2));
/// conn.add_route(route).await?;
///
/// for route in conn.get_ipv4_routes(99).await? {
///     println!("{}", route.dest);
/// }
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    pid: u32,
    stats: Arc<SocketStats>,
    events: broadcast::Sender<NetlinkEvent>,
}

impl Connection {
    /// Open a socket in the current network namespace with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(SocketConfig::default())
    }

    /// Open a socket in the namespace at `ns_path`
    /// (`/var/run/netns/<name>`, `/proc/<pid>/ns/net`).
    pub fn new_in_namespace_path<P: AsRef<Path>>(ns_path: P) -> Result<Self> {
        Self::with_config(SocketConfig::default().namespace(ns_path.as_ref()))
    }

    /// Open a socket configured by `config`.
    ///
    /// Blocks until the reactor thread has bound the socket, so that
    /// permission and namespace errors surface here.
    pub fn with_config(config: SocketConfig) -> Result<Self> {
        let stats = Arc::new(SocketStats::default());
        let (events, _) = broadcast::channel(config.event_capacity);
        let reactor = Reactor::spawn(config, stats.clone(), events.clone())?;
        Ok(Self {
            inner: Arc::new(Inner {
                commands: reactor.commands,
                pid: reactor.pid,
                stats,
                events,
            }),
        })
    }

    /// Local netlink port ID.
    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Receive change notifications for the groups in
    /// [`SocketConfig::events`]. Without subscriptions nothing arrives.
    pub fn subscribe(&self) -> broadcast::Receiver<NetlinkEvent> {
        self.inner.events.subscribe()
    }

    /// Stop the reactor. Queued requests resolve with
    /// [`Error::Cancelled`], written ones with [`Error::Shutdown`].
    pub fn close(&self) {
        let _ = self.inner.commands.send(Command::Close);
    }

    /// Check if the reactor has stopped.
    pub fn is_closed(&self) -> bool {
        self.inner.commands.is_closed()
    }

    fn submit<T>(
        &self,
        request: Request,
        convert: impl FnOnce(Reply) -> Result<T> + Send + 'static,
    ) -> Completion<T> {
        let op = request.operation();
        let builder = match codec::encode(&request) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::debug!(%op, error = %e, "request rejected before send");
                return Completion::ready(Err(e));
            }
        };
        let (handle, responder) = Completion::channel(convert);
        let submission = Submission::new(&request, builder, responder);
        if self
            .inner
            .commands
            .send(Command::Submit(submission))
            .is_err()
        {
            // The responder went down with the command; the handle
            // resolves with Error::Shutdown.
            tracing::debug!(%op, "reactor is gone");
        }
        handle
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pid", &self.inner.pid)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn expect_ack(reply: Reply) -> Result<()> {
    match reply {
        Reply::Ack => Ok(()),
        Reply::Objects(_) => Err(Error::InvalidMessage(
            "multi-part reply to an acknowledged request".into(),
        )),
    }
}

fn collect<T>(reply: Reply, pick: fn(Object) -> Option<T>) -> Result<Vec<T>>
where
    Vec<T>: CollectionOrder,
{
    match reply {
        Reply::Objects(objects) => {
            let mut items: Vec<T> = objects.into_iter().filter_map(pick).collect();
            items.sort_canonical();
            Ok(items)
        }
        Reply::Ack => Err(Error::InvalidMessage("acknowledgement in place of a dump".into())),
    }
}

impl NetlinkProtocol for Connection {
    fn add_link(&self, link: Link) -> Completion<()> {
        self.submit(Request::AddLink(link), expect_ack)
    }

    fn add_route(&self, route: Route) -> Completion<()> {
        self.submit(Request::AddRoute(route), expect_ack)
    }

    fn delete_route(&self, route: Route) -> Completion<()> {
        self.submit(Request::DeleteRoute(route), expect_ack)
    }

    fn get_routes(&self, filter: RouteFilter) -> Completion<Vec<Route>> {
        let keep = filter.clone();
        self.submit(Request::GetRoutes(filter), move |reply| {
            let mut routes = collect(reply, |obj| match obj {
                Object::Route(route) => Some(route),
                _ => None,
            })?;
            routes.retain(|route| keep.matches(route));
            Ok(routes)
        })
    }

    fn add_if_address(&self, addr: IfAddress) -> Completion<()> {
        self.submit(Request::AddIfAddress(addr), expect_ack)
    }

    fn delete_if_address(&self, addr: IfAddress) -> Completion<()> {
        self.submit(Request::DeleteIfAddress(addr), expect_ack)
    }

    fn get_all_if_addresses(&self) -> Completion<Vec<IfAddress>> {
        self.submit(Request::GetIfAddresses, |reply| {
            collect(reply, |obj| match obj {
                Object::IfAddress(addr) => Some(addr),
                _ => None,
            })
        })
    }

    fn get_all_links(&self) -> Completion<Vec<Link>> {
        self.submit(Request::GetLinks, |reply| {
            collect(reply, |obj| match obj {
                Object::Link(link) => Some(link),
                _ => None,
            })
        })
    }

    fn get_all_neighbors(&self) -> Completion<Vec<Neighbor>> {
        self.submit(Request::GetNeighbors, |reply| {
            collect(reply, |obj| match obj {
                Object::Neighbor(neigh) => Some(neigh),
                _ => None,
            })
        })
    }
}
