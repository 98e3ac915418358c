//! Change notification integration tests.

use std::time::Duration;

use fibnl::{
    EventGroups, Link, NetlinkEvent, NetlinkProtocol, NextHop, Result, Route, SocketConfig,
};
use tokio::sync::broadcast;

use crate::common::TestNamespace;

/// Wait for the first event accepted by `pick`, or give up after two seconds.
async fn wait_for<T>(
    events: &mut broadcast::Receiver<NetlinkEvent>,
    mut pick: impl FnMut(NetlinkEvent) -> Option<T>,
) -> Option<T> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) => {
                if let Some(found) = pick(event) {
                    return Some(found);
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn test_link_events() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("linkev")?;
    let conn = ns.connection_with(SocketConfig::default().events(EventGroups::none().links(true)))?;
    let mut events = conn.subscribe();

    conn.add_link(Link::new(0, "dummy0").kind("dummy")).await?;

    let link = wait_for(&mut events, |event| match event {
        NetlinkEvent::NewLink(link) if link.name == "dummy0" => Some(link),
        _ => None,
    })
    .await;
    assert!(link.is_some(), "no RTM_NEWLINK for dummy0");
    assert!(conn.stats().events_published >= 1);

    Ok(())
}

#[tokio::test]
async fn test_route_events() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("routeev")?;
    let conn = ns.connection_with(SocketConfig::default().events(EventGroups::none().routes(true)))?;
    let mut events = conn.subscribe();

    conn.add_link(Link::new(0, "dummy0").kind("dummy").up(true)).await?;
    let ifindex = conn
        .get_all_links()
        .await?
        .into_iter()
        .find(|l| l.name == "dummy0")
        .map(|l| l.ifindex)
        .unwrap_or(0);

    let route = Route::unicast("2001:db8:5::/64".parse().unwrap(), 99).next_hop(NextHop::dev(ifindex));
    conn.add_route(route.clone()).await?;
    conn.delete_route(route.clone()).await?;

    let deleted = wait_for(&mut events, |event| match event {
        NetlinkEvent::DelRoute(r) if r.dest == route.dest && r.protocol == 99 => Some(r),
        _ => None,
    })
    .await;
    assert!(deleted.is_some(), "no RTM_DELROUTE for {}", route.dest);

    Ok(())
}

#[tokio::test]
async fn test_no_events_without_groups() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("noev")?;
    let conn = ns.connection()?;
    let mut events = conn.subscribe();

    conn.add_link(Link::new(0, "dummy0").kind("dummy")).await?;
    assert!(wait_for(&mut events, Some).await.is_none());

    Ok(())
}
