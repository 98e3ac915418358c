//! Route integration tests.
//!
//! Tests for route management using network namespaces.

use std::net::IpAddr;

use fibnl::{
    Connection, IfAddress, Link, MplsLabel, NetlinkProtocol, NextHop, Result, Route, RouteFilter,
};

use crate::common::TestNamespace;

const PROTO: u8 = 99;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Namespace with two dummy links `X` and `Y`, both up and addressed.
async fn setup_routed_ns(name: &str) -> Result<(TestNamespace, Connection, u32, u32)> {
    let ns = TestNamespace::new(name)?;
    let conn = ns.connection()?;

    conn.add_link(Link::new(0, "X").kind("dummy").up(true)).await?;
    conn.add_link(Link::new(0, "Y").kind("dummy").up(true)).await?;

    let links = conn.get_all_links().await?;
    let index = |name: &str| {
        links
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.ifindex)
            .unwrap_or(0)
    };
    let (x, y) = (index("X"), index("Y"));

    conn.add_if_address(IfAddress::parse(y, "192.168.1.1/24")?).await?;
    conn.add_if_address(IfAddress::parse(y, "2001:db8:ff::1/64")?).await?;

    Ok((ns, conn, x, y))
}

#[tokio::test]
async fn test_ecmp_route_scenario() -> Result<()> {
    require_root!();

    let (_ns, conn, _x, y) = setup_routed_ns("rtecmp").await?;

    let route = |dest: &str| {
        Route::unicast(dest.parse().unwrap(), PROTO)
            .next_hop(NextHop::via(ip("2001:db8:ff::2")).ifindex(y))
            .next_hop(NextHop::via(ip("2001:db8:ff::3")).ifindex(y))
    };
    let dests = ["2001:db8:1::/64", "2001:db8:2::/64", "2001:db8:3::/64"];
    for dest in dests {
        conn.add_route(route(dest)).await?;
    }

    let routes = conn
        .get_routes(RouteFilter::all().protocol(PROTO))
        .await?;
    assert_eq!(routes.len(), 3);
    for r in &routes {
        assert_eq!(r.next_hops.len(), 2, "{} should keep both hops", r.dest);
        assert!(r.next_hops.iter().all(|nh| nh.ifindex == Some(y)));
    }

    conn.delete_route(route(dests[1])).await?;
    assert_eq!(conn.get_ipv6_routes(PROTO).await?.len(), 2);

    let err = conn.delete_route(route(dests[1])).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    Ok(())
}

#[tokio::test]
async fn test_route_replace_is_upsert() -> Result<()> {
    require_root!();

    let (_ns, conn, _x, y) = setup_routed_ns("rtrepl").await?;

    let base = Route::unicast("10.0.0.0/8".parse().unwrap(), PROTO);
    conn.add_route(base.clone().next_hop(NextHop::via(ip("192.168.1.254")).ifindex(y)))
        .await?;
    conn.add_route(base.clone().next_hop(NextHop::via(ip("192.168.1.253")).ifindex(y)))
        .await?;

    let routes = conn.get_ipv4_routes(PROTO).await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].next_hops[0].gateway, Some(ip("192.168.1.253")));

    Ok(())
}

#[tokio::test]
async fn test_metric_change_is_upsert() -> Result<()> {
    require_root!();

    let (_ns, conn, _x, y) = setup_routed_ns("rtmetric").await?;

    let v4 = Route::unicast("10.0.0.0/8".parse().unwrap(), PROTO).next_hop(NextHop::dev(y));
    let v6 = Route::unicast("2001:db8:7::/64".parse().unwrap(), PROTO).next_hop(NextHop::dev(y));
    for metric in [10, 20] {
        conn.add_route(v4.clone().priority(metric)).await?;
        conn.add_route(v6.clone().priority(metric)).await?;
    }

    let routes = conn.get_ipv4_routes(PROTO).await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].priority, Some(20));
    let routes = conn.get_ipv6_routes(PROTO).await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].priority, Some(20));

    Ok(())
}

#[tokio::test]
async fn test_metric_change_from_another_connection() -> Result<()> {
    require_root!();

    let (ns, conn, _x, y) = setup_routed_ns("rtmetric2").await?;
    let route = Route::unicast("10.0.0.0/8".parse().unwrap(), PROTO).next_hop(NextHop::dev(y));
    conn.add_route(route.clone().priority(10)).await?;

    // A fresh connection learns the installed metric from a dump.
    let restarted = ns.connection()?;
    assert_eq!(restarted.get_ipv4_routes(PROTO).await?.len(), 1);
    restarted.add_route(route.clone().priority(30)).await?;

    let routes = restarted.get_ipv4_routes(PROTO).await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].priority, Some(30));

    Ok(())
}

#[tokio::test]
async fn test_protocol_filter() -> Result<()> {
    require_root!();

    let (_ns, conn, _x, y) = setup_routed_ns("rtproto").await?;

    conn.add_route(Route::unicast("10.1.0.0/16".parse().unwrap(), PROTO).next_hop(NextHop::dev(y)))
        .await?;
    conn.add_route(Route::unicast("10.2.0.0/16".parse().unwrap(), 98).next_hop(NextHop::dev(y)))
        .await?;

    let mine = conn.get_ipv4_routes(PROTO).await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].dest.to_string(), "10.1.0.0/16");

    // Kernel-installed connected routes are present in the full dump.
    let all = conn.get_all_routes().await?;
    assert!(all.len() > 2);
    assert!(all.windows(2).all(|w| w[0].cmp_key(&w[1]).is_le()));

    Ok(())
}

#[tokio::test]
async fn test_mpls_swap_route() -> Result<()> {
    require_root!();

    let (ns, conn, _x, y) = setup_routed_ns("rtmpls").await?;
    if ns.enable_mpls().is_err() {
        eprintln!("Skipping test: MPLS not available");
        return Ok(());
    }

    let route = Route::mpls(MplsLabel::new(100)?, PROTO).next_hop(
        NextHop::via(ip("192.168.1.254"))
            .ifindex(y)
            .labels([MplsLabel::new(200)?]),
    );
    conn.add_route(route).await?;

    let routes = conn.get_mpls_routes(PROTO).await?;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].next_hops[0].labels, vec![MplsLabel::new(200)?]);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_submissions() -> Result<()> {
    require_root!();

    let (_ns, conn, _x, y) = setup_routed_ns("rtconc").await?;

    let handles: Vec<_> = (0..64u32)
        .map(|i| {
            let dest = format!("10.{}.{}.0/24", i / 256 + 10, i % 256);
            conn.add_route(Route::unicast(dest.parse().unwrap(), PROTO).next_hop(NextHop::dev(y)))
        })
        .collect();
    for handle in handles {
        handle.await?;
    }

    assert_eq!(conn.get_ipv4_routes(PROTO).await?.len(), 64);
    let stats = conn.stats();
    assert!(stats.acked >= 64);
    assert_eq!(stats.protocol_violations, 0);

    Ok(())
}
