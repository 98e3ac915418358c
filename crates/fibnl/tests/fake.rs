//! Behaviour of the in-memory `NetlinkProtocol` implementation.
//!
//! Everything here is written against the trait, the way the FIB service
//! uses it, so the same helpers could drive a kernel-backed connection.
//!
//! ```bash
//! cargo test --test fake --features fake
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;

use fibnl::{
    Error, ErrorKind, FakeConnection, IfAddress, Link, MplsLabel, Neighbor, NeighborState,
    NetlinkProtocol, NextHop, Result, Route, RouteFamily, RouteFilter,
};

const PROTO: u8 = 99;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Two gateways of the destination's family on `ifindex`.
fn ecmp_route(dest: &str, ifindex: u32) -> Route {
    let dest: IpNet = dest.parse().unwrap();
    let gateways = match dest {
        IpNet::V4(_) => ["192.168.1.1", "192.168.1.2"],
        IpNet::V6(_) => ["fe80::1", "fe80::2"],
    };
    Route::unicast(dest, PROTO)
        .next_hop(NextHop::via(ip(gateways[0])).ifindex(ifindex))
        .next_hop(NextHop::via(ip(gateways[1])).ifindex(ifindex))
}

fn topology() -> FakeConnection {
    let fake = FakeConnection::new();
    fake.seed_link(Link::new(0, "X"));
    fake.seed_link(Link::new(1, "Y"));
    fake
}

async fn route_count<P: NetlinkProtocol>(nl: &P, protocol: u8) -> Result<usize> {
    let routes = nl
        .get_routes(RouteFilter::all().protocol(protocol))
        .await?;
    Ok(routes.len())
}

#[tokio::test]
async fn test_end_to_end_scenario() -> Result<()> {
    let fake = topology();

    let links = fake.get_all_links().await?;
    let names: Vec<_> = links.iter().map(|l| (l.ifindex, l.name.as_str())).collect();
    assert_eq!(names, vec![(0, "X"), (1, "Y")]);

    let dests = ["2001:db8:1::/64", "2001:db8:2::/64", "2001:db8:3::/64"];
    for dest in dests {
        fake.add_route(ecmp_route(dest, 1)).await?;
    }
    assert_eq!(route_count(&fake, PROTO).await?, 3);

    let routes = fake.get_ipv6_routes(PROTO).await?;
    assert!(routes.iter().all(|r| r.next_hops.len() == 2));
    let got: Vec<_> = routes.iter().map(|r| r.dest.to_string()).collect();
    assert_eq!(got, dests);

    fake.delete_route(ecmp_route(dests[1], 1)).await?;
    assert_eq!(route_count(&fake, PROTO).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_upsert_is_idempotent() -> Result<()> {
    let fake = topology();
    let route = ecmp_route("2001:db8::/64", 1);

    fake.add_route(route.clone()).await?;
    fake.add_route(route.clone()).await?;
    assert_eq!(fake.get_all_routes().await?, vec![route.clone()]);

    // Same key, different content: the later write wins.
    let replaced = Route::unicast("2001:db8::/64".parse().unwrap(), PROTO)
        .next_hop(NextHop::dev(1));
    fake.add_route(replaced.clone()).await?;
    assert_eq!(fake.get_all_routes().await?, vec![replaced]);

    let addr = IfAddress::parse(1, "2001:db8::1/64")?;
    fake.add_if_address(addr.clone()).await?;
    fake.add_if_address(addr.clone()).await?;
    assert_eq!(fake.get_all_if_addresses().await?, vec![addr]);
    Ok(())
}

#[tokio::test]
async fn test_delete_then_get() -> Result<()> {
    let fake = topology();
    let route = ecmp_route("2001:db8::/64", 1);
    fake.add_route(route.clone()).await?;
    fake.delete_route(route.clone()).await?;
    assert!(fake.get_all_routes().await?.is_empty());

    let err = fake.delete_route(route).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_delete_ignores_next_hops() -> Result<()> {
    let fake = topology();
    fake.add_route(ecmp_route("10.0.0.0/8", 1)).await?;
    fake.delete_route(Route::unicast("10.0.0.0/8".parse().unwrap(), PROTO))
        .await?;
    assert_eq!(route_count(&fake, PROTO).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_routes_are_keyed_by_protocol() -> Result<()> {
    let fake = topology();
    fake.add_route(ecmp_route("10.0.0.0/8", 1)).await?;
    let other = Route::unicast("10.0.0.0/8".parse().unwrap(), 3).next_hop(NextHop::dev(1));
    fake.add_route(other.clone()).await?;

    assert_eq!(fake.get_ipv4_routes(PROTO).await?.len(), 1);
    assert_eq!(fake.get_ipv4_routes(3).await?, vec![other]);

    let err = fake
        .delete_route(Route::unicast("10.0.0.0/8".parse().unwrap(), 4))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(fake.get_all_routes().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_collection_order() -> Result<()> {
    let fake = topology();
    let label = MplsLabel::new(100)?;
    fake.add_route(
        Route::mpls(label, PROTO).next_hop(NextHop::via(ip("fe80::1")).ifindex(1)),
    )
    .await?;
    fake.add_route(ecmp_route("2001:db8::/32", 1)).await?;
    fake.add_route(ecmp_route("10.0.0.0/8", 1)).await?;

    let families: Vec<_> = fake
        .get_all_routes()
        .await?
        .iter()
        .map(|r| r.family())
        .collect();
    assert_eq!(
        families,
        vec![RouteFamily::Ipv4, RouteFamily::Ipv6, RouteFamily::Mpls]
    );

    let mpls = fake.get_mpls_routes(PROTO).await?;
    assert_eq!(mpls.len(), 1);
    assert_eq!(mpls[0].next_hops[0].ifindex, Some(1));
    Ok(())
}

#[tokio::test]
async fn test_validation_rejects_before_state_changes() {
    let fake = topology();

    let no_hops = Route::unicast("10.0.0.0/8".parse().unwrap(), PROTO);
    let err = fake.add_route(no_hops).await.unwrap_err();
    assert!(matches!(err, Error::Encoding { object: "route", .. }));

    let err = fake.add_link(Link::new(0, "this-name-is-too-long")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);

    let err = fake
        .add_if_address(IfAddress::parse(0, "10.0.0.1/24").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);

    assert!(fake.get_all_routes().await.unwrap().is_empty());
    assert!(fake.get_all_if_addresses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_kernel_rejection_shapes() {
    let fake = topology();

    // Unknown egress device.
    let err = fake.add_route(ecmp_route("10.0.0.0/8", 42)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KernelRejected);
    assert_eq!(err.errno(), Some(libc::ENODEV));

    // Name held by another index.
    let err = fake.add_link(Link::new(5, "Y")).await.unwrap_err();
    assert!(err.is_already_exists());

    let err = fake
        .delete_if_address(IfAddress::parse(1, "10.0.0.1/24").unwrap())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_neighbors_are_sorted() -> Result<()> {
    let fake = topology();
    fake.seed_neighbor(Neighbor::new(1, ip("fe80::2"), None).state(NeighborState::Stale));
    fake.seed_neighbor(Neighbor::new(0, ip("fe80::9"), None));
    fake.seed_neighbor(Neighbor::new(1, ip("fe80::1"), None));

    let keys: Vec<_> = fake
        .get_all_neighbors()
        .await?
        .into_iter()
        .map(|n| (n.ifindex, n.destination))
        .collect();
    assert_eq!(
        keys,
        vec![(0, ip("fe80::9")), (1, ip("fe80::1")), (1, ip("fe80::2"))]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_distinct_keys() -> Result<()> {
    let fake = Arc::new(topology());

    let tasks: Vec<_> = (0..32u16)
        .map(|i| {
            let fake = fake.clone();
            tokio::spawn(async move {
                let dest = format!("2001:db8:{:x}::/64", i);
                fake.add_route(ecmp_route(&dest, 1)).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap()?;
    }

    // Every dump sees a whole number of completed writes.
    let routes = fake.get_ipv6_routes(PROTO).await?;
    assert_eq!(routes.len(), 32);
    assert!(routes.windows(2).all(|w| w[0].cmp_key(&w[1]).is_lt()));
    Ok(())
}

#[tokio::test]
async fn test_awaited_writes_are_ordered() -> Result<()> {
    let fake = topology();
    for metric in [10, 20, 30] {
        fake.add_route(ecmp_route("10.0.0.0/8", 1).priority(metric))
            .await?;
    }
    let routes = fake.get_ipv4_routes(PROTO).await?;
    assert_eq!(routes[0].priority, Some(30));
    Ok(())
}

#[test]
fn test_blocking_wait() {
    let fake = topology();
    fake.add_route(ecmp_route("10.0.0.0/8", 1)).wait().unwrap();
    assert_eq!(fake.get_all_routes().wait().unwrap().len(), 1);
}
