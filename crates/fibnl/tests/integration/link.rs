//! Link integration tests.

use fibnl::{Link, NetlinkProtocol, Result};

use crate::common::TestNamespace;

#[tokio::test]
async fn test_create_dummy_interface() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("dummy")?;
    let conn = ns.connection()?;

    conn.add_link(Link::new(0, "dummy0").kind("dummy").up(true).mtu(9000))
        .await?;

    let links = conn.get_all_links().await?;
    let dummy = links.iter().find(|l| l.name == "dummy0");
    assert!(dummy.is_some(), "dummy0 should exist");

    let dummy = dummy.unwrap();
    assert_eq!(dummy.kind.as_deref(), Some("dummy"));
    assert_eq!(dummy.mtu, Some(9000));
    assert!(dummy.is_up(), "dummy0 should be up");

    Ok(())
}

#[tokio::test]
async fn test_add_link_updates_existing() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("linkupd")?;
    let conn = ns.connection()?;
    ns.add_dummy("dummy0")?;

    let ifindex = conn
        .get_all_links()
        .await?
        .into_iter()
        .find(|l| l.name == "dummy0")
        .map(|l| l.ifindex)
        .unwrap();

    conn.add_link(Link::new(ifindex, "dummy0").mtu(1400)).await?;
    let links = conn.get_all_links().await?;
    let dummy = links.iter().find(|l| l.ifindex == ifindex).unwrap();
    assert_eq!(dummy.mtu, Some(1400));

    Ok(())
}

#[tokio::test]
async fn test_links_sorted_by_index() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("linkord")?;
    let conn = ns.connection()?;
    for name in ["d2", "d0", "d1"] {
        ns.add_dummy(name)?;
    }

    let links = conn.get_all_links().await?;
    assert!(links.iter().any(|l| l.is_loopback()));
    assert!(links.windows(2).all(|w| w[0].ifindex < w[1].ifindex));
    assert_eq!(links.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_invalid_name_rejected_locally() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("linkbad")?;
    let conn = ns.connection()?;

    let err = conn.add_link(Link::new(0, "bad/name")).await.unwrap_err();
    assert_eq!(err.kind(), fibnl::ErrorKind::Encoding);
    assert_eq!(conn.stats().sent, 0);

    Ok(())
}
