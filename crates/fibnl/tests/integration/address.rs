//! Interface address integration tests.

use fibnl::{IfAddress, NetlinkProtocol, Result};

use crate::common::TestNamespace;

async fn dummy_index(conn: &fibnl::Connection, name: &str) -> Result<u32> {
    let links = conn.get_all_links().await?;
    Ok(links
        .into_iter()
        .find(|l| l.name == name)
        .map(|l| l.ifindex)
        .unwrap_or(0))
}

#[tokio::test]
async fn test_add_and_delete_addresses() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("addr")?;
    let conn = ns.connection()?;
    ns.add_dummy("dummy0")?;
    let ifindex = dummy_index(&conn, "dummy0").await?;

    let v4 = IfAddress::parse(ifindex, "192.168.1.1/24")?;
    let v6 = IfAddress::parse(ifindex, "2001:db8::1/64")?;
    conn.add_if_address(v4.clone()).await?;
    conn.add_if_address(v6.clone()).await?;
    // Upsert: adding again succeeds.
    conn.add_if_address(v4.clone()).await?;

    let addrs = conn.get_all_if_addresses().await?;
    let mine: Vec<_> = addrs.iter().filter(|a| a.ifindex == ifindex).collect();
    assert!(mine.iter().any(|a| a.prefix == v4.prefix));
    assert!(mine.iter().any(|a| a.prefix == v6.prefix));

    conn.delete_if_address(v4.clone()).await?;
    let addrs = conn.get_all_if_addresses().await?;
    assert!(!addrs.iter().any(|a| a.prefix == v4.prefix));

    let err = conn.delete_if_address(v4).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    Ok(())
}

#[tokio::test]
async fn test_address_on_missing_link() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("addrnodev")?;
    let conn = ns.connection()?;

    let err = conn
        .add_if_address(IfAddress::parse(4242, "10.0.0.1/24")?)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), fibnl::ErrorKind::KernelRejected);

    Ok(())
}
