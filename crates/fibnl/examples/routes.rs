//! List routes.
//!
//! Run with: cargo run -p fibnl --example routes
//!
//! Restrict to one protocol id:
//!   cargo run -p fibnl --example routes -- 99

use std::collections::HashMap;
use std::env;

use fibnl::{Connection, NetlinkProtocol, RouteFilter};

#[tokio::main]
async fn main() -> fibnl::Result<()> {
    let conn = Connection::new()?;
    let filter = match env::args().nth(1).and_then(|s| s.parse().ok()) {
        Some(protocol) => RouteFilter::all().protocol(protocol),
        None => RouteFilter::all(),
    };

    let names: HashMap<u32, String> = conn
        .get_all_links()
        .await?
        .into_iter()
        .map(|l| (l.ifindex, l.name))
        .collect();

    println!(
        "{:<6} {:<6} {:<28} {:<28} {:<12}",
        "PROTO", "TABLE", "DESTINATION", "GATEWAY", "DEV"
    );
    println!("{}", "-".repeat(84));

    for route in conn.get_routes(filter).await? {
        for (i, hop) in route.next_hops.iter().enumerate() {
            let dest = if i == 0 { route.dest.to_string() } else { String::new() };
            let gateway = hop.gateway.map(|g| g.to_string()).unwrap_or_else(|| "-".into());
            let dev = hop
                .ifindex
                .and_then(|i| names.get(&i).cloned())
                .unwrap_or_else(|| "-".into());
            println!(
                "{:<6} {:<6} {:<28} {:<28} {:<12}",
                route.protocol, route.table, dest, gateway, dev
            );
        }
        if route.next_hops.is_empty() {
            println!(
                "{:<6} {:<6} {:<28} {:?}",
                route.protocol, route.table, route.dest, route.route_type
            );
        }
    }

    let stats = conn.stats();
    eprintln!("{} requests, {} dumps", stats.submitted, stats.dumps_completed);
    Ok(())
}
