//! Print link, address and route changes as the kernel announces them.
//!
//! Run with: RUST_LOG=fibnl=debug cargo run -p fibnl --example monitor

use fibnl::{Connection, EventGroups, SocketConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> fibnl::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = SocketConfig::default().events(
        EventGroups::none()
            .links(true)
            .addresses(true)
            .routes(true),
    );
    let conn = Connection::with_config(config)?;
    let mut events = conn.subscribe();

    loop {
        match events.recv().await {
            Ok(event) => println!("{:<6} {:?}", event.action(), event),
            Err(RecvError::Lagged(n)) => eprintln!("missed {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
    Ok(())
}
