//! Common test utilities for integration tests.
//!
//! Provides `TestNamespace` for isolated network namespace testing
//! and helper macros for conditional test execution.

use fibnl::{Connection, Error, Result, SocketConfig};
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

/// Global counter for unique namespace names.
static NAMESPACE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a unique namespace name for this test.
fn unique_ns_name(prefix: &str) -> String {
    let id = NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id();
    format!("fibnl-test-{}-{}-{}", prefix, pid, id)
}

fn ip(args: &[&str]) -> Result<String> {
    let output = Command::new("ip").args(args).output().map_err(Error::Io)?;
    if !output.status.success() {
        return Err(Error::Io(io::Error::other(format!(
            "ip {:?}: {}",
            args,
            String::from_utf8_lossy(&output.stderr).trim()
        ))));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// A throwaway network namespace, deleted on drop.
pub struct TestNamespace {
    name: String,
}

impl TestNamespace {
    /// Create a namespace whose name includes `prefix`, the process ID and
    /// a counter.
    pub fn new(prefix: &str) -> Result<Self> {
        let name = unique_ns_name(prefix);
        ip(&["netns", "add", &name])?;
        Ok(Self { name })
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from("/var/run/netns").join(&self.name)
    }

    /// Open a connection inside this namespace.
    pub fn connection(&self) -> Result<Connection> {
        self.connection_with(SocketConfig::default())
    }

    pub fn connection_with(&self, config: SocketConfig) -> Result<Connection> {
        Connection::with_config(config.namespace(self.path()))
    }

    /// Run a command in the namespace and return its output.
    pub fn exec(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let mut full = vec!["netns", "exec", &self.name, cmd];
        full.extend_from_slice(args);
        ip(&full)
    }

    /// Add a dummy interface and bring it up.
    pub fn add_dummy(&self, name: &str) -> Result<()> {
        self.exec("ip", &["link", "add", name, "type", "dummy"])?;
        self.exec("ip", &["link", "set", name, "up"])?;
        Ok(())
    }

    /// Enable MPLS forwarding; fails where the mpls_router module is absent.
    pub fn enable_mpls(&self) -> Result<()> {
        self.exec("sysctl", &["-qw", "net.mpls.platform_labels=1048575"])?;
        Ok(())
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

/// Check if running as root.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
///
/// Use this at the beginning of integration tests that require root privileges.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ns_name() {
        let name1 = unique_ns_name("test");
        let name2 = unique_ns_name("test");
        assert_ne!(name1, name2);
        assert!(name1.starts_with("fibnl-test-test-"));
    }
}
