//! Socket configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use fibnl::{Connection, EventGroups, RetryPolicy, SocketConfig};
//!
//! let config = SocketConfig::default()
//!     .request_timeout(Duration::from_secs(2))
//!     .retry(RetryPolicy::default().max_attempts(6))
//!     .events(EventGroups::none().routes(true))
//!     .namespace("/var/run/netns/fib");
//! let conn = Connection::with_config(config)?;
//! ```

use std::path::PathBuf;
use std::time::Duration;

use super::events::EventGroups;
use super::retry::RetryPolicy;

/// Tunables for a [`Connection`](super::Connection).
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Deadline for requests answered by a single acknowledgement.
    pub request_timeout: Duration,
    /// Deadline for dumps, measured from the last (re)send.
    pub dump_timeout: Duration,
    pub retry: RetryPolicy,
    /// Written-but-unresolved requests allowed at once.
    pub max_in_flight: usize,
    /// How long a finished sequence number stays unusable.
    pub seq_quarantine: Duration,
    /// Write pause after the kernel reports ENOBUFS or an overrun.
    pub backpressure_pause: Duration,
    /// SO_RCVBUF request; `None` keeps the system default.
    pub recv_buffer_size: Option<usize>,
    /// Receive buffer per datagram.
    pub datagram_size: usize,
    /// Multicast groups to join for change notifications.
    pub events: EventGroups,
    /// Notifications buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Network namespace file (`/var/run/netns/<name>`, `/proc/<pid>/ns/net`).
    pub namespace: Option<PathBuf>,
    pub thread_name: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            dump_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            max_in_flight: 256,
            seq_quarantine: Duration::from_secs(10),
            backpressure_pause: Duration::from_millis(100),
            recv_buffer_size: Some(4 * 1024 * 1024),
            datagram_size: 64 * 1024,
            events: EventGroups::none(),
            event_capacity: 1024,
            namespace: None,
            thread_name: "fibnl-reactor".to_string(),
        }
    }
}

impl SocketConfig {
    /// Set the acknowledgement deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the dump deadline.
    pub fn dump_timeout(mut self, timeout: Duration) -> Self {
        self.dump_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the in-flight cap (at least 1).
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    /// Set the sequence number quarantine.
    pub fn seq_quarantine(mut self, quarantine: Duration) -> Self {
        self.seq_quarantine = quarantine;
        self
    }

    /// Set the backpressure pause.
    pub fn backpressure_pause(mut self, pause: Duration) -> Self {
        self.backpressure_pause = pause;
        self
    }

    /// Set the socket receive buffer size.
    pub fn recv_buffer_size(mut self, size: Option<usize>) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the per-datagram buffer size.
    pub fn datagram_size(mut self, size: usize) -> Self {
        self.datagram_size = size.max(4096);
        self
    }

    /// Subscribe to change notifications.
    pub fn events(mut self, events: EventGroups) -> Self {
        self.events = events;
        self
    }

    /// Set the notification channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Open the socket inside a network namespace.
    pub fn namespace(mut self, path: impl Into<PathBuf>) -> Self {
        self.namespace = Some(path.into());
        self
    }

    /// Name the reactor thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
