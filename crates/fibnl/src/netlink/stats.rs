//! Socket counters.
//!
//! The reactor bumps [`SocketStats`]; handles read a [`StatsSnapshot`].
//!
//! ```ignore
//! let before = conn.stats();
//! conn.add_route(route).await?;
//! let delta = conn.stats().since(&before);
//! assert_eq!(delta.acked, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! counters {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        /// Live counters shared between the reactor and its handles.
        #[derive(Debug, Default)]
        pub struct SocketStats {
            $($(#[$doc])* pub(crate) $name: AtomicU64,)*
        }

        /// Point-in-time copy of [`SocketStats`].
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct StatsSnapshot {
            $($(#[$doc])* pub $name: u64,)*
        }

        impl SocketStats {
            /// Read every counter.
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($name: self.$name.load(Ordering::Relaxed),)*
                }
            }
        }

        impl StatsSnapshot {
            /// Counter increase since `earlier`.
            pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
                StatsSnapshot {
                    $($name: self.$name.saturating_sub(earlier.$name),)*
                }
            }
        }
    };
}

counters! {
    /// Requests accepted from callers.
    submitted,
    /// Messages written to the socket, resends included.
    sent,
    /// Requests completed by a positive acknowledgement.
    acked,
    /// Dumps completed by DONE.
    dumps_completed,
    /// Requests failed with a terminal kernel error.
    kernel_errors,
    /// Resends after a transient error or interrupted dump.
    retries,
    /// Requests that hit their deadline.
    timeouts,
    /// Requests dropped before they were written.
    cancelled,
    /// Malformed or unexpected kernel messages.
    protocol_violations,
    /// ENOBUFS and overrun reports.
    backpressure_events,
    /// Notifications handed to subscribers.
    events_published,
}

impl SocketStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
