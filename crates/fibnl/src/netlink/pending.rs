//! Outstanding requests keyed by sequence number.
//!
//! The table is owned by the reactor and never shared. An entry leaves the
//! table exactly once, through one of the `on_*`, [`fail`], [`expire`],
//! [`abort_dumps`] or [`drain`] methods, and the caller completes its
//! context with the returned outcome. Removed sequence numbers stay in a
//! quarantine so that late replies to an expired or retried request cannot
//! be mistaken for replies to a new one.
//!
//! [`fail`]: PendingTable::fail
//! [`expire`]: PendingTable::expire
//! [`abort_dumps`]: PendingTable::abort_dumps
//! [`drain`]: PendingTable::drain

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::codec::{Object, Reply};
use super::error::Error;

/// What completes an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// A single acknowledgement.
    Ack,
    /// A multi-part reply ended by DONE.
    Dump,
}

/// Why an entry left the table without a reply.
#[derive(Debug)]
pub(crate) enum Failure {
    /// Negative acknowledgement or negative DONE status.
    Kernel { errno: i32, message: Option<String> },
    /// The dump changed under the kernel while it was being read.
    Interrupted,
    /// Messages were dropped while the dump was in progress.
    Overrun,
    /// Deadline passed.
    Timeout,
    /// The reply could not be decoded.
    Protocol(Error),
}

/// An entry that left the table.
#[derive(Debug)]
pub(crate) struct Finished<T> {
    pub seq: u32,
    pub kind: Kind,
    pub ctx: T,
    pub outcome: Result<Reply, Failure>,
}

struct Entry<T> {
    kind: Kind,
    deadline: Instant,
    ctx: T,
    objects: Vec<Object>,
    interrupted: bool,
}

pub(crate) struct PendingTable<T> {
    entries: HashMap<u32, Entry<T>>,
    /// Sequence number -> end of quarantine.
    retired: HashMap<u32, Instant>,
    quarantine: Duration,
    next_seq: u32,
}

impl<T> PendingTable<T> {
    pub(crate) fn new(quarantine: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            retired: HashMap::new(),
            quarantine,
            next_seq: 1,
        }
    }

    /// Number of outstanding entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, seq: u32) -> bool {
        self.entries.contains_key(&seq)
    }

    /// Check if `seq` was used recently and is quarantined.
    pub(crate) fn is_retired(&self, seq: u32, now: Instant) -> bool {
        self.retired.get(&seq).is_some_and(|until| *until > now)
    }

    /// Check if `seq` can be given to a new request.
    pub(crate) fn is_available(&self, seq: u32, now: Instant) -> bool {
        seq != 0 && !self.contains(seq) && !self.is_retired(seq, now)
    }

    /// Next free sequence number. Zero is never used: the kernel sends
    /// notifications with sequence zero.
    pub(crate) fn allocate(&mut self, now: Instant) -> u32 {
        loop {
            let seq = self.next_seq;
            self.next_seq = self.next_seq.wrapping_add(1);
            if self.is_available(seq, now) {
                return seq;
            }
        }
    }

    pub(crate) fn register(&mut self, seq: u32, kind: Kind, deadline: Instant, ctx: T) {
        self.retired.remove(&seq);
        self.entries.insert(
            seq,
            Entry {
                kind,
                deadline,
                ctx,
                objects: Vec::new(),
                interrupted: false,
            },
        );
    }

    /// Record one dump fragment. Returns `false` if nobody is waiting for
    /// `seq`.
    pub(crate) fn on_fragment(&mut self, seq: u32, object: Option<Object>, interrupted: bool) -> bool {
        let Some(entry) = self.entries.get_mut(&seq) else {
            return false;
        };
        entry.interrupted |= interrupted;
        if let (Kind::Dump, Some(object)) = (entry.kind, object) {
            entry.objects.push(object);
        }
        true
    }

    /// Positive acknowledgement.
    pub(crate) fn on_ack(&mut self, seq: u32, now: Instant) -> Option<Finished<T>> {
        let (kind, entry) = self.remove(seq, now)?;
        let reply = match kind {
            Kind::Ack => Reply::Ack,
            Kind::Dump => Reply::Objects(entry.objects),
        };
        Some(Finished {
            seq,
            kind,
            ctx: entry.ctx,
            outcome: Ok(reply),
        })
    }

    /// Negative acknowledgement.
    pub(crate) fn on_error(
        &mut self,
        seq: u32,
        errno: i32,
        message: Option<String>,
        now: Instant,
    ) -> Option<Finished<T>> {
        self.fail(seq, Failure::Kernel { errno, message }, now)
    }

    /// End of a dump. An interruption seen on any fragment, or on DONE
    /// itself, turns the reply into [`Failure::Interrupted`].
    pub(crate) fn on_done(
        &mut self,
        seq: u32,
        status: i32,
        interrupted: bool,
        now: Instant,
    ) -> Option<Finished<T>> {
        let (kind, entry) = self.remove(seq, now)?;
        let outcome = if status < 0 {
            Err(Failure::Kernel {
                errno: -status,
                message: None,
            })
        } else if entry.interrupted || interrupted {
            Err(Failure::Interrupted)
        } else {
            Ok(match kind {
                Kind::Dump => Reply::Objects(entry.objects),
                Kind::Ack => Reply::Ack,
            })
        };
        Some(Finished {
            seq,
            kind,
            ctx: entry.ctx,
            outcome,
        })
    }

    pub(crate) fn fail(&mut self, seq: u32, failure: Failure, now: Instant) -> Option<Finished<T>> {
        let (kind, entry) = self.remove(seq, now)?;
        Some(Finished {
            seq,
            kind,
            ctx: entry.ctx,
            outcome: Err(failure),
        })
    }

    /// Remove every entry whose deadline is not after `now`, and forget
    /// quarantined numbers whose quarantine ended.
    pub(crate) fn expire(&mut self, now: Instant) -> Vec<Finished<T>> {
        self.retired.retain(|_, until| *until > now);
        let expired: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(seq, _)| *seq)
            .collect();
        self.finish_all(expired, now, || Failure::Timeout)
    }

    /// Fail every dump in progress with [`Failure::Overrun`].
    pub(crate) fn abort_dumps(&mut self, now: Instant) -> Vec<Finished<T>> {
        let dumps: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.kind == Kind::Dump)
            .map(|(seq, _)| *seq)
            .collect();
        self.finish_all(dumps, now, || Failure::Overrun)
    }

    /// Remove everything; used on shutdown. Nothing is quarantined.
    pub(crate) fn drain(&mut self) -> Vec<(u32, T)> {
        self.entries.drain().map(|(seq, e)| (seq, e.ctx)).collect()
    }

    /// Earliest deadline of an outstanding entry.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    fn finish_all(
        &mut self,
        mut seqs: Vec<u32>,
        now: Instant,
        failure: impl Fn() -> Failure,
    ) -> Vec<Finished<T>> {
        seqs.sort_unstable();
        seqs.into_iter()
            .filter_map(|seq| self.fail(seq, failure(), now))
            .collect()
    }

    fn remove(&mut self, seq: u32, now: Instant) -> Option<(Kind, Entry<T>)> {
        let entry = self.entries.remove(&seq)?;
        self.retired.insert(seq, now + self.quarantine);
        Some((entry.kind, entry))
    }
}
