//! The socket reactor.
//!
//! One OS thread owns the socket and the pending table and runs a
//! current-thread runtime. Callers hand it [`Command`]s over an unbounded
//! queue; it writes requests, reads every datagram the kernel queues,
//! settles pending entries and resolves completions, all from that thread.
//!
//! [`ReactorCore`] holds the scheduling state and is driven with explicit
//! timestamps and a send closure, so it is tested without a socket.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use super::builder::MessageBuilder;
use super::codec::{self, Decoded, Frame, Object, Operation, Reply, Request, ResourceKey};
use super::completion::Responder;
use super::config::SocketConfig;
use super::error::{Error, Result};
use super::events::NetlinkEvent;
use super::installed::InstalledRoutes;
use super::pending::{Failure, Finished, Kind, PendingTable};
use super::retry::{self, Disposition, RetryPolicy};
use super::route::Route;
use super::socket::{NetlinkSocket, Received, SendStatus};
use super::stats::SocketStats;

/// Messages from handles to the reactor thread.
pub(crate) enum Command {
    Submit(Submission),
    Close,
}

/// Which message of a submission is on the wire.
enum Stage {
    /// The caller's request.
    Request,
    /// Removal of a route the acknowledged add left under another metric.
    Cleanup(Route),
}

/// A request waiting to be written, or waiting to be written again.
pub(crate) struct Submission {
    op: Operation,
    key: Option<ResourceKey>,
    builder: MessageBuilder,
    responder: Responder,
    route: Option<Route>,
    stage: Stage,
    /// Stale routes still to delete once the add is acknowledged.
    cleanup: Vec<Route>,
    /// Writes of the current message so far.
    attempts: u32,
    /// Earliest time of the next write (backoff).
    not_before: Option<Instant>,
    /// Owns its key, or the dump slot, until it completes.
    holds_slot: bool,
}

impl Submission {
    pub(crate) fn new(request: &Request, builder: MessageBuilder, responder: Responder) -> Self {
        Self {
            op: request.operation(),
            key: request.key(),
            builder,
            responder,
            route: request.route().cloned(),
            stage: Stage::Request,
            cleanup: Vec::new(),
            attempts: 0,
            not_before: None,
            holds_slot: false,
        }
    }

    fn kind(&self) -> Kind {
        if self.op.is_dump() { Kind::Dump } else { Kind::Ack }
    }
}

/// Result of a write pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flush {
    /// Everything eligible was written.
    Idle,
    /// The socket would block; wait for writability.
    Blocked,
    /// Writes are paused by backpressure.
    Paused,
}

pub(crate) struct ReactorCore {
    pid: u32,
    request_timeout: Duration,
    dump_timeout: Duration,
    retry: RetryPolicy,
    max_in_flight: usize,
    backpressure_pause: Duration,
    table: PendingTable<Submission>,
    queue: VecDeque<Submission>,
    installed: InstalledRoutes,
    busy_keys: HashSet<ResourceKey>,
    dump_busy: bool,
    paused_until: Option<Instant>,
    stats: Arc<SocketStats>,
    events: broadcast::Sender<NetlinkEvent>,
}

impl ReactorCore {
    pub(crate) fn new(
        config: &SocketConfig,
        pid: u32,
        stats: Arc<SocketStats>,
        events: broadcast::Sender<NetlinkEvent>,
    ) -> Self {
        Self {
            pid,
            request_timeout: config.request_timeout,
            dump_timeout: config.dump_timeout,
            retry: config.retry,
            max_in_flight: config.max_in_flight,
            backpressure_pause: config.backpressure_pause,
            table: PendingTable::new(config.seq_quarantine),
            queue: VecDeque::new(),
            installed: InstalledRoutes::new(),
            busy_keys: HashSet::new(),
            dump_busy: false,
            paused_until: None,
            stats,
            events,
        }
    }

    pub(crate) fn submit(&mut self, sub: Submission) {
        SocketStats::bump(&self.stats.submitted);
        trace!(op = %sub.op, "request queued");
        self.queue.push_back(sub);
    }

    /// Write every eligible queued request, in queue order.
    pub(crate) fn flush<F>(&mut self, now: Instant, mut send: F) -> Flush
    where
        F: FnMut(&[u8]) -> io::Result<SendStatus>,
    {
        self.sweep_abandoned();

        if self.paused_until.is_some_and(|until| until > now) {
            return Flush::Paused;
        }
        self.paused_until = None;

        let mut i = 0;
        while i < self.queue.len() {
            if self.table.len() >= self.max_in_flight {
                break;
            }
            if !self.is_eligible(&self.queue[i], now) {
                i += 1;
                continue;
            }
            let Some(mut sub) = self.queue.remove(i) else {
                break;
            };

            let seq = self.table.allocate(now);
            sub.builder.set_seq(seq);
            sub.builder.set_pid(self.pid);

            match send(sub.builder.seal()) {
                Ok(SendStatus::Sent) => self.on_sent(seq, sub, now),
                Ok(SendStatus::WouldBlock) => {
                    self.queue.insert(i, sub);
                    return Flush::Blocked;
                }
                Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                    sub.attempts += 1;
                    let resume = self.on_backpressure(now);
                    self.retry_or_fail(sub, libc::ENOBUFS, resume);
                    return Flush::Paused;
                }
                Err(e) => {
                    warn!(seq, op = %sub.op, error = %e, "netlink send failed");
                    self.release(&mut sub);
                    sub.responder.complete(Err(Error::Io(e)));
                }
            }
        }
        Flush::Idle
    }

    /// Process one received datagram.
    pub(crate) fn handle_datagram(&mut self, buf: &[u8], multicast: bool, now: Instant) {
        for frame in codec::decode_message(buf) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    SocketStats::bump(&self.stats.protocol_violations);
                    warn!(error = %e, multicast, "malformed netlink datagram");
                    // Whatever followed the broken header is lost; dumps
                    // cannot be trusted any more.
                    if !multicast {
                        self.abort_dumps(now);
                    }
                    return;
                }
            };
            if multicast {
                self.publish(frame, now);
            } else {
                self.dispatch(frame, now);
            }
        }
    }

    /// Read datagrams with `recv` until the socket has nothing queued.
    ///
    /// A receive overrun is handled here. Any other receive error is
    /// returned and leaves the socket unusable.
    pub(crate) fn drain<F>(&mut self, buf: &mut BytesMut, now: Instant, mut recv: F) -> io::Result<()>
    where
        F: FnMut(&mut BytesMut) -> io::Result<Option<Received>>,
    {
        loop {
            match recv(buf) {
                Ok(Some(received)) => {
                    let len = received.len.min(buf.len());
                    self.handle_datagram(&buf[..len], received.multicast, now);
                }
                Ok(None) => return Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => self.on_overrun(now),
                Err(e) => return Err(e),
            }
        }
    }

    /// The kernel dropped messages for this socket.
    pub(crate) fn on_overrun(&mut self, now: Instant) {
        self.on_backpressure(now);
        self.abort_dumps(now);
    }

    /// Expire deadlines.
    pub(crate) fn on_timer(&mut self, now: Instant) {
        for finished in self.table.expire(now) {
            self.settle(finished, now);
        }
    }

    /// Next instant at which [`on_timer`](Self::on_timer) or a flush has
    /// work to do.
    pub(crate) fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        let backoff = self
            .queue
            .iter()
            .filter_map(|sub| sub.not_before)
            .filter(|at| *at > now)
            .min();
        let pause = self.paused_until.filter(|at| *at > now);
        [self.table.next_deadline(), backoff, pause]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fail everything: queued requests were never written, written ones
    /// have an unknown outcome.
    pub(crate) fn shutdown(&mut self) {
        let queued = self.queue.len();
        let in_flight = self.table.len();
        for sub in self.queue.drain(..) {
            SocketStats::bump(&self.stats.cancelled);
            sub.responder.complete(Err(Error::Cancelled));
        }
        for (_, sub) in self.table.drain() {
            sub.responder.complete(Err(Error::Shutdown));
        }
        self.busy_keys.clear();
        self.dump_busy = false;
        info!(queued, in_flight, "netlink reactor stopped");
    }

    fn is_eligible(&self, sub: &Submission, now: Instant) -> bool {
        if sub.not_before.is_some_and(|at| at > now) {
            return false;
        }
        if sub.holds_slot {
            return true;
        }
        if sub.op.is_dump() {
            return !self.dump_busy;
        }
        match &sub.key {
            Some(key) => !self.busy_keys.contains(key),
            None => true,
        }
    }

    fn claim(&mut self, sub: &mut Submission) {
        if sub.holds_slot {
            return;
        }
        if sub.op.is_dump() {
            self.dump_busy = true;
        } else if let Some(key) = &sub.key {
            self.busy_keys.insert(key.clone());
        }
        sub.holds_slot = true;
    }

    fn release(&mut self, sub: &mut Submission) {
        if !sub.holds_slot {
            return;
        }
        if sub.op.is_dump() {
            self.dump_busy = false;
        } else if let Some(key) = &sub.key {
            self.busy_keys.remove(key);
        }
        sub.holds_slot = false;
    }

    fn sweep_abandoned(&mut self) {
        let queue = std::mem::take(&mut self.queue);
        for mut sub in queue {
            // A started cleanup runs to the end even without a listener.
            if sub.responder.is_abandoned() && matches!(sub.stage, Stage::Request) {
                SocketStats::bump(&self.stats.cancelled);
                debug!(op = %sub.op, "request cancelled before write");
                self.release(&mut sub);
                sub.responder.complete(Err(Error::Cancelled));
            } else {
                self.queue.push_back(sub);
            }
        }
    }

    fn on_sent(&mut self, seq: u32, mut sub: Submission, now: Instant) {
        self.claim(&mut sub);
        sub.attempts += 1;
        sub.not_before = None;
        SocketStats::bump(&self.stats.sent);

        let kind = sub.kind();
        let deadline = now + self.timeout_for(kind);
        debug!(seq, op = %sub.op, attempt = sub.attempts, "request sent");
        self.table.register(seq, kind, deadline, sub);
    }

    fn timeout_for(&self, kind: Kind) -> Duration {
        match kind {
            Kind::Ack => self.request_timeout,
            Kind::Dump => self.dump_timeout,
        }
    }

    fn on_backpressure(&mut self, now: Instant) -> Instant {
        SocketStats::bump(&self.stats.backpressure_events);
        let until = now + self.backpressure_pause;
        let until = self.paused_until.map_or(until, |current| current.max(until));
        warn!(pause = ?self.backpressure_pause, "netlink socket overrun, pausing writes");
        self.paused_until = Some(until);
        until
    }

    fn abort_dumps(&mut self, now: Instant) {
        for finished in self.table.abort_dumps(now) {
            self.settle(finished, now);
        }
    }

    fn publish(&mut self, frame: Frame, now: Instant) {
        match frame.decoded {
            Ok(Decoded::Overrun) => self.on_overrun(now),
            Ok(decoded) => {
                if let Some(event) = NetlinkEvent::from_decoded(decoded) {
                    // No subscribers is fine.
                    if self.events.send(event).is_ok() {
                        SocketStats::bump(&self.stats.events_published);
                    }
                }
            }
            Err(e) => {
                SocketStats::bump(&self.stats.protocol_violations);
                debug!(msg_type = frame.header.nlmsg_type, error = %e, "undecodable notification");
            }
        }
    }

    fn dispatch(&mut self, frame: Frame, now: Instant) {
        let seq = frame.header.nlmsg_seq;
        let interrupted = frame.header.is_dump_interrupted();

        let finished = match frame.decoded {
            Ok(Decoded::Ack) => self.table.on_ack(seq, now),
            Ok(Decoded::Error { errno, message }) => self.table.on_error(seq, errno, message, now),
            Ok(Decoded::Done { status }) => self.table.on_done(seq, status, interrupted, now),
            Ok(Decoded::New(object)) => {
                if !self.table.on_fragment(seq, Some(object), interrupted) {
                    self.stray(seq, now);
                }
                return;
            }
            Ok(Decoded::Deleted(_)) | Ok(Decoded::Ignored { .. }) => {
                if !self.table.on_fragment(seq, None, interrupted) {
                    self.stray(seq, now);
                }
                return;
            }
            Ok(Decoded::Noop) => return,
            Ok(Decoded::Overrun) => {
                self.on_overrun(now);
                return;
            }
            Err(e) => {
                SocketStats::bump(&self.stats.protocol_violations);
                warn!(seq, msg_type = frame.header.nlmsg_type, error = %e, "undecodable reply");
                self.table.fail(seq, Failure::Protocol(e), now)
            }
        };

        match finished {
            Some(finished) => self.settle(finished, now),
            None => self.stray(seq, now),
        }
    }

    fn stray(&mut self, seq: u32, now: Instant) {
        if self.table.is_retired(seq, now) {
            debug!(seq, "dropping reply for a finished request");
        } else if seq == 0 {
            trace!("ignoring unsolicited message");
        } else {
            SocketStats::bump(&self.stats.protocol_violations);
            warn!(seq, "reply for unknown sequence number");
        }
    }

    fn settle(&mut self, finished: Finished<Submission>, now: Instant) {
        let Finished {
            seq,
            kind,
            ctx: mut sub,
            outcome,
        } = finished;

        match outcome {
            Ok(reply) => {
                match kind {
                    Kind::Ack => SocketStats::bump(&self.stats.acked),
                    Kind::Dump => SocketStats::bump(&self.stats.dumps_completed),
                }
                self.complete(seq, sub, reply);
            }
            Err(Failure::Kernel { errno, .. })
                if matches!(sub.stage, Stage::Cleanup(_)) && is_gone(errno) =>
            {
                debug!(seq, op = %sub.op, errno, "stale route already gone");
                self.complete(seq, sub, Reply::Ack);
            }
            Err(Failure::Kernel { errno, message }) => match retry::classify(errno) {
                Disposition::Terminal => {
                    if sub.op == Operation::DeleteRoute
                        && is_gone(errno)
                        && let Some(route) = &sub.route
                    {
                        self.installed.forget(route);
                    }
                    SocketStats::bump(&self.stats.kernel_errors);
                    debug!(seq, op = %sub.op, errno, "kernel rejected request");
                    self.release(&mut sub);
                    let op = sub.op;
                    sub.responder
                        .complete(Err(Error::from_kernel_ext(op, errno, message.as_deref())));
                }
                Disposition::Retryable => {
                    let at = now + self.retry.backoff(sub.attempts);
                    self.retry_or_fail(sub, errno, at);
                }
                Disposition::Backpressure => {
                    let at = self.on_backpressure(now);
                    self.retry_or_fail(sub, errno, at);
                }
            },
            Err(Failure::Interrupted) => {
                debug!(seq, op = %sub.op, "dump interrupted");
                let at = now + self.retry.backoff(sub.attempts);
                self.retry_or_fail(sub, libc::EINTR, at);
            }
            Err(Failure::Overrun) => {
                let at = self.paused_until.unwrap_or(now);
                self.retry_or_fail(sub, libc::ENOBUFS, at);
            }
            Err(Failure::Timeout) => {
                SocketStats::bump(&self.stats.timeouts);
                let after = self.timeout_for(kind);
                warn!(seq, op = %sub.op, ?after, "request timed out");
                self.release(&mut sub);
                sub.responder.complete(Err(Error::Timeout { seq, after }));
            }
            Err(Failure::Protocol(e)) => {
                self.release(&mut sub);
                sub.responder.complete(Err(e));
            }
        }
    }

    /// A message of `sub` succeeded: update what is known to be installed,
    /// then either write the next cleanup delete or resolve the caller.
    fn complete(&mut self, seq: u32, mut sub: Submission, reply: Reply) {
        self.observe(&mut sub, &reply);

        if let Some(stale) = sub.cleanup.pop() {
            match stale.build_delete() {
                Ok(builder) => {
                    debug!(
                        dest = %stale.dest,
                        metric = ?stale.priority,
                        "removing route under a stale metric"
                    );
                    sub.builder = builder;
                    sub.stage = Stage::Cleanup(stale);
                    sub.attempts = 0;
                    sub.not_before = None;
                    // Still holds the key; goes out before anything queued.
                    self.queue.push_front(sub);
                }
                Err(e) => {
                    self.release(&mut sub);
                    sub.responder.complete(Err(e));
                }
            }
            return;
        }

        debug!(seq, op = %sub.op, attempts = sub.attempts, "request completed");
        self.release(&mut sub);
        let reply = match sub.stage {
            Stage::Request => reply,
            Stage::Cleanup(_) => Reply::Ack,
        };
        sub.responder.complete(Ok(reply));
    }

    fn observe(&mut self, sub: &mut Submission, reply: &Reply) {
        match (&sub.stage, sub.op) {
            (Stage::Cleanup(stale), _) => self.installed.forget(stale),
            (Stage::Request, Operation::AddRoute) => {
                if let Some(route) = &sub.route {
                    // Popped from the back: lowest metric first.
                    sub.cleanup = self.installed.stale(route);
                    sub.cleanup.reverse();
                    self.installed.record(route);
                }
            }
            (Stage::Request, Operation::DeleteRoute) => {
                if let Some(route) = &sub.route {
                    self.installed.remove(route);
                }
            }
            (Stage::Request, Operation::GetRoutes) => {
                if let Reply::Objects(objects) = reply {
                    for object in objects {
                        if let Object::Route(route) = object {
                            self.installed.record(route);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn retry_or_fail(&mut self, mut sub: Submission, errno: i32, at: Instant) {
        if self.retry.allows_retry(sub.attempts) {
            SocketStats::bump(&self.stats.retries);
            debug!(op = %sub.op, errno, attempt = sub.attempts, "transient error, retrying");
            self.claim(&mut sub);
            sub.not_before = Some(at);
            self.queue.push_back(sub);
        } else {
            warn!(op = %sub.op, errno, attempts = sub.attempts, "retry budget exhausted");
            self.release(&mut sub);
            let err = Error::transient(sub.op, errno, sub.attempts);
            sub.responder.complete(Err(err));
        }
    }
}

/// The kernel found nothing to delete.
fn is_gone(errno: i32) -> bool {
    errno == libc::ESRCH || errno == libc::ENOENT
}

/// Handle to a running reactor thread.
pub(crate) struct Reactor {
    pub commands: mpsc::UnboundedSender<Command>,
    pub pid: u32,
}

impl Reactor {
    /// Start the reactor thread and open the socket on it. Returns once the
    /// socket is bound or failed to open.
    pub(crate) fn spawn(
        config: SocketConfig,
        stats: Arc<SocketStats>,
        events: broadcast::Sender<NetlinkEvent>,
    ) -> Result<Self> {
        let (commands, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);

        // Detached: the thread exits once every command sender is gone.
        std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::Io(e)));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let socket = match NetlinkSocket::open(&config) {
                        Ok(socket) => socket,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(socket.pid()));
                    let core = ReactorCore::new(&config, socket.pid(), stats, events);
                    run(core, socket, rx, config.datagram_size).await;
                });
            })?;

        let pid = ready_rx.recv().map_err(|_| Error::Shutdown)??;
        Ok(Self { commands, pid })
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Returns `false` once the reactor should stop.
fn accept(core: &mut ReactorCore, command: Option<Command>) -> bool {
    match command {
        Some(Command::Submit(sub)) => {
            core.submit(sub);
            true
        }
        Some(Command::Close) | None => false,
    }
}

async fn run(
    mut core: ReactorCore,
    socket: NetlinkSocket,
    mut commands: mpsc::UnboundedReceiver<Command>,
    datagram_size: usize,
) {
    info!(pid = socket.pid(), "netlink reactor started");
    let mut buf = BytesMut::with_capacity(datagram_size);
    let mut write_blocked = false;

    'reactor: loop {
        if !write_blocked {
            write_blocked =
                core.flush(Instant::now(), |msg| socket.try_send(msg)) == Flush::Blocked;
        }
        let wakeup = core.next_wakeup(Instant::now());

        tokio::select! {
            command = commands.recv() => {
                if !accept(&mut core, command) {
                    break;
                }
                // Take everything already queued before writing.
                while let Ok(command) = commands.try_recv() {
                    if !accept(&mut core, Some(command)) {
                        break 'reactor;
                    }
                }
            }
            ready = socket.readable() => {
                if let Err(e) = ready {
                    warn!(error = %e, "netlink socket failed");
                    break;
                }
                if let Err(e) = core.drain(&mut buf, Instant::now(), |buf| socket.try_recv(buf)) {
                    // Read readiness is still set.
                    warn!(error = %e, "netlink receive failed");
                    break;
                }
            }
            ready = socket.writable(), if write_blocked => {
                if let Err(e) = ready {
                    warn!(error = %e, "netlink socket failed");
                    break;
                }
                write_blocked = false;
            }
            _ = sleep_until(wakeup) => core.on_timer(Instant::now()),
        }
    }

    core.shutdown();
}
