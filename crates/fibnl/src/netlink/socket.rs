//! Low-level async route-netlink socket.
//!
//! All I/O is non-blocking and readiness driven: the reactor waits for
//! [`NetlinkSocket::readable`] / [`NetlinkSocket::writable`] and then drains
//! or fills the socket with the `try_*` calls until the kernel says
//! would-block.

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::config::SocketConfig;
use super::error::{Error, Result};

/// Outcome of a non-blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    /// The socket buffer is full; wait for writability.
    WouldBlock,
}

/// One received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    /// Sent to a multicast group rather than to this socket.
    pub multicast: bool,
}

/// Async NETLINK_ROUTE socket.
pub struct NetlinkSocket {
    fd: AsyncFd<Socket>,
    /// Local port ID (assigned by kernel).
    pid: u32,
}

impl NetlinkSocket {
    /// Open a socket as described by `config`: namespace, receive buffer
    /// and multicast groups.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &SocketConfig) -> Result<Self> {
        let mut socket = match &config.namespace {
            Some(path) => Self::new_in_namespace_path(path)?,
            None => Self::new()?,
        };
        if let Some(size) = config.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        for group in config.events.groups() {
            socket.add_membership(group)?;
        }
        Ok(socket)
    }

    /// Create a socket in the current network namespace.
    pub fn new() -> Result<Self> {
        Self::create_socket()
    }

    /// Create a socket that operates in the namespace behind `ns_fd`.
    ///
    /// This temporarily switches the calling thread to the target namespace,
    /// creates the socket, then switches back. The socket keeps operating in
    /// the target namespace.
    pub fn new_in_namespace(ns_fd: RawFd) -> Result<Self> {
        let current_ns = File::open("/proc/self/ns/net")
            .map_err(|e| Error::InvalidMessage(format!("cannot open current namespace: {}", e)))?;

        // SAFETY: setns only reads the descriptor, which the caller keeps
        // open for the duration of the call.
        let ret = unsafe { libc::setns(ns_fd, libc::CLONE_NEWNET) };
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        let result = Self::create_socket();

        // SAFETY: current_ns is open until the end of this function.
        let restore_ret = unsafe { libc::setns(current_ns.as_raw_fd(), libc::CLONE_NEWNET) };
        if restore_ret < 0 {
            tracing::warn!(
                error = %io::Error::last_os_error(),
                "failed to restore original network namespace"
            );
        }

        result
    }

    /// Create a socket in the namespace at `ns_path`, e.g.
    /// `/var/run/netns/<name>` or `/proc/<pid>/ns/net`.
    pub fn new_in_namespace_path<P: AsRef<Path>>(ns_path: P) -> Result<Self> {
        let ns_file = File::open(ns_path.as_ref()).map_err(|e| {
            Error::InvalidMessage(format!(
                "cannot open namespace '{}': {}",
                ns_path.as_ref().display(),
                e
            ))
        })?;
        Self::new_in_namespace(ns_file.as_raw_fd())
    }

    fn create_socket() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Extended ACK carries the kernel's reason for a rejection.
        if let Err(e) = socket.set_ext_ack(true) {
            tracing::debug!(error = %e, "extended ACK not supported");
        }

        let fd = AsyncFd::with_interest(socket, Interest::READABLE | Interest::WRITABLE)?;
        tracing::debug!(pid, "netlink socket bound");
        Ok(Self { fd, pid })
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Subscribe to a multicast group.
    pub fn add_membership(&mut self, group: u32) -> Result<()> {
        self.fd.get_mut().add_membership(group)?;
        Ok(())
    }

    /// Request a receive buffer of `size` bytes (SO_RCVBUF).
    pub fn set_recv_buffer_size(&mut self, size: usize) -> Result<()> {
        let size = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);
        // SAFETY: the descriptor is valid and the option value is a c_int
        // that outlives the call.
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                &size as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Wait until a datagram may be available.
    pub async fn readable(&self) -> io::Result<()> {
        let _guard = self.fd.readable().await?;
        Ok(())
    }

    /// Wait until a send may succeed.
    pub async fn writable(&self) -> io::Result<()> {
        let _guard = self.fd.writable().await?;
        Ok(())
    }

    /// Receive one datagram into `buf` without waiting. `Ok(None)` means
    /// nothing is queued.
    pub fn try_recv(&self, buf: &mut BytesMut) -> io::Result<Option<Received>> {
        buf.clear();
        match self
            .fd
            .try_io(Interest::READABLE, |inner| inner.recv_from(buf, 0))
        {
            Ok((len, addr)) => Ok(Some(Received {
                len,
                multicast: addr.multicast_groups() != 0,
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send one message without waiting.
    pub fn try_send(&self, msg: &[u8]) -> io::Result<SendStatus> {
        match self
            .fd
            .try_io(Interest::WRITABLE, |inner| inner.send(msg, 0))
        {
            Ok(_) => Ok(SendStatus::Sent),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(SendStatus::WouldBlock),
            Err(e) => Err(e),
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_new_socket_is_writable_and_quiet() {
        let socket = NetlinkSocket::new().unwrap();
        assert_ne!(socket.pid(), 0);

        tokio::time::timeout(Duration::from_secs(1), socket.writable())
            .await
            .expect("fresh socket should be writable")
            .unwrap();

        let mut buf = BytesMut::with_capacity(4096);
        assert_eq!(socket.try_recv(&mut buf).unwrap(), None);
    }
}
