//! Process-wide singleton lock.

use crate::error::{FetchError, FetchResult};
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use tracing::debug;

/// Exclusive lock held by binding a loopback TCP port.
///
/// The operating system releases the port when the process exits, so a crash
/// never leaves a stale lock behind. Dropping the lock releases it as well.
#[derive(Debug)]
pub struct SingletonLock {
    listener: Option<TcpListener>,
    port: u16,
}

impl SingletonLock {
    /// Port used when none is configured.
    pub const DEFAULT_PORT: u16 = 55234;

    /// Takes the lock, failing immediately if another process holds it.
    ///
    /// Port 0 binds an ephemeral port; [`SingletonLock::port`] reports which.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::LockHeld`] if the port is already bound, or an
    /// I/O error for any other bind failure.
    pub fn acquire(port: u16) -> FetchResult<Self> {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                debug!(port, "singleton lock acquired");
                Ok(Self {
                    listener: Some(listener),
                    port,
                })
            }
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
            ) =>
            {
                debug!(port, "lock port already bound");
                Err(FetchError::LockHeld { port })
            }
            Err(e) => Err(FetchError::Io(e)),
        }
    }

    /// Returns the bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns true while the lock is held.
    pub fn is_held(&self) -> bool {
        self.listener.is_some()
    }

    /// Releases the lock.
    pub fn release(mut self) {
        self.listener = None;
        debug!(port = self.port, "singleton lock released");
    }
}
