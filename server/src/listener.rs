//! Accepting connections, and sorting accept failures into the ones that
//! concern a single connection, the ones worth retrying after a pause, and
//! the ones that mean the listener is gone.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// Source of incoming connections for the serving loop.
pub(crate) trait Listener: Send + 'static {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    type Io = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcceptError {
    /// Belongs to one incoming connection; accept again right away.
    Connection,
    /// Out of descriptors, buffers or memory for now; accept again after
    /// backing off.
    Temporary,
    /// The listener itself is unusable.
    Fatal,
}

impl AcceptError {
    pub(crate) fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset => return Self::Connection,
            io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::OutOfMemory => return Self::Temporary,
            _ => {}
        }
        classify_os_error(err.raw_os_error()).unwrap_or(Self::Fatal)
    }
}

#[cfg(unix)]
fn classify_os_error(code: Option<i32>) -> Option<AcceptError> {
    match code? {
        libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM => Some(AcceptError::Temporary),
        // Network errors already pending on the new socket, which accept(2)
        // reports in its place.
        libc::EPROTO
        | libc::ENOPROTOOPT
        | libc::EHOSTDOWN
        | libc::EHOSTUNREACH
        | libc::EOPNOTSUPP
        | libc::ENETDOWN
        | libc::ENETUNREACH
        | libc::EPERM => Some(AcceptError::Connection),
        _ => None,
    }
}

#[cfg(not(unix))]
fn classify_os_error(_code: Option<i32>) -> Option<AcceptError> {
    None
}

/// Delay between accept retries: doubles from 5ms up to 1s, and starts
/// over after a successful accept.
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    delay: Option<Duration>,
}

impl Backoff {
    const MIN: Duration = Duration::from_millis(5);
    const MAX: Duration = Duration::from_secs(1);

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = match self.delay {
            None => Self::MIN,
            Some(delay) => (delay * 2).min(Self::MAX),
        };
        self.delay = Some(delay);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.delay = None;
    }
}
