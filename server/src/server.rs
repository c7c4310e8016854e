//! Server lifecycle: bind, serve in the background, drain on stop.
//!
//! # Design
//! `Server` owns the lifecycle; a single spawned task owns the listener and
//! every accepted connection. The two talk through:
//! - a `watch` channel carrying `ServerState`, which doubles as the readiness
//!   notification (`ready` waits for the state to leave `Starting`);
//! - a `shutdown` token telling the task to stop accepting and drain;
//! - a `stop` token the task cancels when serving dies on its own, which is
//!   what wakes `start_and_wait`. Callers can cancel it too.
//!
//! Connections run on their own tasks inside a `JoinSet` and are watched by
//! hyper-util's graceful shutdown, so the drain can be bounded and whatever
//! is left when the deadline passes can be aborted.
//!
//! Accept failures from running out of descriptors are retried with a
//! backoff; only errors that leave the listener unusable end serving.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::{RequestBodyTimeout, RequestBodyTimeoutLayer};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::listener::{AcceptError, Backoff, Listener};

/// The per-connection service: the caller's router behind a request body
/// read timeout.
pub type AppService = RequestBodyTimeout<Router>;

pub fn app_service(router: Router, read_timeout: Duration) -> AppService {
    ServiceBuilder::new()
        .layer(RequestBodyTimeoutLayer::new(read_timeout))
        .service(router)
}

/// Lifecycle of a `Server`. Each server goes through it once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Bind failed, or serving ended without being asked to.
    Failed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::NotStarted => "not-started",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
            ServerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct Server {
    config: ServerConfig,
    router: Router,
    addr: Option<String>,
    local_addr: Option<SocketAddr>,
    state: Arc<watch::Sender<ServerState>>,
    shutdown: CancellationToken,
    stop: CancellationToken,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl Server {
    /// Create a server for `router`. No socket is opened until `start`.
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let (state, _) = watch::channel(ServerState::NotStarted);
        Self {
            config: config.with_defaults(),
            router,
            addr: None,
            local_addr: None,
            state: Arc::new(state),
            shutdown: CancellationToken::new(),
            stop: CancellationToken::new(),
            task: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// `http://host:port` of the bound listener, once `start` succeeded.
    pub fn addr(&self) -> Option<&str> {
        self.addr.as_deref()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Cancelling this token makes `start_and_wait` stop the server and
    /// return. It is also cancelled when serving fails after start.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Wait until the serving task has picked up the listener. Returns the
    /// state observed: `Running`, or whatever the server ended in if it never
    /// got there.
    pub async fn ready(&self) -> ServerState {
        let mut rx = self.state.subscribe();
        let observed = rx
            .wait_for(|state| *state != ServerState::Starting)
            .await
            .map(|state| *state);
        observed.unwrap_or_else(|_| self.state())
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Returns once the listener is bound; use `ready` to wait for the
    /// serving loop. Only valid once per server.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        let current = self.state();
        if current != ServerState::NotStarted {
            return Err(ServerError::InvalidState {
                op: "start",
                state: current,
            });
        }
        self.state.send_replace(ServerState::Starting);

        let bind = (self.config.host(), self.config.port);
        let listener = match TcpListener::bind(bind).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.send_replace(ServerState::Failed);
                return Err(ServerError::Bind {
                    addr: self.config.bind_address(),
                    source,
                });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(err) => {
                self.state.send_replace(ServerState::Failed);
                return Err(ServerError::LocalAddr(err));
            }
        };

        if self.config.enable_tls {
            warn!(
                tls_port = ?self.config.tls.map(|tls| tls.port),
                "TLS is not supported, serving plain HTTP"
            );
        }

        self.spawn_serving(listener, local_addr);
        Ok(())
    }

    fn spawn_serving<L: Listener>(&mut self, listener: L, local_addr: SocketAddr) {
        let mut http = auto::Builder::new(TokioExecutor::new());
        http.http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.read_header_timeout);

        let serving = Serving {
            listener,
            local_addr,
            service: app_service(self.router.clone(), self.config.read_timeout),
            http,
            state: self.state.clone(),
            shutdown: self.shutdown.clone(),
            stop: self.stop.clone(),
            shutdown_timeout: self.config.shutdown_timeout,
        };

        self.addr = Some(format!("http://{local_addr}"));
        self.local_addr = Some(local_addr);
        self.task = Some(tokio::spawn(serving.run()));
    }

    /// Stop accepting, close the listener and wait up to
    /// `shutdown_timeout` for in-flight requests. Connections still open
    /// after that are aborted and `ShutdownTimeout` is returned.
    ///
    /// A no-op when the server was never started or is already stopped.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        self.state.send_if_modified(|state| match state {
            ServerState::Starting | ServerState::Running => {
                *state = ServerState::Stopping;
                true
            }
            _ => false,
        });
        info!(addr = self.addr.as_deref().unwrap_or_default(), "stopping server");
        self.shutdown.cancel();

        let result = match task.await {
            Ok(result) => result,
            Err(err) => {
                self.state.send_replace(ServerState::Failed);
                self.stop.cancel();
                return Err(err.into());
            }
        };

        self.state.send_if_modified(|state| {
            if *state == ServerState::Failed {
                return false;
            }
            *state = ServerState::Stopped;
            true
        });
        self.stop.cancel();
        result
    }

    /// Start (unless already started) and serve until an interrupt signal
    /// arrives or the stop token is cancelled, then `stop`.
    pub async fn start_and_wait(&mut self) -> Result<(), ServerError> {
        match self.state() {
            ServerState::NotStarted => self.start().await?,
            ServerState::Starting | ServerState::Running => {}
            state => {
                return Err(ServerError::InvalidState {
                    op: "wait on",
                    state,
                })
            }
        }

        let stop = self.stop.clone();
        tokio::select! {
            _ = interrupt() => info!("interrupt received, shutting down"),
            _ = stop.cancelled() => info!("stop requested, shutting down"),
        }
        self.stop().await
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Let a still-running serving task drain and release the port.
        self.shutdown.cancel();
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("addr", &self.addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Everything the serving task owns.
struct Serving<L> {
    listener: L,
    local_addr: SocketAddr,
    service: AppService,
    http: auto::Builder<TokioExecutor>,
    state: Arc<watch::Sender<ServerState>>,
    shutdown: CancellationToken,
    stop: CancellationToken,
    shutdown_timeout: Duration,
}

impl<L: Listener> Serving<L> {
    async fn run(self) -> Result<(), ServerError> {
        let Serving {
            mut listener,
            local_addr,
            service,
            http,
            state,
            shutdown,
            stop,
            shutdown_timeout,
        } = self;

        if transition(&state, ServerState::Starting, ServerState::Running) {
            info!(addr = %local_addr, "listening");
        }

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        let mut backoff = Backoff::default();

        let outcome: io::Result<()> = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        let service = TowerToHyperService::new(service.clone());
                        let conn = http
                            .serve_connection_with_upgrades(TokioIo::new(stream), service)
                            .into_owned();
                        let conn = graceful.watch(conn);
                        connections.spawn(async move {
                            if let Err(err) = conn.await {
                                debug!(%peer, error = %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => match AcceptError::classify(&err) {
                        AcceptError::Connection => {
                            debug!(error = %err, "accept failed for a single connection");
                        }
                        AcceptError::Temporary => {
                            let delay = backoff.next_delay();
                            warn!(error = %err, ?delay, "accept failed, retrying");
                            let stopping = tokio::select! {
                                _ = shutdown.cancelled() => true,
                                _ = tokio::time::sleep(delay) => false,
                            };
                            if stopping {
                                break Ok(());
                            }
                        }
                        AcceptError::Fatal => break Err(err),
                    },
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        };

        // No new connections from here on, even while draining.
        drop(listener);

        match outcome {
            Ok(()) => drain(graceful, connections, shutdown_timeout).await,
            Err(err) => {
                error!(addr = %local_addr, error = %err, "serving stopped unexpectedly");
                state.send_replace(ServerState::Failed);
                stop.cancel();
                connections.shutdown().await;
                Ok(())
            }
        }
    }
}

async fn drain(
    graceful: GracefulShutdown,
    mut connections: JoinSet<()>,
    timeout: Duration,
) -> Result<(), ServerError> {
    debug!(connections = connections.len(), "draining connections");
    match tokio::time::timeout(timeout, graceful.shutdown()).await {
        Ok(()) => {
            while connections.join_next().await.is_some() {}
            info!("server stopped");
            Ok(())
        }
        Err(_) => {
            warn!(
                remaining = connections.len(),
                ?timeout,
                "drain deadline passed, closing remaining connections"
            );
            connections.shutdown().await;
            Err(ServerError::ShutdownTimeout(timeout))
        }
    }
}

fn transition(state: &watch::Sender<ServerState>, from: ServerState, to: ServerState) -> bool {
    state.send_if_modified(|current| {
        if *current != from {
            return false;
        }
        *current = to;
        true
    })
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn interrupt() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
