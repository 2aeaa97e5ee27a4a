//! Network infrastructure for the hosting side.
//!
//! The [`Server`] owns one dedicated background thread running a
//! current-thread tokio runtime. That thread accepts driver connections
//! (one at a time; there is no fan-out) and drives each connection's
//! framed read/write loop. Decoded commands are handed to the registered
//! callbacks; the callbacks never run scene mutations themselves, they post
//! into the scheduler queue drained by the mutation context.
//!
//! Lifecycle: `Idle → Starting → Running → Ending → Idle`. `start` binds
//! the listening socket synchronously, so `Running` means "bound".
//! `end` cancels the background task cooperatively and joins the thread;
//! when it returns, no background activity remains. A cancelled connection
//! loop still shuts its socket down and fires the connection-ended callback
//! on the way out.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scenelink_core::protocol::codec::{decode_message, encode_message};
use scenelink_core::protocol::framing::{read_frame, write_frame};
use scenelink_core::protocol::messages::Message;

/// Errors that can occur in the host network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The listening socket could not be bound.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The background runtime could not be created.
    #[error("failed to start network runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Connection lifecycle states, shared by host and driver sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Starting,
    Running,
    Ending,
}

/// Sender half of one live connection.
///
/// `send` enqueues onto an unbounded channel drained by the network thread;
/// it never blocks and is safe to call from any context, including the
/// mutation context mid-command.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    /// Serializes and transmits `msg` from the network thread.
    ///
    /// Sending after the connection has ended is a logged no-op.
    pub fn send(&self, msg: Message) {
        if self.tx.send(msg).is_err() {
            warn!("send on an ended connection dropped");
        }
    }

    /// A detached handle/receiver pair.
    ///
    /// Embedders and tests use this to observe outbound traffic without a
    /// socket; the server builds its handles the same way.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// The three callbacks a server is wired with.
///
/// All of them run on the network thread; keep them cheap and post real
/// work onto the mutation context.
#[derive(Clone)]
pub struct ServerCallbacks {
    /// A decoded command arrived.
    pub on_command: Arc<dyn Fn(Message) + Send + Sync>,
    /// A connection was accepted; the handle sends back to this driver.
    pub on_connection_start: Arc<dyn Fn(ConnectionHandle) + Send + Sync>,
    /// The connection ended (peer close, fatal error, or cancellation).
    pub on_connection_end: Arc<dyn Fn() + Send + Sync>,
}

/// The hosting side's connection manager.
pub struct Server {
    callbacks: ServerCallbacks,
    state: Arc<Mutex<Lifecycle>>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(callbacks: ServerCallbacks) -> Self {
        Self {
            callbacks,
            state: Arc::new(Mutex::new(Lifecycle::Idle)),
            cancel: CancellationToken::new(),
            thread: None,
            local_addr: None,
        }
    }

    pub fn state(&self) -> Lifecycle {
        *self.state.lock().expect("lifecycle lock poisoned")
    }

    /// The bound listening address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds `addr` and starts the background accept loop.
    ///
    /// A no-op if the server is already `Starting` or `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the socket cannot be bound;
    /// the server is back in `Idle` afterwards.
    pub fn start(&mut self, addr: SocketAddr) -> Result<(), NetworkError> {
        {
            let mut state = self.state.lock().expect("lifecycle lock poisoned");
            match *state {
                Lifecycle::Starting | Lifecycle::Running => {
                    debug!("server already running; start ignored");
                    return Ok(());
                }
                Lifecycle::Ending => {
                    debug!("server still ending; start ignored");
                    return Ok(());
                }
                Lifecycle::Idle => *state = Lifecycle::Starting,
            }
        }
        // A previous run's thread (already finished) may still need reaping.
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        let listener = match std::net::TcpListener::bind(addr) {
            Ok(listener) => listener,
            Err(source) => {
                *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
                return Err(NetworkError::BindFailed { addr, source });
            }
        };
        if let Err(source) = listener.set_nonblocking(true) {
            *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
            return Err(NetworkError::BindFailed { addr, source });
        }
        self.local_addr = listener.local_addr().ok();

        let cancel = CancellationToken::new();
        self.cancel = cancel.clone();
        let callbacks = self.callbacks.clone();
        let state = Arc::clone(&self.state);

        let thread = std::thread::Builder::new()
            .name("scenelink-server".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!("failed to build server runtime: {err}");
                        *state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
                        return;
                    }
                };
                runtime.block_on(serve(listener, callbacks, cancel));
                info!("server ended");
            })
            .map_err(NetworkError::Runtime)?;
        self.thread = Some(thread);

        *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Running;
        Ok(())
    }

    /// Stops the server and blocks until the background thread has fully
    /// unwound. A no-op if `Idle`.
    ///
    /// Call this off the mutation context if that context must stay
    /// responsive during teardown.
    pub fn end(&mut self) {
        {
            let mut state = self.state.lock().expect("lifecycle lock poisoned");
            if *state == Lifecycle::Idle {
                return;
            }
            *state = Lifecycle::Ending;
        }
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("server thread panicked during shutdown");
            }
        }
        self.local_addr = None;
        *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.end();
    }
}

/// The accept loop: one connection at a time until cancelled.
async fn serve(
    listener: std::net::TcpListener,
    callbacks: ServerCallbacks,
    cancel: CancellationToken,
) {
    let listener = match tokio::net::TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to register listener with the runtime: {err}");
            return;
        }
    };
    match listener.local_addr() {
        Ok(addr) => info!("server started at {addr}"),
        Err(_) => info!("server started"),
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("server cancelled");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "connection started");
                    let (reader, writer) = stream.into_split();
                    run_connection(reader, writer, &callbacks, &cancel).await;
                    info!(%peer, "connection ended");
                }
                Err(err) => {
                    warn!("accept failed: {err}");
                }
            }
        }
    }
}

/// Drives one connection until close, error, or cancellation.
///
/// Shuts the socket down and fires `on_connection_end` on every exit path.
async fn run_connection(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    callbacks: &ServerCallbacks,
    cancel: &CancellationToken,
) {
    let (handle, mut outbound) = ConnectionHandle::channel();
    // Keep one sender alive locally so the outbound channel can never close
    // underneath the select loop.
    let _keep = handle.clone();
    (callbacks.on_connection_start)(handle);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("connection cancelled");
                break;
            }
            queued = outbound.recv() => {
                let Some(msg) = queued else { break };
                match encode_message(&msg) {
                    Ok(body) => {
                        if let Err(err) = write_frame(&mut writer, &body).await {
                            error!("send failed: {err}");
                            break;
                        }
                    }
                    Err(err) => error!("dropping unencodable message: {err}"),
                }
            }
            frame = read_frame(&mut reader) => match frame {
                Ok(Some(body)) => match decode_message(&body) {
                    Ok(msg) => {
                        debug!(id = msg.id(), "received command");
                        (callbacks.on_command)(msg);
                    }
                    // Malformed payloads are dropped; the session lives on.
                    Err(err) => warn!("dropping malformed frame: {err}"),
                },
                Ok(None) => {
                    info!("connection closed by peer");
                    break;
                }
                Err(err) => {
                    error!("connection lost: {err}");
                    break;
                }
            }
        }
    }

    if let Err(err) = tokio::io::AsyncWriteExt::shutdown(&mut writer).await {
        debug!("socket shutdown: {err}");
    }
    (callbacks.on_connection_end)();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_callbacks() -> ServerCallbacks {
        ServerCallbacks {
            on_command: Arc::new(|_| {}),
            on_connection_start: Arc::new(|_| {}),
            on_connection_end: Arc::new(|| {}),
        }
    }

    #[test]
    fn test_new_server_is_idle() {
        let server = Server::new(noop_callbacks());
        assert_eq!(server.state(), Lifecycle::Idle);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn test_start_binds_and_end_returns_to_idle() {
        let mut server = Server::new(noop_callbacks());
        server.start("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_eq!(server.state(), Lifecycle::Running);
        let addr = server.local_addr().expect("bound address");
        assert_ne!(addr.port(), 0);

        server.end();
        assert_eq!(server.state(), Lifecycle::Idle);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn test_start_twice_is_a_no_op() {
        let mut server = Server::new(noop_callbacks());
        server.start("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = server.local_addr().unwrap();
        server.start("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_eq!(server.local_addr(), Some(addr));
        server.end();
    }

    #[test]
    fn test_end_when_idle_is_a_no_op() {
        let mut server = Server::new(noop_callbacks());
        server.end();
        assert_eq!(server.state(), Lifecycle::Idle);
    }

    #[test]
    fn test_bind_failure_reports_and_returns_to_idle() {
        let mut first = Server::new(noop_callbacks());
        first.start("127.0.0.1:0".parse().unwrap()).unwrap();
        let taken = first.local_addr().unwrap();

        let mut second = Server::new(noop_callbacks());
        let err = second.start(taken).unwrap_err();
        assert!(matches!(err, NetworkError::BindFailed { .. }));
        assert_eq!(second.state(), Lifecycle::Idle);

        first.end();
    }

    #[test]
    fn test_server_can_restart_after_end() {
        let mut server = Server::new(noop_callbacks());
        server.start("127.0.0.1:0".parse().unwrap()).unwrap();
        server.end();
        server.start("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_eq!(server.state(), Lifecycle::Running);
        server.end();
    }

    #[test]
    fn test_handle_send_after_receiver_dropped_is_a_no_op() {
        let (handle, rx) = ConnectionHandle::channel();
        drop(rx);
        handle.send(Message::Clear);
    }
}
