//! Network infrastructure for the driving side.
//!
//! [`DriverConnection`] mirrors the host's server: the same lifecycle state
//! machine (`Idle → Starting → Running → Ending → Idle`), the same
//! dedicated background thread owning a current-thread runtime, the same
//! framed select loop. The differences are direction (it connects instead
//! of accepting) and that there is exactly one connection per start; when
//! it ends, the connection is back in `Idle`. Reconnecting is the
//! embedder's policy, not this layer's.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scenelink_core::protocol::codec::{decode_message, encode_message};
use scenelink_core::protocol::framing::{read_frame, write_frame};
use scenelink_core::protocol::messages::Message;

/// Errors that can occur in the driver network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// TCP connection to the host failed.
    #[error("failed to connect to host at {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The background runtime could not be created.
    #[error("failed to start network runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Starting,
    Running,
    Ending,
}

/// Callbacks a driver connection is wired with.
///
/// All of them run on the network thread.
#[derive(Clone)]
pub struct DriverCallbacks {
    /// A decoded host event arrived.
    pub on_event: Arc<dyn Fn(Message) + Send + Sync>,
    /// The TCP connection was established.
    pub on_connected: Arc<dyn Fn() + Send + Sync>,
    /// The connection ended (peer close, fatal error, or cancellation).
    pub on_disconnected: Arc<dyn Fn() + Send + Sync>,
}

type OutboundSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>;

/// Cheap cloneable sender bound to a [`DriverConnection`].
///
/// Valid before and after the connection runs: sending while disconnected
/// is a logged no-op ("no connection").
#[derive(Clone)]
pub struct DriverHandle {
    slot: OutboundSlot,
}

impl DriverHandle {
    /// Serializes and transmits `msg` from the network thread.
    pub fn send(&self, msg: Message) {
        let slot = self.slot.lock().expect("outbound slot lock poisoned");
        match slot.as_ref() {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    warn!("send on an ended connection dropped");
                }
            }
            None => warn!("no connection; message dropped"),
        }
    }

    #[cfg(test)]
    pub(crate) fn bound(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        }
    }
}

/// The driving side's connection manager.
pub struct DriverConnection {
    slot: OutboundSlot,
    state: Arc<Mutex<Lifecycle>>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl Default for DriverConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverConnection {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(Lifecycle::Idle)),
            cancel: CancellationToken::new(),
            thread: None,
        }
    }

    pub fn state(&self) -> Lifecycle {
        *self.state.lock().expect("lifecycle lock poisoned")
    }

    /// A sender bound to this connection's outbound queue.
    pub fn handle(&self) -> DriverHandle {
        DriverHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Connects to `addr` and starts the background read/write loop.
    ///
    /// The socket is connected synchronously: when this returns `Ok`, the
    /// connection is `Running` and `on_connected` has been scheduled. A
    /// no-op if already `Starting` or `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ConnectFailed`] if the host is unreachable;
    /// the connection is back in `Idle` afterwards.
    pub fn start(
        &mut self,
        addr: SocketAddr,
        callbacks: DriverCallbacks,
    ) -> Result<(), NetworkError> {
        {
            let mut state = self.state.lock().expect("lifecycle lock poisoned");
            match *state {
                Lifecycle::Starting | Lifecycle::Running => {
                    debug!("connection already running; start ignored");
                    return Ok(());
                }
                Lifecycle::Ending => {
                    debug!("connection still ending; start ignored");
                    return Ok(());
                }
                Lifecycle::Idle => *state = Lifecycle::Starting,
            }
        }
        // Reap a previous run's finished thread before replacing it.
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        let stream = match std::net::TcpStream::connect(addr) {
            Ok(stream) => stream,
            Err(source) => {
                *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
                return Err(NetworkError::ConnectFailed { addr, source });
            }
        };
        if let Err(source) = stream.set_nonblocking(true) {
            *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
            return Err(NetworkError::ConnectFailed { addr, source });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.slot.lock().expect("outbound slot lock poisoned") = Some(tx);

        let cancel = CancellationToken::new();
        self.cancel = cancel.clone();
        let slot = Arc::clone(&self.slot);
        let state = Arc::clone(&self.state);

        let thread = std::thread::Builder::new()
            .name("scenelink-driver".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!("failed to build driver runtime: {err}");
                        *slot.lock().expect("outbound slot lock poisoned") = None;
                        *state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
                        return;
                    }
                };
                runtime.block_on(run(stream, rx, callbacks, cancel));
                // The connection is over; further sends report "no connection".
                *slot.lock().expect("outbound slot lock poisoned") = None;
                *state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
                info!("driver connection ended");
            })
            .map_err(NetworkError::Runtime)?;
        self.thread = Some(thread);

        *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Running;
        Ok(())
    }

    /// Sends `msg` through this connection. Non-blocking, any thread.
    pub fn send(&self, msg: Message) {
        self.handle().send(msg);
    }

    /// Disconnects and blocks until the background thread has fully
    /// unwound. A no-op if nothing is running.
    pub fn end(&mut self) {
        {
            let mut state = self.state.lock().expect("lifecycle lock poisoned");
            if *state == Lifecycle::Idle && self.thread.is_none() {
                return;
            }
            if *state != Lifecycle::Idle {
                *state = Lifecycle::Ending;
            }
        }
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("driver network thread panicked during shutdown");
            }
        }
        *self.slot.lock().expect("outbound slot lock poisoned") = None;
        *self.state.lock().expect("lifecycle lock poisoned") = Lifecycle::Idle;
    }
}

impl Drop for DriverConnection {
    fn drop(&mut self) {
        self.end();
    }
}

/// Drives the connection until close, error, or cancellation.
async fn run(
    stream: std::net::TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    callbacks: DriverCallbacks,
    cancel: CancellationToken,
) {
    let stream = match tokio::net::TcpStream::from_std(stream) {
        Ok(stream) => stream,
        Err(err) => {
            error!("failed to register stream with the runtime: {err}");
            (callbacks.on_disconnected)();
            return;
        }
    };
    let (mut reader, mut writer) = stream.into_split();
    info!("connection started");
    (callbacks.on_connected)();

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
                        debug!(id = msg.id(), "received event");
                        (callbacks.on_event)(msg);
                    }
                    Err(err) => warn!("dropping malformed frame: {err}"),
                },
                Ok(None) => {
                    info!("connection closed by host");
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
    (callbacks.on_disconnected)();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop_callbacks() -> DriverCallbacks {
        DriverCallbacks {
            on_event: Arc::new(|_| {}),
            on_connected: Arc::new(|| {}),
            on_disconnected: Arc::new(|| {}),
        }
    }

    /// Reads one frame body from a blocking stream.
    fn read_frame_blocking(stream: &mut std::net::TcpStream) -> Option<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).ok()?;
        let mut body = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        stream.read_exact(&mut body).ok()?;
        Some(body)
    }

    #[test]
    fn test_new_connection_is_idle() {
        let connection = DriverConnection::new();
        assert_eq!(connection.state(), Lifecycle::Idle);
    }

    #[test]
    fn test_connect_to_unreachable_host_fails() {
        let mut connection = DriverConnection::new();
        // Port 1 on loopback refuses immediately.
        let err = connection
            .start("127.0.0.1:1".parse().unwrap(), noop_callbacks())
            .unwrap_err();
        assert!(matches!(err, NetworkError::ConnectFailed { .. }));
        assert_eq!(connection.state(), Lifecycle::Idle);
    }

    #[test]
    fn test_send_without_connection_is_a_no_op() {
        let connection = DriverConnection::new();
        connection.send(Message::Clear);
        assert_eq!(connection.state(), Lifecycle::Idle);
    }

    #[test]
    fn test_connect_send_and_end_against_a_fake_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let connected = Arc::new(AtomicUsize::new(0));
        let disconnected = Arc::new(AtomicUsize::new(0));
        let callbacks = DriverCallbacks {
            on_event: Arc::new(|_| {}),
            on_connected: {
                let connected = Arc::clone(&connected);
                Arc::new(move || {
                    connected.fetch_add(1, Ordering::SeqCst);
                })
            },
            on_disconnected: {
                let disconnected = Arc::clone(&disconnected);
                Arc::new(move || {
                    disconnected.fetch_add(1, Ordering::SeqCst);
                })
            },
        };

        let mut connection = DriverConnection::new();
        connection.start(addr, callbacks).unwrap();
        assert_eq!(connection.state(), Lifecycle::Running);

        let (mut host_side, _) = listener.accept().unwrap();
        connection.send(Message::Clear);

        let body = read_frame_blocking(&mut host_side).expect("one frame");
        assert_eq!(decode_message(&body).unwrap(), Message::Clear);

        connection.end();
        assert_eq!(connection.state(), Lifecycle::Idle);
        assert_eq!(connected.load(Ordering::SeqCst), 1);
        // Cancellation still fires the disconnect callback.
        assert_eq!(disconnected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_reach_the_callback() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let (seen_tx, seen_rx) = std::sync::mpsc::channel();
        let callbacks = DriverCallbacks {
            on_event: Arc::new(move |msg| {
                let _ = seen_tx.send(msg);
            }),
            on_connected: Arc::new(|| {}),
            on_disconnected: Arc::new(|| {}),
        };

        let mut connection = DriverConnection::new();
        connection.start(addr, callbacks).unwrap();
        let (mut host_side, _) = listener.accept().unwrap();

        let body = encode_message(&Message::ReceivedBuffer(
            scenelink_core::protocol::messages::ReceivedBuffer {
                name: "sl-x".into(),
            },
        ))
        .unwrap();
        use std::io::Write;
        host_side
            .write_all(&(body.len() as u32).to_be_bytes())
            .unwrap();
        host_side.write_all(&body).unwrap();

        let msg = seen_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("event within 5s");
        assert_eq!(msg.id(), "received_buffer");

        connection.end();
    }

    #[test]
    fn test_host_close_returns_connection_to_idle() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let (ended_tx, ended_rx) = std::sync::mpsc::channel();
        let callbacks = DriverCallbacks {
            on_event: Arc::new(|_| {}),
            on_connected: Arc::new(|| {}),
            on_disconnected: Arc::new(move || {
                let _ = ended_tx.send(());
            }),
        };

        let mut connection = DriverConnection::new();
        connection.start(addr, callbacks).unwrap();
        let (host_side, _) = listener.accept().unwrap();
        drop(host_side);

        ended_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("disconnect within 5s");
        // The background thread winds down on its own; end() then reaps it.
        connection.end();
        assert_eq!(connection.state(), Lifecycle::Idle);
    }

    #[test]
    fn test_end_when_idle_is_a_no_op() {
        let mut connection = DriverConnection::new();
        connection.end();
        assert_eq!(connection.state(), Lifecycle::Idle);
    }

    #[test]
    fn test_connection_can_restart_after_end() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut connection = DriverConnection::new();
        connection.start(addr, noop_callbacks()).unwrap();
        let _first = listener.accept().unwrap();
        connection.end();

        connection.start(addr, noop_callbacks()).unwrap();
        let _second = listener.accept().unwrap();
        assert_eq!(connection.state(), Lifecycle::Running);
        connection.end();
    }
}
