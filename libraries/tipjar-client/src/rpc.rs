//! Correlated request/response exchange over one connection.
//!
//! Any number of tasks may issue calls concurrently. Writes are
//! serialized by the connection; a single reader loop owns every read
//! and hands each response to the caller registered under its
//! correlation id. A call that times out abandons its registration, so
//! a response arriving after the deadline is discarded on receipt.

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tipjar_core::protocol::{Request, RequestBody, Response};
use tipjar_core::wire;
use tokio::sync::{oneshot, watch, RwLock};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

/// Lifecycle of an [`RpcClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No session. `connect` may be called.
    Disconnected,
    /// A session is established and calls may be issued.
    Connected,
    /// Terminal. The client cannot be used again.
    Disposed,
}

enum SessionSlot {
    Disconnected,
    Connected(Arc<Session>),
    Disposed,
}

type ResponseSender = oneshot::Sender<Result<Response>>;

/// State shared between callers and the reader loop for one session.
struct Session {
    connection: Connection,
    pending: Mutex<HashMap<u32, ResponseSender>>,
    next_correlation: AtomicU32,
    timeout_streak: AtomicU32,
    dead: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Removes a call's pending-response registration when the call future
/// is dropped, completed or not.
struct PendingGuard<'a> {
    session: &'a Session,
    correlation: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // no-op when the reader loop or a teardown already claimed the
        // entry
        self.session
            .pending
            .lock()
            .unwrap()
            .remove(&self.correlation);
    }
}

impl Session {
    async fn call(&self, body: RequestBody, config: &ClientConfig) -> Result<Response> {
        if self.dead.load(Ordering::Acquire) {
            return Err(ClientError::ConnectionClosed);
        }

        let correlation = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        let op = body.op();
        let request = Request::new(correlation, body);
        let payload = wire::encode_request(&request);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(correlation, tx);
        let _guard = PendingGuard {
            session: self,
            correlation,
        };

        // the session may have died between the liveness check and the
        // registration; a teardown cannot drain an entry that did not
        // exist yet
        if self.dead.load(Ordering::Acquire) {
            return Err(ClientError::ConnectionClosed);
        }

        // one deadline covers the whole exchange, send included
        let deadline = Instant::now() + config.call_timeout;

        debug!(op = %op, correlation, "call issued");
        match timeout_at(deadline, self.connection.send_frame(&payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(op = %op, correlation, error = %e, "send failed, tearing down session");
                self.close(|| ClientError::ConnectionClosed).await;
                return Err(e);
            }
            Err(_) => {
                // the frame may be half-written; the stream cannot be
                // trusted after an abandoned write
                warn!(op = %op, correlation, "send stalled past the call window, tearing down session");
                self.close(|| ClientError::ConnectionClosed).await;
                return Err(ClientError::Timeout {
                    after: config.call_timeout,
                });
            }
        }

        match timeout_at(deadline, rx).await {
            Ok(Ok(result)) => {
                let response = result?;
                if response.op == op {
                    Ok(response)
                } else {
                    warn!(
                        expected = %op,
                        received = %response.op,
                        correlation,
                        "response operation does not match the request"
                    );
                    Err(ClientError::Server {
                        message: format!(
                            "response operation {} does not match request operation {op}",
                            response.op
                        ),
                    })
                }
            }
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                let streak = self.timeout_streak.fetch_add(1, Ordering::AcqRel) + 1;
                warn!(op = %op, correlation, streak, "call timed out");
                if streak >= config.max_consecutive_timeouts {
                    warn!(streak, "too many consecutive timeouts, tearing down session");
                    self.close(|| ClientError::ConnectionClosed).await;
                }
                Err(ClientError::Timeout {
                    after: config.call_timeout,
                })
            }
        }
    }

    /// Hand a decoded response to whoever is waiting on its correlation
    /// id. Responses nobody waits for are dropped.
    fn dispatch(&self, response: Response) {
        let waiter = self.pending.lock().unwrap().remove(&response.correlation);
        match waiter {
            Some(tx) => {
                self.timeout_streak.store(0, Ordering::Relaxed);
                debug!(correlation = response.correlation, op = %response.op, "response dispatched");
                if tx.send(Ok(response)).is_err() {
                    trace!("waiter gone before delivery");
                }
            }
            None => {
                trace!(correlation = response.correlation, "late response discarded");
            }
        }
    }

    /// Tear the session down: mark it dead, stop the reader loop, close
    /// the socket, and fail every pending call with `error()`.
    ///
    /// Safe to call from several paths; every step tolerates repetition.
    async fn close<F>(&self, error: F)
    where
        F: Fn() -> ClientError,
    {
        self.dead.store(true, Ordering::Release);
        let _ = self.shutdown.send(true);
        self.connection.shutdown().await;

        let waiters: Vec<_> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().map(|(_, tx)| tx).collect()
        };
        if !waiters.is_empty() {
            debug!(count = waiters.len(), "failing pending calls");
        }
        for tx in waiters {
            let _ = tx.send(Err(error()));
        }
    }
}

/// Owns every read on the session's socket.
///
/// Exits when the session is disposed or the stream ends; a read or
/// decode failure tears the whole session down, since nothing after a
/// broken frame can be framed reliably.
async fn reader_loop(session: Arc<Session>, mut shutdown: watch::Receiver<bool>) {
    enum CloseCause {
        PeerClosed,
        Malformed(wire::DecodeError),
        Io(std::io::Error),
    }

    let cause = loop {
        tokio::select! {
            // a local teardown also closes the socket; prefer reporting
            // the teardown over the read error it causes
            biased;
            _ = shutdown.changed() => {
                trace!("reader loop stopping, session closed locally");
                return;
            }
            frame = session.connection.recv_frame() => match frame {
                Ok(payload) => match wire::decode_response(&payload) {
                    Ok(response) => session.dispatch(response),
                    Err(e) => break CloseCause::Malformed(e),
                },
                Err(ClientError::ConnectionClosed) => break CloseCause::PeerClosed,
                Err(ClientError::MalformedFrame(e)) => break CloseCause::Malformed(e),
                Err(ClientError::Connection(e)) => break CloseCause::Io(e),
                Err(other) => break CloseCause::Io(std::io::Error::other(other.to_string())),
            },
        }
    };

    match cause {
        CloseCause::PeerClosed => {
            warn!("server closed the connection");
            session.close(|| ClientError::ConnectionClosed).await;
        }
        CloseCause::Malformed(e) => {
            warn!(error = %e, "malformed frame, tearing down session");
            session.close(|| ClientError::MalformedFrame(e.clone())).await;
        }
        CloseCause::Io(e) => {
            warn!(error = %e, "read failed, tearing down session");
            let kind = e.kind();
            let text = e.to_string();
            session
                .close(|| ClientError::Connection(std::io::Error::new(kind, text.clone())))
                .await;
        }
    }
}

/// Request/response client over one TCP session.
///
/// Starts out [`Disconnected`](ClientState::Disconnected). `connect`
/// establishes a session; a failed session drops the client back to
/// `Disconnected` so it can be connected again; `dispose` is terminal.
pub struct RpcClient {
    config: ClientConfig,
    slot: RwLock<SessionSlot>,
}

impl RpcClient {
    /// New client for `config`. Performs no I/O.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            slot: RwLock::new(SessionSlot::Disconnected),
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current lifecycle state.
    ///
    /// A session that failed reads back as
    /// [`Disconnected`](ClientState::Disconnected).
    pub async fn state(&self) -> ClientState {
        match &*self.slot.read().await {
            SessionSlot::Disconnected => ClientState::Disconnected,
            SessionSlot::Connected(session) if session.dead.load(Ordering::Acquire) => {
                ClientState::Disconnected
            }
            SessionSlot::Connected(_) => ClientState::Connected,
            SessionSlot::Disposed => ClientState::Disposed,
        }
    }

    /// Establish the TCP session and start the reader loop.
    ///
    /// Valid from `Disconnected` only; connecting an already-connected
    /// client fails with [`ClientError::InvalidState`], a disposed one
    /// likewise. The endpoint is validated before any I/O happens.
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.slot.write().await;
        match &*slot {
            SessionSlot::Disposed => {
                return Err(ClientError::InvalidState("client is disposed"));
            }
            SessionSlot::Connected(session) if !session.dead.load(Ordering::Acquire) => {
                return Err(ClientError::InvalidState("already connected"));
            }
            _ => {}
        }

        let (host, port) = self.config.endpoint_parts()?;
        let connection = Connection::open(&host, port, self.config.connect_timeout).await?;
        debug!(peer = %connection.peer(), endpoint = %self.config.endpoint, "session established");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = Arc::new(Session {
            connection,
            pending: Mutex::new(HashMap::new()),
            next_correlation: AtomicU32::new(1),
            timeout_streak: AtomicU32::new(0),
            dead: AtomicBool::new(false),
            shutdown: shutdown_tx,
        });
        tokio::spawn(reader_loop(Arc::clone(&session), shutdown_rx));

        *slot = SessionSlot::Connected(session);
        Ok(())
    }

    /// Issue one request and wait for its response.
    ///
    /// Concurrent calls share the session; each response reaches the
    /// call that issued its correlation id, whatever order the server
    /// answers in.
    pub async fn call(&self, body: RequestBody) -> Result<Response> {
        let session = {
            let slot = self.slot.read().await;
            match &*slot {
                SessionSlot::Disconnected => {
                    return Err(ClientError::InvalidState("not connected"));
                }
                SessionSlot::Disposed => {
                    return Err(ClientError::InvalidState("client is disposed"));
                }
                SessionSlot::Connected(session) => {
                    if session.dead.load(Ordering::Acquire) {
                        return Err(ClientError::InvalidState("not connected"));
                    }
                    Arc::clone(session)
                }
            }
        };
        session.call(body, &self.config).await
    }

    /// End the session and retire the client.
    ///
    /// Pending calls fail with [`ClientError::ConnectionClosed`]. Safe
    /// to call repeatedly; after the first call every operation fails
    /// with [`ClientError::InvalidState`].
    pub async fn dispose(&self) {
        let previous = {
            let mut slot = self.slot.write().await;
            std::mem::replace(&mut *slot, SessionSlot::Disposed)
        };
        if let SessionSlot::Connected(session) = previous {
            debug!("disposing client");
            session.close(|| ClientError::ConnectionClosed).await;
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        // best effort without an executor: stop the reader loop and let
        // the socket close when the session drops
        if let SessionSlot::Connected(session) = &*self.slot.get_mut() {
            session.dead.store(true, Ordering::Release);
            let _ = session.shutdown.send(true);
        }
    }
}
