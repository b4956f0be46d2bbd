//! Shared test fixtures: an in-process tipjar server.

use anyhow::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tipjar_core::protocol::{Op, Request, RequestBody, Response};
use tipjar_core::types::User;
use tipjar_core::wire;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the server treats incoming requests.
#[derive(Debug, Clone)]
pub enum ServerMode {
    /// Speak the real protocol against an in-memory store.
    Store,
    /// Speak the protocol, but sleep before the first response.
    SlowFirst(Duration),
    /// Accept connections and read requests, never respond.
    Silent,
    /// Answer the first request with bytes that decode as nothing.
    Garbage,
    /// Answer every request with a valid envelope for the wrong
    /// operation.
    WrongOp,
    /// Close the connection upon the first request.
    CloseOnRequest,
    /// Buffer this many requests, then answer them newest-first.
    ReverseBatch(usize),
}

/// A real TCP server for one test, bound to an ephemeral loopback port.
pub struct TestServer {
    addr: SocketAddr,
    store: Arc<Mutex<HashMap<i32, User>>>,
    next_id: Arc<AtomicI32>,
}

impl TestServer {
    /// Server speaking the full protocol against an empty store.
    pub async fn start() -> Result<Self> {
        Self::start_with(ServerMode::Store).await
    }

    /// Server with the given behavior.
    pub async fn start_with(mode: ServerMode) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let store = Arc::new(Mutex::new(HashMap::new()));
        let next_id = Arc::new(AtomicI32::new(1));

        let accept_store = Arc::clone(&store);
        let accept_next_id = Arc::clone(&next_id);
        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                tokio::spawn(handle_connection(
                    socket,
                    mode.clone(),
                    Arc::clone(&accept_store),
                    Arc::clone(&accept_next_id),
                ));
            }
        });

        Ok(Self {
            addr,
            store,
            next_id,
        })
    }

    /// Endpoint URL for client configuration.
    pub fn endpoint(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    /// Put a record in the store directly, bypassing the protocol.
    pub fn seed(&self, user: User) {
        let id = user.id;
        self.store.lock().unwrap().insert(id, user);
        // keep server-assigned ids clear of seeded ones
        self.next_id.fetch_max(id + 1, Ordering::Relaxed);
    }

    /// Read a record from the store directly, bypassing the protocol.
    pub fn record(&self, id: i32) -> Option<User> {
        self.store.lock().unwrap().get(&id).cloned()
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.store.lock().unwrap().len()
    }
}

/// An endpoint that nothing is listening on.
pub async fn dead_endpoint() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("tcp://{addr}"))
}

pub async fn read_frame(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    socket.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    let mut payload = vec![0u8; len];
    socket.read_exact(&mut payload).await?;
    Ok(payload)
}

pub async fn write_frame(socket: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    socket.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    socket.write_all(payload).await?;
    socket.flush().await
}

async fn handle_connection(
    mut socket: TcpStream,
    mode: ServerMode,
    store: Arc<Mutex<HashMap<i32, User>>>,
    next_id: Arc<AtomicI32>,
) {
    match mode {
        ServerMode::Store => serve_store(&mut socket, &store, &next_id, None).await,
        ServerMode::SlowFirst(delay) => {
            serve_store(&mut socket, &store, &next_id, Some(delay)).await;
        }
        ServerMode::Silent => loop {
            if read_frame(&mut socket).await.is_err() {
                return;
            }
        },
        ServerMode::Garbage => {
            if read_frame(&mut socket).await.is_err() {
                return;
            }
            let _ = write_frame(&mut socket, &[0xFF; 8]).await;
            // hold the socket open until the client reacts and closes
            let mut probe = [0u8; 1];
            let _ = socket.read(&mut probe).await;
        }
        ServerMode::WrongOp => loop {
            let payload = match read_frame(&mut socket).await {
                Ok(payload) => payload,
                Err(_) => return,
            };
            let request = match wire::decode_request(&payload) {
                Ok(request) => request,
                Err(_) => return,
            };
            let wrong = match request.op() {
                Op::Delete => Op::Update,
                _ => Op::Delete,
            };
            let response = Response::accepted(request.correlation, wrong, true);
            if write_frame(&mut socket, &wire::encode_response(&response))
                .await
                .is_err()
            {
                return;
            }
        },
        ServerMode::CloseOnRequest => {
            let _ = read_frame(&mut socket).await;
            // dropping the socket sends the close
        }
        ServerMode::ReverseBatch(batch_size) => {
            let mut batch = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                let payload = match read_frame(&mut socket).await {
                    Ok(payload) => payload,
                    Err(_) => return,
                };
                let request = match wire::decode_request(&payload) {
                    Ok(request) => request,
                    Err(_) => return,
                };
                batch.push(request);
            }
            for request in batch.iter().rev() {
                let response = apply(request, &store, &next_id);
                if write_frame(&mut socket, &wire::encode_response(&response))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let mut probe = [0u8; 1];
            let _ = socket.read(&mut probe).await;
        }
    }
}

async fn serve_store(
    socket: &mut TcpStream,
    store: &Mutex<HashMap<i32, User>>,
    next_id: &AtomicI32,
    mut first_delay: Option<Duration>,
) {
    loop {
        let payload = match read_frame(socket).await {
            Ok(payload) => payload,
            Err(_) => return,
        };
        let request = match wire::decode_request(&payload) {
            Ok(request) => request,
            Err(_) => return,
        };
        if let Some(pause) = first_delay.take() {
            tokio::time::sleep(pause).await;
        }
        let response = apply(&request, store, next_id);
        if write_frame(socket, &wire::encode_response(&response))
            .await
            .is_err()
        {
            return;
        }
    }
}

fn apply(request: &Request, store: &Mutex<HashMap<i32, User>>, next_id: &AtomicI32) -> Response {
    let correlation = request.correlation;
    match &request.body {
        RequestBody::List => {
            let mut users: Vec<User> = store.lock().unwrap().values().cloned().collect();
            users.sort_by_key(|u| u.id);
            Response::users(correlation, users)
        }
        RequestBody::Get { id } => Response::found(correlation, store.lock().unwrap().get(id).cloned()),
        RequestBody::Add { user } => {
            if user.id != 0 {
                return Response::error(correlation, Op::Add, "id must be unassigned");
            }
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            store.lock().unwrap().insert(id, user.clone().with_id(id));
            Response::accepted(correlation, Op::Add, true)
        }
        RequestBody::Update { id, user } => {
            let accepted = match store.lock().unwrap().entry(*id) {
                Entry::Occupied(mut entry) => {
                    entry.insert(user.clone().with_id(*id));
                    true
                }
                Entry::Vacant(_) => false,
            };
            Response::accepted(correlation, Op::Update, accepted)
        }
        RequestBody::Delete { id } => {
            let accepted = store.lock().unwrap().remove(id).is_some();
            Response::accepted(correlation, Op::Delete, accepted)
        }
    }
}
