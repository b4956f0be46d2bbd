//! Tipjar TCP Client
//!
//! Async client for the tipjar donation service: one TCP session,
//! length-prefixed binary frames, correlated request/response exchange,
//! and a typed CRUD surface over donation records.
//!
//! # Features
//!
//! - **Session lifecycle**: connect, dispose, reconnect after a failure
//! - **Concurrent calls**: many tasks share one socket, responses are
//!   matched to callers by correlation id
//! - **Timeouts**: a per-call window, with session teardown after
//!   repeated consecutive timeouts
//! - **Typed operations**: `get_all`, `get`, `add`, `update`, `delete`
//!
//! # Example
//!
//! ```ignore
//! use tipjar_client::{ClientConfig, UserApi, UserApiClient};
//! use tipjar_core::types::User;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = UserApiClient::new(ClientConfig::new("tcp://127.0.0.1:5555"));
//!     client.connect().await?;
//!
//!     client.add(User::new("Alice", 500, "first donation")).await?;
//!     for user in client.get_all().await? {
//!         println!("{}: {} ({})", user.id, user.name, user.donate);
//!     }
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```

mod api;
mod client;
mod config;
mod connection;
mod error;
mod rpc;

// Re-export main types
pub use api::UserApi;
pub use client::UserApiClient;
pub use config::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_PORT};
pub use error::{ClientError, Result};
pub use rpc::{ClientState, RpcClient};
