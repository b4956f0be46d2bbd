//! Typed donation-record client over the RPC layer.

use crate::api::UserApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::rpc::{ClientState, RpcClient};
use async_trait::async_trait;
use tipjar_core::protocol::{RequestBody, ResponseBody};
use tipjar_core::types::{User, UNASSIGNED_ID};
use tracing::debug;

/// TCP implementation of [`UserApi`].
///
/// Wraps an [`RpcClient`] and translates between typed operations and
/// protocol envelopes. One client holds at most one session; all methods
/// take `&self`, so a connected client can be shared across tasks.
pub struct UserApiClient {
    rpc: RpcClient,
}

impl UserApiClient {
    /// New client for `config`. No I/O happens until [`connect`](Self::connect).
    pub fn new(config: ClientConfig) -> Self {
        Self {
            rpc: RpcClient::new(config),
        }
    }

    /// Establish the session to the configured endpoint.
    pub async fn connect(&self) -> Result<()> {
        self.rpc.connect().await
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ClientState {
        self.rpc.state().await
    }

    /// End the session and retire the client. Pending calls fail; safe
    /// to call repeatedly.
    pub async fn dispose(&self) {
        self.rpc.dispose().await
    }
}

impl Default for UserApiClient {
    /// Client for the standard loopback endpoint.
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

#[async_trait]
impl UserApi for UserApiClient {
    async fn get_all(&self) -> Result<Vec<User>> {
        debug!("fetching all records");
        match self.rpc.call(RequestBody::List).await?.body {
            ResponseBody::Users(users) => {
                debug!(count = users.len(), "records fetched");
                Ok(users)
            }
            ResponseBody::Error(message) => Err(ClientError::Server { message }),
            _ => Err(unexpected_reply("list")),
        }
    }

    async fn get(&self, id: i32) -> Result<User> {
        debug!(id, "fetching record");
        match self.rpc.call(RequestBody::Get { id }).await?.body {
            ResponseBody::Found(Some(user)) => Ok(user),
            ResponseBody::Found(None) => Err(ClientError::NotFound { id }),
            ResponseBody::Error(message) => Err(ClientError::Server { message }),
            _ => Err(unexpected_reply("get")),
        }
    }

    async fn add(&self, user: User) -> Result<bool> {
        // identity is assigned server-side; the request always carries
        // the unassigned id
        let user = user.with_id(UNASSIGNED_ID);
        debug!(name = %user.name, donate = user.donate, "adding record");
        match self.rpc.call(RequestBody::Add { user }).await?.body {
            ResponseBody::Accepted(accepted) => Ok(accepted),
            ResponseBody::Error(message) => Err(ClientError::Server { message }),
            _ => Err(unexpected_reply("add")),
        }
    }

    async fn update(&self, id: i32, user: User) -> Result<bool> {
        debug!(id, "updating record");
        match self.rpc.call(RequestBody::Update { id, user }).await?.body {
            ResponseBody::Accepted(accepted) => Ok(accepted),
            ResponseBody::Error(message) => Err(ClientError::Server { message }),
            _ => Err(unexpected_reply("update")),
        }
    }

    async fn delete(&self, id: i32) -> Result<bool> {
        debug!(id, "deleting record");
        match self.rpc.call(RequestBody::Delete { id }).await?.body {
            ResponseBody::Accepted(accepted) => Ok(accepted),
            ResponseBody::Error(message) => Err(ClientError::Server { message }),
            _ => Err(unexpected_reply("delete")),
        }
    }
}

fn unexpected_reply(op: &str) -> ClientError {
    ClientError::Server {
        message: format!("unexpected reply payload for {op}"),
    }
}
