//! Request and response envelopes for the tipjar wire protocol.

use crate::types::User;
use std::fmt;

/// Operation selector carried as the first byte of every envelope.
///
/// The numeric tags are part of the wire contract; changing them is a
/// protocol version break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    /// Fetch every record.
    List = 1,
    /// Fetch one record by id.
    Get = 2,
    /// Create a record; the server assigns the id.
    Add = 3,
    /// Replace a record in full.
    Update = 4,
    /// Remove a record by id.
    Delete = 5,
}

impl Op {
    /// Wire tag for this operation.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Operation for a wire tag, if the tag is known.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::List),
            2 => Some(Self::Get),
            3 => Some(Self::Add),
            4 => Some(Self::Update),
            5 => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Operation payload of one outstanding call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Fetch every record.
    List,
    /// Fetch one record.
    Get {
        /// Record identifier.
        id: i32,
    },
    /// Create a record; `user.id` is `0` on the wire.
    Add {
        /// Record to create.
        user: User,
    },
    /// Replace the record under `id` with `user`, all fields.
    Update {
        /// Record identifier.
        id: i32,
        /// Full replacement record.
        user: User,
    },
    /// Remove one record.
    Delete {
        /// Record identifier.
        id: i32,
    },
}

impl RequestBody {
    /// Operation this payload belongs to.
    pub fn op(&self) -> Op {
        match self {
            Self::List => Op::List,
            Self::Get { .. } => Op::Get,
            Self::Add { .. } => Op::Add,
            Self::Update { .. } => Op::Update,
            Self::Delete { .. } => Op::Delete,
        }
    }
}

/// One outstanding call: a correlation id and the operation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Token matching this request to its response.
    pub correlation: u32,
    /// Operation payload.
    pub body: RequestBody,
}

impl Request {
    /// Envelope for `body` under the given correlation id.
    pub fn new(correlation: u32, body: RequestBody) -> Self {
        Self { correlation, body }
    }

    /// Operation this request performs.
    pub fn op(&self) -> Op {
        self.body.op()
    }
}

/// Operation payload of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Every record on the server; reply to `List`.
    Users(Vec<User>),
    /// Reply to `Get`: the record, or `None` when the id is unknown.
    Found(Option<User>),
    /// Reply to `Add`/`Update`/`Delete`: whether the server accepted it.
    Accepted(bool),
    /// The server failed to execute the request.
    Error(String),
}

/// Reply to one request.
///
/// `op` and `body` must agree: `List` carries `Users`, `Get` carries
/// `Found`, the mutating operations carry `Accepted`, and `Error` may
/// answer any operation. The constructors uphold this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Correlation id echoed from the request.
    pub correlation: u32,
    /// Operation echoed from the request.
    pub op: Op,
    /// Operation payload.
    pub body: ResponseBody,
}

impl Response {
    /// `List` reply carrying every record.
    pub fn users(correlation: u32, users: Vec<User>) -> Self {
        Self {
            correlation,
            op: Op::List,
            body: ResponseBody::Users(users),
        }
    }

    /// `Get` reply carrying the record, or its absence.
    pub fn found(correlation: u32, user: Option<User>) -> Self {
        Self {
            correlation,
            op: Op::Get,
            body: ResponseBody::Found(user),
        }
    }

    /// `Add`/`Update`/`Delete` reply carrying the acceptance flag.
    pub fn accepted(correlation: u32, op: Op, accepted: bool) -> Self {
        Self {
            correlation,
            op,
            body: ResponseBody::Accepted(accepted),
        }
    }

    /// Failure reply for the given operation.
    pub fn error(correlation: u32, op: Op, message: impl Into<String>) -> Self {
        Self {
            correlation,
            op,
            body: ResponseBody::Error(message.into()),
        }
    }
}
