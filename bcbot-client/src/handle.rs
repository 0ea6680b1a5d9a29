// ABOUTME: SessionHandle gives Send+Sync, clonable access to a live ChatSession.
// ABOUTME: A single worker task owns the session and executes requests one at a time.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ClientError, ClientResult};
use crate::traits::ChatSession;
use crate::types::{HistoryQuery, RoomParams, RoomQuery, RoomSummary};

const REQUEST_QUEUE_SIZE: usize = 32;

type Reply<T> = oneshot::Sender<ClientResult<T>>;

/// Requests sent from SessionHandle to the session worker
#[derive(Debug)]
pub enum Request {
    SendMessage {
        text: String,
        reply: Reply<()>,
    },
    SearchRooms {
        query: RoomQuery,
        reply: Reply<Vec<RoomSummary>>,
    },
    CreateRoom {
        params: RoomParams,
        reply: Reply<RoomSummary>,
    },
    JoinRoom {
        name: String,
        reply: Reply<RoomSummary>,
    },
    LeaveRoom {
        reply: Reply<()>,
    },
    QueryAccount {
        member_number: i64,
        reply: Reply<Value>,
    },
    CharacterData {
        member_number: i64,
        reply: Reply<Value>,
    },
    RoomMemberDetail {
        member_number: i64,
        reply: Reply<Value>,
    },
    ChatHistory {
        query: HistoryQuery,
        reply: Reply<Vec<Value>>,
    },
    Disconnect {
        reply: Reply<()>,
    },
}

/// Send + Sync handle to a connected session.
///
/// All clones feed the same worker, so calls against one session never
/// overlap even when issued concurrently. Once `close` has run, the worker
/// is gone and every call fails with `ClientError::ConnectionLost`.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
    name: &'static str,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("client", &self.name)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl SessionHandle {
    /// Move the session onto its own worker task and return a handle to it
    pub fn spawn(session: Box<dyn ChatSession>, name: &'static str) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        tokio::spawn(run_worker(session, rx, name));
        Self { tx, name }
    }

    /// Client name the session was opened with
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the worker has shut down
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn send_message(&self, text: &str) -> ClientResult<()> {
        let text = text.to_string();
        self.call(|reply| Request::SendMessage { text, reply }).await
    }

    pub async fn search_rooms(&self, query: &RoomQuery) -> ClientResult<Vec<RoomSummary>> {
        let query = query.clone();
        self.call(|reply| Request::SearchRooms { query, reply }).await
    }

    pub async fn create_room(&self, params: &RoomParams) -> ClientResult<RoomSummary> {
        let params = params.clone();
        self.call(|reply| Request::CreateRoom { params, reply }).await
    }

    pub async fn join_room(&self, name: &str) -> ClientResult<RoomSummary> {
        let name = name.to_string();
        self.call(|reply| Request::JoinRoom { name, reply }).await
    }

    pub async fn leave_room(&self) -> ClientResult<()> {
        self.call(|reply| Request::LeaveRoom { reply }).await
    }

    pub async fn query_account(&self, member_number: i64) -> ClientResult<Value> {
        self.call(|reply| Request::QueryAccount {
            member_number,
            reply,
        })
        .await
    }

    pub async fn get_character_data(&self, member_number: i64) -> ClientResult<Value> {
        self.call(|reply| Request::CharacterData {
            member_number,
            reply,
        })
        .await
    }

    pub async fn get_room_member_detail(&self, member_number: i64) -> ClientResult<Value> {
        self.call(|reply| Request::RoomMemberDetail {
            member_number,
            reply,
        })
        .await
    }

    pub async fn get_chat_history(&self, query: &HistoryQuery) -> ClientResult<Vec<Value>> {
        let query = query.clone();
        self.call(|reply| Request::ChatHistory { query, reply }).await
    }

    /// Disconnect the session and stop the worker.
    ///
    /// Requests already queued behind the disconnect fail with ConnectionLost.
    /// Closing an already closed handle succeeds.
    pub async fn close(&self) -> ClientResult<()> {
        if self.tx.is_closed() {
            return Ok(());
        }
        match self.call(|reply| Request::Disconnect { reply }).await {
            Err(ClientError::ConnectionLost(_)) => Ok(()),
            other => other,
        }
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> ClientResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| ClientError::ConnectionLost("session worker closed".to_string()))?;
        reply_rx.await.map_err(|_| {
            ClientError::ConnectionLost("session closed before replying".to_string())
        })?
    }
}

async fn run_worker(
    session: Box<dyn ChatSession>,
    mut rx: mpsc::Receiver<Request>,
    name: &'static str,
) {
    tracing::debug!(client = name, "session worker started");

    while let Some(request) = rx.recv().await {
        match request {
            Request::SendMessage { text, reply } => {
                let _ = reply.send(session.send_message(&text).await);
            }
            Request::SearchRooms { query, reply } => {
                let _ = reply.send(session.search_rooms(&query).await);
            }
            Request::CreateRoom { params, reply } => {
                let _ = reply.send(session.create_room(&params).await);
            }
            Request::JoinRoom { name, reply } => {
                let _ = reply.send(session.join_room(&name).await);
            }
            Request::LeaveRoom { reply } => {
                let _ = reply.send(session.leave_room().await);
            }
            Request::QueryAccount {
                member_number,
                reply,
            } => {
                let _ = reply.send(session.query_account(member_number).await);
            }
            Request::CharacterData {
                member_number,
                reply,
            } => {
                let _ = reply.send(session.get_character_data(member_number).await);
            }
            Request::RoomMemberDetail {
                member_number,
                reply,
            } => {
                let _ = reply.send(session.get_room_member_detail(member_number).await);
            }
            Request::ChatHistory { query, reply } => {
                let _ = reply.send(session.get_chat_history(&query).await);
            }
            Request::Disconnect { reply } => {
                let _ = reply.send(session.disconnect().await);
                break;
            }
        }
    }

    // Dropping rx drops the reply senders of anything still queued
    tracing::debug!(client = name, "session worker stopped");
}
