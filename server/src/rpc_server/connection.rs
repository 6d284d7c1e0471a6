use tokio::sync::mpsc::{error::SendError, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};
use tokio_stream::StreamExt;
use tonic::Streaming;
use tracing::{debug, warn};

use super::error::RpcError;
use super::worker::{CommandSender, WorkerCommand};
use crate::proto::{ClientMessage, RoomId, ServerMessage};

pub type ConnectionId = u64;

type ChannelSendResult = Result<(), SendError<ServerMessage>>;

/// Session stream whose `join` hasn't been accepted by the worker yet.
/// Nothing is read from the stream until [`PendingConnection::accept`].
#[derive(Debug)]
pub struct PendingConnection {
    id: ConnectionId,
    room: RoomId,
    name: String,
    stream: Streaming<ClientMessage>,
    sender: UnboundedSender<ServerMessage>,
}

impl PendingConnection {
    pub fn new(
        id: ConnectionId,
        room: RoomId,
        name: String,
        stream: Streaming<ClientMessage>,
        sender: UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            room,
            name,
            stream,
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts forwarding client requests to the worker.
    pub fn accept(self, command_sender: CommandSender) -> Connection {
        let reader = spawn_reader(self.id, self.room, self.stream, command_sender);
        Connection {
            id: self.id,
            name: self.name,
            sender: self.sender,
            reader,
        }
    }

    /// Tells the client why it can't join. Dropping `self` ends the reply stream.
    pub fn reject(self, err: RpcError) {
        debug!(connection = self.id, room = %self.room, %err, "join rejected");
        if let Err(err) = self.sender.send(ServerMessage::from(&err)) {
            warn!(connection = self.id, %err, "failed to send error to client");
        }
    }
}

/// Reads client requests and hands them to the worker. Reports a disconnect
/// once the stream ends or fails.
fn spawn_reader(
    id: ConnectionId,
    room: RoomId,
    mut stream: Streaming<ClientMessage>,
    command_sender: CommandSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(res) = stream.next().await {
            match res {
                Ok(message) => {
                    let command = WorkerCommand::Request {
                        room: room.clone(),
                        connection: id,
                        message,
                    };
                    if let Err(err) = command_sender.send(Some(command)) {
                        warn!(connection = id, %err, "worker is gone, dropping request");
                        return;
                    }
                }
                Err(status) => {
                    debug!(connection = id, %status, "session stream failed");
                    break;
                }
            }
        }
        let command = WorkerCommand::Disconnect {
            room,
            connection: id,
        };
        if let Err(err) = command_sender.send(Some(command)) {
            warn!(connection = id, %err, "failed to report disconnect");
        }
    })
}

/// Accepted session stream bound to a participant by display name.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    name: String,
    sender: UnboundedSender<ServerMessage>,
    reader: JoinHandle<()>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notify(&self, message: ServerMessage) -> ChannelSendResult {
        self.sender.send(message)
    }

    /// Stops reading from the client. Used when the client leaves on its own.
    pub fn close(self) {
        self.reader.abort();
    }

    /// Waits for the reader once it has reported the disconnect.
    pub async fn wait(self) -> Result<(), JoinError> {
        self.reader.await
    }

    #[cfg(test)]
    pub(crate) fn detached(
        id: ConnectionId,
        name: &str,
        sender: UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sender,
            reader: tokio::spawn(async {}),
        }
    }
}
