use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::connection::{ConnectionId, PendingConnection};
use super::error::RpcError;
use super::room::{Deadline, Room};
use super::storage::RoomStorage;
use super::RpcInnerResult;
use crate::config::RoomConfig;
use crate::proto::{ClientMessage, RoomId};

/// `None` asks the worker to stop.
pub type CommandSender = UnboundedSender<Option<WorkerCommand>>;
pub type CommandReceiver = UnboundedReceiver<Option<WorkerCommand>>;

#[derive(Debug)]
pub enum WorkerCommand {
    Join(PendingConnection),
    Request {
        room: RoomId,
        connection: ConnectionId,
        message: ClientMessage,
    },
    Disconnect {
        room: RoomId,
        connection: ConnectionId,
    },
    TurnTimeout {
        room: RoomId,
        generation: u64,
        version: u64,
    },
    ReconnectExpired {
        room: RoomId,
        name: String,
        epoch: u64,
    },
}

/// Single task applying every room command in arrival order.
/// Timers post their commands back through the same channel.
pub struct Worker {
    storage: RoomStorage,
    config: RoomConfig,
    command_sender: CommandSender,
    ct: CancellationToken,
}

impl Worker {
    pub fn spawn(
        storage: RoomStorage,
        config: RoomConfig,
        command_sender: CommandSender,
        command_receiver: CommandReceiver,
        ct: CancellationToken,
    ) -> JoinHandle<()> {
        let worker = Self {
            storage,
            config,
            command_sender,
            ct,
        };
        tokio::spawn(worker.run(command_receiver))
    }

    async fn run(self, mut command_receiver: CommandReceiver) {
        info!("room worker started");
        loop {
            let command = tokio::select! {
                _ = self.ct.cancelled() => break,
                command = command_receiver.recv() => command,
            };
            let Some(Some(command)) = command else {
                debug!("no more commands");
                break;
            };
            if let Err(err) = self.handle(command).await {
                error!(%err, "failed to handle command");
            }
        }
        if let Err(err) = self.storage.close_all() {
            error!(%err, "failed to close rooms");
        }
        info!("room worker stopped");
    }

    async fn handle(&self, command: WorkerCommand) -> RpcInnerResult<()> {
        match command {
            WorkerCommand::Join(pending) => self.join(pending),
            WorkerCommand::Request {
                room,
                connection,
                message,
            } => self.request(room, connection, message),
            WorkerCommand::Disconnect { room, connection } => {
                self.disconnect(room, connection).await
            }
            WorkerCommand::TurnTimeout {
                room,
                generation,
                version,
            } => {
                let mut guard = self.storage.lock()?;
                if let Some(room) = guard.get_mut(&room) {
                    room.turn_timeout(generation, version);
                }
                Ok(())
            }
            WorkerCommand::ReconnectExpired { room, name, epoch } => {
                let mut guard = self.storage.lock()?;
                let Some(entry) = guard.get_mut(&room) else {
                    return Ok(());
                };
                entry.reconnect_expired(&name, epoch);
                if entry.is_abandoned() {
                    info!(%room, "dropping abandoned room");
                    if let Some(abandoned) = guard.remove(&room) {
                        abandoned.close();
                    }
                }
                Ok(())
            }
        }
    }

    #[instrument(
        skip_all,
        fields(connection = pending.id(), room = %pending.room(), name = pending.name())
    )]
    fn join(&self, pending: PendingConnection) -> RpcInnerResult<()> {
        let mut guard = self.storage.lock()?;
        let room = guard
            .entry(pending.room().clone())
            .or_insert_with_key(|id| Room::new(id.clone()));
        match room.admit(pending.name()) {
            Ok(role) => {
                let connection = pending.accept(self.command_sender.clone());
                room.join(connection, role);
            }
            Err(err) => pending.reject(err),
        }
        Ok(())
    }

    #[instrument(skip(self, message), fields(request = message.name()))]
    fn request(
        &self,
        room_id: RoomId,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> RpcInnerResult<()> {
        let mut guard = self.storage.lock()?;
        let Some(room) = guard.get_mut(&room_id) else {
            warn!("request for a dropped room");
            return Ok(());
        };
        let result = match message {
            ClientMessage::Join { .. } => Err(RpcError::unexpected_request(
                "start-game, make-move, reset-game or leave",
                message.name(),
            )),
            ClientMessage::StartGame { kind } => room.start(connection, kind),
            ClientMessage::MakeMove { target } => room.make_move(connection, target),
            ClientMessage::ResetGame => room.reset(connection),
            ClientMessage::Leave => room.leave(connection).map(|conn| {
                conn.close();
                Vec::new()
            }),
        };
        match result {
            Ok(deadlines) => self.arm(&room_id, deadlines),
            Err(err) => room.notify_err(connection, &err),
        }
        if room.is_abandoned() {
            info!("dropping empty room");
            guard.remove(&room_id);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect(&self, room_id: RoomId, connection: ConnectionId) -> RpcInnerResult<()> {
        let closed = {
            let mut guard = self.storage.lock()?;
            let Some(room) = guard.get_mut(&room_id) else {
                return Ok(());
            };
            room.disconnect(connection)
        };
        // already gone when the participant left explicitly
        let Some((conn, deadlines)) = closed else {
            return Ok(());
        };
        self.arm(&room_id, deadlines);
        if let Err(err) = conn.wait().await {
            warn!(%err, "failed to join reader");
        }
        Ok(())
    }

    fn arm(&self, room: &RoomId, deadlines: Vec<Deadline>) {
        for deadline in deadlines {
            let (delay, command) = match deadline {
                Deadline::Turn {
                    generation,
                    version,
                } => {
                    let Some(delay) = self.config.turn_timeout() else {
                        continue;
                    };
                    let command = WorkerCommand::TurnTimeout {
                        room: room.clone(),
                        generation,
                        version,
                    };
                    (delay, command)
                }
                Deadline::Reconnect { name, epoch } => {
                    let command = WorkerCommand::ReconnectExpired {
                        room: room.clone(),
                        name,
                        epoch,
                    };
                    (self.config.reconnect_grace(), command)
                }
            };
            let sender = self.command_sender.clone();
            let ct = self.ct.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = ct.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        if let Err(err) = sender.send(Some(command)) {
                            debug!(%err, "timer fired after worker stopped");
                        }
                    }
                }
            });
        }
    }
}
