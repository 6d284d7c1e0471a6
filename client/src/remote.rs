use std::time::Duration;

use game_server::core::{GameKind, Target};
use game_server::proto::ClientMessage;
use tracing::{debug, info};

use crate::sync::{SessionSynchronizer, SyncError, SyncResult};
use crate::{ClientConfig, ConnectionEvent, RoomConnection};

const LEAVE_GRACE: Duration = Duration::from_secs(1);

/// Multiplayer game: a [`SessionSynchronizer`] fed by a [`RoomConnection`].
#[derive(Debug)]
pub struct RemoteGame {
    sync: SessionSynchronizer,
    connection: RoomConnection,
    gave_up: bool,
}

impl RemoteGame {
    pub fn join(
        address: impl Into<String>,
        room_id: impl Into<String>,
        display_name: impl Into<String>,
        config: ClientConfig,
    ) -> Self {
        let sync = SessionSynchronizer::new(room_id, display_name);
        let connection = RoomConnection::open(address, sync.join_message(), config);
        Self {
            sync,
            connection,
            gave_up: false,
        }
    }

    pub fn sync(&self) -> &SessionSynchronizer {
        &self.sync
    }

    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    /// Waits for the next connection event and folds it into the mirror.
    /// Returns `None` once the connection has given up or was closed.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.gave_up {
            return None;
        }
        let event = self.connection.next_event().await?;
        match &event {
            ConnectionEvent::Connected => self.sync.on_connected(),
            ConnectionEvent::Message(message) => self.sync.handle(message.clone()),
            ConnectionEvent::Malformed(error) => self.sync.on_malformed(error.clone()),
            ConnectionEvent::Disconnected(_) => self.sync.on_connection_lost(),
            ConnectionEvent::GaveUp => {
                self.sync.on_connection_lost();
                self.gave_up = true;
            }
        }
        Some(event)
    }

    pub fn submit_move(&self, target: Target) -> SyncResult<()> {
        let message = self.sync.request_move(target)?;
        self.send(message)
    }

    pub fn start(&self, kind: GameKind) -> SyncResult<()> {
        let message = self.sync.request_start(kind)?;
        self.send(message)
    }

    pub fn reset(&self) -> SyncResult<()> {
        let message = self.sync.request_reset()?;
        self.send(message)
    }

    /// Sends `leave` and waits for the server to close the stream before
    /// closing the connection.
    pub async fn leave(mut self) {
        info!(room = %self.sync.room_id(), "leaving room");
        if self.connection.send(ClientMessage::Leave).is_ok() {
            let closed = async {
                while let Some(event) = self.connection.next_event().await {
                    if matches!(
                        event,
                        ConnectionEvent::Disconnected(_) | ConnectionEvent::GaveUp
                    ) {
                        break;
                    }
                }
            };
            if tokio::time::timeout(LEAVE_GRACE, closed).await.is_err() {
                debug!("server did not close the stream in time");
            }
        }
        self.connection.close().await;
    }

    fn send(&self, message: ClientMessage) -> SyncResult<()> {
        self.connection
            .send(message)
            .map_err(|_| SyncError::NotConnected)
    }
}
