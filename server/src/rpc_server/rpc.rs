use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, instrument};

use super::connection::PendingConnection;
use super::error::RpcError;
use super::storage::RoomStorage;
use super::worker::{CommandSender, Worker, WorkerCommand};
use super::RpcResult;
use crate::config::RoomConfig;
use crate::proto::{room_server::Room, ClientMessage, GetRoomRequest, RoomInfo, ServerFrame};

/// `grid_games.Room` service. Requests are forwarded to a single worker
/// started with [`RoomImpl::start_worker`].
#[derive(Debug)]
pub struct RoomImpl {
    storage: RoomStorage,
    config: RoomConfig,
    command_sender: CommandSender,
    command_receiver: Option<UnboundedReceiver<Option<WorkerCommand>>>,
    next_connection: AtomicU64,
}

impl Default for RoomImpl {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl Drop for RoomImpl {
    fn drop(&mut self) {
        // the worker may already be gone
        let _ = self.command_sender.send(None);
    }
}

impl RoomImpl {
    pub fn new(config: RoomConfig) -> Self {
        let (command_sender, command_receiver) = unbounded_channel();
        Self {
            storage: RoomStorage::default(),
            config,
            command_sender,
            command_receiver: Some(command_receiver),
            next_connection: AtomicU64::new(1),
        }
    }

    /// Spawns the room worker. Only the first call starts anything; later calls
    /// return an already finished handle.
    pub fn start_worker(&mut self, ct: CancellationToken) -> JoinHandle<()> {
        let Some(command_receiver) = self.command_receiver.take() else {
            return tokio::spawn(async {});
        };
        Worker::spawn(
            self.storage.clone(),
            self.config,
            self.command_sender.clone(),
            command_receiver,
            ct,
        )
    }
}

#[tonic::async_trait]
impl Room for RoomImpl {
    type SessionStream =
        Pin<Box<dyn Stream<Item = Result<ServerFrame, Status>> + Send + 'static>>;

    #[instrument(skip_all)]
    async fn session(
        &self,
        request: Request<Streaming<ClientMessage>>,
    ) -> RpcResult<Self::SessionStream> {
        let mut stream = request.into_inner();
        let first = stream.message().await?.ok_or(RpcError::EmptyRequest)?;
        let (room_id, display_name) = match first {
            ClientMessage::Join {
                room_id,
                display_name,
            } => (room_id, display_name),
            other => return Err(RpcError::unexpected_request("join", other.name()).into()),
        };
        let display_name = display_name.trim().to_owned();
        if display_name.is_empty() {
            return Err(RpcError::EmptyDisplayName.into());
        }

        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        info!(connection = id, room = %room_id, name = %display_name, "session opened");
        let (sender, mut receiver) = unbounded_channel();
        let pending = PendingConnection::new(id, room_id, display_name, stream, sender);
        self.command_sender
            .send(Some(WorkerCommand::Join(pending)))
            .map_err(|_| RpcError::WorkerDown)?;

        let out_stream = async_stream::stream! {
            while let Some(message) = receiver.recv().await {
                debug!(connection = id, message = message.name(), "sending");
                yield Ok(ServerFrame::from(message));
            }
            debug!(connection = id, "session closed");
        };
        Ok(Response::new(Box::pin(out_stream)))
    }

    #[instrument(skip_all)]
    async fn get_room(&self, request: Request<GetRoomRequest>) -> RpcResult<RoomInfo> {
        let request = request.into_inner();
        let info = self.storage.info(&request.room_id)?;
        Ok(Response::new(info))
    }
}
