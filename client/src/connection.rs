use game_server::proto::room_client::RoomClient;
use game_server::proto::{ClientMessage, ServerFrame, ServerMessage, ROOM_SERVICE};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tracing::{debug, info, instrument, warn};

use crate::ClientConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error(transparent)]
    Status(#[from] tonic::Status),
    #[error("timed out connecting to the server")]
    Timeout,
    #[error("room service is not serving")]
    NotServing,
    #[error("connection is closed")]
    Closed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    /// The session stream is open and `join` has been sent.
    Connected,
    Message(ServerMessage),
    /// A frame that isn't a known server message. The stream stays open.
    Malformed(String),
    /// The stream was lost; a reconnect follows unless attempts are exhausted.
    Disconnected(String),
    /// Reconnect attempts are exhausted. No more events follow.
    GaveUp,
}

enum SessionEnd {
    /// Stream ended or failed; worth reconnecting.
    Lost(String),
    /// The owner dropped its request sender.
    Abandoned,
}

/// Owned connection to a room.
///
/// A background task keeps the session stream alive, re-sending `join` after
/// every reconnect. Failed attempts only stop counting once the server accepts
/// a `join`, so a refused join runs out of attempts like an unreachable
/// server. Dropping the connection or calling [`RoomConnection::close`]
/// stops the task.
#[derive(Debug)]
pub struct RoomConnection {
    requests: UnboundedSender<ClientMessage>,
    events: UnboundedReceiver<ConnectionEvent>,
    ct: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RoomConnection {
    /// Starts connecting in the background. Must be called inside a tokio runtime.
    pub fn open(address: impl Into<String>, join: ClientMessage, config: ClientConfig) -> Self {
        let (requests, request_receiver) = unbounded_channel();
        let (event_sender, events) = unbounded_channel();
        let ct = CancellationToken::new();
        let task = tokio::spawn(run(
            address.into(),
            join,
            config,
            request_receiver,
            event_sender,
            ct.clone(),
        ));
        Self {
            requests,
            events,
            ct,
            task: Some(task),
        }
    }

    /// Queues a request for the current session stream.
    pub fn send(&self, message: ClientMessage) -> Result<(), ConnectionError> {
        self.requests
            .send(message)
            .map_err(|_| ConnectionError::Closed)
    }

    /// Next event, or `None` once the connection task is gone.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.ct.is_cancelled()
    }

    pub async fn close(mut self) {
        self.ct.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "connection task failed");
            }
        }
    }
}

impl Drop for RoomConnection {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

async fn run(
    address: String,
    join: ClientMessage,
    config: ClientConfig,
    mut requests: UnboundedReceiver<ClientMessage>,
    events: UnboundedSender<ConnectionEvent>,
    ct: CancellationToken,
) {
    let mut failures = 0;
    loop {
        let mut established = false;
        let end = tokio::select! {
            _ = ct.cancelled() => break,
            end = session(
                &address,
                &join,
                &config,
                &mut requests,
                &events,
                &mut established,
            ) => end,
        };
        let reason = match end {
            SessionEnd::Abandoned => break,
            SessionEnd::Lost(reason) => reason,
        };
        if established {
            failures = 0;
        }
        failures += 1;
        warn!(%reason, failures, "room connection lost");
        // receiver may be gone already
        let _ = events.send(ConnectionEvent::Disconnected(reason));
        if failures > config.reconnect_attempts() {
            info!("giving up on the room server");
            let _ = events.send(ConnectionEvent::GaveUp);
            break;
        }
        tokio::select! {
            _ = ct.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay()) => {}
        }
    }
    debug!("connection task stopped");
}

#[instrument(skip_all, fields(address = %address))]
async fn session(
    address: &str,
    join: &ClientMessage,
    config: &ClientConfig,
    requests: &mut UnboundedReceiver<ClientMessage>,
    events: &UnboundedSender<ConnectionEvent>,
    established: &mut bool,
) -> SessionEnd {
    let mut inbound = match open_stream(address, join, config).await {
        Ok(opened) => opened,
        Err(err) => return SessionEnd::Lost(err.to_string()),
    };
    info!("opened room stream");
    if events.send(ConnectionEvent::Connected).is_err() {
        return SessionEnd::Abandoned;
    }

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(message) = request else {
                    return SessionEnd::Abandoned;
                };
                debug!(request = message.name(), "sending");
                if inbound.outbound.send(message).is_err() {
                    return SessionEnd::Lost("request stream closed".into());
                }
            }
            message = inbound.stream.message() => match message {
                Ok(Some(ServerFrame::Message(message))) => {
                    if let ServerMessage::Joined { role, .. } = &message {
                        info!(?role, "joined room");
                        *established = true;
                    }
                    if events.send(ConnectionEvent::Message(message)).is_err() {
                        return SessionEnd::Abandoned;
                    }
                }
                Ok(Some(ServerFrame::Malformed { error, .. })) => {
                    debug!(%error, "malformed server message");
                    if events.send(ConnectionEvent::Malformed(error)).is_err() {
                        return SessionEnd::Abandoned;
                    }
                }
                Ok(None) => return SessionEnd::Lost("stream closed by the server".into()),
                Err(status) => return SessionEnd::Lost(status.to_string()),
            },
        }
    }
}

struct OpenStream {
    outbound: UnboundedSender<ClientMessage>,
    stream: tonic::Streaming<ServerFrame>,
}

async fn open_stream(
    address: &str,
    join: &ClientMessage,
    config: &ClientConfig,
) -> Result<OpenStream, ConnectionError> {
    let endpoint =
        Endpoint::from_shared(address.to_owned())?.connect_timeout(config.connect_timeout());
    let channel: Channel = tokio::time::timeout(config.connect_timeout(), endpoint.connect())
        .await
        .map_err(|_| ConnectionError::Timeout)??;

    let mut health = HealthClient::new(channel.clone());
    let status = health
        .check(Request::new(HealthCheckRequest {
            service: ROOM_SERVICE.into(),
        }))
        .await?
        .into_inner()
        .status;
    if status != ServingStatus::Serving as i32 {
        return Err(ConnectionError::NotServing);
    }

    let (outbound, mut receiver) = unbounded_channel();
    outbound
        .send(join.clone())
        .map_err(|_| ConnectionError::Closed)?;
    let requests = async_stream::stream! {
        while let Some(message) = receiver.recv().await {
            yield message;
        }
    };
    let stream = RoomClient::new(channel)
        .session(requests)
        .await?
        .into_inner();
    Ok(OpenStream { outbound, stream })
}
