use std::net::SocketAddr;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use game_server::config::RoomConfig;
use game_server::core::{FinishedState, GameKind, Mark, Role};
use game_server::proto::room_server::RoomServer;
use game_server::rpc_server::RoomImpl;
use grid_client::sync::{ConnectionStatus, EndReason, SessionSynchronizer, SyncError};
use grid_client::{ClientConfig, ConnectionEvent, RemoteGame};

const WAIT: Duration = Duration::from_secs(5);

async fn run_server() -> (SocketAddr, JoinHandle<()>, CancellationToken) {
    let ct = CancellationToken::new();
    let ct_cloned = ct.clone();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let incoming =
        tonic::transport::server::TcpIncoming::from_listener(listener, true, None).unwrap();
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<RoomServer<RoomImpl>>()
        .await;
    let t = tokio::spawn(async move {
        let mut room_impl = RoomImpl::new(RoomConfig::default());
        let worker = room_impl.start_worker(ct_cloned);
        Server::builder()
            .add_service(health_service)
            .add_service(RoomServer::new(room_impl))
            .serve_with_incoming_shutdown(incoming, async move {
                worker.await.unwrap();
            })
            .await
            .unwrap();
    });
    (addr, t, ct)
}

fn join(addr: SocketAddr, room: &str, name: &str, config: ClientConfig) -> RemoteGame {
    RemoteGame::join(format!("http://{}", addr), room, name, config)
}

/// Pumps connection events until `done` holds for the mirror.
async fn wait_until(game: &mut RemoteGame, done: impl Fn(&SessionSynchronizer) -> bool) {
    tokio::time::timeout(WAIT, async {
        while !done(game.sync()) {
            game.next_event().await.expect("connection is alive");
        }
    })
    .await
    .expect("condition reached in time");
}

fn at_version(version: u64) -> impl Fn(&SessionSynchronizer) -> bool {
    move |sync| sync.session().is_some_and(|s| s.version() == version)
}

#[tokio::test]
async fn two_players_play_through_synchronizers() {
    let (addr, server_thread, ct) = run_server().await;

    let mut alice = join(addr, "room", "alice", ClientConfig::default());
    wait_until(&mut alice, |sync| sync.role() == Some(Role::Host)).await;
    assert!(alice.sync().is_waiting_for_start());
    let mut bob = join(addr, "room", "bob", ClientConfig::default());
    wait_until(&mut bob, |sync| sync.role() == Some(Role::Guest)).await;
    wait_until(&mut alice, |sync| sync.participants().len() == 2).await;

    assert_eq!(
        bob.start(GameKind::TicTacToe),
        Err(SyncError::not_host("start a game"))
    );
    alice.start(GameKind::TicTacToe).unwrap();
    wait_until(&mut alice, at_version(0)).await;
    wait_until(&mut bob, at_version(0)).await;
    assert_eq!(bob.sync().own_mark(), Some(Mark::O));
    assert_eq!(bob.submit_move(4), Err(SyncError::NotYourTurn));

    // X: 0 1 2, O: 3 4
    for (version, target) in [0, 3, 1, 4, 2].into_iter().enumerate() {
        let mover = if version % 2 == 0 { &alice } else { &bob };
        mover.submit_move(target).unwrap();
        wait_until(&mut alice, at_version(version as u64 + 1)).await;
        wait_until(&mut bob, at_version(version as u64 + 1)).await;
    }
    let result = bob.sync().view().and_then(|view| view.result);
    assert_eq!(result, Some(FinishedState::Win(Mark::X)));
    assert_eq!(bob.submit_move(8), Err(SyncError::SessionFinished));

    alice.reset().unwrap();
    wait_until(&mut bob, at_version(6)).await;
    assert_eq!(bob.sync().view().and_then(|view| view.result), None);

    alice.leave().await;
    wait_until(&mut bob, |sync| sync.ending().is_some()).await;
    let ending = bob.sync().ending().unwrap();
    assert_eq!(ending.reason, EndReason::Disconnect);
    assert_eq!(ending.winner, Mark::O);
    assert!(bob.sync().is_host());

    drop(bob);
    ct.cancel();
    server_thread.await.unwrap();
}

#[tokio::test]
async fn gives_up_once_server_is_gone() {
    let (addr, server_thread, ct) = run_server().await;
    let config = ClientConfig::default()
        .with_reconnect_attempts(2)
        .with_reconnect_delay(Duration::from_millis(50))
        .with_connect_timeout(Duration::from_millis(500));

    let mut alice = join(addr, "room", "alice", config);
    wait_until(&mut alice, |sync| sync.role() == Some(Role::Host)).await;
    assert_eq!(alice.sync().status(), ConnectionStatus::Connected);

    ct.cancel();
    let mut events = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = alice.next_event().await {
            events.push(event);
        }
    })
    .await
    .expect("connection gave up in time");

    // queued room messages may still arrive ahead of the disconnect
    let transport: Vec<_> = events
        .iter()
        .filter(|event| !matches!(event, ConnectionEvent::Message(_)))
        .collect();
    assert!(matches!(
        transport.first(),
        Some(ConnectionEvent::Disconnected(_))
    ));
    assert_eq!(transport.last(), Some(&&ConnectionEvent::GaveUp));
    assert!(alice.gave_up());
    assert_eq!(alice.sync().status(), ConnectionStatus::Disconnected);
    // the mirror keeps the last known state
    assert_eq!(alice.sync().role(), Some(Role::Host));
    assert!(alice.submit_move(0).is_err());

    server_thread.await.unwrap();
}

#[tokio::test]
async fn refused_join_runs_out_of_attempts() {
    let (addr, server_thread, ct) = run_server().await;

    let mut alice = join(addr, "full", "alice", ClientConfig::default());
    wait_until(&mut alice, |sync| sync.role() == Some(Role::Host)).await;
    let mut bob = join(addr, "full", "bob", ClientConfig::default());
    wait_until(&mut bob, |sync| sync.role() == Some(Role::Guest)).await;

    let config = ClientConfig::default()
        .with_reconnect_attempts(1)
        .with_reconnect_delay(Duration::from_millis(50));
    let mut carol = join(addr, "full", "carol", config);
    let mut disconnects = 0;
    tokio::time::timeout(WAIT, async {
        while let Some(event) = carol.next_event().await {
            if matches!(event, ConnectionEvent::Disconnected(_)) {
                disconnects += 1;
            }
        }
    })
    .await
    .expect("connection gave up in time");

    assert!(carol.gave_up());
    assert_eq!(disconnects, 2);
    assert_eq!(carol.sync().banner(), Some("room is full"));
    assert_eq!(carol.sync().role(), None);
    assert_eq!(carol.sync().status(), ConnectionStatus::Disconnected);

    drop((alice, bob, carol));
    ct.cancel();
    server_thread.await.unwrap();
}
