use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use grid_server::config::ServerArgs;
use grid_server::proto::room_server::RoomServer;
use grid_server::rpc_server::RoomImpl;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = ServerArgs::parse();
    let addr = args.addr()?;
    info!(%addr, "listening for connections");

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<RoomServer<RoomImpl>>()
        .await;

    let ct = CancellationToken::new();
    let mut room_impl = RoomImpl::new(args.room_config());
    let worker = room_impl.start_worker(ct.clone());
    let server = Server::builder()
        .add_service(health_service)
        .add_service(RoomServer::new(room_impl))
        .serve_with_shutdown(addr, async move {
            if let Err(err) = worker.await {
                error!(%err, "worker join task failed");
            };
        });

    let shutdown = async move {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "unable to listen for shutdown signal");
        }
        info!("shutting down");
        ct.cancel();
    };
    let (result, ()) = tokio::join!(server, shutdown);
    result?;

    Ok(())
}
