use tonic_build::manual::{Builder, Method, Service};

fn main() {
    println!("cargo::rerun-if-changed=build.rs");

    let room_service = Service::builder()
        .name("Room")
        .package("grid_games")
        .method(
            Method::builder()
                .name("session")
                .route_name("Session")
                .input_type("crate::proto::ClientMessage")
                .output_type("crate::proto::ServerFrame")
                .codec_path("crate::codec::JsonCodec")
                .client_streaming()
                .server_streaming()
                .build(),
        )
        .method(
            Method::builder()
                .name("get_room")
                .route_name("GetRoom")
                .input_type("crate::proto::GetRoomRequest")
                .output_type("crate::proto::RoomInfo")
                .codec_path("crate::codec::JsonCodec")
                .build(),
        )
        .build();

    // messages are serde types from `crate::proto`, there is no .proto input
    Builder::new().compile(&[room_service]);
}
