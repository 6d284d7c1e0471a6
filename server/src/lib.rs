pub mod codec;
pub mod config;
pub mod core;
pub mod proto;
pub mod rpc_server;
