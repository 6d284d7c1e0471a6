mod connection;
mod error;
mod room;
mod rpc;
mod storage;
mod worker;

use tonic::{Response, Status};

pub use error::RpcError;
pub use rpc::RoomImpl;

pub type RpcResult<T> = Result<Response<T>, Status>;
pub(crate) type RpcInnerResult<T> = Result<T, RpcError>;
