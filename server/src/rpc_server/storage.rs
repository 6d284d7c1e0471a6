use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use super::error::RpcError;
use super::room::Room;
use super::RpcInnerResult;
use crate::proto::{RoomId, RoomInfo};

type RoomMap = HashMap<RoomId, Room>;

/// Rooms shared between the worker and the RPC handlers.
#[derive(Clone, Debug, Default)]
pub struct RoomStorage(Arc<Mutex<RoomMap>>);

impl Deref for RoomStorage {
    type Target = Arc<Mutex<RoomMap>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl RoomStorage {
    pub fn info(&self, id: &RoomId) -> RpcInnerResult<RoomInfo> {
        let guard = self.lock()?;
        guard
            .get(id)
            .map(Room::info)
            .ok_or_else(|| RpcError::NoSuchRoom { id: id.clone() })
    }

    /// Drops all rooms, ending every open session stream.
    pub fn close_all(&self) -> RpcInnerResult<()> {
        let mut guard = self.lock()?;
        for (_, room) in guard.drain() {
            room.close();
        }
        Ok(())
    }
}
