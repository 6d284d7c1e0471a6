use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::connection::{Connection, ConnectionId};
use super::error::RpcError;
use super::RpcInnerResult;
use crate::core::{
    ConnectionState, GameKind, GameSession, GameState, Mark, Move, Participant, Role, Target,
};
use crate::proto::{LeaveReason, RoomId, RoomInfo, ServerMessage};

/// Timer a room asks the worker to arm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Deadline {
    /// Fires a turn timeout unless the session moved on in the meantime.
    Turn { generation: u64, version: u64 },
    /// Ends the session unless `name` rejoined in the meantime.
    Reconnect { name: String, epoch: u64 },
}

#[derive(Debug)]
struct Member {
    participant: Participant,
    // bumped on every disconnect and rejoin
    epoch: u64,
}

/// Up to two participants, their live connections and the canonical session.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    members: SmallVec<[Member; 2]>,
    connections: Vec<Connection>,
    session: Option<GameSession>,
    // bumped on every start so turn timers of a replaced session go stale
    generation: u64,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: SmallVec::new(),
            connections: Vec::new(),
            session: None,
            generation: 0,
        }
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.members
            .iter()
            .map(|member| member.participant.clone())
            .collect()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id.clone(),
            participants: self.participants(),
            snapshot: self.session.as_ref().map(GameSession::snapshot),
        }
    }

    /// No participant is connected, including the case of no participants at all.
    pub fn is_abandoned(&self) -> bool {
        self.members
            .iter()
            .all(|member| !member.participant.is_connected())
    }

    /// Decides which role `name` gets, without changing the room.
    /// A disconnected participant with the same name gets its seat back.
    pub fn admit(&self, name: &str) -> RpcInnerResult<Role> {
        if let Some(member) = self.member_by_name(name) {
            if member.participant.is_connected() {
                return Err(RpcError::NameTaken {
                    name: name.to_owned(),
                });
            }
            return Ok(member.participant.role());
        }
        match self.members.as_slice() {
            [] => Ok(Role::Host),
            [other] if other.participant.role() == Role::Host => Ok(Role::Guest),
            [_] => Ok(Role::Host),
            _ => Err(RpcError::RoomFull),
        }
    }

    /// Binds an admitted connection to its participant and brings it up to date.
    pub fn join(&mut self, connection: Connection, role: Role) {
        let kind = self.session.as_ref().map(GameSession::kind);
        let rejoined = match self.member_by_name_mut(connection.name()) {
            Some(member) => {
                member
                    .participant
                    .set_connection(ConnectionState::Connected);
                member.epoch += 1;
                true
            }
            None => {
                let mut participant = Participant::new(connection.name(), role);
                if let Some(kind) = kind {
                    participant.assign_mark(kind);
                }
                self.members.push(Member {
                    participant,
                    epoch: 0,
                });
                false
            }
        };
        info!(room = %self.id, name = connection.name(), ?role, rejoined, "participant joined");

        let id = connection.id();
        self.connections.push(connection);
        self.send_to(
            id,
            ServerMessage::Joined {
                role,
                participants: self.participants(),
            },
        );
        self.broadcast(ServerMessage::ParticipantJoined {
            participants: self.participants(),
        });
        if let Some(session) = &self.session {
            self.send_to(
                id,
                ServerMessage::SessionStarted {
                    snapshot: session.snapshot(),
                },
            );
        }
    }

    pub fn start(
        &mut self,
        connection: ConnectionId,
        kind: GameKind,
    ) -> RpcInnerResult<Vec<Deadline>> {
        self.require_host(connection, "start a game")?;
        if self.members.len() < 2 {
            return Err(RpcError::NoOpponent);
        }

        let session = GameSession::new(kind);
        let snapshot = session.snapshot();
        self.session = Some(session);
        self.generation += 1;
        self.assign_marks(kind);

        info!(room = %self.id, %kind, generation = self.generation, "session started");
        self.broadcast(ServerMessage::SessionStarted { snapshot });
        Ok(self.turn_deadline())
    }

    pub fn make_move(
        &mut self,
        connection: ConnectionId,
        target: Target,
    ) -> RpcInnerResult<Vec<Deadline>> {
        let role = self.member_of(connection)?.participant.role();
        let session = self.session.as_mut().ok_or(RpcError::NoSession)?;
        let actor = session.mark_for(role);
        let state = session.apply_move(Move::new(actor, target))?;
        let snapshot = session.snapshot();

        if let GameState::Finished(result) = state {
            info!(room = %self.id, ?result, "session decided");
        }
        self.broadcast(ServerMessage::MoveApplied { snapshot });
        Ok(self.turn_deadline())
    }

    pub fn reset(&mut self, connection: ConnectionId) -> RpcInnerResult<Vec<Deadline>> {
        self.require_host(connection, "reset the game")?;
        let session = self.session.as_mut().ok_or(RpcError::NoSession)?;
        session.reset();
        let snapshot = session.snapshot();
        let kind = session.kind();
        self.assign_marks(kind);

        info!(room = %self.id, version = snapshot.version, "session reset");
        self.broadcast(ServerMessage::SessionReset { snapshot });
        Ok(self.turn_deadline())
    }

    /// Removes the participant behind `connection` for good.
    pub fn leave(&mut self, connection: ConnectionId) -> RpcInnerResult<Connection> {
        let index = self
            .connections
            .iter()
            .position(|conn| conn.id() == connection)
            .ok_or(RpcError::ForeignConnection)?;
        let conn = self.connections.remove(index);
        let role = self
            .member_by_name(conn.name())
            .map(|member| member.participant.role());
        self.members
            .retain(|member| member.participant.display_name() != conn.name());
        let kind = self.session.as_ref().map(GameSession::kind);
        for member in self.members.iter_mut() {
            member.participant.set_role(Role::Host);
            // the promoted member takes the host mark so a new guest can't share it
            if let Some(kind) = kind {
                member.participant.assign_mark(kind);
            }
        }
        info!(room = %self.id, name = conn.name(), "participant left");

        self.broadcast(ServerMessage::ParticipantLeft {
            participants: self.participants(),
            reason: LeaveReason::Left,
        });
        if let (Some(role), false) = (role, self.members.is_empty()) {
            self.end_by_disconnect(role);
        }
        Ok(conn)
    }

    /// Marks the participant behind `connection` as disconnected and keeps its seat.
    pub fn disconnect(
        &mut self,
        connection: ConnectionId,
    ) -> Option<(Connection, Vec<Deadline>)> {
        let index = self
            .connections
            .iter()
            .position(|conn| conn.id() == connection)?;
        let conn = self.connections.remove(index);
        let mut deadlines = Vec::new();
        if let Some(member) = self.member_by_name_mut(conn.name()) {
            member
                .participant
                .set_connection(ConnectionState::Disconnected);
            member.epoch += 1;
            deadlines.push(Deadline::Reconnect {
                name: conn.name().to_owned(),
                epoch: member.epoch,
            });
        }
        info!(room = %self.id, name = conn.name(), "participant disconnected");

        self.broadcast(ServerMessage::ParticipantLeft {
            participants: self.participants(),
            reason: LeaveReason::Disconnected,
        });
        Some((conn, deadlines))
    }

    pub fn turn_timeout(&mut self, generation: u64, version: u64) {
        if generation != self.generation {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.version() != version {
            return;
        }
        let winner = session.other(session.turn());
        match session.forfeit(winner) {
            Ok(_) => {
                let snapshot = session.snapshot();
                info!(room = %self.id, %winner, "turn timed out");
                self.broadcast(ServerMessage::SessionEndedByTimeout { snapshot, winner });
            }
            Err(err) => debug!(room = %self.id, %err, "stale turn timeout"),
        }
    }

    pub fn reconnect_expired(&mut self, name: &str, epoch: u64) {
        let Some(member) = self.member_by_name(name) else {
            return;
        };
        if member.epoch != epoch || member.participant.is_connected() {
            return;
        }
        let role = member.participant.role();
        info!(room = %self.id, name, "reconnect grace expired");
        self.end_by_disconnect(role);
    }

    /// Sends `err` to the originator of a refused request only.
    pub fn notify_err(&self, connection: ConnectionId, err: &RpcError) {
        debug!(room = %self.id, connection, %err, "request refused");
        self.send_to(connection, ServerMessage::from(err));
    }

    /// Drops every connection, which ends their reply streams.
    pub fn close(self) {
        for conn in self.connections {
            conn.close();
        }
    }

    fn end_by_disconnect(&mut self, loser: Role) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let winner: Mark = session.other(session.mark_for(loser));
        match session.forfeit(winner) {
            Ok(_) => {
                let snapshot = session.snapshot();
                info!(room = %self.id, %winner, "session ended by disconnect");
                self.broadcast(ServerMessage::SessionEndedByDisconnect { snapshot, winner });
            }
            Err(err) => debug!(room = %self.id, %err, "session already decided"),
        }
    }

    fn turn_deadline(&self) -> Vec<Deadline> {
        match &self.session {
            Some(session) if !session.is_finished() => vec![Deadline::Turn {
                generation: self.generation,
                version: session.version(),
            }],
            _ => Vec::new(),
        }
    }

    fn assign_marks(&mut self, kind: GameKind) {
        for member in self.members.iter_mut() {
            member.participant.assign_mark(kind);
        }
    }

    fn require_host(&self, connection: ConnectionId, action: &'static str) -> RpcInnerResult<()> {
        match self.member_of(connection)?.participant.role() {
            Role::Host => Ok(()),
            Role::Guest => Err(RpcError::not_host(action)),
        }
    }

    fn member_of(&self, connection: ConnectionId) -> RpcInnerResult<&Member> {
        self.connections
            .iter()
            .find(|conn| conn.id() == connection)
            .and_then(|conn| self.member_by_name(conn.name()))
            .ok_or(RpcError::ForeignConnection)
    }

    fn member_by_name(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| member.participant.display_name() == name)
    }

    fn member_by_name_mut(&mut self, name: &str) -> Option<&mut Member> {
        self.members
            .iter_mut()
            .find(|member| member.participant.display_name() == name)
    }

    fn send_to(&self, connection: ConnectionId, message: ServerMessage) {
        if let Some(conn) = self.connections.iter().find(|conn| conn.id() == connection) {
            if let Err(err) = conn.notify(message) {
                warn!(room = %self.id, connection, %err, "failed to notify subscriber");
            }
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        for conn in self.connections.iter() {
            if let Err(err) = conn.notify(message.clone()) {
                warn!(
                    room = %self.id,
                    connection = conn.id(),
                    %err,
                    "failed to notify subscriber"
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use super::*;
    use crate::core::FinishedState;

    type Inbox = UnboundedReceiver<ServerMessage>;

    fn connect(room: &mut Room, id: ConnectionId, name: &str) -> RpcInnerResult<Inbox> {
        let role = room.admit(name)?;
        let (sender, receiver) = unbounded_channel();
        room.join(Connection::detached(id, name, sender), role);
        Ok(receiver)
    }

    fn drain(receiver: &mut Inbox) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn names(messages: &[ServerMessage]) -> Vec<&'static str> {
        messages.iter().map(ServerMessage::name).collect()
    }

    fn started_room() -> RpcInnerResult<(Room, Inbox, Inbox)> {
        let mut room = Room::new("room".into());
        let mut host = connect(&mut room, 1, "alice")?;
        let mut guest = connect(&mut room, 2, "bob")?;
        room.start(1, GameKind::TicTacToe)?;
        drain(&mut host);
        drain(&mut guest);
        Ok((room, host, guest))
    }

    #[tokio::test]
    async fn test_roles_and_capacity() -> RpcInnerResult<()> {
        let mut room = Room::new("room".into());
        let mut host = connect(&mut room, 1, "alice")?;
        let guest = connect(&mut room, 2, "bob")?;
        drop(guest);

        let messages = drain(&mut host);
        itertools::assert_equal(
            names(&messages),
            ["joined", "participant-joined", "participant-joined"],
        );
        assert!(matches!(
            messages[0],
            ServerMessage::Joined {
                role: Role::Host,
                ..
            }
        ));
        assert!(matches!(room.admit("carol"), Err(RpcError::RoomFull)));
        assert!(matches!(room.admit("alice"), Err(RpcError::NameTaken { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_only_host_starts_and_resets() -> RpcInnerResult<()> {
        let mut room = Room::new("room".into());
        let _host = connect(&mut room, 1, "alice")?;
        assert!(matches!(
            room.start(1, GameKind::ConnectFour),
            Err(RpcError::NoOpponent)
        ));
        let _guest = connect(&mut room, 2, "bob")?;
        assert!(matches!(
            room.start(2, GameKind::ConnectFour),
            Err(RpcError::NotHost { .. })
        ));
        assert!(matches!(room.reset(1), Err(RpcError::NoSession)));

        let deadlines = room.start(1, GameKind::ConnectFour)?;
        assert_eq!(
            deadlines,
            vec![Deadline::Turn {
                generation: 1,
                version: 0
            }]
        );
        itertools::assert_equal(
            room.participants().iter().map(Participant::assigned_mark),
            [Some(Mark::Red), Some(Mark::Yellow)],
        );
        assert!(matches!(room.reset(2), Err(RpcError::NotHost { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_moves_are_broadcast_and_errors_are_private() -> RpcInnerResult<()> {
        let (mut room, mut host, mut guest) = started_room()?;

        room.make_move(1, 4)?;
        itertools::assert_equal(names(&drain(&mut host)), ["move-applied"]);
        itertools::assert_equal(names(&drain(&mut guest)), ["move-applied"]);

        // host tries to move twice in a row
        let err = room.make_move(1, 0).unwrap_err();
        room.notify_err(1, &err);
        itertools::assert_equal(names(&drain(&mut host)), ["protocol-error"]);
        assert!(drain(&mut guest).is_empty());
        assert_eq!(room.session().map(GameSession::version), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejoin_replays_snapshot() -> RpcInnerResult<()> {
        let (mut room, mut host, _guest) = started_room()?;
        room.make_move(1, 0)?;

        let (_, deadlines) = room.disconnect(2).expect("guest is connected");
        assert_eq!(
            deadlines,
            vec![Deadline::Reconnect {
                name: "bob".into(),
                epoch: 1
            }]
        );
        assert!(!room.is_abandoned());
        drain(&mut host);

        let mut guest = connect(&mut room, 3, "bob")?;
        let messages = drain(&mut guest);
        itertools::assert_equal(
            names(&messages),
            ["joined", "participant-joined", "session-started"],
        );
        match &messages[2] {
            ServerMessage::SessionStarted { snapshot } => assert_eq!(snapshot.version, 1),
            other => panic!("unexpected message: {:?}", other),
        }

        // grace timer from before the rejoin is stale
        room.reconnect_expired("bob", 1);
        assert_eq!(room.session().and_then(GameSession::result), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconnect_grace_expiry_ends_session() -> RpcInnerResult<()> {
        let (mut room, mut host, _guest) = started_room()?;
        room.disconnect(2);
        drain(&mut host);

        room.reconnect_expired("bob", 1);
        let messages = drain(&mut host);
        itertools::assert_equal(names(&messages), ["session-ended-by-disconnect"]);
        assert_eq!(
            room.session().and_then(GameSession::result),
            Some(FinishedState::Win(Mark::X))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_leave_ends_session_and_promotes_guest() -> RpcInnerResult<()> {
        let (mut room, _host, mut guest) = started_room()?;
        room.leave(1)?;

        let messages = drain(&mut guest);
        itertools::assert_equal(
            names(&messages),
            ["participant-left", "session-ended-by-disconnect"],
        );
        assert!(matches!(
            messages[1],
            ServerMessage::SessionEndedByDisconnect {
                winner: Mark::O,
                ..
            }
        ));
        let participants = room.participants();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].role(), Role::Host);
        assert_eq!(room.admit("carol")?, Role::Guest);
        Ok(())
    }

    #[tokio::test]
    async fn test_promoted_host_and_new_guest_get_distinct_marks() -> RpcInnerResult<()> {
        let (mut room, _host, _guest) = started_room()?;
        room.leave(1)?;
        let _carol = connect(&mut room, 3, "carol")?;

        let marks: Vec<_> = room
            .participants()
            .iter()
            .map(|p| (p.display_name().to_owned(), p.role(), p.assigned_mark()))
            .collect();
        assert_eq!(
            marks,
            [
                ("bob".to_owned(), Role::Host, Some(Mark::X)),
                ("carol".to_owned(), Role::Guest, Some(Mark::O)),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_turn_timeout_ignores_stale_versions() -> RpcInnerResult<()> {
        let (mut room, mut host, _guest) = started_room()?;
        room.make_move(1, 0)?;
        drain(&mut host);

        room.turn_timeout(1, 0);
        assert!(drain(&mut host).is_empty());

        room.turn_timeout(1, 1);
        let messages = drain(&mut host);
        assert!(matches!(
            messages.as_slice(),
            [ServerMessage::SessionEndedByTimeout {
                winner: Mark::X,
                ..
            }]
        ));
        Ok(())
    }
}
