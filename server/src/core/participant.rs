use serde::{Deserialize, Serialize};

use super::{GameKind, Mark};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    pub fn mark(self, kind: GameKind) -> Mark {
        let (host, guest) = kind.marks();
        match self {
            Role::Host => host,
            Role::Guest => guest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Member of a room as every other member sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    display_name: String,
    assigned_mark: Option<Mark>,
    role: Role,
    connection: ConnectionState,
}

impl Participant {
    pub fn new(display_name: impl Into<String>, role: Role) -> Self {
        Self {
            display_name: display_name.into(),
            assigned_mark: None,
            role,
            connection: ConnectionState::Connected,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn assigned_mark(&self) -> Option<Mark> {
        self.assigned_mark
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Gives the participant the mark its role has in a game of `kind`.
    pub fn assign_mark(&mut self, kind: GameKind) {
        self.assigned_mark = Some(self.role.mark(kind));
    }

    pub fn clear_mark(&mut self) {
        self.assigned_mark = None;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_marks_follow_role() {
        let mut guest = Participant::new("bob", Role::Guest);
        assert_eq!(guest.assigned_mark(), None);
        guest.assign_mark(GameKind::ConnectFour);
        assert_eq!(guest.assigned_mark(), Some(Mark::Yellow));
        guest.set_role(Role::Host);
        guest.assign_mark(GameKind::TicTacToe);
        assert_eq!(guest.assigned_mark(), Some(Mark::X));
    }

    #[test]
    fn test_wire_format() -> Result<(), serde_json::Error> {
        let participant = Participant::new("alice", Role::Host);
        assert_eq!(
            serde_json::to_value(&participant)?,
            serde_json::json!({
                "displayName": "alice",
                "assignedMark": null,
                "role": "host",
                "connection": "connected",
            })
        );
        Ok(())
    }
}
