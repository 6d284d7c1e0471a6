use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use clap::Parser;

/// Authoritative room server for Tic-Tac-Toe and Connect Four sessions.
#[derive(Parser, Debug)]
#[command(name = "grid-server")]
#[command(version)]
pub struct ServerArgs {
    /// Address to bind to
    #[arg(long, env = "GRID_SERVER_HOST", default_value = "[::1]")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "GRID_SERVER_PORT", default_value_t = 50051)]
    pub port: u16,

    /// Seconds a player has to move before forfeiting, 0 disables the timer
    #[arg(long, env = "GRID_TURN_TIMEOUT_SECS", default_value_t = 60)]
    pub turn_timeout_secs: u64,

    /// Seconds a disconnected player has to rejoin before the session ends
    #[arg(long, env = "GRID_RECONNECT_GRACE_SECS", default_value_t = 30)]
    pub reconnect_grace_secs: u64,
}

impl ServerArgs {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn room_config(&self) -> RoomConfig {
        let turn_timeout = match self.turn_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        RoomConfig::default()
            .with_turn_timeout(turn_timeout)
            .with_reconnect_grace(Duration::from_secs(self.reconnect_grace_secs))
    }
}

/// Timers the room worker arms while sessions are undecided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomConfig {
    turn_timeout: Option<Duration>,
    reconnect_grace: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Some(Duration::from_secs(60)),
            reconnect_grace: Duration::from_secs(30),
        }
    }
}

impl RoomConfig {
    pub fn with_turn_timeout(mut self, turn_timeout: Option<Duration>) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }

    pub fn with_reconnect_grace(mut self, reconnect_grace: Duration) -> Self {
        self.reconnect_grace = reconnect_grace;
        self
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout
    }

    pub fn reconnect_grace(&self) -> Duration {
        self.reconnect_grace
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_args() -> Result<(), Box<dyn std::error::Error>> {
        let args = ServerArgs::try_parse_from([
            "grid-server",
            "--host",
            "127.0.0.1",
            "-p",
            "4000",
            "--turn-timeout-secs",
            "0",
        ])?;
        assert_eq!(args.addr()?, "127.0.0.1:4000".parse::<SocketAddr>()?);
        let config = args.room_config();
        assert_eq!(config.turn_timeout(), None);
        assert_eq!(config.reconnect_grace(), Duration::from_secs(30));
        Ok(())
    }
}
