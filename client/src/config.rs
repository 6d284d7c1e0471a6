use std::time::Duration;

use clap::Parser;
use game_server::core::GameKind;

pub const DEFAULT_SERVER_ADDRESS: &str = "http://[::1]:50051";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    computer_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            computer_delay: Duration::from_millis(500),
        }
    }
}

impl ClientConfig {
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_computer_delay(mut self, delay: Duration) -> Self {
        self.computer_delay = delay;
        self
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn computer_delay(&self) -> Duration {
        self.computer_delay
    }
}

/// Terminal client for the grid games room server.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct ClientArgs {
    /// Room server address.
    #[arg(long, env = "GRID_SERVER_ADDRESS", default_value = DEFAULT_SERVER_ADDRESS)]
    pub server: String,

    #[arg(long, env = "GRID_ROOM", default_value = "lobby")]
    pub room: String,

    #[arg(long, env = "GRID_NAME", default_value = "player")]
    pub name: String,

    /// Play against the computer instead of joining a room.
    #[arg(long)]
    pub computer: bool,

    /// Game to start: `tictactoe` or `connectfour`.
    #[arg(long, default_value = "tictactoe", value_parser = parse_kind)]
    pub game: GameKind,

    #[arg(long, env = "GRID_RECONNECT_ATTEMPTS", default_value_t = 3)]
    pub reconnect_attempts: u32,

    #[arg(long, env = "GRID_RECONNECT_DELAY_SECS", default_value_t = 2)]
    pub reconnect_delay_secs: u64,

    #[arg(long, env = "GRID_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    #[arg(long, env = "GRID_COMPUTER_DELAY_MS", default_value_t = 500)]
    pub computer_delay_ms: u64,
}

impl ClientArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_reconnect_attempts(self.reconnect_attempts)
            .with_reconnect_delay(Duration::from_secs(self.reconnect_delay_secs))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_computer_delay(Duration::from_millis(self.computer_delay_ms))
    }
}

fn parse_kind(value: &str) -> Result<GameKind, String> {
    match value {
        "tictactoe" | "ttt" => Ok(GameKind::TicTacToe),
        "connectfour" | "c4" => Ok(GameKind::ConnectFour),
        other => Err(format!("unknown game: {}", other)),
    }
}
