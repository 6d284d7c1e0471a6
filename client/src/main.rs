use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use game_server::core::{GameKind, Target};
use grid_client::config::ClientArgs;
use grid_client::sync::{ConnectionStatus, SyncResult};
use grid_client::{ClientConfig, ConnectionEvent, LocalGame, RemoteGame};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "commands: <target> | start [tictactoe|connectfour] | reset | quit";

#[derive(Debug, PartialEq)]
enum Command {
    Move(Target),
    Start(Option<GameKind>),
    Reset,
    Quit,
    Unknown,
}

fn parse_command(line: &str) -> Command {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("start") => match words.next() {
            None => Command::Start(None),
            Some("tictactoe") => Command::Start(Some(GameKind::TicTacToe)),
            Some("connectfour") => Command::Start(Some(GameKind::ConnectFour)),
            Some(_) => Command::Unknown,
        },
        Some("reset") => Command::Reset,
        Some("quit") | Some("q") => Command::Quit,
        Some(word) => word.parse().map_or(Command::Unknown, Command::Move),
        None => Command::Unknown,
    }
}

fn report(result: SyncResult<()>) {
    if let Err(err) = result {
        println!("{}", err);
    }
}

async fn play_local(
    kind: GameKind,
    config: &ClientConfig,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut game = LocalGame::new(kind, config);
    println!("{}", game.view());
    while let Some(line) = input.next_line().await? {
        match parse_command(&line) {
            Command::Move(target) => {
                if let Err(err) = game.submit_move(target) {
                    println!("{}", err);
                    continue;
                }
                println!("{}", game.view());
                if let Some(turn) = game.schedule_computer_move() {
                    if turn.wait().await {
                        if let Some(target) = game.play_computer_turn(&turn) {
                            println!("computer plays {}", target);
                            println!("{}", game.view());
                        }
                    }
                }
            }
            Command::Start(next) => {
                game = LocalGame::new(next.unwrap_or(kind), config);
                println!("{}", game.view());
            }
            Command::Reset => {
                game.reset();
                println!("{}", game.view());
            }
            Command::Quit => break,
            Command::Unknown => println!("{}", HELP),
        }
    }
    Ok(())
}

fn render_remote(game: &RemoteGame, event: &ConnectionEvent) {
    let sync = game.sync();
    match event {
        ConnectionEvent::Connected => println!("connected to room {}", sync.room_id()),
        ConnectionEvent::Disconnected(reason) => println!("disconnected: {}", reason),
        ConnectionEvent::GaveUp => println!("server unreachable, giving up"),
        ConnectionEvent::Malformed(_) => {
            if let Some(banner) = sync.banner() {
                println!("! {}", banner);
            }
        }
        ConnectionEvent::Message(message) => {
            if let Some(banner) = sync.banner() {
                println!("! {}", banner);
            }
            if let Some(view) = sync.view() {
                println!("{}", view);
            } else if sync.is_waiting_for_start() {
                println!("waiting for the host to start a game ({})", message.name());
            }
            if let Some(ending) = sync.ending() {
                println!("{:?}: {} wins", ending.reason, ending.winner);
            }
        }
    }
}

async fn play_remote(
    args: &ClientArgs,
    config: ClientConfig,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut game = RemoteGame::join(&args.server, &args.room, &args.name, config);
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_command(&line) {
                    Command::Move(target) => report(game.submit_move(target)),
                    Command::Start(kind) => report(game.start(kind.unwrap_or(args.game))),
                    Command::Reset => report(game.reset()),
                    Command::Quit => break,
                    Command::Unknown => println!("{}", HELP),
                }
            }
            event = game.next_event() => {
                let Some(event) = event else {
                    break;
                };
                render_remote(&game, &event);
            }
        }
    }
    if game.sync().status() == ConnectionStatus::Connected {
        game.leave().await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = ClientArgs::parse();
    let config = args.client_config();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    if args.computer {
        play_local(args.game, &config, &mut input).await
    } else {
        play_remote(&args, config, &mut input).await
    }
}
