//! Console commands typed by the local user

use crate::dice::{DiceKind, UnknownDice};
use shared::{Position, TokenId};
use std::path::PathBuf;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  /token [color]        create a token (random color if omitted)
  /move <id> <x> <y>    move a token
  /roll [dN]            roll a die (d4 d6 d8 d10 d12 d20, default d20)
  /grid <w> <h>         resize the local grid
  /bg <path>            share an image file as background
  /announce <text>      send a system message
  /link                 print the join link
  /tokens               list tokens
  /peers                list connected peers
  /help                 show this help
  /quit                 leave the room
Anything else is sent as chat.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Token { color: Option<String> },
    Move { token: TokenId, position: Position },
    Roll(DiceKind),
    Grid { width: u32, height: u32 },
    Background(PathBuf),
    Announce(String),
    Link,
    Tokens,
    Peers,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Dice(#[from] UnknownDice),
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(Some(Command::Chat(line.to_string())));
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "token" => match args[..] {
            [] => Command::Token { color: None },
            [color] => Command::Token {
                color: Some(color.to_string()),
            },
            _ => return Err(CommandError::Usage("/token [color]")),
        },
        "move" => match args[..] {
            [id, x, y] => {
                let (Ok(x), Ok(y)) = (x.parse(), y.parse()) else {
                    return Err(CommandError::Usage("/move <id> <x> <y>"));
                };
                Command::Move {
                    token: TokenId::from(id),
                    position: Position::new(x, y),
                }
            }
            _ => return Err(CommandError::Usage("/move <id> <x> <y>")),
        },
        "roll" => match args[..] {
            [] => Command::Roll(DiceKind::default()),
            [kind] => Command::Roll(kind.parse()?),
            _ => return Err(CommandError::Usage("/roll [dN]")),
        },
        "grid" => match args[..] {
            [w, h] => match (w.parse(), h.parse()) {
                (Ok(width), Ok(height)) => Command::Grid { width, height },
                _ => return Err(CommandError::Usage("/grid <w> <h>")),
            },
            _ => return Err(CommandError::Usage("/grid <w> <h>")),
        },
        "bg" if !rest.is_empty() => Command::Background(PathBuf::from(rest)),
        "bg" => return Err(CommandError::Usage("/bg <path>")),
        "announce" if !rest.is_empty() => Command::Announce(rest.to_string()),
        "announce" => return Err(CommandError::Usage("/announce <text>")),
        "link" => Command::Link,
        "tokens" => Command::Tokens,
        "peers" => Command::Peers,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}
