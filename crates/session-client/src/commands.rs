// crates/session-client/src/commands.rs

//! Console command line parsing.

use session_core::deck::DEFAULT_HAND_SIZE;
use thiserror::Error;

pub const DEFAULT_LEADERBOARD_COUNT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    Status,
    Start,
    Put(String),
    Remove(String),
    Draw,
    Score,
    Save(String),
    Say(String),
    Join(String),
    Leave(String),
    Leaderboard(u32),
    Deal(usize),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid count {0:?}")]
    InvalidCount(String),
}

/// Parse one input line. `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let arg = |name: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingArgument(name))
        } else {
            Ok(rest.to_string())
        }
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "start" => ConsoleCommand::Start,
        "put" => ConsoleCommand::Put(arg("put")?),
        "remove" => ConsoleCommand::Remove(arg("remove")?),
        "draw" => ConsoleCommand::Draw,
        "score" => ConsoleCommand::Score,
        "save" => ConsoleCommand::Save(arg("save")?),
        "say" => ConsoleCommand::Say(arg("say")?),
        "join" => ConsoleCommand::Join(arg("join")?),
        "leave" => ConsoleCommand::Leave(arg("leave")?),
        "leaderboard" | "lb" => {
            if rest.is_empty() {
                ConsoleCommand::Leaderboard(DEFAULT_LEADERBOARD_COUNT)
            } else {
                let n = rest
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ParseError::InvalidCount(rest.to_string()))?;
                ConsoleCommand::Leaderboard(n)
            }
        }
        "deal" => {
            if rest.is_empty() {
                ConsoleCommand::Deal(DEFAULT_HAND_SIZE)
            } else {
                let n = rest.parse().map_err(|_| ParseError::InvalidCount(rest.to_string()))?;
                ConsoleCommand::Deal(n)
            }
        }
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => return Err(ParseError::Unknown(word.to_string())),
    };
    Ok(Some(cmd))
}

pub const HELP: &str = "\
commands:
  connect | disconnect | status
  start                 start a game
  put <card-id>         put a card from your hand on the desk
  remove <card-id>      take a card back from the desk
  draw                  draw from the deck
  score                 submit the desk for scoring
  save <nickname>       save your score to the leaderboard
  say <text>            chat
  join <room> | leave <room>
  leaderboard [n]       show the top n (default 10)
  deal [n]              deal a practice hand locally (default 8)
  quit";
