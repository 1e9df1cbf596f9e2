use std::path::PathBuf;

use thiserror::Error;

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Image(PathBuf),
    File(PathBuf),
    Remove,
    Voice,
    Theme,
    Clear,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("Usage: /{0} <path>")]
    MissingPath(&'static str),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Ok(Command::Send(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        let path = |command: &'static str| {
            if argument.is_empty() {
                Err(CommandError::MissingPath(command))
            } else {
                Ok(PathBuf::from(argument))
            }
        };

        match name {
            "image" => path("image").map(Command::Image),
            "file" => path("file").map(Command::File),
            "remove" => Ok(Command::Remove),
            "voice" => Ok(Command::Voice),
            "theme" => Ok(Command::Theme),
            "clear" => Ok(Command::Clear),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
