use std::{
    fmt::{Display, Formatter},
    str::Utf8Error,
};

/// All error kinds
#[derive(Debug)]
pub enum Error {
    /// Semantic or protocol error reported back to the issuing client as an error reply
    Command(CommandError),
    /// Raised if an error occurs in the configuration parsing or validation
    Config(String),
    /// IO error on a socket or a persistence file
    IO(std::io::Error),
    /// Malformed bytes on the wire or in a persistence file
    Protocol(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Command(e) => f.write_fmt(format_args!("Command error: {e}")),
            Error::Config(e) => f.write_fmt(format_args!("Config error: {e}")),
            Error::IO(e) => f.write_fmt(format_args!("IO error: {e}")),
            Error::Protocol(e) => f.write_fmt(format_args!("Protocol error: {e}")),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Error::Command(e)
    }
}

impl From<Utf8Error> for Error {
    fn from(e: Utf8Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

/// Prefix of an error reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    Err,
    WrongType,
}

impl Display for CommandErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandErrorKind::Err => f.write_str("ERR"),
            CommandErrorKind::WrongType => f.write_str("WRONGTYPE"),
        }
    }
}

/// Error surfaced to a client as a `-<KIND> <message>\r\n` reply.
///
/// Unlike [`Error::IO`], a `CommandError` never terminates the connection:
/// the handler renders it and keeps reading frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub kind: CommandErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            kind: CommandErrorKind::Err,
            message: message.into(),
        }
    }

    pub fn wrong_type() -> Self {
        Self {
            kind: CommandErrorKind::WrongType,
            message: "Operation against a key holding the wrong kind of value".to_owned(),
        }
    }

    pub fn wrong_arity(command: &str) -> Self {
        Self::err(format!(
            "wrong number of arguments for '{}' command",
            command.to_ascii_lowercase()
        ))
    }

    pub fn not_an_integer() -> Self {
        Self::err("value is not an integer or out of range")
    }

    pub fn unknown_command(name: &str) -> Self {
        Self::err(format!("unknown command '{name}'"))
    }

    pub fn read_only() -> Self {
        Self::err("READONLY You can't write against a read-only replica.")
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{} {}", self.kind, self.message))
    }
}
