use crate::{CommandError, Result};
use std::fmt::{self, Write};

/// Commands that mutate the keyspace and are therefore journaled to the
/// append-only file and propagated to replicas.
const WRITE_COMMANDS: [&str; 5] = ["SET", "DELETE", "EXPIRE", "LPUSH", "HSET"];

/// A client command: upper-cased name plus raw argument tokens.
///
/// Arguments are kept untyped on purpose: a queued transaction must accept
/// any token stream and defer validation to execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parses one inline frame into a command.
    ///
    /// The first token is case-folded to upper-case; the remaining tokens are
    /// taken verbatim. A blank frame is a protocol error.
    pub fn parse_inline(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| CommandError::err("empty command"))?;

        Ok(Self {
            name: name.to_ascii_uppercase(),
            args: tokens.map(str::to_owned).collect(),
        })
    }

    pub fn is_write(&self) -> bool {
        WRITE_COMMANDS.contains(&self.name.as_str())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            f.write_char(' ')?;
            f.write_str(arg)?;
        }

        Ok(())
    }
}
