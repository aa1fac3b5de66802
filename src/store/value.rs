use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    time::{SystemTime, UNIX_EPOCH},
};

/// Stored payload of a single key.
///
/// Lists are kept head-first: index 0 is the most recently pushed element.
/// The untagged serde representation matches the snapshot document, where
/// the kind is carried as a separate tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    List(Vec<String>),
    Hash(HashMap<String, String>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
            Value::Hash(_) => Kind::Hash,
        }
    }
}

/// Kind tag of a [`Value`], as spelled in the snapshot document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    List,
    Hash,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Str => "string",
            Kind::List => "list",
            Kind::Hash => "hash",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value together with its optional expiry instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,
    /// Absolute UNIX-epoch seconds; `None` means the entry never expires.
    pub expire_at: Option<f64>,
}

impl Entry {
    pub fn new(value: Value, expire_at: Option<f64>) -> Self {
        Self { value, expire_at }
    }

    pub fn persistent(value: Value) -> Self {
        Self {
            value,
            expire_at: None,
        }
    }

    /// An expiry strictly in the past means the entry is logically absent.
    pub fn is_expired(&self, now: f64) -> bool {
        matches!(self.expire_at, Some(at) if now > at)
    }
}

/// Current wall clock as UNIX-epoch seconds, the unit expiries are stored in.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
