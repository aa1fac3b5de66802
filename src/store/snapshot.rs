use crate::{
    Result,
    store::{Entry, Keyspace, Value},
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// One keyspace entry in the snapshot document: `[kind, payload, expiry]`,
/// where the payload is a string, an array of strings (head-first) or an
/// object, and the expiry is UNIX-epoch seconds or null.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEntry(String, Value, Option<f64>);

impl SnapshotEntry {
    fn from_entry(entry: &Entry) -> Self {
        Self(
            entry.value.kind().as_str().to_owned(),
            entry.value.clone(),
            entry.expire_at,
        )
    }
}

/// Serializes the keyspace to `path` as a single JSON document keyed by
/// keyspace keys. The caller is expected to sweep expired entries first.
pub async fn save(path: &Path, keyspace: &Keyspace) -> Result<()> {
    let document: HashMap<&String, SnapshotEntry> = keyspace
        .iter()
        .map(|(key, entry)| (key, SnapshotEntry::from_entry(entry)))
        .collect();

    let bytes = serde_json::to_vec(&document)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Reads a snapshot document back into entries.
///
/// `Ok(None)` means the file does not exist; any other failure is an error
/// the caller may treat as non-fatal. Entries whose kind tag disagrees with
/// their payload shape are dropped with a warning.
pub async fn load(path: &Path) -> Result<Option<HashMap<String, Entry>>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let document: HashMap<String, SnapshotEntry> = serde_json::from_slice(&bytes)?;
    let mut entries = HashMap::with_capacity(document.len());
    for (key, SnapshotEntry(kind, value, expire_at)) in document {
        if kind != value.kind().as_str() {
            warn!("snapshot entry '{key}' tagged '{kind}' does not match its payload, dropped");
            continue;
        }
        entries.insert(key, Entry::new(value, expire_at));
    }

    Ok(Some(entries))
}
