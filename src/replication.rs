use crate::{
    Error, Result,
    resp::{Command, CommandDecoder},
    store::{Keyspace, StorageEngine, Value},
};
use futures_util::StreamExt;
use log::{info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, tcp::OwnedWriteHalf},
    time,
};
use tokio_util::codec::FramedRead;

/// Fixed backoff between reconnection attempts to the master.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Write side of one attached replica connection.
pub(crate) struct ReplicaWriter {
    writer: OwnedWriteHalf,
    tag: String,
}

impl ReplicaWriter {
    pub fn new(writer: OwnedWriteHalf, tag: String) -> Self {
        Self { writer, tag }
    }

    pub async fn send(&mut self, record: &[u8]) -> Result<()> {
        self.writer.write_all(record).await?;
        Ok(())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// The set of live downstream replicas, owned by the storage engine and
/// mutated only under the keyspace lock.
#[derive(Default)]
pub(crate) struct ReplicaSet {
    writers: Vec<ReplicaWriter>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, replica: ReplicaWriter) {
        self.writers.push(replica);
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Sends one serialized command record to every live replica.
    ///
    /// A replica whose socket errors is dropped from the set; the
    /// originating client command is never failed on its behalf, and a
    /// dropped replica recovers by reconnecting for a fresh full sync.
    pub async fn broadcast(&mut self, record: &[u8]) {
        if self.writers.is_empty() {
            return;
        }

        let writers = std::mem::take(&mut self.writers);
        for mut replica in writers {
            match replica.send(record).await {
                Ok(()) => self.writers.push(replica),
                Err(e) => warn!("[{}] replica dropped: {e}", replica.tag()),
            }
        }
    }
}

/// Synthesizes a command stream that reproduces the current keyspace on an
/// empty peer: `SET` per string, one `LPUSH` per list with arguments in
/// reverse of stored order (so replay restores the original head order),
/// `HSET` per hash field, then `EXPIRE` with the remaining TTL for every
/// entry that still has one.
pub(crate) fn full_sync_commands(keyspace: &Keyspace, now: f64) -> Vec<Command> {
    let mut commands = Vec::with_capacity(keyspace.len());

    for (key, entry) in keyspace.iter() {
        if entry.is_expired(now) {
            continue;
        }

        match &entry.value {
            Value::Str(s) => {
                commands.push(Command::new("SET", vec![key.clone(), s.clone()]));
            }
            Value::List(list) => {
                let mut args = Vec::with_capacity(list.len() + 1);
                args.push(key.clone());
                args.extend(list.iter().rev().cloned());
                commands.push(Command::new("LPUSH", args));
            }
            Value::Hash(hash) => {
                for (field, value) in hash {
                    commands.push(Command::new(
                        "HSET",
                        vec![key.clone(), field.clone(), value.clone()],
                    ));
                }
            }
        }

        if let Some(at) = entry.expire_at {
            let remaining = (at - now) as i64;
            if remaining > 0 {
                commands.push(Command::new(
                    "EXPIRE",
                    vec![key.clone(), remaining.to_string()],
                ));
            }
        }
    }

    commands
}

/// Replica-side master link: connect, announce, then apply the command
/// stream until the link drops; retry forever with a fixed backoff.
pub(crate) async fn run_replica(
    engine: Arc<StorageEngine>,
    master_host: String,
    master_port: u16,
    listening_port: u16,
) {
    loop {
        match sync_with_master(&engine, &master_host, master_port, listening_port).await {
            Ok(()) => info!("master {master_host}:{master_port} closed the replication link"),
            Err(e) => warn!("replication link to {master_host}:{master_port} failed: {e}"),
        }

        time::sleep(RECONNECT_DELAY).await;
    }
}

async fn sync_with_master(
    engine: &StorageEngine,
    master_host: &str,
    master_port: u16,
    listening_port: u16,
) -> Result<()> {
    let stream = TcpStream::connect((master_host, master_port)).await?;
    info!("connected to master {master_host}:{master_port}, requesting full sync");

    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(format!("REPLICAOF listening-port {listening_port}\r\n").as_bytes())
        .await?;

    // stale local state must not survive a resync
    engine.clear().await;

    let mut frames = FramedRead::new(read_half, CommandDecoder);
    while let Some(frame) = frames.next().await {
        let command = frame?;
        match engine.apply_replicated(&command).await {
            Ok(_) => {}
            Err(Error::Command(e)) => {
                warn!("master sent command '{command}' the keyspace rejected: {e}")
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
