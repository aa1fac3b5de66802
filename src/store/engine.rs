use crate::{
    CommandError, Error, Result,
    replication::{ReplicaSet, ReplicaWriter, full_sync_commands},
    resp::{Command, CommandDecoder, Reply, command_record},
    store::{AofWriter, Entry, Keyspace, Value, snapshot, unix_now},
};
use bytes::BytesMut;
use log::{debug, error, info, warn};
use std::path::Path;
use tokio::{net::tcp::OwnedWriteHalf, sync::Mutex};
use tokio_util::codec::Decoder;

/// The command dispatcher and sole owner of the keyspace.
///
/// Every read and write funnels through one mutex. For a successful write
/// the whole span from expiry check through mutation, AOF append and replica
/// fan-out happens under that lock, so apply order, journal order and
/// replica order are the same total order.
pub struct StorageEngine {
    inner: Mutex<EngineInner>,
}

struct EngineInner {
    keyspace: Keyspace,
    aof: Option<AofWriter>,
    replicas: ReplicaSet,
    /// Disabled on replicas: commands arriving from the master stream must
    /// neither re-journal nor fan out again.
    propagate: bool,
}

impl StorageEngine {
    pub fn new(propagate: bool) -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                keyspace: Keyspace::new(),
                aof: None,
                replicas: ReplicaSet::new(),
                propagate,
            }),
        }
    }

    /// Executes a single client command.
    ///
    /// Successful write-set commands are journaled and propagated before the
    /// lock is released; a journal failure is logged and does not fail the
    /// command, since the mutation is already applied.
    pub async fn execute(&self, command: &Command) -> Result<Reply> {
        let mut inner = self.inner.lock().await;
        let reply = inner.dispatch(command)?;
        if command.is_write() {
            inner.journal_and_propagate(command).await;
        }
        Ok(reply)
    }

    /// Executes a queued transaction as one atomic batch.
    ///
    /// Every command is validated (known name, arity, integer arguments)
    /// before anything is applied, so a syntactically bad batch aborts with
    /// zero mutations. A runtime failure such as a kind mismatch stops
    /// execution at the failing command. Either way an aborted batch emits
    /// no AOF records and no replication traffic; on success both are
    /// emitted for every write, in original order, before the lock drops.
    pub async fn execute_batch(&self, commands: &[Command]) -> Result<Vec<Reply>> {
        let mut inner = self.inner.lock().await;

        for command in commands {
            match validate(command) {
                Ok(()) => {}
                Err(Error::Command(e)) => return Err(abort(&e)),
                Err(e) => return Err(e),
            }
        }

        let mut replies = Vec::with_capacity(commands.len());
        for (applied, command) in commands.iter().enumerate() {
            match inner.dispatch(command) {
                Ok(reply) => replies.push(reply),
                Err(Error::Command(e)) => {
                    warn!(
                        "transaction aborted on command {} ('{}'): {e}",
                        applied + 1,
                        command
                    );
                    return Err(abort(&e));
                }
                Err(e) => return Err(e),
            }
        }

        for command in commands.iter().filter(|c| c.is_write()) {
            inner.journal_and_propagate(command).await;
        }

        Ok(replies)
    }

    /// Applies a command received from the master stream or replayed from
    /// the AOF: no journaling, no fan-out.
    pub async fn apply_replicated(&self, command: &Command) -> Result<Reply> {
        let mut inner = self.inner.lock().await;
        inner.dispatch(command)
    }

    /// Performs the initial full sync towards a new replica and, once the
    /// synthesized state is flushed, adds it to the live set.
    ///
    /// Runs entirely under the keyspace lock: every write committed after
    /// this returns is guaranteed to reach the replica through live
    /// propagation, exactly once, in apply order.
    pub async fn attach_replica(&self, writer: OwnedWriteHalf, tag: String) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut replica = ReplicaWriter::new(writer, tag);

        let commands = full_sync_commands(&inner.keyspace, unix_now());
        let count = commands.len();
        for command in &commands {
            replica.send(&command_record(command)).await?;
        }

        info!(
            "[{}] replica attached, full sync replayed {count} commands",
            replica.tag()
        );
        inner.replicas.insert(replica);
        debug!("{} live replicas", inner.replicas.len());
        Ok(())
    }

    /// Drops the whole keyspace. A replica calls this when (re)establishing
    /// its master link, so stale local state cannot outlive a resync.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.keyspace.clear();
    }

    /// Sweeps expired entries, then serializes the keyspace to `path`.
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let swept = inner.keyspace.sweep(unix_now());
        if swept > 0 {
            debug!("snapshot sweep dropped {swept} expired entries");
        }
        snapshot::save(path, &inner.keyspace).await?;
        info!("snapshot of {} entries saved to {path:?}", inner.keyspace.len());
        Ok(())
    }

    /// Replaces the keyspace with the contents of a snapshot file.
    ///
    /// A missing file starts empty; any other load failure is logged and
    /// non-fatal, also starting empty.
    pub async fn load_snapshot(&self, path: &Path) {
        match snapshot::load(path).await {
            Ok(Some(entries)) => {
                let mut inner = self.inner.lock().await;
                inner.keyspace.replace_all(entries);
                info!("loaded {} entries from snapshot {path:?}", inner.keyspace.len());
            }
            Ok(None) => {
                warn!("snapshot file {path:?} not found, starting with an empty keyspace");
            }
            Err(e) => {
                error!("failed to load snapshot {path:?}: {e}, starting with an empty keyspace");
            }
        }
    }

    /// Rebuilds the keyspace by replaying the append-only file.
    ///
    /// Records stream through the same RESP-Array decoder the replica link
    /// uses. A truncated trailing record (crash mid-append) ends the replay;
    /// a missing file starts empty. Returns the number of applied commands.
    pub async fn replay_aof(&self, path: &Path) -> Result<usize> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("AOF file {path:?} not found, starting with an empty keyspace");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut inner = self.inner.lock().await;
        let mut buf = BytesMut::from(&bytes[..]);
        let mut decoder = CommandDecoder;
        let mut applied = 0;

        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(command)) => {
                    if let Err(e) = inner.dispatch(&command) {
                        warn!("AOF replay skipped command '{command}': {e}");
                    }
                    applied += 1;
                }
                Ok(None) => {
                    if !buf.is_empty() {
                        warn!(
                            "AOF {path:?} ends with a truncated record ({} bytes dropped)",
                            buf.len()
                        );
                    }
                    break;
                }
                Err(e) => {
                    error!("AOF {path:?} is corrupt, stopping replay: {e}");
                    break;
                }
            }
        }

        info!("AOF replay applied {applied} commands from {path:?}");
        Ok(applied)
    }

    /// Opens the append-only file; every subsequent successful write appends
    /// its RESP-Array record there.
    pub async fn open_aof(&self, path: &Path) -> Result<()> {
        let aof = AofWriter::open(path).await?;
        let mut inner = self.inner.lock().await;
        inner.aof = Some(aof);
        Ok(())
    }

    /// Flushes and closes the append-only file on graceful shutdown.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut aof) = inner.aof.take() {
            if let Err(e) = aof.close().await {
                error!("failed to close AOF: {e}");
            }
        }
    }

    pub async fn entry_count(&self) -> usize {
        self.inner.lock().await.keyspace.len()
    }
}

/// Wraps the failing command's message into the single error reply an
/// aborted transaction produces.
fn abort(cause: &CommandError) -> Error {
    CommandError::err(format!("Transaction aborted: {}", cause.message)).into()
}

impl EngineInner {
    /// Appends the command to the AOF and broadcasts it to every live
    /// replica, while the keyspace lock is still held.
    async fn journal_and_propagate(&mut self, command: &Command) {
        if !self.propagate {
            return;
        }

        let record = command_record(command);
        if let Some(aof) = &mut self.aof {
            // a failed append must not fail the already-applied command
            if let Err(e) = aof.append(&record).await {
                error!("AOF append failed for '{command}': {e}");
            }
        }
        self.replicas.broadcast(&record).await;
    }

    /// Executes one command against the keyspace. Expiry is evaluated and
    /// purged before the command's semantics run.
    fn dispatch(&mut self, command: &Command) -> Result<Reply> {
        let args = &command.args;
        match command.name.as_str() {
            "SET" => self.set(args),
            "GET" => self.get(args),
            "DELETE" => self.delete(args),
            "EXPIRE" => self.expire(args),
            "LPUSH" => self.lpush(args),
            "LRANGE" => self.lrange(args),
            "HSET" => self.hset(args),
            "HGET" => self.hget(args),
            name => Err(CommandError::unknown_command(name).into()),
        }
    }

    fn set(&mut self, args: &[String]) -> Result<Reply> {
        let (key, value, expire_in) = match args {
            [key, value] => (key, value, None),
            [key, value, ex, seconds] if ex.eq_ignore_ascii_case("EX") => {
                let seconds = parse_integer(seconds)?;
                if seconds < 0 {
                    return Err(CommandError::not_an_integer().into());
                }
                (key, value, Some(seconds))
            }
            _ => return Err(CommandError::wrong_arity("set").into()),
        };

        // unconditional replace: any previous kind and expiry are discarded
        let expire_at = expire_in.map(|seconds| unix_now() + seconds as f64);
        self.keyspace
            .insert(key.clone(), Entry::new(Value::Str(value.clone()), expire_at));
        Ok(Reply::ok())
    }

    fn get(&mut self, args: &[String]) -> Result<Reply> {
        let [key] = args else {
            return Err(CommandError::wrong_arity("get").into());
        };

        if self.keyspace.purge_expired(key, unix_now()) {
            return Ok(Reply::Nil);
        }
        match self.keyspace.get(key) {
            None => Ok(Reply::Nil),
            Some(entry) => match &entry.value {
                Value::Str(s) => Ok(Reply::Bulk(s.clone())),
                _ => Err(CommandError::wrong_type().into()),
            },
        }
    }

    fn delete(&mut self, args: &[String]) -> Result<Reply> {
        let [key] = args else {
            return Err(CommandError::wrong_arity("delete").into());
        };

        // an entry found expired here still existed, if only logically
        if self.keyspace.purge_expired(key, unix_now()) {
            return Ok(Reply::Integer(1));
        }
        Ok(Reply::Integer(self.keyspace.remove(key).map_or(0, |_| 1)))
    }

    fn expire(&mut self, args: &[String]) -> Result<Reply> {
        let [key, seconds] = args else {
            return Err(CommandError::wrong_arity("expire").into());
        };
        let seconds = parse_integer(seconds)?;

        let now = unix_now();
        if self.keyspace.purge_expired(key, now) {
            return Ok(Reply::Integer(0));
        }
        match self.keyspace.get_mut(key) {
            None => Ok(Reply::Integer(0)),
            Some(entry) => {
                entry.expire_at = Some(now + seconds as f64);
                Ok(Reply::Integer(1))
            }
        }
    }

    fn lpush(&mut self, args: &[String]) -> Result<Reply> {
        let (key, values) = match args {
            [key, values @ ..] if !values.is_empty() => (key, values),
            _ => return Err(CommandError::wrong_arity("lpush").into()),
        };

        self.keyspace.purge_expired(key, unix_now());
        if let Some(entry) = self.keyspace.get_mut(key) {
            return match &mut entry.value {
                Value::List(list) => {
                    // left-to-right prepend: the last pushed value becomes the head
                    list.splice(0..0, values.iter().rev().cloned());
                    Ok(Reply::Integer(list.len() as i64))
                }
                _ => Err(CommandError::wrong_type().into()),
            };
        }

        let list: Vec<String> = values.iter().rev().cloned().collect();
        let len = list.len();
        self.keyspace
            .insert(key.clone(), Entry::persistent(Value::List(list)));
        Ok(Reply::Integer(len as i64))
    }

    fn lrange(&mut self, args: &[String]) -> Result<Reply> {
        let [key, start, stop] = args else {
            return Err(CommandError::wrong_arity("lrange").into());
        };
        let start = parse_integer(start)?;
        let stop = parse_integer(stop)?;

        if self.keyspace.purge_expired(key, unix_now()) {
            return Ok(Reply::Array(Vec::new()));
        }
        let Some(entry) = self.keyspace.get(key) else {
            return Ok(Reply::Array(Vec::new()));
        };
        let Value::List(list) = &entry.value else {
            return Err(CommandError::wrong_type().into());
        };

        Ok(Reply::Array(
            list_range(list, start, stop)
                .iter()
                .map(|v| Reply::Bulk(v.clone()))
                .collect(),
        ))
    }

    fn hset(&mut self, args: &[String]) -> Result<Reply> {
        let [key, field, value] = args else {
            return Err(CommandError::wrong_arity("hset").into());
        };

        self.keyspace.purge_expired(key, unix_now());
        if let Some(entry) = self.keyspace.get_mut(key) {
            return match &mut entry.value {
                Value::Hash(hash) => {
                    let is_new = hash.insert(field.clone(), value.clone()).is_none();
                    Ok(Reply::Integer(is_new as i64))
                }
                _ => Err(CommandError::wrong_type().into()),
            };
        }

        let mut hash = std::collections::HashMap::new();
        hash.insert(field.clone(), value.clone());
        self.keyspace
            .insert(key.clone(), Entry::persistent(Value::Hash(hash)));
        Ok(Reply::Integer(1))
    }

    fn hget(&mut self, args: &[String]) -> Result<Reply> {
        let [key, field] = args else {
            return Err(CommandError::wrong_arity("hget").into());
        };

        if self.keyspace.purge_expired(key, unix_now()) {
            return Ok(Reply::Nil);
        }
        match self.keyspace.get(key) {
            None => Ok(Reply::Nil),
            Some(entry) => match &entry.value {
                Value::Hash(hash) => Ok(hash
                    .get(field)
                    .map_or(Reply::Nil, |v| Reply::Bulk(v.clone()))),
                _ => Err(CommandError::wrong_type().into()),
            },
        }
    }
}

/// Syntactic validation of a queued command: known name, arity, integer
/// arguments. Run over a whole transaction before any command applies, so
/// malformed batches abort without mutating anything. Kind conflicts are
/// deliberately not checked here: earlier commands in the batch may change
/// a key's kind, so they are only decidable at execution.
fn validate(command: &Command) -> Result<()> {
    let args = &command.args;
    match command.name.as_str() {
        "SET" => match args.as_slice() {
            [_, _] => Ok(()),
            [_, _, ex, seconds] if ex.eq_ignore_ascii_case("EX") => {
                if parse_integer(seconds)? < 0 {
                    return Err(CommandError::not_an_integer().into());
                }
                Ok(())
            }
            _ => Err(CommandError::wrong_arity("set").into()),
        },
        "GET" => check_arity(args, 1, "get"),
        "DELETE" => check_arity(args, 1, "delete"),
        "EXPIRE" => {
            check_arity(args, 2, "expire")?;
            parse_integer(&args[1]).map(drop)
        }
        "LPUSH" if args.len() >= 2 => Ok(()),
        "LPUSH" => Err(CommandError::wrong_arity("lpush").into()),
        "LRANGE" => {
            check_arity(args, 3, "lrange")?;
            parse_integer(&args[1])?;
            parse_integer(&args[2]).map(drop)
        }
        "HSET" => check_arity(args, 3, "hset"),
        "HGET" => check_arity(args, 2, "hget"),
        name => Err(CommandError::unknown_command(name).into()),
    }
}

fn check_arity(args: &[String], expected: usize, command: &str) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CommandError::wrong_arity(command).into())
    }
}

fn parse_integer(token: &str) -> Result<i64> {
    atoi::atoi(token.as_bytes()).ok_or_else(|| CommandError::not_an_integer().into())
}

/// Zero-based inclusive range with `stop == -1` meaning "through the end".
/// Out-of-range indices clamp to an empty slice; negative indices other
/// than `-1` for `stop` are not interpreted.
fn list_range(list: &[String], start: i64, stop: i64) -> &[String] {
    if start < 0 || start as usize >= list.len() {
        return &[];
    }
    let start = start as usize;
    let end = if stop == -1 {
        list.len()
    } else if stop < 0 {
        return &[];
    } else {
        usize::min(stop as usize + 1, list.len())
    };
    if end <= start { &[] } else { &list[start..end] }
}
