/*!
IgnisDB is an in-memory key-value datastore serving clients over a
line-based text protocol with RESP-framed replies.

# Features
* Typed values: strings, lists and hashes, with per-key time-to-live and
  lazy expiration
* `MULTI`/`EXEC`/`DISCARD` transactions executed as one atomic batch
* Two persistence strategies: periodic JSON snapshots and an append-only
  command log with startup replay
* Single-master asynchronous replication to any number of read-only
  replicas, with automatic full resync on reconnect

# Running a master

```text
ignisdb --port 6380 --persistence-mode snapshot --snapshot-interval 300
```

# Running a replica

```text
ignisdb --role replica --port 6381 --master-port 6380
```

Every mutation funnels through a single keyspace lock that also covers the
AOF append and the replica fan-out, so journal order and replica order are
always the apply order. See [`store::StorageEngine`] for the dispatcher,
[`resp`] for the wire protocol, and [`server::Server`] for the front door.
*/

pub mod config;
mod connection;
mod error;
mod replication;
pub mod resp;
pub mod server;
pub mod store;

pub use error::*;

/// Library general result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
