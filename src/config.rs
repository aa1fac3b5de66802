use crate::{Error, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_MASTER_PORT: u16 = 6380;
const DEFAULT_REPLICA_PORT: u16 = 6381;
const DEFAULT_SNAPSHOT_INTERVAL: u64 = 300;

/// IgnisDB, an in-memory key-value datastore
#[derive(Parser, Debug)]
#[command(name = "ignisdb")]
#[command(about = "In-memory key-value datastore speaking a RESP-style protocol")]
#[command(version)]
pub struct Cli {
    /// Server role
    #[arg(long, value_enum, default_value_t = Role::Master)]
    pub role: Role,

    /// Listen host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Listen port (defaults to 6380 for a master, 6381 for a replica)
    #[arg(long)]
    pub port: Option<u16>,

    /// Master host to replicate from (replica role only)
    #[arg(long, default_value = DEFAULT_HOST)]
    pub master_host: String,

    /// Master port to replicate from (replica role only)
    #[arg(long)]
    pub master_port: Option<u16>,

    /// Persistence strategy
    #[arg(long, value_enum, default_value_t = PersistenceMode::Snapshot)]
    pub persistence_mode: PersistenceMode,

    /// Path of the snapshot document
    #[arg(long, default_value = "ignisdb_snapshot.json")]
    pub snapshot_file: PathBuf,

    /// Path of the append-only file
    #[arg(long, default_value = "ignisdb.aof")]
    pub aof_file: PathBuf,

    /// Seconds between periodic snapshot saves
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_INTERVAL)]
    pub snapshot_interval: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Replica,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    Snapshot,
    Aof,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub role: Role,
    pub host: String,
    pub port: u16,
    /// `(host, port)` of the master; present exactly when `role` is replica.
    pub master_addr: Option<(String, u16)>,
    pub persistence_mode: PersistenceMode,
    pub snapshot_file: PathBuf,
    pub aof_file: PathBuf,
    pub snapshot_interval: u64,
}

impl ServerConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let port = cli.port.unwrap_or(match cli.role {
            Role::Master => DEFAULT_MASTER_PORT,
            Role::Replica => DEFAULT_REPLICA_PORT,
        });

        let master_addr = match cli.role {
            Role::Master => None,
            Role::Replica => {
                let master_port = cli.master_port.ok_or_else(|| {
                    Error::Config("--master-port is required for the replica role".to_owned())
                })?;
                Some((cli.master_host, master_port))
            }
        };

        if cli.snapshot_interval == 0 {
            return Err(Error::Config(
                "--snapshot-interval must be at least 1 second".to_owned(),
            ));
        }

        Ok(Self {
            role: cli.role,
            host: cli.host,
            port,
            master_addr,
            persistence_mode: cli.persistence_mode,
            snapshot_file: cli.snapshot_file,
            aof_file: cli.aof_file,
            snapshot_interval: cli.snapshot_interval,
        })
    }
}
