use crate::{
    Result,
    config::{PersistenceMode, Role, ServerConfig},
    connection::handle_client,
    replication,
    store::StorageEngine,
};
use log::{debug, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal, time};

/// The listening server: owns the storage engine and the background tasks
/// around it.
pub struct Server {
    config: ServerConfig,
    engine: Arc<StorageEngine>,
}

impl Server {
    /// Builds the engine for `config` and restores persisted state.
    ///
    /// Masters load their snapshot or replay their AOF here; replicas start
    /// empty and receive their state from the master's full sync instead.
    pub async fn prepare(config: ServerConfig) -> Result<Self> {
        let engine = Arc::new(StorageEngine::new(config.role == Role::Master));

        if config.role == Role::Master {
            match config.persistence_mode {
                PersistenceMode::Snapshot => {
                    engine.load_snapshot(&config.snapshot_file).await;
                }
                PersistenceMode::Aof => {
                    engine.replay_aof(&config.aof_file).await?;
                    engine.open_aof(&config.aof_file).await?;
                }
            }
        }

        Ok(Self { config, engine })
    }

    pub fn engine(&self) -> Arc<StorageEngine> {
        self.engine.clone()
    }

    /// Binds the listener and serves until interrupted.
    ///
    /// On `ctrl_c` the accept loop stops, the append-only file is flushed
    /// and closed, and the call returns cleanly; connections already being
    /// served finish their in-flight command on their own tasks.
    pub async fn run(self) -> Result<()> {
        let Self { config, engine } = self;

        if config.role == Role::Master
            && config.persistence_mode == PersistenceMode::Snapshot
        {
            tokio::spawn(periodic_snapshot(
                engine.clone(),
                config.snapshot_file.clone(),
                config.snapshot_interval,
            ));
        }

        if let Some((master_host, master_port)) = config.master_addr.clone() {
            tokio::spawn(replication::run_replica(
                engine.clone(),
                master_host,
                master_port,
                config.port,
            ));
        }

        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!(
            "IgnisDB {:?} listening on {}:{}, persistence mode {:?}",
            config.role, config.host, config.port, config.persistence_mode
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    debug!("new connection from {addr}");

                    let engine = engine.clone();
                    let role = config.role;
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, addr, engine, role).await {
                            debug!("[{addr}] connection ended: {e}");
                        }
                    });
                }
                _ = signal::ctrl_c() => {
                    info!("interrupt received, shutting down");
                    break;
                }
            }
        }

        engine.shutdown().await;
        Ok(())
    }
}

async fn periodic_snapshot(
    engine: Arc<StorageEngine>,
    path: std::path::PathBuf,
    interval: u64,
) {
    let mut ticker = time::interval(Duration::from_secs(interval));
    // the first tick fires immediately; skip it so saves start one full
    // interval after boot
    ticker.tick().await;

    loop {
        ticker.tick().await;
        debug!("periodic snapshot starting");
        if let Err(e) = engine.save_snapshot(&path).await {
            warn!("periodic snapshot failed: {e}");
        }
    }
}
