use crate::Result;
use log::info;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

/// The append-only command journal.
///
/// Records are written in apply order, under the keyspace lock, before the
/// originating client sees success. The file is never fsync'd per record:
/// durability rides on the OS buffer flush cadence.
pub struct AofWriter {
    file: File,
    path: PathBuf,
}

impl AofWriter {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        info!("AOF file {path:?} opened for append");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Appends one pre-serialized RESP-Array record.
    pub async fn append(&mut self, record: &[u8]) -> Result<()> {
        self.file.write_all(record).await?;
        Ok(())
    }

    /// Flushes buffered bytes and closes the file.
    pub async fn close(&mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        info!("AOF file {:?} closed", self.path);
        Ok(())
    }
}
