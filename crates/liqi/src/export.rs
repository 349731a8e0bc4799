//! Decoded game records and where they are written.

use std::future::Future;
use std::path::{Path, PathBuf};

use liqi_protocol::{FrameCodec, ProtocolError, ResolvedMessage, TypeRegistry, lq, unwrap_compound};
use serde::Serialize;

use crate::LiqiError;

/// One exported game: the listing entry plus every event of the game,
/// decoded in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecordExport {
    /// The record as the lobby listed it.
    pub head: lq::RecordGame,
    /// Round starts, draws, discards, calls and results, in game order.
    pub details: Vec<ResolvedMessage>,
}

impl GameRecordExport {
    /// The game's UUID.
    pub fn uuid(&self) -> &str {
        &self.head.uuid
    }
}

/// Decodes a stored game record (a wrapped `GameDetailRecords`) into its
/// ordered entries.
///
/// # Errors
/// Fails on malformed bytes or on the first entry whose type tag is not
/// registered.
pub fn decode_record<C: FrameCodec + ?Sized>(
    codec: &C,
    registry: &TypeRegistry,
    data: &[u8],
) -> Result<Vec<ResolvedMessage>, ProtocolError> {
    let entries = unwrap_compound(codec, data)?;
    registry.decode_all(
        entries
            .iter()
            .map(|(tag, bytes)| (tag.as_str(), bytes.as_slice())),
    )
}

/// Destination for exported records.
pub trait RecordSink: Send + Sync {
    /// Persists one record.
    fn write(
        &self,
        record: &GameRecordExport,
    ) -> impl Future<Output = Result<(), LiqiError>> + Send;
}

/// Writes each record as pretty-printed JSON to `<dir>/<uuid>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    /// Writes into `dir`, creating it on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a record with `uuid` is written to.
    pub fn path_for(&self, uuid: &str) -> PathBuf {
        let file_stem: String = uuid
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }
}

impl RecordSink for JsonDirSink {
    async fn write(&self, record: &GameRecordExport) -> Result<(), LiqiError> {
        let json = serde_json::to_vec_pretty(record).map_err(ProtocolError::Json)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(record.uuid());
        tokio::fs::write(&path, json).await?;
        tracing::debug!(path = %path.display(), "record written");
        Ok(())
    }
}
