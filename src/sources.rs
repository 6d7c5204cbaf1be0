use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use time::UtcOffset;

use crate::icloud::{ResolveError, SharedStreamClient, StreamTransport};
use crate::models::timeline::{self, Timeline};
use memory_lane_api_structs::PhotoRecord;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("resolving the shared album failed")]
    Resolve(#[from] ResolveError),
    #[error("resolving the shared album timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not read local photo manifest")]
    Io(#[from] std::io::Error),
    #[error("local photo manifest is malformed")]
    Json(#[from] serde_json::Error),
}

/// Where the timeline's photos come from.
#[derive(Debug)]
pub enum PhotoSource {
    SharedAlbum {
        client: SharedStreamClient<Box<dyn StreamTransport>>,
        album_id: String,
        timeout: Duration,
    },
    /// A `photos.json` written by `memory-lane-sync`.
    LocalManifest { path: PathBuf, offset: UtcOffset },
}

impl PhotoSource {
    pub fn shared_album<T: StreamTransport + 'static>(
        transport: T,
        album_id: impl Into<String>,
        timeout: Duration,
        offset: UtcOffset,
    ) -> Self {
        let transport: Box<dyn StreamTransport> = Box::new(transport);
        PhotoSource::SharedAlbum {
            client: SharedStreamClient::new(transport).with_offset(offset),
            album_id: album_id.into(),
            timeout,
        }
    }

    pub async fn load(&self) -> Result<Timeline, SourceError> {
        match self {
            PhotoSource::SharedAlbum {
                client,
                album_id,
                timeout,
            } => {
                let groups = async_std::future::timeout(*timeout, client.resolve(album_id))
                    .await
                    .map_err(|_| SourceError::Timeout(*timeout))??;
                Ok(timeline::from_year_groups(groups))
            },
            PhotoSource::LocalManifest { path, offset } => {
                let raw = async_std::fs::read_to_string(path).await?;
                let records: Vec<PhotoRecord> = serde_json::from_str(&raw)?;
                Ok(timeline::from_records(records, *offset))
            },
        }
    }
}
