//! Turns a directory of photo files into the `photos.json` the album serves.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::geocode::Geocoder;
use crate::headlines::HeadlineCache;
use crate::metadata::{self, PhotoMetadata};
use memory_lane_api_structs::{Location, PhotoRecord};

/// Used for photos without GPS data.
pub const DEFAULT_LOCATION: (f64, f64) = (51.5074, -0.1278);

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "tif", "tiff"];

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not read photos directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize photo records")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
enum PhotoError {
    #[error(transparent)]
    Metadata(#[from] metadata::Error),
    #[error("could not read file times")]
    FileTime(#[source] std::io::Error),
    #[error("could not format capture date")]
    Format(#[from] time::error::Format),
}

#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub photos_dir: PathBuf,
    pub output: PathBuf,
    /// Prefix the file name is appended to for the public URL.
    pub url_prefix: String,
    /// Pause after each described photo, keeping within Nominatim's usage policy.
    pub delay: Duration,
}

pub fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn caption(path: &Path, title: Option<&str>) -> String {
    match title.map(str::trim).filter(|title| !title.is_empty()) {
        Some(title) => title.to_string(),
        None => {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy())
                .unwrap_or_default();
            format!("Memory: {}", stem)
        },
    }
}

fn photo_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_photo(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn describe<G: Geocoder>(
    path: &Path,
    options: &SyncOptions,
    geocoder: &G,
    headlines: &mut HeadlineCache,
) -> Result<(OffsetDateTime, PhotoRecord), PhotoError> {
    let owned_path = path.to_path_buf();
    let PhotoMetadata { taken, gps, title } =
        async_std::task::spawn_blocking(move || metadata::read_metadata(&owned_path)).await?;

    let taken = match taken {
        Some(taken) => taken,
        None => metadata::file_time(path).map_err(PhotoError::FileTime)?,
    }
    .to_offset(UtcOffset::UTC);

    let (lat, lng) = gps.unwrap_or(DEFAULT_LOCATION);
    let name = geocoder.place_name(lat, lng).await;
    let headline = headlines.headline_for(taken).await;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let record = PhotoRecord {
        url: format!("{}/{}", options.url_prefix.trim_end_matches('/'), file_name),
        id: file_name,
        date: taken.format(&Rfc3339)?,
        location: Location {
            lat,
            lng,
            name: Some(name),
        },
        caption: caption(path, title.as_deref()),
        headline: Some(headline),
    };

    Ok((taken, record))
}

/// Describes every photo in `options.photos_dir` and writes the sorted
/// records to `options.output`. Files that cannot be described are logged
/// and left out.
pub async fn sync<G: Geocoder>(
    options: &SyncOptions,
    geocoder: &G,
    headlines: &mut HeadlineCache,
) -> Result<Vec<PhotoRecord>, Error> {
    let dir = &options.photos_dir;
    let files = photo_files(dir).map_err(|source| Error::ReadDir {
        path: dir.clone(),
        source,
    })?;
    log::info!("Found {} photos in {}", files.len(), dir.display());

    let mut described = Vec::with_capacity(files.len());
    for path in files {
        log::debug!("Processing {}", path.display());
        match describe(&path, options, geocoder, headlines).await {
            Ok(photo) => {
                described.push(photo);
                if options.delay > Duration::from_secs(0) {
                    async_std::task::sleep(options.delay).await;
                }
            },
            Err(err) => log::error!("Failed to process {}: {}", path.display(), err),
        }
    }

    described.sort_by_key(|(taken, _)| *taken);
    let records: Vec<PhotoRecord> = described.into_iter().map(|(_, record)| record).collect();

    let write_error = |source| Error::Write {
        path: options.output.clone(),
        source,
    };
    if let Some(parent) = options.output.parent() {
        async_std::fs::create_dir_all(parent)
            .await
            .map_err(write_error)?;
    }
    let json = serde_json::to_string_pretty(&records)?;
    async_std::fs::write(&options.output, json)
        .await
        .map_err(write_error)?;

    log::info!(
        "Synced {} photos to {}",
        records.len(),
        options.output.display()
    );
    Ok(records)
}
