//! Capture date, GPS position and title of a photo file.

use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use exif::{In, Tag, Value};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::xmp;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not read photo file")]
    Io(#[from] std::io::Error),
    #[error("could not read EXIF data")]
    Exif(#[from] exif::Error),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhotoMetadata {
    pub taken: Option<OffsetDateTime>,
    /// Latitude and longitude in decimal degrees.
    pub gps: Option<(f64, f64)>,
    pub title: Option<String>,
}

pub fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "tif" | "tiff"))
        .unwrap_or(false)
}

/// Files without any EXIF block yield empty metadata rather than an error.
pub fn read_metadata(path: &Path) -> Result<PhotoMetadata, Error> {
    let mut file = File::open(path)?;

    let mut metadata = {
        let mut bufreader = BufReader::new(&file);
        match exif::Reader::new().read_from_container(&mut bufreader) {
            Ok(exif) => from_exif(&exif),
            Err(exif::Error::NotFound(_)) => PhotoMetadata::default(),
            Err(err) => return Err(err.into()),
        }
    };

    if is_tiff(path) {
        file.seek(SeekFrom::Start(0))?;
        match xmp::read_xmp_packet(&file).and_then(|packet| xmp::parse_xmp(&packet)) {
            Ok(packet) => {
                metadata.title = packet.title;
                if metadata.taken.is_none() {
                    metadata.taken = packet
                        .create_date
                        .and_then(|date| OffsetDateTime::parse(&date, &Rfc3339).ok());
                }
            },
            Err(err) => log::debug!("No XMP metadata in {}: {}", path.display(), err),
        }
    }

    Ok(metadata)
}

/// Creation time of the file itself, falling back to its modification time.
pub fn file_time(path: &Path) -> std::io::Result<OffsetDateTime> {
    let metadata = std::fs::metadata(path)?;
    let time = metadata.created().or_else(|_| metadata.modified())?;
    Ok(OffsetDateTime::from(time))
}

fn from_exif(exif: &exif::Exif) -> PhotoMetadata {
    let taken = [
        (Tag::DateTimeOriginal, Tag::OffsetTimeOriginal),
        (Tag::DateTimeDigitized, Tag::OffsetTimeDigitized),
        (Tag::DateTime, Tag::OffsetTime),
    ]
    .iter()
    .find_map(|&(tag, offset_tag)| exif_datetime(exif, tag, offset_tag));

    let latitude = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S');
    let longitude = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W');
    let gps = match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ => None,
    };

    PhotoMetadata {
        taken,
        gps,
        title: None,
    }
}

fn first_ascii(exif: &exif::Exif, tag: Tag) -> Option<&[u8]> {
    match exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(ref values) => values.first().map(|v| v.as_slice()),
        _ => None,
    }
}

/// EXIF timestamps carry no zone unless an offset tag accompanies them;
/// those are taken as UTC.
fn exif_datetime(exif: &exif::Exif, tag: Tag, offset_tag: Tag) -> Option<OffsetDateTime> {
    let mut datetime = exif::DateTime::from_ascii(first_ascii(exif, tag)?).ok()?;
    if let Some(offset) = first_ascii(exif, offset_tag) {
        datetime.parse_offset(offset).ok();
    }

    let date = Date::from_calendar_date(
        i32::from(datetime.year),
        Month::try_from(datetime.month).ok()?,
        datetime.day,
    )
    .ok()?;
    let time = Time::from_hms_nano(
        datetime.hour,
        datetime.minute,
        datetime.second,
        datetime.nanosecond.unwrap_or(0),
    )
    .ok()?;
    let offset = datetime
        .offset
        .and_then(|minutes| UtcOffset::from_whole_seconds(i32::from(minutes) * 60).ok())
        .unwrap_or(UtcOffset::UTC);

    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

fn coordinate(exif: &exif::Exif, tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let parts = match exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(ref parts) if parts.len() == 3 => parts,
        _ => return None,
    };
    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    if !degrees.is_finite() {
        return None;
    }

    match first_ascii(exif, ref_tag).and_then(|r| r.first()) {
        Some(&r) if r == negative_ref => Some(-degrees),
        _ => Some(degrees),
    }
}
