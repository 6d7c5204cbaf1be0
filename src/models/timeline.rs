use std::collections::BTreeMap;
use std::convert::TryFrom;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::icloud::{ResolvedPhoto, YearGroups};
use memory_lane_api_structs::{Location, PhotoRecord};

/// A photo as the timeline renders it, whichever source it came from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub location: Option<Location>,
    pub caption: Option<String>,
    pub headline: Option<String>,
}

pub type Timeline = BTreeMap<i32, Vec<TimelineEntry>>;

impl From<ResolvedPhoto> for TimelineEntry {
    fn from(photo: ResolvedPhoto) -> Self {
        TimelineEntry {
            id: photo.id,
            url: photo.url,
            date: photo.date,
            width: Some(photo.width),
            height: Some(photo.height),
            location: None,
            caption: None,
            headline: None,
        }
    }
}

impl TryFrom<PhotoRecord> for TimelineEntry {
    type Error = time::error::Parse;

    fn try_from(record: PhotoRecord) -> Result<Self, Self::Error> {
        Ok(TimelineEntry {
            date: OffsetDateTime::parse(&record.date, &Rfc3339)?,
            id: record.id,
            url: record.url,
            width: None,
            height: None,
            location: Some(record.location),
            caption: Some(record.caption),
            headline: record.headline,
        })
    }
}

/// Buckets already date-sorted items by calendar year in `offset`, keeping
/// their order within each year.
pub fn group_by_year<T, F>(items: Vec<T>, offset: UtcOffset, date: F) -> BTreeMap<i32, Vec<T>>
where
    F: Fn(&T) -> OffsetDateTime,
{
    let mut groups: BTreeMap<i32, Vec<T>> = BTreeMap::new();
    for item in items {
        let year = date(&item).to_offset(offset).year();
        groups.entry(year).or_default().push(item);
    }
    groups
}

pub fn from_year_groups(groups: YearGroups) -> Timeline {
    groups
        .into_iter()
        .map(|(year, photos)| (year, photos.into_iter().map(Into::into).collect()))
        .collect()
}

/// Records with an unparseable date are skipped.
pub fn from_records(records: Vec<PhotoRecord>, offset: UtcOffset) -> Timeline {
    let mut entries: Vec<TimelineEntry> = records
        .into_iter()
        .filter_map(|record| {
            let id = record.id.clone();
            match TimelineEntry::try_from(record) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(%id, %err, "skipping photo with unparseable date");
                    None
                },
            }
        })
        .collect();
    entries.sort_by_key(|entry| entry.date);

    group_by_year(entries, offset, |entry| entry.date)
}

#[derive(Debug, Serialize)]
pub struct YearSection<'a> {
    pub year: i32,
    pub photos: &'a [TimelineEntry],
}

/// Newest year first, photos oldest first within a year.
pub fn sections_newest_first(timeline: &Timeline) -> Vec<YearSection<'_>> {
    timeline
        .iter()
        .rev()
        .map(|(year, photos)| YearSection {
            year: *year,
            photos: photos.as_slice(),
        })
        .collect()
}
