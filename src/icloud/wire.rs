//! Response shapes of the shared stream endpoints.
//!
//! Per-photo records are kept as raw JSON until they are needed so one
//! malformed entry can be dropped without failing the whole response.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct StreamManifest {
    #[serde(rename = "X-Apple-MMe-Host")]
    pub host: Option<String>,
    #[serde(default)]
    pub photos: Option<Vec<serde_json::Value>>,
}

impl StreamManifest {
    /// The reassignment host, if the response carried a non-empty one.
    pub fn reassigned_host(&self) -> Option<&str> {
        self.host.as_deref().filter(|host| !host.is_empty())
    }

    pub fn into_photos(self) -> Vec<serde_json::Value> {
        self.photos.unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ManifestPhoto {
    pub photo_guid: String,
    pub date_created: String,
    /// Kept in document order so width ties resolve to the first-seen entry.
    #[serde(deserialize_with = "ordered_derivatives")]
    pub derivatives: Vec<(String, Derivative)>,
}

impl ManifestPhoto {
    /// The widest derivative. Later derivatives only win when strictly wider.
    pub fn widest_derivative(&self) -> Option<&Derivative> {
        self.derivatives
            .iter()
            .map(|(_, derivative)| derivative)
            .fold(None, |widest: Option<&Derivative>, candidate| match widest {
                Some(current) if candidate.width <= current.width => Some(current),
                _ => Some(candidate),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct Derivative {
    #[serde(deserialize_with = "lenient_u32")]
    pub width: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub height: u32,
    pub checksum: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssetUrlsRequest<'a> {
    pub photo_guids: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssetUrls {
    #[serde(default)]
    pub items: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub locations: Locations,
}

impl AssetUrls {
    pub fn item(&self, checksum: &str) -> Option<AssetItem> {
        let raw = self.items.get(checksum)?;
        match AssetItem::deserialize(raw) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::debug!(checksum, %err, "dropping malformed asset item");
                None
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssetItem {
    #[serde(deserialize_with = "lenient_key")]
    pub url_location: String,
    pub url_path: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct AssetLocation {
    pub scheme: String,
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// iCloud keys locations by host name; a plain array is accepted as well and
/// indexed by the item's numeric `url_location`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Locations {
    Keyed(HashMap<String, AssetLocation>),
    Indexed(Vec<AssetLocation>),
}

impl Default for Locations {
    fn default() -> Self {
        Locations::Keyed(HashMap::new())
    }
}

impl Locations {
    pub fn get(&self, key: &str) -> Option<&AssetLocation> {
        match self {
            Locations::Keyed(locations) => locations.get(key),
            Locations::Indexed(locations) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| locations.get(index)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => u32::try_from(n).map_err(de::Error::custom),
        NumberOrString::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn lenient_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Text(s) => s,
    })
}

fn ordered_derivatives<'de, D>(deserializer: D) -> Result<Vec<(String, Derivative)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, Derivative)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of derivative name to derivative")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}
