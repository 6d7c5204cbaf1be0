//! Client for public iCloud shared photo streams.
//!
//! Resolving a stream takes two or three sequential POSTs: the manifest,
//! optionally the manifest again on the host the first answer reassigned us
//! to, and the asset URL lookup on that same host.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::models::timeline::group_by_year;

mod transport;
mod wire;

pub use transport::{IsahcTransport, StreamTransport, TransportResponse};
use wire::{AssetUrls, AssetUrlsRequest, ManifestPhoto, StreamManifest};

pub const DEFAULT_HOST: &str = "p01-sharedstreams.icloud.com";

/// Status the manifest endpoint uses to hand out a different host.
pub const REASSIGNMENT_STATUS: u16 = 330;

const MANIFEST_REQUEST: &[u8] = br#"{"streamCtag":null}"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Manifest,
    AssetUrls,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Manifest => write!(f, "webstream"),
            Endpoint::AssetUrls => write!(f, "webasseturls"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("manifest fetch failed with status {status}")]
    ManifestFetch { status: u16 },
    #[error("asset url fetch failed with status {status}")]
    AssetUrlFetch { status: u16 },
    #[error("request to shared stream failed")]
    Transport(#[from] isahc::Error),
    #[error("malformed {endpoint} response")]
    Malformed {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode asset url request")]
    Encode(#[source] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolvedPhoto {
    pub id: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub width: u32,
    pub height: u32,
}

pub type YearGroups = BTreeMap<i32, Vec<ResolvedPhoto>>;

#[derive(Debug)]
pub struct SharedStreamClient<T> {
    transport: T,
    offset: UtcOffset,
}

impl<T: StreamTransport> SharedStreamClient<T> {
    pub fn new(transport: T) -> Self {
        SharedStreamClient {
            transport,
            offset: UtcOffset::UTC,
        }
    }

    /// Offset whose calendar year photos are grouped under.
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, stream_id: &str) -> Result<YearGroups, ResolveError> {
        let (host, manifest) = self.fetch_manifest(stream_id).await?;

        let photos: Vec<ManifestPhoto> = manifest
            .into_photos()
            .into_iter()
            .filter_map(|raw| match serde_json::from_value(raw) {
                Ok(photo) => Some(photo),
                Err(err) => {
                    tracing::debug!(%err, "dropping malformed manifest entry");
                    None
                },
            })
            .collect();
        if photos.is_empty() {
            return Ok(YearGroups::new());
        }

        let assets = self.fetch_asset_urls(&host, stream_id, &photos).await?;

        let mut resolved: Vec<_> = photos
            .iter()
            .filter_map(|photo| resolve_photo(photo, &assets))
            .collect();
        resolved.sort_by_key(|photo| photo.date);
        tracing::debug!(photos = resolved.len(), "resolved shared stream");

        Ok(group_by_year(resolved, self.offset, |photo| photo.date))
    }

    async fn fetch_manifest(&self, stream_id: &str) -> Result<(String, StreamManifest), ResolveError> {
        let response = self
            .transport
            .post(&webstream_url(DEFAULT_HOST, stream_id), MANIFEST_REQUEST.to_vec())
            .await?;
        if !response.status.is_success() && response.status.as_u16() != REASSIGNMENT_STATUS {
            return Err(ResolveError::ManifestFetch {
                status: response.status.as_u16(),
            });
        }

        let manifest: StreamManifest = decode(Endpoint::Manifest, &response.body)?;
        let host = match manifest.reassigned_host() {
            Some(host) => host.to_string(),
            None => return Ok((DEFAULT_HOST.to_string(), manifest)),
        };

        tracing::debug!(%host, "stream reassigned");
        let response = self
            .transport
            .post(&webstream_url(&host, stream_id), MANIFEST_REQUEST.to_vec())
            .await?;
        if !response.status.is_success() {
            return Err(ResolveError::ManifestFetch {
                status: response.status.as_u16(),
            });
        }

        let manifest = decode(Endpoint::Manifest, &response.body)?;
        Ok((host, manifest))
    }

    async fn fetch_asset_urls(
        &self,
        host: &str,
        stream_id: &str,
        photos: &[ManifestPhoto],
    ) -> Result<AssetUrls, ResolveError> {
        // Only entries that deserialized are asked for; the rest could never
        // be resolved anyway.
        let request = AssetUrlsRequest {
            photo_guids: photos.iter().map(|p| p.photo_guid.as_str()).collect(),
        };
        let body = serde_json::to_vec(&request).map_err(ResolveError::Encode)?;

        let url = format!("https://{}/{}/sharedstreams/webasseturls", host, stream_id);
        let response = self.transport.post(&url, body).await?;
        if !response.status.is_success() {
            return Err(ResolveError::AssetUrlFetch {
                status: response.status.as_u16(),
            });
        }

        decode(Endpoint::AssetUrls, &response.body)
    }
}

fn webstream_url(host: &str, stream_id: &str) -> String {
    format!("https://{}/{}/sharedstreams/webstream", host, stream_id)
}

fn decode<D: DeserializeOwned>(endpoint: Endpoint, body: &[u8]) -> Result<D, ResolveError> {
    serde_json::from_slice(body).map_err(|source| ResolveError::Malformed { endpoint, source })
}

fn resolve_photo(photo: &ManifestPhoto, assets: &AssetUrls) -> Option<ResolvedPhoto> {
    let derivative = photo.widest_derivative()?;
    let item = assets.item(&derivative.checksum)?;

    let location = match assets.locations.get(&item.url_location) {
        Some(location) => location,
        None => {
            tracing::debug!(guid = %photo.photo_guid, location = %item.url_location, "unknown asset location");
            return None;
        },
    };
    let host = location.hosts.first()?;

    let date = match OffsetDateTime::parse(&photo.date_created, &Rfc3339) {
        Ok(date) => date,
        Err(err) => {
            tracing::debug!(guid = %photo.photo_guid, %err, "unparseable creation date");
            return None;
        },
    };

    Some(ResolvedPhoto {
        id: photo.photo_guid.clone(),
        url: format!("{}://{}{}", location.scheme, host, item.url_path),
        date,
        width: derivative.width,
        height: derivative.height,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use isahc::http::StatusCode;
    use serde_json::{json, Value};
    use time::macros::{datetime, offset};

    use super::*;

    #[derive(Debug)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<(u16, Value)>>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<(u16, Value)>) -> Self {
            ScriptedTransport {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }

        fn requested_urls(&self) -> Vec<String> {
            let requests = self.requests.lock().expect("requests lock");
            requests.iter().map(|(url, _)| url.clone()).collect()
        }
    }

    #[async_trait::async_trait]
    impl<'a> StreamTransport for &'a ScriptedTransport {
        async fn post(&self, url: &str, body: Vec<u8>) -> Result<TransportResponse, isahc::Error> {
            let body: Value = serde_json::from_slice(&body).expect("request body is json");
            self.requests
                .lock()
                .expect("requests lock")
                .push((url.to_string(), body));

            let (status, body) = self
                .responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .expect("unexpected request");
            Ok(TransportResponse {
                status: StatusCode::from_u16(status).expect("status"),
                body: serde_json::to_vec(&body).expect("response body"),
            })
        }
    }

    fn derivative(width: u32, checksum: &str) -> Value {
        json!({
            "width": width.to_string(),
            "height": (width / 2).to_string(),
            "checksum": checksum,
            "fileSize": "1024",
        })
    }

    fn item(path: &str) -> Value {
        json!({ "url_location": 0, "url_path": path })
    }

    fn assets(items: Value) -> Value {
        json!({
            "items": items,
            "locations": [{ "scheme": "https", "hosts": ["cdn.example.com"] }],
        })
    }

    #[async_std::test]
    async fn resolves_widest_derivatives_into_year_groups() {
        let transport = ScriptedTransport::new(vec![
            (330, json!({ "X-Apple-MMe-Host": "p42-sharedstreams.icloud.com" })),
            (
                200,
                json!({
                    "photos": [
                        {
                            "photoGuid": "A",
                            "dateCreated": "2021-06-01T09:00:00Z",
                            "derivatives": { "1": derivative(100, "ca"), "2": derivative(400, "cb") },
                        },
                        {
                            "photoGuid": "B",
                            "dateCreated": "2021-03-15T18:30:00Z",
                            "derivatives": { "1": derivative(200, "cc") },
                        },
                    ],
                }),
            ),
            (
                200,
                assets(json!({ "cb": item("/p/b.jpg"), "cc": item("/p/c.jpg") })),
            ),
        ]);

        let client = SharedStreamClient::new(&transport);
        let groups = client.resolve("stream").await.expect("resolve");

        assert_eq!(groups.len(), 1);
        let photos = &groups[&2021];
        assert_eq!(
            photos,
            &vec![
                ResolvedPhoto {
                    id: "B".to_string(),
                    url: "https://cdn.example.com/p/c.jpg".to_string(),
                    date: datetime!(2021-03-15 18:30:00 UTC),
                    width: 200,
                    height: 100,
                },
                ResolvedPhoto {
                    id: "A".to_string(),
                    url: "https://cdn.example.com/p/b.jpg".to_string(),
                    date: datetime!(2021-06-01 09:00:00 UTC),
                    width: 400,
                    height: 200,
                },
            ]
        );

        let requests = transport.requests.lock().expect("requests lock");
        assert_eq!(requests[0].1, json!({ "streamCtag": null }));
        assert_eq!(requests[2].1, json!({ "photoGuids": ["A", "B"] }));
    }

    #[async_std::test]
    async fn asset_urls_are_requested_from_the_reassigned_host() {
        let transport = ScriptedTransport::new(vec![
            (200, json!({ "X-Apple-MMe-Host": "alt.example.com" })),
            (
                200,
                json!({
                    "photos": [{
                        "photoGuid": "A",
                        "dateCreated": "2020-01-01T00:00:00Z",
                        "derivatives": { "1": derivative(100, "ca") },
                    }],
                }),
            ),
            (200, assets(json!({ "ca": item("/a.jpg") }))),
        ]);

        SharedStreamClient::new(&transport)
            .resolve("stream")
            .await
            .expect("resolve");

        assert_eq!(
            transport.requested_urls(),
            vec![
                "https://p01-sharedstreams.icloud.com/stream/sharedstreams/webstream",
                "https://alt.example.com/stream/sharedstreams/webstream",
                "https://alt.example.com/stream/sharedstreams/webasseturls",
            ]
        );
    }

    #[async_std::test]
    async fn default_host_is_kept_without_reassignment() {
        let transport = ScriptedTransport::new(vec![
            (
                200,
                json!({
                    "photos": [{
                        "photoGuid": "A",
                        "dateCreated": "2020-01-01T00:00:00Z",
                        "derivatives": { "1": derivative(100, "ca") },
                    }],
                }),
            ),
            (200, assets(json!({ "ca": item("/a.jpg") }))),
        ]);

        SharedStreamClient::new(&transport)
            .resolve("stream")
            .await
            .expect("resolve");

        assert_eq!(
            transport.requested_urls()[1],
            "https://p01-sharedstreams.icloud.com/stream/sharedstreams/webasseturls"
        );
    }

    #[async_std::test]
    async fn empty_manifest_skips_asset_lookup() {
        let transport = ScriptedTransport::new(vec![(200, json!({ "photos": [] }))]);

        let groups = SharedStreamClient::new(&transport)
            .resolve("stream")
            .await
            .expect("resolve");

        assert!(groups.is_empty());
        assert_eq!(transport.requested_urls().len(), 1);
    }

    #[async_std::test]
    async fn manifest_failure_is_fatal() {
        let transport = ScriptedTransport::new(vec![(404, json!({}))]);

        let result = SharedStreamClient::new(&transport).resolve("stream").await;

        assert!(matches!(result, Err(ResolveError::ManifestFetch { status: 404 })));
        assert_eq!(transport.requested_urls().len(), 1);
    }

    #[async_std::test]
    async fn reassigned_manifest_must_succeed() {
        let transport = ScriptedTransport::new(vec![
            (330, json!({ "X-Apple-MMe-Host": "alt.example.com" })),
            (330, json!({ "X-Apple-MMe-Host": "other.example.com" })),
        ]);

        let result = SharedStreamClient::new(&transport).resolve("stream").await;

        assert!(matches!(result, Err(ResolveError::ManifestFetch { status: 330 })));
    }

    #[async_std::test]
    async fn asset_url_failure_is_fatal() {
        let transport = ScriptedTransport::new(vec![
            (
                200,
                json!({
                    "photos": [{
                        "photoGuid": "A",
                        "dateCreated": "2020-01-01T00:00:00Z",
                        "derivatives": { "1": derivative(100, "ca") },
                    }],
                }),
            ),
            (500, json!({})),
        ]);

        let result = SharedStreamClient::new(&transport).resolve("stream").await;

        assert!(matches!(result, Err(ResolveError::AssetUrlFetch { status: 500 })));
        assert_eq!(
            result.map_err(|err| err.to_string()).unwrap_err(),
            "asset url fetch failed with status 500"
        );
    }

    #[async_std::test]
    async fn unusable_entries_are_dropped() {
        let transport = ScriptedTransport::new(vec![
            (
                200,
                json!({
                    "photos": [
                        { "photoGuid": "no-derivatives", "dateCreated": "2020-01-01T00:00:00Z", "derivatives": {} },
                        { "photoGuid": "missing-derivatives", "dateCreated": "2020-01-01T00:00:00Z" },
                        {
                            "photoGuid": "unmatched",
                            "dateCreated": "2020-01-01T00:00:00Z",
                            "derivatives": { "1": derivative(100, "nope") },
                        },
                        {
                            "photoGuid": "bad-location",
                            "dateCreated": "2020-01-01T00:00:00Z",
                            "derivatives": { "1": derivative(100, "elsewhere") },
                        },
                        {
                            "photoGuid": "kept",
                            "dateCreated": "2020-01-01T00:00:00Z",
                            "derivatives": { "1": derivative(100, "ok") },
                        },
                    ],
                }),
            ),
            (
                200,
                assets(json!({
                    "ok": item("/ok.jpg"),
                    "elsewhere": { "url_location": 7, "url_path": "/x.jpg" },
                })),
            ),
        ]);

        let groups = SharedStreamClient::new(&transport)
            .resolve("stream")
            .await
            .expect("resolve");

        let ids: Vec<_> = groups.values().flatten().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["kept"]);
    }

    #[async_std::test]
    async fn years_follow_the_configured_offset() {
        let transport = ScriptedTransport::new(vec![
            (
                200,
                json!({
                    "photos": [
                        {
                            "photoGuid": "new-years-eve",
                            "dateCreated": "2020-12-31T23:30:00Z",
                            "derivatives": { "1": derivative(100, "a") },
                        },
                        {
                            "photoGuid": "summer",
                            "dateCreated": "2020-07-01T12:00:00Z",
                            "derivatives": { "1": derivative(100, "b") },
                        },
                    ],
                }),
            ),
            (200, assets(json!({ "a": item("/a.jpg"), "b": item("/b.jpg") }))),
        ]);

        let groups = SharedStreamClient::new(&transport)
            .with_offset(offset!(+2))
            .resolve("stream")
            .await
            .expect("resolve");

        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![2020, 2021]);
        assert_eq!(groups[&2021][0].id, "new-years-eve");
        for photos in groups.values() {
            assert!(photos.windows(2).all(|pair| pair[0].date <= pair[1].date));
        }
    }
}
