#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One entry of the `photos.json` file written by the sync tool.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub url: String,
    /// RFC 3339 timestamp.
    pub date: String,
    pub location: Location,
    pub caption: String,
    #[serde(default, alias = "bbcHeadline", skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    Comment,
    Reaction,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentPayload {
    #[serde(rename = "type")]
    pub kind: CommentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl CommentPayload {
    /// Whether the payload carries the content its kind requires.
    pub fn is_empty(&self) -> bool {
        let content = match self.kind {
            CommentKind::Comment => &self.text,
            CommentKind::Reaction => &self.emoji,
        };
        content.as_deref().map_or(true, |c| c.trim().is_empty())
    }
}
