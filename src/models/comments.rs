use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use memory_lane_api_structs::CommentPayload;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 7;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Comment {
    pub id: String,
    #[serde(flatten)]
    pub payload: CommentPayload,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

impl Comment {
    pub fn new(payload: CommentPayload) -> Self {
        Comment {
            id: generate_id(),
            payload,
            date: OffsetDateTime::now_utc(),
        }
    }
}

/// Key the comment list of a photo is stored under.
pub fn storage_key(photo_id: &str) -> String {
    format!("photo:{}", photo_id)
}

fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
