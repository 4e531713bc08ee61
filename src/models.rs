use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Single playable or auxiliary source handed to the embedding application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MediaItemSource {
    Video {
        link: String,
        description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
    },
    Subtitle {
        link: String,
        description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
    },
}
