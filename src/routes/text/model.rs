use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DetectTextRequest {
    pub text: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DetectTextResponse {
    Safe,
    Warning { keywords: Vec<String> },
}

impl DetectTextResponse {
    pub fn from_matches(keywords: Vec<String>) -> Self {
        if keywords.is_empty() {
            DetectTextResponse::Safe
        } else {
            DetectTextResponse::Warning { keywords }
        }
    }
}
