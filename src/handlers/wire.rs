use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct PushRequestBody {
    pub key: String,
    #[serde_as(as = "Base64")]
    pub value: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct OkMessage {
    pub message: &'static str,
}

impl OkMessage {
    pub const fn ok() -> Self {
        Self { message: "ok" }
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
pub struct PopResponseBody {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde_as(as = "Option<Base64>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

impl PopResponseBody {
    pub fn found(key: String, value: Vec<u8>) -> Self {
        Self {
            message: "ok",
            key: Some(key),
            value: Some(value),
        }
    }

    pub fn empty() -> Self {
        Self {
            message: "Queue is empty",
            key: None,
            value: None,
        }
    }
}
