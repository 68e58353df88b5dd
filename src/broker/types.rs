use serde::{Deserialize, Serialize};

/// One queue element as carried across the southbound wire protocol.
///
/// An empty `key` is the broker's way of saying "no master queue here has
/// elements" (see `GET /front`); it is never a valid key for a pushed value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Vec<u8>,
}

impl Element {
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct PushRequest<'a> {
    pub value: &'a [u8],
}

#[derive(Debug, Serialize)]
pub struct PopRequest<'a> {
    pub key: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AddKeyRequest<'a> {
    pub key: &'a str,
    #[serde(rename = "isMaster")]
    pub is_master: bool,
}

#[derive(Debug, Serialize)]
pub struct SetMasterRequest {
    #[serde(rename = "masterStatus")]
    pub master_status: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportRequest<'a> {
    pub key: &'a str,
    pub values: &'a [Vec<u8>],
    #[serde(rename = "isMaster")]
    pub is_master: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportRequest<'a> {
    pub key: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ExportResponse {
    pub values: Vec<Vec<u8>>,
}
