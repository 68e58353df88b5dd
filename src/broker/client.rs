use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::types::{
    AddKeyRequest, Element, ExportRequest, ExportResponse, ImportRequest, PopRequest,
    PushRequest, SetMasterRequest,
};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("transport error talking to {broker}: {source}")]
    Transport {
        broker: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{broker} returned status {status}")]
    Status { broker: String, status: u16 },
    #[error("malformed response body from {broker}: {source}")]
    Decode {
        broker: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The capability set a broker exposes to the coordinator. Abstracting it
/// behind a trait lets tests substitute an in-memory fake wholesale instead
/// of making real HTTP calls (see the design notes on test doubles).
#[async_trait]
pub trait BrokerRpc: Send + Sync {
    fn name(&self) -> &str;
    async fn healthz(&self) -> Result<Duration, BrokerError>;
    async fn push(&self, key: &str, value: &[u8]) -> Result<(), BrokerError>;
    async fn front(&self) -> Result<Element, BrokerError>;
    async fn remove(&self, key: &str) -> Result<(), BrokerError>;
    async fn add_key(&self, key: &str, is_master: bool) -> Result<(), BrokerError>;
    async fn set_master(&self, key: &str, master_status: bool) -> Result<(), BrokerError>;
    async fn import(
        &self,
        key: &str,
        is_master: bool,
        values: &[Vec<u8>],
    ) -> Result<(), BrokerError>;
    async fn export(&self, key: &str) -> Result<Vec<Vec<u8>>, BrokerError>;
}

/// A typed, mutex-serialized RPC stub for one broker.
///
/// All operations take `call_lock` for the duration of the HTTP request so
/// concurrent callers against the *same* broker observe a strict order;
/// calls against different brokers proceed fully in parallel since each
/// `BrokerClient` owns its own lock.
pub struct BrokerClient {
    name: String,
    address: String,
    http: reqwest::Client,
    call_lock: Mutex<()>,
}

impl BrokerClient {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            http: reqwest::Client::new(),
            call_lock: Mutex::new(()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(BrokerError::Status {
                broker: self.name.clone(),
                status: resp.status().as_u16(),
            })
        }
    }

    fn transport_err(&self, source: reqwest::Error) -> BrokerError {
        BrokerError::Transport {
            broker: self.name.clone(),
            source,
        }
    }

    fn decode_err(&self, source: reqwest::Error) -> BrokerError {
        BrokerError::Decode {
            broker: self.name.clone(),
            source,
        }
    }
}

#[async_trait]
impl BrokerRpc for BrokerClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn healthz(&self) -> Result<Duration, BrokerError> {
        let _guard = self.call_lock.lock().await;
        let start = Instant::now();
        let resp = self
            .http
            .get(self.url("/healthz"))
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.check_status(resp).await?;
        Ok(Instant::now() - start)
    }

    async fn push(&self, key: &str, value: &[u8]) -> Result<(), BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .post(self.url(&format!("/key/{key}/push")))
            .json(&PushRequest { value })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.check_status(resp).await?;
        Ok(())
    }

    async fn front(&self) -> Result<Element, BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .get(self.url("/front"))
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let resp = self.check_status(resp).await?;
        resp.json::<Element>().await.map_err(|e| self.decode_err(e))
    }

    async fn remove(&self, key: &str) -> Result<(), BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .post(self.url(&format!("/key/{key}/pop")))
            .json(&PopRequest { key })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.check_status(resp).await?;
        Ok(())
    }

    async fn add_key(&self, key: &str, is_master: bool) -> Result<(), BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .post(self.url("/key"))
            .json(&AddKeyRequest { key, is_master })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.check_status(resp).await?;
        Ok(())
    }

    async fn set_master(&self, key: &str, master_status: bool) -> Result<(), BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .post(self.url(&format!("/key/{key}/set_master")))
            .json(&SetMasterRequest { master_status })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.check_status(resp).await?;
        Ok(())
    }

    async fn import(
        &self,
        key: &str,
        is_master: bool,
        values: &[Vec<u8>],
    ) -> Result<(), BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .post(self.url("/import"))
            .json(&ImportRequest {
                key,
                values,
                is_master,
            })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        self.check_status(resp).await?;
        Ok(())
    }

    async fn export(&self, key: &str) -> Result<Vec<Vec<u8>>, BrokerError> {
        let _guard = self.call_lock.lock().await;
        let resp = self
            .http
            .get(self.url("/export"))
            .json(&ExportRequest { key })
            .send()
            .await
            .map_err(|e| self.transport_err(e))?;
        let resp = self.check_status(resp).await?;
        let body: ExportResponse = resp.json().await.map_err(|e| self.decode_err(e))?;
        Ok(body.values)
    }
}
