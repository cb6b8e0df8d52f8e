use std::time::Duration;

use async_trait::async_trait;
use awc::Client;
use serde::Deserialize;
use thiserror::Error;

use super::block::Block;
use super::consensus::ChainFetcher;

/// Path at which every node serves its full chain
pub const CHAIN_ENDPOINT: &str = "/api/v1/chain";

/// Upper bound on a decoded chain payload
const MAX_CHAIN_PAYLOAD: usize = 64 * 1024 * 1024;

/// Errors that can occur while fetching a peer's chain
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Decoding error: {0}")]
    Decode(String),

    #[error("Reported length {reported} does not match {actual} blocks")]
    LengthMismatch { reported: usize, actual: usize },
}

/// Body of a peer's chain endpoint
#[derive(Debug, Deserialize)]
struct ChainPayload {
    chain: Vec<Block>,
    length: usize,
}

impl ChainPayload {
    fn into_chain(self) -> Result<Vec<Block>, TransportError> {
        if self.length != self.chain.len() {
            return Err(TransportError::LengthMismatch {
                reported: self.length,
                actual: self.chain.len(),
            });
        }
        Ok(self.chain)
    }
}

/// Fetches chains over plain HTTP from other nodes
pub struct HttpChainFetcher {
    client: Client,
}

impl HttpChainFetcher {
    /// Creates a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        HttpChainFetcher {
            client: Client::builder().timeout(timeout).finish(),
        }
    }
}

#[async_trait(?Send)]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, TransportError> {
        let url = format!("http://{}{}", peer, CHAIN_ENDPOINT);

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let payload: ChainPayload = response
            .json()
            .limit(MAX_CHAIN_PAYLOAD)
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        payload.into_chain()
    }
}
