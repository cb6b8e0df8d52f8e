use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};

use super::block::Block;
use super::chain::Ledger;
use super::network::TransportError;
use super::validation::ChainValidator;

/// Transport used to pull a peer's full chain
#[async_trait(?Send)]
pub trait ChainFetcher {
    /// Fetches the chain held by `peer` (a `host[:port]` location)
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, TransportError>;
}

/// Longest-valid-chain conflict resolution
#[derive(Debug, Clone, Copy)]
pub struct ConsensusResolver {
    validator: ChainValidator,
}

impl ConsensusResolver {
    pub fn new(validator: ChainValidator) -> Self {
        ConsensusResolver { validator }
    }

    /// Builds a resolver validating with the ledger's own proof engine
    pub fn for_ledger(ledger: &Ledger) -> Self {
        Self::new(ChainValidator::new(ledger.proof_engine()))
    }

    /// Resolves conflicts against every peer known to the ledger
    pub async fn resolve_conflicts<F>(&self, ledger: &Ledger, fetcher: &F) -> bool
    where
        F: ChainFetcher + ?Sized,
    {
        let peers = ledger.peers();
        self.resolve(ledger, &peers, fetcher).await
    }

    /// Fetches the chains of `peers` concurrently and swaps in the longest
    /// valid one if it is strictly longer than the local chain.
    ///
    /// Unreachable peers and invalid chains are skipped.
    ///
    /// # Returns
    ///
    /// true if the local chain was replaced
    pub async fn resolve<F>(&self, ledger: &Ledger, peers: &[String], fetcher: &F) -> bool
    where
        F: ChainFetcher + ?Sized,
    {
        let fetched = join_all(peers.iter().map(|peer| fetcher.fetch_chain(peer))).await;
        let results = peers.iter().map(String::as_str).zip(fetched);

        match self.select_longest(ledger.len(), results) {
            Some((peer, chain)) => {
                let replaced = ledger.replace_chain(chain);
                if replaced {
                    info!("Adopted chain from peer {}", peer);
                } else {
                    info!("Local chain grew during resolution, keeping it");
                }
                replaced
            }
            None => {
                debug!("Local chain is authoritative");
                false
            }
        }
    }

    /// Picks the longest valid chain strictly longer than `local_len`.
    ///
    /// Results are considered in the given order and a later chain only
    /// wins if it is strictly longer, so equal-length candidates resolve to
    /// the earliest peer.
    pub fn select_longest<'a, I>(&self, local_len: usize, results: I) -> Option<(&'a str, Vec<Block>)>
    where
        I: IntoIterator<Item = (&'a str, Result<Vec<Block>, TransportError>)>,
    {
        let mut best_length = local_len;
        let mut best: Option<(&'a str, Vec<Block>)> = None;

        for (peer, result) in results {
            let chain = match result {
                Ok(chain) => chain,
                Err(err) => {
                    warn!("Skipping peer {}: {}", peer, err);
                    continue;
                }
            };

            if chain.is_empty() {
                warn!("Skipping peer {}: empty chain", peer);
                continue;
            }

            if chain.len() <= best_length {
                continue;
            }

            if !self.validator.is_valid(&chain) {
                warn!("Rejected invalid chain of length {} from peer {}", chain.len(), peer);
                continue;
            }

            best_length = chain.len();
            best = Some((peer, chain));
        }

        best
    }
}
