use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use super::block::Block;
use super::peers::{PeerError, PeerSet};
use super::proof::ProofEngine;
use super::transaction::{Transaction, TransactionError};
use super::validation::ChainValidator;

/// Proof carried by the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// Sentinel standing in for the genesis block's missing predecessor
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Amount paid to the node that mints a block
pub const MINING_REWARD: f64 = 1.0;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] PeerError),

    #[error("Chain is empty")]
    EmptyChain,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Chain and pending pool, always mutated together under one lock
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl LedgerState {
    fn tip(&self) -> Result<&Block, BlockchainError> {
        self.chain.last().ok_or(BlockchainError::EmptyChain)
    }

    /// Seals the pending pool into a new block and appends it
    fn seal(&mut self, proof: u64, previous_hash: Option<String>) -> Result<Block, BlockchainError> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.tip()?.digest()?,
        };

        // Keep timestamps non-decreasing even if the wall clock steps back
        let now = Utc::now();
        let timestamp = match self.chain.last() {
            Some(tip) if tip.timestamp > now => tip.timestamp,
            _ => now,
        };

        let block = Block::new(
            self.chain.len() as u64 + 1,
            timestamp,
            std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        );

        self.chain.push(block.clone());
        Ok(block)
    }
}

/// A node's ledger: the chain, the pending pool and the known peers
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,

    /// Known peers
    peers: PeerSet,

    /// Proof-of-work puzzle used for minting and validation
    proof_engine: ProofEngine,

    /// Identifier that receives this node's mining rewards
    node_id: String,
}

impl Ledger {
    /// Creates a new ledger with a sealed genesis block
    ///
    /// # Arguments
    ///
    /// * `proof_engine` - The proof-of-work puzzle
    /// * `node_id` - The identifier credited with mining rewards
    pub fn new(proof_engine: ProofEngine, node_id: &str) -> Result<Self, BlockchainError> {
        let ledger = Ledger {
            state: Mutex::new(LedgerState {
                chain: Vec::new(),
                pending: Vec::new(),
            }),
            peers: PeerSet::new(),
            proof_engine,
            node_id: node_id.to_string(),
        };

        ledger.mint_block(GENESIS_PROOF, Some(GENESIS_PREVIOUS_HASH.to_string()))?;
        info!(
            "Created genesis block for node {} (difficulty {})",
            node_id,
            proof_engine.difficulty()
        );

        Ok(ledger)
    }

    // Every mutation is a single push, take or swap, so a poisoned lock
    // still guards consistent state
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn proof_engine(&self) -> ProofEngine {
        self.proof_engine
    }

    /// Seals the pending pool into a new block
    ///
    /// # Arguments
    ///
    /// * `proof` - A proof solving the tip's puzzle
    /// * `previous_hash` - The digest of the tip, computed when `None`
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn mint_block(&self, proof: u64, previous_hash: Option<String>) -> Result<Block, BlockchainError> {
        let mut state = self.state();
        Self::mint_locked(&mut state, proof, previous_hash)
    }

    fn mint_locked(
        state: &mut LedgerState,
        proof: u64,
        previous_hash: Option<String>,
    ) -> Result<Block, BlockchainError> {
        let block = state.seal(proof, previous_hash)?;
        info!(
            "Sealed block {} (proof {}, {} transactions)",
            block.index,
            block.proof,
            block.transactions.len()
        );
        Ok(block)
    }

    /// Searches a proof for the current tip, pays the mining reward and
    /// seals a new block.
    ///
    /// The search runs without holding the ledger lock. If the tip changes
    /// meanwhile the proof is stale and the search restarts on the new tip.
    pub fn mint_next_block(&self) -> Result<Block, BlockchainError> {
        loop {
            let tip = self.tip()?;
            let last_hash = tip.digest()?;

            let proof = self.proof_engine.search(tip.proof);

            match self.seal_if_tip(&last_hash, proof)? {
                Some(block) => return Ok(block),
                None => warn!("Chain tip moved while searching for a proof, retrying"),
            }
        }
    }

    /// Pays the mining reward and seals the pool with `proof`, provided the
    /// tip still has digest `last_hash`.
    ///
    /// Returns `None` and leaves the pool untouched if the tip has moved.
    fn seal_if_tip(&self, last_hash: &str, proof: u64) -> Result<Option<Block>, BlockchainError> {
        let mut state = self.state();
        if state.tip()?.digest()? != last_hash {
            return Ok(None);
        }

        state
            .pending
            .push(Transaction::new_reward(&self.node_id, MINING_REWARD));
        Self::mint_locked(&mut state, proof, Some(last_hash.to_string())).map(Some)
    }

    /// Adds a new transaction to the pending pool
    ///
    /// # Returns
    ///
    /// The index of the block the transaction is expected to land in. This is
    /// informational only, an intervening mint or chain swap can change it.
    pub fn submit_transaction(
        &self,
        sender: &str,
        recipient: &str,
        amount: f64,
    ) -> Result<u64, BlockchainError> {
        let transaction = Transaction::new(sender, recipient, amount)?;

        let mut state = self.state();
        let next_index = state.tip()?.index + 1;
        debug!(
            "Queued transaction {} -> {} ({}) for block {}",
            transaction.sender, transaction.recipient, transaction.amount, next_index
        );
        state.pending.push(transaction);

        Ok(next_index)
    }

    /// Gets the last block in the chain
    pub fn tip(&self) -> Result<Block, BlockchainError> {
        self.state().tip().cloned()
    }

    /// Snapshot of the entire chain
    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    /// Number of blocks in the chain
    pub fn len(&self) -> usize {
        self.state().chain.len()
    }

    /// Snapshot of transactions waiting to be sealed
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state().pending.clone()
    }

    /// Validates the local chain
    pub fn is_valid(&self) -> bool {
        ChainValidator::new(self.proof_engine).is_valid(&self.chain())
    }

    /// Replaces the local chain with `candidate` if it is strictly longer.
    ///
    /// The length is re-checked under the lock since the local chain may
    /// have grown after the candidate was selected. Pending transactions
    /// are kept.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.state();
        if candidate.len() <= state.chain.len() {
            return false;
        }

        info!(
            "Replacing local chain of length {} with chain of length {}",
            state.chain.len(),
            candidate.len()
        );
        state.chain = candidate;
        true
    }

    /// Registers a peer from a URL-like address
    ///
    /// # Returns
    ///
    /// The normalized `host[:port]` location
    pub fn register_peer(&self, address: &str) -> Result<String, BlockchainError> {
        let (location, added) = self.peers.register(address)?;
        if added {
            info!("Registered peer {}", location);
        } else {
            debug!("Peer {} already known", location);
        }
        Ok(location)
    }

    /// Snapshot of known peers in sorted order
    pub fn peers(&self) -> Vec<String> {
        self.peers.snapshot()
    }
}
