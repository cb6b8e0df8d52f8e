// Blockchain module
//
// This module contains the ledger and consensus engine including:
// - Block structure and canonical hashing
// - Transaction structure
// - Proof of work algorithm
// - Ledger (chain + pending pool + known peers)
// - Chain validation
// - Longest-valid-chain conflict resolution

pub mod block;
pub mod chain;
pub mod consensus;
pub mod network;
pub mod peers;
pub mod proof;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{BlockchainError, Ledger};
pub use consensus::ConsensusResolver;
pub use network::HttpChainFetcher;
pub use proof::ProofEngine;
pub use transaction::Transaction;
