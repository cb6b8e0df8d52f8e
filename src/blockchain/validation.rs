use log::debug;

use super::block::Block;
use super::proof::ProofEngine;

/// Checks index numbering, hash linkage and proof-of-work linkage of a
/// candidate chain
#[derive(Debug, Clone, Copy)]
pub struct ChainValidator {
    proof_engine: ProofEngine,
}

impl ChainValidator {
    pub fn new(proof_engine: ProofEngine) -> Self {
        ChainValidator { proof_engine }
    }

    /// Validates a candidate chain
    ///
    /// Every block must sit at `index == position + 1`. Beyond its index the
    /// genesis block is trusted as-is; every later block must reference
    /// the digest of its predecessor and carry a proof that solves the
    /// predecessor's puzzle. An empty chain is vacuously valid, callers must
    /// reject it themselves.
    ///
    /// # Returns
    ///
    /// true if the chain is valid, false at the first violation
    pub fn is_valid(&self, chain: &[Block]) -> bool {
        for (position, block) in chain.iter().enumerate() {
            if block.index != position as u64 + 1 {
                debug!("Block at position {} has index {}", position, block.index);
                return false;
            }
        }

        for pair in chain.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);

            let previous_hash = match previous.digest() {
                Ok(hash) => hash,
                Err(err) => {
                    debug!("Block {} could not be hashed: {}", previous.index, err);
                    return false;
                }
            };

            if current.previous_hash != previous_hash {
                debug!("Block {} has a broken hash link", current.index);
                return false;
            }

            if !self.proof_engine.is_valid(previous.proof, current.proof) {
                debug!("Block {} has an invalid proof", current.index);
                return false;
            }
        }

        true
    }
}
