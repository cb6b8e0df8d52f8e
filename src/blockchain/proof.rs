use sha2::{Digest, Sha256};

/// Leading hex zeros required by default
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Upper bound for difficulty: a SHA-256 hex digest has 64 characters
pub const MAX_DIFFICULTY: usize = 64;

/// Proof-of-work puzzle: find `p'` such that `sha256("{p}{p'}")` starts
/// with `difficulty` zero characters in hex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofEngine {
    difficulty: usize,
}

impl Default for ProofEngine {
    fn default() -> Self {
        ProofEngine::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofEngine {
    /// Creates a proof engine, capping `difficulty` at [`MAX_DIFFICULTY`]
    pub fn new(difficulty: usize) -> Self {
        ProofEngine {
            difficulty: difficulty.min(MAX_DIFFICULTY),
        }
    }

    /// Number of leading hex zeros required
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Checks whether `proof` solves the puzzle posed by `last_proof`
    pub fn is_valid(&self, last_proof: u64, proof: u64) -> bool {
        let guess = format!("{}{}", last_proof, proof);
        let guess_hash = hex::encode(Sha256::digest(guess.as_bytes()));

        guess_hash.bytes().take(self.difficulty).all(|c| c == b'0')
    }

    /// Finds the smallest proof satisfying the puzzle for `last_proof`.
    ///
    /// The search starts at 0 and counts upwards, so the result depends only
    /// on `last_proof` and the difficulty.
    pub fn search(&self, last_proof: u64) -> u64 {
        let mut proof = 0;
        while !self.is_valid(last_proof, proof) {
            proof += 1;
        }
        proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_satisfies_reference_difficulty() {
        let engine = ProofEngine::new(4);
        let proof = engine.search(100);

        assert!(engine.is_valid(100, proof));

        let guess = format!("100{}", proof);
        let guess_hash = hex::encode(Sha256::digest(guess.as_bytes()));
        assert!(guess_hash.starts_with("0000"));
    }

    #[test]
    fn test_search_is_deterministic() {
        let engine = ProofEngine::new(3);

        assert_eq!(engine.search(42), engine.search(42));
    }

    #[test]
    fn test_search_returns_smallest_proof() {
        let engine = ProofEngine::new(2);
        let proof = engine.search(7);

        assert!((0..proof).all(|candidate| !engine.is_valid(7, candidate)));
    }

    #[test]
    fn test_zero_difficulty_accepts_anything() {
        let engine = ProofEngine::new(0);

        assert!(engine.is_valid(1, 1));
        assert_eq!(engine.search(123), 0);
    }

    #[test]
    fn test_difficulty_is_capped() {
        assert_eq!(ProofEngine::new(1000).difficulty(), MAX_DIFFICULTY);
    }

}
