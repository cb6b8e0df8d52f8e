use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Represents a sealed block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Position of the block in the chain, starting at 1 for genesis
    pub index: u64,

    /// Wall-clock time the block was sealed
    #[schema(value_type = String, example = "2023-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Transactions in submission order
    pub transactions: Vec<Transaction>,

    /// Proof of work relative to the previous block's proof
    pub proof: u64,

    /// Digest of the previous block
    pub previous_hash: String,
}

impl Block {
    /// Creates a new block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - The time the block is sealed
    /// * `transactions` - The transactions to include in the block
    /// * `proof` - The proof of work
    /// * `previous_hash` - The digest of the previous block
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Self {
        Block {
            index,
            timestamp,
            transactions,
            proof,
            previous_hash,
        }
    }

    /// Calculates the SHA-256 digest of the block's canonical form
    ///
    /// # Returns
    ///
    /// The digest as a lowercase hexadecimal string
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        canonical_digest(self)
    }
}

/// Hashes any serializable value through its canonical JSON form.
///
/// Object keys are sorted at every nesting level before hashing, so two
/// values holding the same fields produce the same digest no matter in which
/// order those fields were inserted or declared.
pub fn canonical_digest<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    let canonical = canonical_json(&value);
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Renders a JSON value compactly with object keys in sorted order
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on a string Value yields the escaped, quoted form
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
