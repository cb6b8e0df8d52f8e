use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Reserved sender identifier for mining rewards
pub const SYSTEM_SENDER: &str = "0";

/// Errors that can occur while building a transaction
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid sender address: {0}")]
    InvalidSenderAddress(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipientAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Represents a transfer between two identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's identifier
    pub sender: String,

    /// Recipient's identifier
    pub recipient: String,

    /// Amount being transferred
    pub amount: f64,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The identifier of the sender
    /// * `recipient` - The identifier of the recipient
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// The transaction, or the first field that failed validation
    pub fn new(sender: &str, recipient: &str, amount: f64) -> Result<Self, TransactionError> {
        if sender.trim().is_empty() {
            return Err(TransactionError::InvalidSenderAddress(
                "sender must not be empty".to_string(),
            ));
        }

        if recipient.trim().is_empty() {
            return Err(TransactionError::InvalidRecipientAddress(
                "recipient must not be empty".to_string(),
            ));
        }

        if !amount.is_finite() {
            return Err(TransactionError::InvalidAmount(format!(
                "amount must be a finite number, got {}",
                amount
            )));
        }

        Ok(Transaction {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
        })
    }

    /// Creates a mining reward paid by the system to `recipient`
    pub fn new_reward(recipient: &str, amount: f64) -> Self {
        Transaction {
            sender: SYSTEM_SENDER.to_string(),
            recipient: recipient.to_string(),
            amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let transaction = Transaction::new("alice", "bob", 10.5).unwrap();

        assert_eq!(transaction.sender, "alice");
        assert_eq!(transaction.recipient, "bob");
        assert_eq!(transaction.amount, 10.5);
        assert_ne!(transaction.sender, SYSTEM_SENDER);
    }

    #[test]
    fn test_rejects_blank_identifiers() {
        assert!(matches!(
            Transaction::new("", "bob", 1.0),
            Err(TransactionError::InvalidSenderAddress(_))
        ));
        assert!(matches!(
            Transaction::new("alice", "   ", 1.0),
            Err(TransactionError::InvalidRecipientAddress(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite_amount() {
        assert!(matches!(
            Transaction::new("alice", "bob", f64::NAN),
            Err(TransactionError::InvalidAmount(_))
        ));
        assert!(matches!(
            Transaction::new("alice", "bob", f64::INFINITY),
            Err(TransactionError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_reward_transaction() {
        let transaction = Transaction::new_reward("node-1", 1.0);

        assert_eq!(transaction.sender, SYSTEM_SENDER);
        assert_eq!(transaction.recipient, "node-1");
        assert_eq!(transaction.amount, 1.0);
    }
}
