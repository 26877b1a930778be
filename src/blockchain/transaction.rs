use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, Keypair};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("cannot sign a transaction for another identity")]
    SignerMismatch,

    #[error("missing signature")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// A signed transfer of value between two identities.
///
/// A `None` sender marks a system-issued mining reward, which carries no
/// signature and is valid by definition. Every other transaction must be
/// signed by the key behind its sender address before the ledger accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address, or `None` for a mining reward
    pub sender: Option<Address>,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Signature over the transaction fingerprint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transfer between two identities.
    pub fn new(sender: Address, recipient: Address, amount: f64) -> Self {
        Transaction {
            sender: Some(sender),
            recipient,
            amount,
            signature: None,
        }
    }

    /// Creates a mining reward paid out by the system itself. Built by the
    /// ledger while mining; never accepted through the public pool entry.
    pub fn new_reward(recipient: Address, amount: f64) -> Self {
        Transaction {
            sender: None,
            recipient,
            amount,
            signature: None,
        }
    }

    /// Checks if this is a system-issued reward
    pub fn is_reward(&self) -> bool {
        self.sender.is_none()
    }

    /// Computes the content fingerprint: a SHA-256 over sender, recipient
    /// and amount. This doubles as the signing payload and the basis for
    /// tamper detection.
    ///
    /// Note that the fingerprint covers nothing else: two transfers with
    /// the same sender, recipient and amount hash (and thus sign)
    /// identically. The ledger makes no double-spend claim.
    pub fn fingerprint(&self) -> String {
        let payload = serde_json::json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
        });

        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Signs the transaction with the sender's keypair.
    ///
    /// # Arguments
    ///
    /// * `keypair` - The keypair whose address must match the sender
    ///
    /// # Returns
    ///
    /// `SignerMismatch` when the keypair does not own the sender address.
    /// Re-signing is allowed and overwrites the previous signature.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<(), TransactionError> {
        match &self.sender {
            Some(sender) if sender == keypair.address() => {}
            _ => return Err(TransactionError::SignerMismatch),
        }

        let fingerprint = self.fingerprint();
        self.signature = Some(keypair.sign(fingerprint.as_bytes()));

        Ok(())
    }

    /// Verifies the transaction.
    ///
    /// Rewards are unconditionally valid. Anything else must carry a
    /// signature (`MissingSignature` otherwise) that verifies against the
    /// sender's public key and the current fingerprint.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let sender = match &self.sender {
            None => return Ok(true),
            Some(sender) => sender,
        };

        let signature = match &self.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = sender.to_public_key()?;

        verify_signature(self.fingerprint().as_bytes(), signature, &public_key)
            .map_err(TransactionError::from)
    }
}
