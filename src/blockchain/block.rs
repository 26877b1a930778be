use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};

use super::transaction::Transaction;

/// Creation time of the fixed genesis block (2019-12-22T00:00:00Z).
const GENESIS_TIMESTAMP: i64 = 1_576_972_800;

/// The nonce search was cancelled before a conforming hash was found.
#[derive(Debug, Error)]
#[error("mining aborted before a conforming hash was found")]
pub struct MiningAborted;

/// A container of transactions, hash-linked to its predecessor and sealed
/// by proof of work. Immutable once mined and appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, bound into the hash
    pub index: u64,

    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// Transactions in inclusion order; the order is part of the hash
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Proof-of-work search counter, mutated only while mining
    pub nonce: u64,

    /// Hash of this block's full content
    pub hash: String,
}

impl Block {
    /// Creates a new block from a snapshot of pending transactions.
    /// The block is not mined yet; call `mine` to seal it.
    pub fn new(index: u64, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Block {
            index,
            timestamp: Utc::now(),
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    /// The fixed first block of every chain. Deterministic: its fields are
    /// constants, so two calls produce identical blocks.
    pub fn genesis() -> Self {
        let mut block = Block {
            index: 0,
            timestamp: DateTime::from_timestamp(GENESIS_TIMESTAMP, 0).unwrap(),
            transactions: Vec::new(),
            previous_hash: "0".to_string(),
            nonce: 0,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    /// Computes the SHA-256 hash of the block's content: index, timestamp,
    /// transactions (in order), previous hash and nonce. Including the
    /// index binds the block to its chain position.
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });

        let mut hasher = Sha256::new();
        hasher.update(block_data.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Performs the proof-of-work search: increments the nonce until the
    /// hash starts with `difficulty` zero hex digits. Blocking; runs until
    /// it succeeds.
    pub fn mine(&mut self, difficulty: usize) {
        let target = "0".repeat(difficulty);

        while !self.hash.starts_with(&target) {
            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        info!("Block mined: {}", self.hash);
    }

    /// Same search as `mine`, but checks a cancellation token between
    /// attempts. An abort leaves the block unsealed and is reported as an
    /// explicit error, never as a half-mined success.
    pub fn mine_interruptible(
        &mut self,
        difficulty: usize,
        cancel: &AtomicBool,
    ) -> Result<(), MiningAborted> {
        let target = "0".repeat(difficulty);

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(MiningAborted);
            }

            if self.hash.starts_with(&target) {
                break;
            }

            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        info!("Block mined: {}", self.hash);
        Ok(())
    }

    /// Checks every contained transaction. A transaction whose validation
    /// errs (e.g. one missing its signature) counts as invalid; the audit
    /// itself never fails.
    pub fn has_valid_transactions(&self) -> bool {
        for transaction in &self.transactions {
            if !transaction.is_valid().unwrap_or(false) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Keypair;

    fn transfer(amount: f64) -> Transaction {
        let sender = Keypair::generate();
        let recipient = Keypair::generate();
        let mut tx = Transaction::new(sender.address().clone(), recipient.address().clone(), amount);
        tx.sign(&sender).unwrap();
        tx
    }

    #[test]
    fn test_new_block() {
        let tx = transfer(10.0);
        let block = Block::new(1, vec![tx], "previous_hash".to_string());

        assert_eq!(block.index, 1);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.previous_hash, "previous_hash");
        assert_eq!(block.hash, block.calculate_hash());
        assert_eq!(block.hash.len(), 64);
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Block::genesis();
        let b = Block::genesis();

        assert_eq!(a.index, 0);
        assert_eq!(a.previous_hash, "0");
        assert!(a.transactions.is_empty());
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_binds_position() {
        let tx = transfer(10.0);
        let block = Block::new(1, vec![tx], "prev".to_string());

        let mut repositioned = block.clone();
        repositioned.index = 2;

        assert_ne!(block.calculate_hash(), repositioned.calculate_hash());
    }

    #[test]
    fn test_hash_binds_transaction_order() {
        let tx1 = transfer(1.0);
        let tx2 = transfer(2.0);

        let forward = Block::new(1, vec![tx1.clone(), tx2.clone()], "prev".to_string());
        let mut reversed = forward.clone();
        reversed.transactions = vec![tx2, tx1];

        assert_ne!(forward.calculate_hash(), reversed.calculate_hash());
    }

    #[test]
    fn test_mine_satisfies_difficulty() {
        let tx = transfer(10.0);
        let mut block = Block::new(1, vec![tx], "prev".to_string());

        block.mine(2);

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn test_mine_interruptible_aborts() {
        let tx = transfer(10.0);
        let mut block = Block::new(1, vec![tx], "prev".to_string());
        let before = block.clone();

        let cancel = AtomicBool::new(true);
        let result = block.mine_interruptible(4, &cancel);

        assert!(result.is_err());
        assert_eq!(block.nonce, before.nonce);
        assert_eq!(block.hash, before.hash);
    }

    #[test]
    fn test_mine_interruptible_completes_without_cancel() {
        let tx = transfer(10.0);
        let mut block = Block::new(1, vec![tx], "prev".to_string());

        let cancel = AtomicBool::new(false);
        block.mine_interruptible(2, &cancel).unwrap();

        assert!(block.hash.starts_with("00"));
    }

    #[test]
    fn test_valid_transactions() {
        let tx1 = transfer(1.0);
        let tx2 = transfer(2.0);
        let block = Block::new(1, vec![tx1, tx2], "prev".to_string());

        assert!(block.has_valid_transactions());
    }

    #[test]
    fn test_tampered_transaction_detected() {
        let tx = transfer(10.0);
        let mut block = Block::new(1, vec![tx], "prev".to_string());

        block.transactions[0].amount = 9999.0;

        assert!(!block.has_valid_transactions());
    }

    #[test]
    fn test_unsigned_transaction_detected() {
        let sender = Keypair::generate();
        let recipient = Keypair::generate();
        let unsigned =
            Transaction::new(sender.address().clone(), recipient.address().clone(), 10.0);

        let block = Block::new(1, vec![unsigned], "prev".to_string());

        assert!(!block.has_valid_transactions());
    }
}
