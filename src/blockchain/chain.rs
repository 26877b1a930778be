use log::info;
use thiserror::Error;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use super::block::Block;
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};
use super::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("transaction must include sender and recipient addresses")]
    IncompleteTransaction,

    #[error("cannot add invalid transaction to the chain")]
    InvalidTransaction,

    #[error("mining aborted before a conforming hash was found")]
    MiningAborted,

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// The ledger: a hash-linked chain of mined blocks plus the pool of
/// transactions waiting for the next one.
///
/// All mutation goes through `add_transaction` and the mining methods.
/// The pool mutex is held for the whole of a mining call, so at most one
/// append is ever in flight; readers always see a fully-appended prefix
/// of the chain.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, never empty (genesis is always present)
    chain: Arc<Mutex<Vec<Block>>>,

    /// Transactions submitted but not yet mined into a block
    pending_transactions: Arc<Mutex<Vec<Transaction>>>,

    /// Required number of leading zero hex digits in a mined hash
    difficulty: usize,

    /// Amount credited to the miner of each block
    mining_reward: f64,
}

impl Blockchain {
    /// Creates a ledger with the default difficulty and reward.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD)
    }

    /// Creates a ledger with an explicit policy. Both values are fixed for
    /// the lifetime of the ledger.
    pub fn with_config(difficulty: usize, mining_reward: f64) -> Self {
        Blockchain {
            chain: Arc::new(Mutex::new(vec![Block::genesis()])),
            pending_transactions: Arc::new(Mutex::new(Vec::new())),
            difficulty,
            mining_reward,
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    /// Returns the last block in the chain.
    pub fn latest_block(&self) -> Block {
        let chain = self.chain.lock().unwrap();
        chain.last().unwrap().clone()
    }

    /// Submits a transaction to the pending pool.
    ///
    /// # Arguments
    ///
    /// * `transaction` - A signed transfer between two present identities
    ///
    /// # Returns
    ///
    /// The index of the block that will include the transaction. Fails when
    /// sender or recipient is absent, or when the transaction does not
    /// validate. Rewards are built internally and never enter here.
    ///
    /// No balance is checked against the pool or the chain history: an
    /// address may submit transfers exceeding what it holds.
    pub fn add_transaction(&self, transaction: Transaction) -> Result<u64, BlockchainError> {
        let sender_present = transaction
            .sender
            .as_ref()
            .is_some_and(|sender| !sender.0.is_empty());

        if !sender_present || transaction.recipient.0.is_empty() {
            return Err(BlockchainError::IncompleteTransaction);
        }

        if !transaction.is_valid()? {
            return Err(BlockchainError::InvalidTransaction);
        }

        self.pending_transactions.lock().unwrap().push(transaction);

        Ok(self.latest_block().index + 1)
    }

    /// Mines the pending pool into a new block credited to `miner_address`.
    ///
    /// A reward transaction is appended to the pool, the pool is drained
    /// into a block linked to the current tip, and the block is mined
    /// synchronously and appended. Blocks the caller for the whole search.
    pub fn mine_pending_transactions(&self, miner_address: &Address) -> Block {
        let mut pending = self.pending_transactions.lock().unwrap();

        pending.push(Transaction::new_reward(
            miner_address.clone(),
            self.mining_reward,
        ));
        let transactions = std::mem::take(&mut *pending);

        let last_block = self.latest_block();
        let mut block = Block::new(last_block.index + 1, transactions, last_block.hash);
        block.mine(self.difficulty);

        self.chain.lock().unwrap().push(block.clone());
        info!("Block {} appended to the chain", block.index);

        block
    }

    /// Like `mine_pending_transactions`, but the search watches a
    /// cancellation token. On abort the chain and the pending pool are
    /// left exactly as they were; no partially-sealed block exists.
    pub fn mine_pending_interruptible(
        &self,
        miner_address: &Address,
        cancel: &AtomicBool,
    ) -> Result<Block, BlockchainError> {
        let mut pending = self.pending_transactions.lock().unwrap();

        let mut transactions = pending.clone();
        transactions.push(Transaction::new_reward(
            miner_address.clone(),
            self.mining_reward,
        ));

        let last_block = self.latest_block();
        let mut block = Block::new(last_block.index + 1, transactions, last_block.hash);
        block
            .mine_interruptible(self.difficulty, cancel)
            .map_err(|_| BlockchainError::MiningAborted)?;

        self.chain.lock().unwrap().push(block.clone());
        pending.clear();
        info!("Block {} appended to the chain", block.index);

        Ok(block)
    }

    /// Computes an address's balance by replaying every transaction in
    /// chain order. May be negative, since submission checks no balance.
    pub fn get_balance_of_address(&self, address: &Address) -> f64 {
        let chain = self.chain.lock().unwrap();
        let mut balance = 0.0;

        for block in chain.iter() {
            for transaction in &block.transactions {
                if transaction.sender.as_ref() == Some(address) {
                    balance -= transaction.amount;
                }
                if transaction.recipient == *address {
                    balance += transaction.amount;
                }
            }
        }

        balance
    }

    /// Audits the whole chain: every block past genesis must carry valid
    /// transactions, a hash matching its content, and a link to its
    /// predecessor's hash. Reports a verdict; never fails.
    pub fn is_valid(&self) -> bool {
        let chain = self.chain.lock().unwrap();

        for i in 1..chain.len() {
            let current_block = &chain[i];
            let previous_block = &chain[i - 1];

            if !current_block.has_valid_transactions() {
                return false;
            }

            if current_block.hash != current_block.calculate_hash() {
                return false;
            }

            if current_block.previous_hash != previous_block.hash {
                return false;
            }
        }

        true
    }

    /// Returns a snapshot of the chain.
    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.lock().unwrap().clone()
    }

    /// Returns a snapshot of the pending pool.
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.pending_transactions.lock().unwrap().clone()
    }
}
