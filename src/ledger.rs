//! The process-wide ledger: an append-only, hash-linked sequence of blocks.
//!
//! Writers (append, commit, adopt) are serialized by a single writer lock, so
//! reading the tail, validating a candidate and publishing the new sequence
//! happen as one critical section. The sequence itself is published as an
//! immutable snapshot; readers clone the `Arc` and never wait on hashing.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::model::Block;
use crate::validation::{ChainError, ValidationFailure, ValidationPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub validation: ValidationPolicy,
    /// Check every block of a longer candidate sequence before adopting it.
    pub revalidate_on_adopt: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::default(),
            revalidate_on_adopt: true,
        }
    }
}

/// Result of trying to extend the ledger by one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    Committed(Block),
    /// The block was discarded; the ledger is unchanged.
    Rejected {
        block: Block,
        reason: ValidationFailure,
    },
}

#[cfg_attr(not(test), allow(dead_code))]
impl Appended {
    pub fn block(&self) -> &Block {
        match self {
            Appended::Committed(block) => block,
            Appended::Rejected { block, .. } => block,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Appended::Committed(_))
    }
}

/// Result of offering a competing sequence to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adoption {
    Adopted { length: usize },
    /// Candidate was not strictly longer.
    Kept { length: usize },
}

pub struct Ledger {
    blocks: RwLock<Arc<Vec<Block>>>,
    writer: Mutex<()>,
    config: LedgerConfig,
}

impl Ledger {
    /// Start a ledger holding a freshly stamped genesis block.
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_genesis(Block::genesis(), config)
    }

    pub fn with_genesis(genesis: Block, config: LedgerConfig) -> Self {
        Self {
            blocks: RwLock::new(Arc::new(vec![genesis])),
            writer: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current sequence, genesis first.
    pub fn snapshot(&self) -> Arc<Vec<Block>> {
        Arc::clone(&self.blocks.read())
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn tail(&self) -> Block {
        tail_of(&self.snapshot()).clone()
    }

    /// Build a block carrying `payload` on the current tail and commit it if valid.
    pub fn append(&self, payload: Vec<u8>) -> Appended {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let candidate = Block::next(tail_of(&current), payload);
        self.commit_locked(&current, candidate)
    }

    /// Commit an externally built block if it extends the current tail.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn commit(&self, candidate: Block) -> Appended {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        self.commit_locked(&current, candidate)
    }

    /// Longest-chain rule: replace the whole sequence iff `candidate` is
    /// strictly longer (and, unless configured otherwise, fully valid).
    pub fn adopt_if_longer(&self, candidate: Vec<Block>) -> Result<Adoption, ChainError> {
        let _writer = self.writer.lock();
        let current = self.len();
        if candidate.len() <= current {
            debug!(
                candidate = candidate.len(),
                current,
                "candidate chain not longer; keeping ours"
            );
            return Ok(Adoption::Kept { length: current });
        }

        if self.config.revalidate_on_adopt {
            if let Err(err) = self.config.validation.check_chain(&candidate) {
                warn!(candidate = candidate.len(), %err, "refusing invalid candidate chain");
                return Err(err);
            }
        }

        let length = candidate.len();
        self.publish(candidate);
        info!(previous = current, length, "adopted longer chain");
        Ok(Adoption::Adopted { length })
    }

    fn commit_locked(&self, current: &[Block], candidate: Block) -> Appended {
        match self.config.validation.check(&candidate, tail_of(current)) {
            Ok(()) => {
                let mut next = Vec::with_capacity(current.len() + 1);
                next.extend_from_slice(current);
                next.push(candidate.clone());
                self.publish(next);
                info!(index = candidate.index, hash = %candidate.hash, "block committed");
                Appended::Committed(candidate)
            }
            Err(reason) => {
                warn!(index = candidate.index, %reason, "block rejected");
                Appended::Rejected {
                    block: candidate,
                    reason,
                }
            }
        }
    }

    fn publish(&self, blocks: Vec<Block>) {
        *self.blocks.write() = Arc::new(blocks);
    }
}

// Every published sequence holds at least the genesis block.
fn tail_of(blocks: &[Block]) -> &Block {
    &blocks[blocks.len() - 1]
}
