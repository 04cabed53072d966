//! Rules deciding whether a block may extend a given tail, and whether a whole
//! sequence of blocks hangs together.

use thiserror::Error;

use crate::model::Block;

/// Why a candidate block may not extend its reference block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("index {candidate} does not follow index {reference}")]
    NotSuccessor { reference: u64, candidate: u64 },

    #[error("previous hash does not match the hash of block {reference}")]
    BrokenLink { reference: u64 },

    #[error("timestamp does not advance past block {reference}")]
    StaleTimestamp { reference: u64 },

    #[error("stored hash does not match block contents")]
    HashMismatch,
}

/// Why a candidate sequence of blocks was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,

    #[error("first block is not a well-formed genesis block")]
    BadGenesis,

    #[error("block at position {position} is invalid: {source}")]
    Broken {
        position: usize,
        #[source]
        source: ValidationFailure,
    },
}

/// Bootstrap-link exception: the first extension of a genesis block may
/// carry an empty previous hash instead of the genesis hash.
pub fn is_bootstrap_link(candidate: &Block, reference: &Block) -> bool {
    reference.index == 0 && candidate.previous_hash.is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Honour [`is_bootstrap_link`] when checking linkage.
    pub allow_bootstrap_link: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            allow_bootstrap_link: true,
        }
    }
}

impl ValidationPolicy {
    /// Check that `candidate` may become the new tail after `reference`.
    ///
    /// Rules, in order: strict successor index, hash linkage, strictly
    /// increasing timestamp, content integrity.
    pub fn check(&self, candidate: &Block, reference: &Block) -> Result<(), ValidationFailure> {
        if candidate.index.checked_sub(1) != Some(reference.index) {
            return Err(ValidationFailure::NotSuccessor {
                reference: reference.index,
                candidate: candidate.index,
            });
        }

        let linked = candidate.previous_hash == reference.hash
            || (self.allow_bootstrap_link && is_bootstrap_link(candidate, reference));
        if !linked {
            return Err(ValidationFailure::BrokenLink {
                reference: reference.index,
            });
        }

        if reference.timestamp >= candidate.timestamp {
            return Err(ValidationFailure::StaleTimestamp {
                reference: reference.index,
            });
        }

        if !candidate.is_sealed() {
            return Err(ValidationFailure::HashMismatch);
        }

        Ok(())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_valid(&self, candidate: &Block, reference: &Block) -> bool {
        self.check(candidate, reference).is_ok()
    }

    /// Collect every problem in `blocks`, walking from genesis to tail.
    pub fn audit(&self, blocks: &[Block]) -> Vec<ChainError> {
        let Some(genesis) = blocks.first() else {
            return vec![ChainError::Empty];
        };

        let mut errors = vec![];
        if genesis.index != 0 || !genesis.previous_hash.is_empty() || !genesis.is_sealed() {
            errors.push(ChainError::BadGenesis);
        }
        for (i, pair) in blocks.windows(2).enumerate() {
            if let Err(source) = self.check(&pair[1], &pair[0]) {
                errors.push(ChainError::Broken {
                    position: i + 1,
                    source,
                });
            }
        }
        errors
    }

    /// First problem in `blocks`, if any.
    pub fn check_chain(&self, blocks: &[Block]) -> Result<(), ChainError> {
        match self.audit(blocks).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000 + secs).unwrap()
    }

    /// genesis at t=0 and a valid successor at t=1
    fn pair() -> (Block, Block) {
        let g = Block::genesis_at(at(0));
        let b = Block::next_at(&g, b"alpha".to_vec(), at(1));
        (g, b)
    }

    fn chain(len: usize) -> Vec<Block> {
        let mut blocks = vec![Block::genesis_at(at(0))];
        for i in 1..len {
            let next = Block::next_at(&blocks[i - 1], format!("p{i}").into_bytes(), at(i as i64));
            blocks.push(next);
        }
        blocks
    }

    /// Re-hash after a field was tampered with, so only the targeted rule trips.
    fn reseal(mut b: Block) -> Block {
        b.hash = crate::model::compute_block_hash(&b);
        b
    }

    #[test]
    fn valid_successor_passes() {
        let (g, b) = pair();
        let policy = ValidationPolicy::default();
        assert_eq!(policy.check(&b, &g), Ok(()));
        assert!(policy.is_valid(&b, &g));
    }

    #[test]
    fn wrong_index_fails() {
        let (g, b) = pair();
        let policy = ValidationPolicy::default();
        for index in [0, 2, 7] {
            let mut bad = b.clone();
            bad.index = index;
            let bad = reseal(bad);
            assert_eq!(
                policy.check(&bad, &g),
                Err(ValidationFailure::NotSuccessor {
                    reference: 0,
                    candidate: index
                })
            );
        }
    }

    #[test]
    fn wrong_link_fails() {
        let (g, b) = pair();
        let mut bad = b.clone();
        bad.previous_hash = "ab".repeat(32);
        let bad = reseal(bad);
        assert_eq!(
            ValidationPolicy::default().check(&bad, &g),
            Err(ValidationFailure::BrokenLink { reference: 0 })
        );
    }

    #[test]
    fn stale_timestamp_fails() {
        let (g, b) = pair();
        let policy = ValidationPolicy::default();
        for ts in [g.timestamp, g.timestamp - Duration::seconds(1)] {
            let mut bad = b.clone();
            bad.timestamp = ts;
            let bad = reseal(bad);
            assert_eq!(
                policy.check(&bad, &g),
                Err(ValidationFailure::StaleTimestamp { reference: 0 })
            );
        }
    }

    #[test]
    fn tampered_content_fails() {
        let (g, b) = pair();
        let policy = ValidationPolicy::default();

        let mut bad = b.clone();
        bad.payload = b"omega".to_vec();
        assert_eq!(policy.check(&bad, &g), Err(ValidationFailure::HashMismatch));

        let mut bad = b.clone();
        bad.hash = "cd".repeat(32);
        assert_eq!(policy.check(&bad, &g), Err(ValidationFailure::HashMismatch));
    }

    #[test]
    fn bootstrap_link_only_on_first_extension() {
        let blocks = chain(2);
        let policy = ValidationPolicy::default();

        let unlinked = reseal(Block {
            previous_hash: String::new(),
            ..Block::next_at(&blocks[0], b"x".to_vec(), at(1))
        });
        assert!(is_bootstrap_link(&unlinked, &blocks[0]));
        assert_eq!(policy.check(&unlinked, &blocks[0]), Ok(()));

        let later = reseal(Block {
            previous_hash: String::new(),
            ..Block::next_at(&blocks[1], b"y".to_vec(), at(2))
        });
        assert!(!is_bootstrap_link(&later, &blocks[1]));
        assert_eq!(
            policy.check(&later, &blocks[1]),
            Err(ValidationFailure::BrokenLink { reference: 1 })
        );
    }

    #[test]
    fn strict_policy_refuses_bootstrap_link() {
        let g = Block::genesis_at(at(0));
        let unlinked = reseal(Block {
            previous_hash: String::new(),
            ..Block::next_at(&g, b"x".to_vec(), at(1))
        });
        let strict = ValidationPolicy {
            allow_bootstrap_link: false,
        };
        assert_eq!(
            strict.check(&unlinked, &g),
            Err(ValidationFailure::BrokenLink { reference: 0 })
        );
    }

    #[test]
    fn audit_clean_chain() {
        let policy = ValidationPolicy::default();
        assert!(policy.audit(&chain(5)).is_empty());
        assert_eq!(policy.check_chain(&chain(1)), Ok(()));
    }

    #[test]
    fn audit_empty_chain() {
        let policy = ValidationPolicy::default();
        assert_eq!(policy.audit(&[]), vec![ChainError::Empty]);
        assert_eq!(policy.check_chain(&[]), Err(ChainError::Empty));
    }

    #[test]
    fn audit_reports_bad_genesis() {
        let mut blocks = chain(3);
        blocks[0].payload = b"forged".to_vec();
        let errors = ValidationPolicy::default().audit(&blocks);
        assert_eq!(errors[0], ChainError::BadGenesis);
    }

    #[test]
    fn audit_reports_each_broken_position() {
        let mut blocks = chain(5);
        blocks[2].payload = b"tampered".to_vec();
        let errors = ValidationPolicy::default().audit(&blocks);
        // position 2 no longer matches its hash; position 3 still links to the stored hash
        assert_eq!(
            errors,
            vec![ChainError::Broken {
                position: 2,
                source: ValidationFailure::HashMismatch
            }]
        );

        blocks.swap(3, 4);
        let first = ValidationPolicy::default().check_chain(&blocks).unwrap_err();
        assert_eq!(
            first,
            ChainError::Broken {
                position: 2,
                source: ValidationFailure::HashMismatch
            }
        );
        assert_eq!(ValidationPolicy::default().audit(&blocks).len(), 3);
    }
}
