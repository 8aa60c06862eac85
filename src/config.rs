/// Bounds and filler used when querying an oracle.
///
/// Every search loop in the attacks is capped by one of these values, and
/// exhausting a cap is reported as an error rather than retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackConfig {
    /// Largest plaintext length submitted while looking for ciphertext growth.
    pub block_size_search_limit: usize,
    /// Filler length, in blocks, submitted by the mode classifier.
    pub mode_filler_blocks: usize,
    /// Byte used for every filler run.
    pub filler: u8,
}

pub const DEFAULT_BLOCK_SIZE_SEARCH_LIMIT: usize = 1024;

// Two identical aligned blocks are only guaranteed from three blocks of filler
pub const MIN_MODE_FILLER_BLOCKS: usize = 3;

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            block_size_search_limit: DEFAULT_BLOCK_SIZE_SEARCH_LIMIT,
            mode_filler_blocks: MIN_MODE_FILLER_BLOCKS,
            filler: b'A',
        }
    }
}

impl AttackConfig {
    pub fn with_block_size_search_limit(mut self, limit: usize) -> Self {
        self.block_size_search_limit = limit;
        self
    }

    /// Oracles with long hidden prefixes may need more than the minimum.
    pub fn with_mode_filler_blocks(mut self, blocks: usize) -> Self {
        self.mode_filler_blocks = blocks.max(MIN_MODE_FILLER_BLOCKS);
        self
    }

    pub fn with_filler(mut self, filler: u8) -> Self {
        self.filler = filler;
        self
    }
}

#[test]
fn test_attack_config_defaults() {
    let config = AttackConfig::default();
    assert_eq!(1024, config.block_size_search_limit);
    assert_eq!(3, config.mode_filler_blocks);
    assert_eq!(b'A', config.filler);
}

#[test]
fn test_mode_filler_blocks_clamped() {
    let config = AttackConfig::default().with_mode_filler_blocks(1);
    assert_eq!(MIN_MODE_FILLER_BLOCKS, config.mode_filler_blocks);
    let config = AttackConfig::default().with_mode_filler_blocks(8);
    assert_eq!(8, config.mode_filler_blocks);
}
