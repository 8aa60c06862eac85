use std::fmt;

use snafu::ensure;
use tracing::{debug, instrument};

use crate::config::AttackConfig;
use crate::crypto::common::adjacent_repeating_block;
use crate::crypto::oracle::Oracle;
use crate::util::{BlockSizeNotFoundSnafu, Error, UnexpectedGrowthSnafu, ZeroBlockSizeSnafu};

#[cfg(test)]
use rstest::rstest;
#[cfg(test)]
use crate::crypto::cipher::Aes;
#[cfg(test)]
use crate::crypto::common::{pad_pkcs_7, random_bytes};
#[cfg(test)]
use crate::crypto::oracle::{random_mode_oracle, CbcOracle, EcbOracle, HiddenText};
#[cfg(test)]
use crate::crypto::testing::XorRotate8;

/// How an oracle chains its blocks, as far as can be told from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Identical plaintext blocks come back as identical ciphertext blocks.
    Ecb,
    /// No repeated blocks were observed.
    Cbc,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Ecb => write!(f, "ECB-like"),
            Mode::Cbc => write!(f, "CBC-like"),
        }
    }
}

pub fn detect_block_size(oracle: &dyn Oracle) -> Result<usize, Error> {
    detect_block_size_with(oracle, &AttackConfig::default())
}

// PKCS#7 always adds between 1 and block_size bytes, so the first growth in
// ciphertext length is exactly one block
#[instrument(skip(oracle))]
pub fn detect_block_size_with(oracle: &dyn Oracle, config: &AttackConfig) -> Result<usize, Error> {
    let mut baseline = None;
    for len in 1..=config.block_size_search_limit {
        let size = oracle.encrypt(&vec![config.filler; len])?.len();
        let initial_size = *baseline.get_or_insert(size);
        if size > initial_size {
            let block_size = size - initial_size;
            ensure!(
                initial_size % block_size == 0,
                UnexpectedGrowthSnafu { from: initial_size, to: size, block_size }
            );
            debug!(block_size, filler_len = len, "detected block size");
            return Ok(block_size);
        }
    }
    BlockSizeNotFoundSnafu { bound: config.block_size_search_limit }.fail()
}

pub fn detect_mode(oracle: &dyn Oracle) -> Result<Mode, Error> {
    detect_mode_with(oracle, &AttackConfig::default())
}

pub fn detect_mode_with(oracle: &dyn Oracle, config: &AttackConfig) -> Result<Mode, Error> {
    let block_size = detect_block_size_with(oracle, config)?;
    classify_mode(oracle, block_size, config)
}

// Three blocks of filler always hold two aligned identical blocks, whatever
// the prefix length. Repeated blocks inside a long hidden prefix are not told
// apart from the filler; raise mode_filler_blocks for such oracles.
#[instrument(skip(oracle))]
pub fn classify_mode(oracle: &dyn Oracle, block_size: usize, config: &AttackConfig) -> Result<Mode, Error> {
    ensure!(block_size > 0, ZeroBlockSizeSnafu);
    let payload = vec![config.filler; config.mode_filler_blocks * block_size];
    let ciphertext = oracle.encrypt(&payload)?;
    let mode = match adjacent_repeating_block(&ciphertext, block_size) {
        Some(_) => Mode::Ecb,
        None    => Mode::Cbc,
    };
    debug!(%mode, "classified oracle mode");
    Ok(mode)
}

#[cfg(test)]
#[rstest]
#[case(8)]
#[case(16)]
#[case(32)]
fn test_detects_block_size_of_padding_oracle(#[case] block_size: usize) {
    let oracle = move |buf: &[u8]| -> Result<Vec<u8>, Error> { Ok(pad_pkcs_7(buf, block_size)) };
    assert_eq!(block_size, detect_block_size(&oracle).unwrap());
}

#[test]
fn test_detects_block_size_of_eight_byte_cipher() {
    let oracle = EcbOracle::with_cipher(XorRotate8::random(), HiddenText::random::<0, 20>());
    assert_eq!(8, detect_block_size(&oracle).unwrap());
}

#[cfg(test)]
#[rstest]
#[case(0)]
#[case(7)]
#[case(16)]
#[case(31)]
fn test_detects_aes_block_size_behind_hidden_text(#[case] hidden_len: usize) {
    let hidden = HiddenText::new(&random_bytes(hidden_len), &random_bytes(hidden_len));
    let ecb = EcbOracle::random_key(hidden.clone()).unwrap();
    let cbc = CbcOracle::random_key(hidden).unwrap();
    assert_eq!(Aes::BLOCK_SIZE, detect_block_size(&ecb).unwrap());
    assert_eq!(Aes::BLOCK_SIZE, detect_block_size(&cbc).unwrap());
}

#[test]
fn test_block_size_detection_gives_up_at_the_bound() {
    let oracle = |_: &[u8]| -> Result<Vec<u8>, Error> { Ok(vec![0u8; 16]) };
    let result = detect_block_size(&oracle);
    assert!(matches!(result, Err(Error::BlockSizeNotFound { bound: 1024 })));

    let config = AttackConfig::default().with_block_size_search_limit(10);
    let growing = |buf: &[u8]| -> Result<Vec<u8>, Error> { Ok(pad_pkcs_7(buf, 64)) };
    let result = detect_block_size_with(&growing, &config);
    assert!(matches!(result, Err(Error::BlockSizeNotFound { bound: 10 })));
}

#[test]
fn test_block_size_detection_rejects_ragged_growth() {
    // Grows by 3 from a baseline of 16
    let oracle = |buf: &[u8]| -> Result<Vec<u8>, Error> {
        Ok(vec![0u8; if buf.len() < 4 { 16 } else { 19 }])
    };
    let result = detect_block_size(&oracle);
    assert!(matches!(result, Err(Error::UnexpectedGrowth { from: 16, to: 19, block_size: 3 })));
}

#[test]
fn test_oracle_errors_propagate() {
    let oracle = |_: &[u8]| -> Result<Vec<u8>, Error> { Err(Error::InvalidPadding) };
    assert!(matches!(detect_block_size(&oracle), Err(Error::InvalidPadding)));
    assert!(matches!(detect_mode(&oracle), Err(Error::InvalidPadding)));
}

#[test]
fn test_detects_ecb_for_every_short_prefix() {
    for prefix_len in 0..=32 {
        let hidden = HiddenText::new(&random_bytes(prefix_len), b"suffix");
        let oracle = EcbOracle::random_key(hidden).unwrap();
        assert_eq!(Mode::Ecb, detect_mode(&oracle).unwrap(), "prefix length {}", prefix_len);
    }
}

#[test]
fn test_detects_cbc_with_random_iv() {
    for prefix_len in 0..=32 {
        let hidden = HiddenText::new(&random_bytes(prefix_len), b"suffix");
        let oracle = CbcOracle::random_key(hidden).unwrap();
        assert_eq!(Mode::Cbc, detect_mode(&oracle).unwrap(), "prefix length {}", prefix_len);
    }
}

#[test]
fn test_detects_mode_over_eight_byte_blocks() {
    let hidden = HiddenText::random::<0, 20>();
    let ecb = EcbOracle::with_cipher(XorRotate8::random(), hidden.clone());
    let cbc = CbcOracle::with_cipher(XorRotate8::random(), hidden);
    assert_eq!(Mode::Ecb, detect_mode(&ecb).unwrap());
    assert_eq!(Mode::Cbc, detect_mode(&cbc).unwrap());
}

#[test]
fn test_detect_ecb_or_cbc() {
    for _ in 0..100 {
        let (mode, oracle) = random_mode_oracle(HiddenText::random::<5, 10>()).unwrap();
        assert_eq!(mode, detect_mode(oracle.as_ref()).unwrap());
    }
}

#[test]
fn test_longer_filler_still_classifies() {
    let config = AttackConfig::default().with_mode_filler_blocks(6);
    let hidden = HiddenText::new(&random_bytes(70), b"");
    let oracle = EcbOracle::random_key(hidden).unwrap();
    assert_eq!(Mode::Ecb, detect_mode_with(&oracle, &config).unwrap());
}

#[test]
fn test_classify_mode_rejects_zero_block_size() {
    let oracle = EcbOracle::random_key(HiddenText::with_suffix(b"suffix")).unwrap();
    let result = classify_mode(&oracle, 0, &AttackConfig::default());
    assert!(matches!(result, Err(Error::ZeroBlockSize)));
}

#[test]
fn test_mode_display() {
    assert_eq!("ECB-like", Mode::Ecb.to_string());
    assert_eq!("CBC-like", Mode::Cbc.to_string());
}
