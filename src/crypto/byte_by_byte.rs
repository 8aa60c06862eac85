use std::collections::HashMap;
use std::ops::Range;

use itertools::Itertools;
use snafu::{ensure, OptionExt};
use tracing::{debug, instrument, trace};

use crate::config::AttackConfig;
use crate::crypto::detect::{classify_mode, detect_block_size_with, Mode};
use crate::crypto::oracle::Oracle;
use crate::util::{
    DictionaryMissSnafu,
    Error,
    HiddenLengthNotFoundSnafu,
    NotEcbSnafu,
    PrefixNotFoundSnafu,
    TruncatedCiphertextSnafu,
    UnexpectedGrowthSnafu,
};

#[cfg(test)]
use rstest::rstest;
#[cfg(test)]
use crate::crypto::cipher::{ecb, Aes};
#[cfg(test)]
use crate::crypto::common::{pad_pkcs_7, random_bytes};
#[cfg(test)]
use crate::crypto::oracle::{CbcOracle, EcbOracle, HiddenText};
#[cfg(test)]
use crate::crypto::testing::{rollin_suffix, XorRotate8};

/// Where the attacker-controlled bytes land relative to the hidden text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Alignment {
    block_size: usize,
    prefix_len: usize,
    suffix_len: usize,
}

impl Alignment {
    // Filler that moves the first controlled byte onto a block boundary
    fn prefix_pad(&self) -> usize {
        (self.block_size - self.prefix_len % self.block_size) % self.block_size
    }

    fn attack_size(&self) -> usize {
        (self.suffix_len / self.block_size + 1) * self.block_size
    }

    fn window(&self) -> Range<usize> {
        let start = self.prefix_len + self.prefix_pad();
        start..(start + self.attack_size())
    }

    // One byte short of the window, so the next unknown suffix byte is the
    // last byte inside it
    fn chosen_text(&self, position: usize, filler: u8) -> Vec<u8> {
        vec![filler; self.prefix_pad() + self.attack_size() - position - 1]
    }
}

pub fn recover_suffix(oracle: &dyn Oracle) -> Result<Vec<u8>, Error> {
    recover_suffix_with(oracle, &AttackConfig::default())
}

// Given an ECB oracle of the form
// (fixed prefix ++) . (++ fixed suffix)
// recover the suffix one byte at a time. A fresh dictionary of every possible
// last byte of the attack window is built for each position.
#[instrument(skip(oracle))]
pub fn recover_suffix_with(oracle: &dyn Oracle, config: &AttackConfig) -> Result<Vec<u8>, Error> {
    let block_size = detect_block_size_with(oracle, config)?;
    ensure!(classify_mode(oracle, block_size, config)? == Mode::Ecb, NotEcbSnafu);

    let prefix_len = detect_prefix_len(oracle, block_size, config.filler)?;
    let hidden_len = detect_hidden_len(oracle, block_size, config.filler)?;
    ensure!(prefix_len <= hidden_len, PrefixNotFoundSnafu { bound: block_size });
    let alignment = Alignment {
        block_size,
        prefix_len,
        suffix_len: hidden_len - prefix_len,
    };
    debug!(?alignment, "aligned against hidden text");

    let window = alignment.window();
    let mut recovered = Vec::with_capacity(alignment.suffix_len);
    for position in 0..alignment.suffix_len {
        let chosen = alignment.chosen_text(position, config.filler);
        let dictionary = build_dictionary(oracle, &chosen, &recovered, &window)?;

        let ciphertext = oracle.encrypt(&chosen)?;
        let target = attack_window(&ciphertext, &window)?;
        let byte = dictionary
            .get(target)
            .copied()
            .context(DictionaryMissSnafu { position })?;
        trace!(position, byte, target = %hex::encode(target), "recovered byte");
        recovered.push(byte);
    }

    debug!(len = recovered.len(), "recovered hidden suffix");
    Ok(recovered)
}

fn build_dictionary(
    oracle: &dyn Oracle,
    chosen: &[u8],
    recovered: &[u8],
    window: &Range<usize>,
) -> Result<HashMap<Vec<u8>, u8>, Error> {
    let mut payload = [chosen, recovered, &[0u8][..]].concat();
    let last = payload.len() - 1;
    (0..=u8::MAX)
        .map(|b| -> Result<(Vec<u8>, u8), Error> {
            payload[last] = b;
            let ciphertext = oracle.encrypt(&payload)?;
            Ok((attack_window(&ciphertext, window)?.to_vec(), b))
        })
        .collect()
}

fn attack_window<'a>(ciphertext: &'a [u8], window: &Range<usize>) -> Result<&'a [u8], Error> {
    ciphertext
        .get(window.clone())
        .context(TruncatedCiphertextSnafu { needed: window.end, len: ciphertext.len() })
}

// The smallest pad that makes two blocks of marker bytes come back as an
// identical pair puts the marker run on a block boundary. Both markers must
// agree, so hidden bytes equal to one marker cannot fake the match.
#[instrument(skip(oracle))]
pub fn detect_prefix_len(oracle: &dyn Oracle, block_size: usize, filler: u8) -> Result<usize, Error> {
    let markers = [filler.wrapping_add(1), filler.wrapping_add(2)];
    for pad in 0..block_size {
        let replies = markers
            .iter()
            .map(|&marker| {
                oracle.encrypt(&[vec![filler; pad], vec![marker; 2*block_size]].concat())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let prefix_len = marker_run_block(&replies[0], &replies[1], block_size)
            .and_then(|idx| (idx*block_size).checked_sub(pad));
        if let Some(prefix_len) = prefix_len {
            debug!(prefix_len, pad, "detected hidden prefix length");
            return Ok(prefix_len);
        }
    }
    PrefixNotFoundSnafu { bound: block_size }.fail()
}

// First block index where both replies repeat a block that differs between them
fn marker_run_block(first: &[u8], second: &[u8], block_size: usize) -> Option<usize> {
    first.chunks_exact(block_size)
        .zip(second.chunks_exact(block_size))
        .tuple_windows()
        .position(|((a, b), (next_a, next_b))| a == next_a && b == next_b && a != b)
}

// Hidden prefix plus suffix length. The first growth happens once hidden
// text plus filler fills whole blocks.
#[instrument(skip(oracle))]
pub fn detect_hidden_len(oracle: &dyn Oracle, block_size: usize, filler: u8) -> Result<usize, Error> {
    let baseline = oracle.encrypt(&[])?.len();
    for pad in 1..=block_size {
        let size = oracle.encrypt(&vec![filler; pad])?.len();
        if size > baseline {
            ensure!(
                size == baseline + block_size,
                UnexpectedGrowthSnafu { from: baseline, to: size, block_size }
            );
            let hidden_len = baseline
                .checked_sub(pad)
                .context(UnexpectedGrowthSnafu { from: baseline, to: size, block_size })?;
            debug!(hidden_len, "detected hidden text length");
            return Ok(hidden_len);
        }
    }
    HiddenLengthNotFoundSnafu { bound: block_size }.fail()
}

#[test]
fn test_alignment_arithmetic() {
    let alignment = Alignment { block_size: 16, prefix_len: 5, suffix_len: 32 };
    assert_eq!(11, alignment.prefix_pad());
    assert_eq!(48, alignment.attack_size());
    assert_eq!(16..64, alignment.window());
    assert_eq!(11 + 47, alignment.chosen_text(0, b'A').len());
    assert_eq!(11 + 16, alignment.chosen_text(31, b'A').len());

    let aligned = Alignment { block_size: 16, prefix_len: 32, suffix_len: 0 };
    assert_eq!(0, aligned.prefix_pad());
    assert_eq!(32..48, aligned.window());
}

#[cfg(test)]
#[rstest]
#[case(0)]
#[case(5)]
#[case(17)]
fn test_recovers_suffix_behind_prefix(#[case] prefix_len: usize) {
    let suffix = rollin_suffix();
    let hidden = HiddenText::new(&random_bytes(prefix_len), &suffix);
    let oracle = EcbOracle::random_key(hidden).unwrap();
    assert_eq!(suffix, recover_suffix(&oracle).unwrap());
}

#[cfg(test)]
#[rstest]
#[case(0)]
#[case(1)]
#[case(15)]
#[case(16)]
#[case(17)]
#[case(32)]
fn test_recovers_suffix_at_block_boundaries(#[case] suffix_len: usize) {
    let suffix = random_bytes(suffix_len);
    let oracle = EcbOracle::random_key(HiddenText::with_suffix(&suffix)).unwrap();
    let recovered = recover_suffix(&oracle).unwrap();
    assert_eq!(suffix_len, recovered.len());
    assert_eq!(suffix, recovered);
}

#[test]
fn test_recovers_suffix_over_eight_byte_blocks() {
    let suffix = b"Did you stop? No, I just drove by\n";
    let hidden = HiddenText::new(&random_bytes(11), suffix);
    let oracle = EcbOracle::with_cipher(XorRotate8::random(), hidden);
    assert_eq!(suffix.to_vec(), recover_suffix(&oracle).unwrap());
}

#[test]
fn test_attack_aes_ecb_byte_by_byte() {
    let expected = rollin_suffix();
    for _ in 0..5 {
        let hidden = HiddenText::new(&random_bytes(rand::random::<usize>() % 100), &expected);
        let oracle = EcbOracle::random_key(hidden).unwrap();
        assert_eq!(expected, recover_suffix(&oracle).unwrap());
    }
}

#[test]
fn test_hidden_bytes_matching_markers_do_not_shift_alignment() {
    // Prefix ends in the first marker, suffix starts with the second
    let prefix = b"0123456789BBBBBBBBBBBB";
    let suffix = b"CCCCCCCCCCCCCCCCCCCC the rest";
    let oracle = EcbOracle::random_key(HiddenText::new(prefix, suffix)).unwrap();
    assert_eq!(prefix.len(), detect_prefix_len(&oracle, 16, b'A').unwrap());
    assert_eq!(suffix.to_vec(), recover_suffix(&oracle).unwrap());
}

#[cfg(test)]
#[rstest]
#[case(0xfe)]
#[case(0xff)]
#[case(0x00)]
fn test_recovers_suffix_with_wrapping_filler(#[case] filler: u8) {
    let config = AttackConfig::default().with_filler(filler);
    // Suffix opens with both markers, which wrap past 0xff for the high fillers
    let suffix = [
        vec![filler.wrapping_add(1); 3],
        vec![filler.wrapping_add(2); 3],
        b"Did you stop?".to_vec(),
    ].concat();
    for prefix_len in [0, 5, 16, 17, 33] {
        let hidden = HiddenText::new(&random_bytes(prefix_len), &suffix);
        let oracle = EcbOracle::random_key(hidden).unwrap();
        assert_eq!(prefix_len, detect_prefix_len(&oracle, 16, filler).unwrap());
        assert_eq!(suffix, recover_suffix_with(&oracle, &config).unwrap());
    }
}

#[test]
fn test_repeated_blocks_inside_prefix_are_skipped() {
    let prefix = vec![7u8; 37];
    let oracle = EcbOracle::random_key(HiddenText::new(&prefix, b"secret")).unwrap();
    assert_eq!(37, detect_prefix_len(&oracle, 16, b'A').unwrap());
    assert_eq!(b"secret".to_vec(), recover_suffix(&oracle).unwrap());
}

#[test]
fn test_detects_prefix_and_hidden_lengths() {
    for prefix_len in 0..=40 {
        let hidden = HiddenText::new(&random_bytes(prefix_len), &random_bytes(23));
        let oracle = EcbOracle::random_key(hidden).unwrap();
        assert_eq!(prefix_len, detect_prefix_len(&oracle, 16, b'A').unwrap());
        assert_eq!(prefix_len + 23, detect_hidden_len(&oracle, 16, b'A').unwrap());
    }
}

#[test]
fn test_refuses_non_leaking_oracle() {
    let oracle = CbcOracle::random_key(HiddenText::with_suffix(b"secret")).unwrap();
    assert!(matches!(recover_suffix(&oracle), Err(Error::NotEcb)));
}

#[test]
fn test_non_deterministic_oracle_is_a_dictionary_miss() {
    // Fresh key on every call: still ECB within a call, but lookups never match
    let oracle = |buf: &[u8]| -> Result<Vec<u8>, Error> {
        let aes = Aes::random()?;
        ecb::encrypt(&aes, &[buf, b"secret".as_slice()].concat())
    };
    assert!(matches!(recover_suffix(&oracle), Err(Error::DictionaryMiss { position: 0 })));
}

#[test]
fn test_hidden_length_needs_growth() {
    let oracle = |_: &[u8]| -> Result<Vec<u8>, Error> { Ok(vec![0u8; 32]) };
    let result = detect_hidden_len(&oracle, 16, b'A');
    assert!(matches!(result, Err(Error::HiddenLengthNotFound { bound: 16 })));
}

#[test]
fn test_hidden_length_rejects_multi_block_growth() {
    let oracle = |buf: &[u8]| -> Result<Vec<u8>, Error> {
        Ok(vec![0u8; if buf.is_empty() { 16 } else { 48 }])
    };
    let result = detect_hidden_len(&oracle, 16, b'A');
    assert!(matches!(result, Err(Error::UnexpectedGrowth { from: 16, to: 48, block_size: 16 })));
}

#[test]
fn test_prefix_detection_needs_repeated_blocks() {
    let oracle = |buf: &[u8]| -> Result<Vec<u8>, Error> { Ok(pad_pkcs_7(&random_bytes(buf.len()), 16)) };
    let result = detect_prefix_len(&oracle, 16, b'A');
    assert!(matches!(result, Err(Error::PrefixNotFound { bound: 16 })));
}

#[test]
fn test_short_ciphertext_is_reported() {
    let result = attack_window(&[0u8; 16], &(16..32));
    assert!(matches!(result, Err(Error::TruncatedCiphertext { needed: 32, len: 16 })));
}
