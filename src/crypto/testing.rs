use base64::{Engine as _, engine::general_purpose};
use snafu::ensure;

use crate::crypto::cipher::BlockCipher;
use crate::crypto::common::generate_random_bytes;
use crate::util::{Error, MisalignedInputSnafu};

pub(crate) const ROLLIN_B64: &str = "Um9sbGluJyBpbiBteSA1LjAKV2l0aCBteSByYWctdG9wIGRvd24gc28gbXkgaGFpciBjYW4gYmxvdwpUaGUgZ2lybGllcyBvbiBzdGFuZGJ5IHdhdmluZyBqdXN0IHRvIHNheSBoaQpEaWQgeW91IHN0b3A/IE5vLCBJIGp1c3QgZHJvdmUgYnkK";

pub(crate) fn rollin_suffix() -> Vec<u8> {
    general_purpose::STANDARD
        .decode(ROLLIN_B64)
        .expect("Base64 decoding failed")
}

/// Byte-wise keyed permutation over 8 byte blocks. Enough of a block cipher
/// to run the modes and attacks at a block size other than 16.
pub(crate) struct XorRotate8 {
    key: [u8; 8],
}

impl XorRotate8 {
    pub(crate) fn random() -> Self {
        Self { key: generate_random_bytes() }
    }

    fn ensure_block(block: &[u8]) -> Result<(), Error> {
        ensure!(block.len() == 8, MisalignedInputSnafu { len: block.len(), block_size: 8usize });
        Ok(())
    }
}

impl BlockCipher for XorRotate8 {
    fn block_size(&self) -> usize {
        8
    }

    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, Error> {
        Self::ensure_block(block)?;
        Ok(block.iter()
            .zip(self.key.iter())
            .map(|(b, k)| (b ^ k).rotate_left(3))
            .collect())
    }

    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, Error> {
        Self::ensure_block(block)?;
        Ok(block.iter()
            .zip(self.key.iter())
            .map(|(b, k)| b.rotate_right(3) ^ k)
            .collect())
    }
}

#[test]
fn test_rollin_suffix() {
    let suffix = rollin_suffix();
    assert_eq!(138, suffix.len());
    assert!(suffix.starts_with(b"Rollin' in my 5.0\n"));
}

#[test]
fn test_xor_rotate_8_inverts() {
    let cipher = XorRotate8::random();
    let block = *b"ICE BABY";
    let encrypted = cipher.encrypt_block(&block).unwrap();
    assert_eq!(block.to_vec(), cipher.decrypt_block(&encrypted).unwrap());
}
