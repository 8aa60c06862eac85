use openssl::symm::{Cipher, Crypter, Mode};
use snafu::{ensure, ResultExt};

use crate::crypto::common::generate_random_bytes;
use crate::util::{CipherSnafu, Error, InvalidKeyLengthSnafu, MisalignedInputSnafu};

#[cfg(test)]
use rstest::rstest;
#[cfg(test)]
use crate::crypto::common::random_bytes;

pub mod ecb;
pub mod cbc;

/// A keyed permutation over fixed-size blocks.
///
/// The modes in [`ecb`] and [`cbc`] and the oracles built on them only ever
/// see a cipher through this trait.
pub trait BlockCipher {
    fn block_size(&self) -> usize;

    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, Error>;

    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, Error>;

    /// Encrypt each block of an aligned buffer independently.
    fn encrypt_blocks(&self, blocks: &[u8]) -> Result<Vec<u8>, Error> {
        ensure_aligned(blocks, self.block_size())?;
        Ok(blocks.chunks(self.block_size())
            .map(|block| self.encrypt_block(block))
            .collect::<Result<Vec<_>, _>>()?
            .concat())
    }

    fn decrypt_blocks(&self, blocks: &[u8]) -> Result<Vec<u8>, Error> {
        ensure_aligned(blocks, self.block_size())?;
        Ok(blocks.chunks(self.block_size())
            .map(|block| self.decrypt_block(block))
            .collect::<Result<Vec<_>, _>>()?
            .concat())
    }
}

pub(crate) fn ensure_aligned(buf: &[u8], block_size: usize) -> Result<(), Error> {
    ensure!(
        buf.len() % block_size == 0,
        MisalignedInputSnafu { len: buf.len(), block_size }
    );
    Ok(())
}

/// AES through openssl's raw ECB transform with padding switched off. The
/// key length picks AES-128, AES-192 or AES-256.
#[derive(Clone)]
pub struct Aes {
    cipher: Cipher,
    key: Vec<u8>,
}

impl Aes {
    pub const BLOCK_SIZE: usize = 16;

    pub fn new(key: &[u8]) -> Result<Self, Error> {
        let cipher = match key.len() {
            16 => Cipher::aes_128_ecb(),
            24 => Cipher::aes_192_ecb(),
            32 => Cipher::aes_256_ecb(),
            len => return InvalidKeyLengthSnafu { len }.fail(),
        };
        Ok(Self { cipher, key: key.to_vec() })
    }

    /// AES-128 under a fresh random key.
    pub fn random() -> Result<Self, Error> {
        let key: [u8; 16] = generate_random_bytes();
        Self::new(&key)
    }

    fn transform(&self, mode: Mode, blocks: &[u8]) -> Result<Vec<u8>, Error> {
        ensure_aligned(blocks, Self::BLOCK_SIZE)?;
        let mut crypter = Crypter::new(self.cipher, mode, &self.key, None)
            .context(CipherSnafu)?;
        crypter.pad(false);
        let mut out = vec![0u8; blocks.len() + Self::BLOCK_SIZE];
        let mut count = crypter.update(blocks, &mut out).context(CipherSnafu)?;
        count += crypter.finalize(&mut out[count..]).context(CipherSnafu)?;
        out.truncate(count);
        Ok(out)
    }

    fn ensure_single_block(block: &[u8]) -> Result<(), Error> {
        ensure!(
            block.len() == Self::BLOCK_SIZE,
            MisalignedInputSnafu { len: block.len(), block_size: Self::BLOCK_SIZE }
        );
        Ok(())
    }
}

impl BlockCipher for Aes {
    fn block_size(&self) -> usize {
        Self::BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, Error> {
        Self::ensure_single_block(block)?;
        self.transform(Mode::Encrypt, block)
    }

    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>, Error> {
        Self::ensure_single_block(block)?;
        self.transform(Mode::Decrypt, block)
    }

    // One openssl context for the whole buffer instead of one per block
    fn encrypt_blocks(&self, blocks: &[u8]) -> Result<Vec<u8>, Error> {
        self.transform(Mode::Encrypt, blocks)
    }

    fn decrypt_blocks(&self, blocks: &[u8]) -> Result<Vec<u8>, Error> {
        self.transform(Mode::Decrypt, blocks)
    }
}

pub fn encrypt_ecb(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, Error> {
    ecb::encrypt(&Aes::new(key)?, plaintext)
}

pub fn decrypt_ecb(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, Error> {
    ecb::decrypt(&Aes::new(key)?, ciphertext)
}

/// A missing IV means the all-zero IV.
pub fn encrypt_cbc(plaintext: &[u8], key: &[u8], iv: Option<&[u8]>) -> Result<Vec<u8>, Error> {
    let aes = Aes::new(key)?;
    cbc::encrypt(&aes, plaintext, iv.unwrap_or(&[0u8; Aes::BLOCK_SIZE]))
}

pub fn decrypt_cbc(ciphertext: &[u8], key: &[u8], iv: Option<&[u8]>) -> Result<Vec<u8>, Error> {
    let aes = Aes::new(key)?;
    cbc::decrypt(&aes, ciphertext, iv.unwrap_or(&[0u8; Aes::BLOCK_SIZE]))
}

#[test]
fn test_aes_128_block_matches_fips_197() {
    let aes = Aes::new(&hex!("000102030405060708090a0b0c0d0e0f")).unwrap();
    let plaintext = hex!("00112233445566778899aabbccddeeff");
    let ciphertext = aes.encrypt_block(&plaintext).unwrap();
    assert_eq!(hex!("69c4e0d86a7b0430d8cdb78070b4c55a").to_vec(), ciphertext);
    assert_eq!(plaintext.to_vec(), aes.decrypt_block(&ciphertext).unwrap());
}

#[cfg(test)]
#[rstest]
#[case(0)]
#[case(15)]
#[case(17)]
#[case(33)]
fn test_rejects_invalid_key_length(#[case] len: usize) {
    let result = Aes::new(&vec![0u8; len]);
    assert!(matches!(result, Err(Error::InvalidKeyLength { len: l }) if l == len));
    assert!(matches!(encrypt_ecb(b"data", &vec![0u8; len]), Err(Error::InvalidKeyLength { .. })));
}

#[cfg(test)]
#[rstest]
#[case(16)]
#[case(24)]
#[case(32)]
fn test_accepts_every_aes_key_length(#[case] len: usize) {
    let key = random_bytes(len);
    let plaintext = b"Burning 'em, if you ain't quick and nimble";
    let ciphertext = encrypt_ecb(plaintext, &key).unwrap();
    assert_eq!(48, ciphertext.len());
    assert_eq!(plaintext.to_vec(), decrypt_ecb(&ciphertext, &key).unwrap());
}

#[test]
fn test_single_block_transform_rejects_partial_blocks() {
    let aes = Aes::new(b"YELLOW SUBMARINE").unwrap();
    let result = aes.encrypt_block(&[0u8; 15]);
    assert!(matches!(result, Err(Error::MisalignedInput { len: 15, block_size: 16 })));
    let result = aes.decrypt_blocks(&[0u8; 20]);
    assert!(matches!(result, Err(Error::MisalignedInput { len: 20, block_size: 16 })));
}

#[test]
fn test_encrypt_blocks_agrees_with_single_blocks() {
    let aes = Aes::random().unwrap();
    let blocks = random_bytes(64);
    let expected: Vec<u8> = blocks.chunks(16)
        .map(|block| aes.encrypt_block(block).unwrap())
        .collect::<Vec<_>>()
        .concat();
    assert_eq!(expected, aes.encrypt_blocks(&blocks).unwrap());
}
