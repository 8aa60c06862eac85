use snafu::ensure;

use crate::crypto::cipher::{ensure_aligned, BlockCipher};
use crate::crypto::common::{pad_pkcs_7, strip_pad_pkcs_7};
use crate::crypto::xor::fixed_xor;
use crate::util::{Error, InvalidIvLengthSnafu};

#[cfg(test)]
use rstest::rstest;
#[cfg(test)]
use crate::crypto::cipher::{decrypt_cbc, encrypt_cbc, Aes};
#[cfg(test)]
use crate::crypto::common::{generate_random_bytes, random_bytes};
#[cfg(test)]
use crate::crypto::testing::XorRotate8;

fn ensure_iv<C: BlockCipher>(cipher: &C, iv: &[u8]) -> Result<(), Error> {
    ensure!(
        iv.len() == cipher.block_size(),
        InvalidIvLengthSnafu { len: iv.len(), block_size: cipher.block_size() }
    );
    Ok(())
}

pub fn encrypt<C: BlockCipher>(cipher: &C, plaintext: &[u8], iv: &[u8]) -> Result<Vec<u8>, Error> {
    ensure_iv(cipher, iv)?;
    let block_size = cipher.block_size();
    let padded = pad_pkcs_7(plaintext, block_size);
    let mut ciphertext = Vec::with_capacity(padded.len());
    let mut chain = iv.to_vec();
    for block in padded.chunks(block_size) {
        chain = cipher.encrypt_block(&fixed_xor(block, &chain))?;
        ciphertext.extend_from_slice(&chain);
    }
    Ok(ciphertext)
}

// Each decrypted block is XORed with the previous *ciphertext* block
pub fn decrypt<C: BlockCipher>(cipher: &C, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, Error> {
    ensure_iv(cipher, iv)?;
    let block_size = cipher.block_size();
    ensure_aligned(ciphertext, block_size)?;
    let mut padded = Vec::with_capacity(ciphertext.len());
    let mut chain = iv;
    for block in ciphertext.chunks(block_size) {
        padded.extend(fixed_xor(&cipher.decrypt_block(block)?, chain));
        chain = block;
    }
    strip_pad_pkcs_7(&padded, block_size)
}

#[test]
fn test_matches_sp800_38a() {
    let key = hex!("2b7e151628aed2a6abf7158809cf4f3c");
    let iv = hex!("000102030405060708090a0b0c0d0e0f");
    let plaintext = hex!("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
    let ciphertext = encrypt_cbc(&plaintext, &key, Some(&iv)).unwrap();
    assert_eq!(48, ciphertext.len());
    assert_eq!(hex!("7649abac8119b246cee98e9b12e9197d"), ciphertext[0..16]);
    assert_eq!(hex!("5086cb9b507219ee95db113a917678b2"), ciphertext[16..32]);
    assert_eq!(plaintext.to_vec(), decrypt_cbc(&ciphertext, &key, Some(&iv)).unwrap());
}

#[test]
fn test_aes_cbc_encrypt_and_decrypt() {
    let plaintext = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let key = b"YELLOW SUBMARINE";
    let iv = b"yellow submarine";
    let ciphertext = encrypt_cbc(plaintext, key, Some(iv)).unwrap();
    assert_eq!(64, ciphertext.len());
    let result = decrypt_cbc(&ciphertext, key, Some(iv)).unwrap();
    assert_eq!(plaintext.to_vec(), result);
}

#[cfg(test)]
#[rstest]
#[case(0)]
#[case(1)]
#[case(15)]
#[case(16)]
#[case(17)]
#[case(100)]
fn test_round_trips_with_zero_iv(#[case] len: usize) {
    let key: [u8; 16] = generate_random_bytes();
    let plaintext = random_bytes(len);
    let ciphertext = encrypt_cbc(&plaintext, &key, None).unwrap();
    assert_eq!(0, ciphertext.len() % 16);
    assert!(ciphertext.len() > len);
    assert_eq!(plaintext, decrypt_cbc(&ciphertext, &key, None).unwrap());
}

#[test]
fn test_missing_iv_is_the_zero_iv() {
    let key = b"YELLOW SUBMARINE";
    let implicit = encrypt_cbc(b"I'm back and I'm ringin' the bell", key, None).unwrap();
    let explicit = encrypt_cbc(b"I'm back and I'm ringin' the bell", key, Some(&[0u8; 16])).unwrap();
    assert_eq!(implicit, explicit);
}

#[test]
fn test_identical_blocks_diverge() {
    let aes = Aes::new(b"YELLOW SUBMARINE").unwrap();
    let ciphertext = encrypt(&aes, &[b'A'; 48], &[0u8; 16]).unwrap();
    assert_ne!(ciphertext[0..16], ciphertext[16..32]);
    assert_ne!(ciphertext[16..32], ciphertext[32..48]);
}

#[test]
fn test_rejects_wrong_iv_length() {
    let aes = Aes::new(b"YELLOW SUBMARINE").unwrap();
    let result = encrypt(&aes, b"data", &[0u8; 8]);
    assert!(matches!(result, Err(Error::InvalidIvLength { len: 8, block_size: 16 })));
    let result = decrypt(&aes, &[0u8; 16], &[0u8; 17]);
    assert!(matches!(result, Err(Error::InvalidIvLength { len: 17, block_size: 16 })));
}

#[test]
fn test_wrong_key_fails_padding_check_or_garbles() {
    let ciphertext = encrypt_cbc(b"Say -- Play that funky music", b"YELLOW SUBMARINE", None).unwrap();
    match decrypt_cbc(&ciphertext, b"yellow submarine", None) {
        Ok(plaintext) => assert_ne!(b"Say -- Play that funky music".to_vec(), plaintext),
        Err(err) => assert!(matches!(err, Error::InvalidPadding)),
    }
}

#[test]
fn test_works_over_eight_byte_blocks() {
    let cipher = XorRotate8::random();
    let iv: [u8; 8] = generate_random_bytes();
    let plaintext = b"With my rag-top down so my hair can blow";
    let ciphertext = encrypt(&cipher, plaintext, &iv).unwrap();
    assert_eq!(48, ciphertext.len());
    assert_eq!(plaintext.to_vec(), decrypt(&cipher, &ciphertext, &iv).unwrap());
}
