use crate::crypto::cipher::{ensure_aligned, BlockCipher};
use crate::crypto::common::{pad_pkcs_7, strip_pad_pkcs_7};
use crate::util::Error;

#[cfg(test)]
use crate::crypto::cipher::{decrypt_ecb, encrypt_ecb, Aes};
#[cfg(test)]
use crate::crypto::testing::XorRotate8;

pub fn encrypt<C: BlockCipher>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    cipher.encrypt_blocks(&pad_pkcs_7(plaintext, cipher.block_size()))
}

pub fn decrypt<C: BlockCipher>(cipher: &C, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    ensure_aligned(ciphertext, cipher.block_size())?;
    let padded = cipher.decrypt_blocks(ciphertext)?;
    strip_pad_pkcs_7(&padded, cipher.block_size())
}

#[test]
fn test_first_block_matches_sp800_38a() {
    let key = hex!("2b7e151628aed2a6abf7158809cf4f3c");
    let plaintext = hex!("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
    let ciphertext = encrypt_ecb(&plaintext, &key).unwrap();
    assert_eq!(48, ciphertext.len());
    assert_eq!(hex!("3ad77bb40d7a3660a89ecaf32466ef97"), ciphertext[0..16]);
    assert_eq!(hex!("f5d3d58503b9699de785895a96fdbaaf"), ciphertext[16..32]);
}

#[test]
fn test_identical_blocks_encrypt_identically() {
    let aes = Aes::new(b"YELLOW SUBMARINE").unwrap();
    let ciphertext = encrypt(&aes, &[b'A'; 48]).unwrap();
    assert_eq!(ciphertext[0..16], ciphertext[16..32]);
    assert_eq!(ciphertext[16..32], ciphertext[32..48]);
}

#[test]
fn test_aligned_plaintext_gains_a_full_padding_block() {
    let key = b"YELLOW SUBMARINE";
    let ciphertext = encrypt_ecb(b"YELLOW SUBMARINE", key).unwrap();
    assert_eq!(32, ciphertext.len());
    assert_eq!(b"YELLOW SUBMARINE".to_vec(), decrypt_ecb(&ciphertext, key).unwrap());
}

#[test]
fn test_works_over_eight_byte_blocks() {
    let cipher = XorRotate8::random();
    let plaintext = b"ICE ICE BABY";
    let ciphertext = encrypt(&cipher, plaintext).unwrap();
    assert_eq!(16, ciphertext.len());
    assert_eq!(plaintext.to_vec(), decrypt(&cipher, &ciphertext).unwrap());
}

#[test]
fn test_decrypt_rejects_misaligned_ciphertext() {
    let result = decrypt_ecb(&[0u8; 17], b"YELLOW SUBMARINE");
    assert!(matches!(result, Err(Error::MisalignedInput { len: 17, block_size: 16 })));
}
