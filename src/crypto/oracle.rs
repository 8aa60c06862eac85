use rand::Rng;
use snafu::ensure;

use crate::crypto::cipher::{cbc, ecb, Aes, BlockCipher};
use crate::crypto::common::{random_bytes, random_bytes_between};
use crate::crypto::detect::Mode;
use crate::util::{Error, InvalidIvLengthSnafu};

#[cfg(test)]
use crate::crypto::cipher::{decrypt_cbc, decrypt_ecb};
#[cfg(test)]
use crate::crypto::common::pad_pkcs_7;

// The attacks only ever see their target through this
pub trait Oracle {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error>;
}

impl<F> Oracle for F where F: Fn(&[u8]) -> Result<Vec<u8>, Error> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self(plaintext)
    }
}

/// Bytes an oracle wraps around every plaintext it is given.
#[derive(Clone, Default)]
pub struct HiddenText {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl HiddenText {
    pub fn new(prefix: &[u8], suffix: &[u8]) -> Self {
        Self { prefix: prefix.to_vec(), suffix: suffix.to_vec() }
    }

    pub fn with_suffix(suffix: &[u8]) -> Self {
        Self::new(&[], suffix)
    }

    /// Random prefix and suffix, each between MIN and MAX bytes long.
    pub fn random<const MIN: usize, const MAX: usize>() -> Self {
        Self {
            prefix: random_bytes_between(MIN, MAX),
            suffix: random_bytes_between(MIN, MAX),
        }
    }

    fn surround(&self, plaintext: &[u8]) -> Vec<u8> {
        [
            self.prefix.as_slice(),
            plaintext,
            self.suffix.as_slice(),
        ].concat()
    }
}

/// prefix ++ plaintext ++ suffix, PKCS#7 padded and encrypted block by block
/// under a fixed key.
pub struct EcbOracle<C = Aes> {
    cipher: C,
    hidden: HiddenText,
}

impl EcbOracle<Aes> {
    pub fn new(key: &[u8], hidden: HiddenText) -> Result<Self, Error> {
        Ok(Self::with_cipher(Aes::new(key)?, hidden))
    }

    pub fn random_key(hidden: HiddenText) -> Result<Self, Error> {
        Ok(Self::with_cipher(Aes::random()?, hidden))
    }
}

impl<C: BlockCipher> EcbOracle<C> {
    pub fn with_cipher(cipher: C, hidden: HiddenText) -> Self {
        Self { cipher, hidden }
    }
}

impl<C: BlockCipher> Oracle for EcbOracle<C> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        ecb::encrypt(&self.cipher, &self.hidden.surround(plaintext))
    }
}

/// Same construction as [`EcbOracle`] but CBC chained. Unless an IV is fixed
/// with [`CbcOracle::with_fixed_iv`], every call draws a fresh random IV.
pub struct CbcOracle<C = Aes> {
    cipher: C,
    hidden: HiddenText,
    iv: Option<Vec<u8>>,
}

impl CbcOracle<Aes> {
    pub fn new(key: &[u8], hidden: HiddenText) -> Result<Self, Error> {
        Ok(Self::with_cipher(Aes::new(key)?, hidden))
    }

    pub fn random_key(hidden: HiddenText) -> Result<Self, Error> {
        Ok(Self::with_cipher(Aes::random()?, hidden))
    }
}

impl<C: BlockCipher> CbcOracle<C> {
    pub fn with_cipher(cipher: C, hidden: HiddenText) -> Self {
        Self { cipher, hidden, iv: None }
    }

    pub fn with_fixed_iv(mut self, iv: &[u8]) -> Result<Self, Error> {
        let block_size = self.cipher.block_size();
        ensure!(iv.len() == block_size, InvalidIvLengthSnafu { len: iv.len(), block_size });
        self.iv = Some(iv.to_vec());
        Ok(self)
    }
}

impl<C: BlockCipher> Oracle for CbcOracle<C> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let plaintext = self.hidden.surround(plaintext);
        match &self.iv {
            Some(iv) => cbc::encrypt(&self.cipher, &plaintext, iv),
            None     => cbc::encrypt(&self.cipher, &plaintext, &random_bytes(self.cipher.block_size())),
        }
    }
}

/// An AES oracle under a random key whose chaining mode is picked by a coin
/// flip when it is built. The mode is handed back separately so a harness
/// can check a classifier against it; the oracle itself never reveals it.
pub fn random_mode_oracle(hidden: HiddenText) -> Result<(Mode, Box<dyn Oracle>), Error> {
    let aes = Aes::random()?;
    let use_ecb: bool = rand::thread_rng().gen();
    let choice: (Mode, Box<dyn Oracle>) = match use_ecb {
        true  => (Mode::Ecb, Box::new(EcbOracle::with_cipher(aes, hidden))),
        false => (Mode::Cbc, Box::new(CbcOracle::with_cipher(aes, hidden))),
    };
    Ok(choice)
}

#[test]
fn test_ecb_oracle_wraps_plaintext_in_hidden_text() {
    let key = b"YELLOW SUBMARINE";
    let oracle = EcbOracle::new(key, HiddenText::new(b"prefix", b"suffix")).unwrap();
    let ciphertext = oracle.encrypt(b"-chosen-").unwrap();
    assert_eq!(b"prefix-chosen-suffix".to_vec(), decrypt_ecb(&ciphertext, key).unwrap());
}

#[test]
fn test_ecb_oracle_is_deterministic() {
    let oracle = EcbOracle::random_key(HiddenText::random::<5, 10>()).unwrap();
    assert_eq!(oracle.encrypt(b"abc").unwrap(), oracle.encrypt(b"abc").unwrap());
}

#[test]
fn test_cbc_oracle_draws_a_fresh_iv_per_call() {
    let oracle = CbcOracle::random_key(HiddenText::with_suffix(b"suffix")).unwrap();
    let first = oracle.encrypt(&[b'A'; 32]).unwrap();
    let second = oracle.encrypt(&[b'A'; 32]).unwrap();
    assert_eq!(first.len(), second.len());
    assert_ne!(first, second);
}

#[test]
fn test_cbc_oracle_with_fixed_iv() {
    let key = b"YELLOW SUBMARINE";
    let iv = b"yellow submarine";
    let oracle = CbcOracle::new(key, HiddenText::new(b"<", b">"))
        .unwrap()
        .with_fixed_iv(iv)
        .unwrap();
    let ciphertext = oracle.encrypt(b"body").unwrap();
    assert_eq!(ciphertext, oracle.encrypt(b"body").unwrap());
    assert_eq!(b"<body>".to_vec(), decrypt_cbc(&ciphertext, key, Some(iv)).unwrap());

    let result = CbcOracle::new(key, HiddenText::default())
        .unwrap()
        .with_fixed_iv(b"short");
    assert!(matches!(result, Err(Error::InvalidIvLength { len: 5, block_size: 16 })));
}

#[test]
fn test_oracle_rejects_invalid_key() {
    assert!(matches!(
        EcbOracle::new(b"too short", HiddenText::default()),
        Err(Error::InvalidKeyLength { len: 9 })
    ));
    assert!(matches!(
        CbcOracle::new(&[0u8; 20], HiddenText::default()),
        Err(Error::InvalidKeyLength { len: 20 })
    ));
}

#[test]
fn test_closures_are_oracles() {
    let oracle = |buf: &[u8]| -> Result<Vec<u8>, Error> { Ok(pad_pkcs_7(buf, 8)) };
    let as_dyn: &dyn Oracle = &oracle;
    assert_eq!(b"abc\x05\x05\x05\x05\x05".to_vec(), as_dyn.encrypt(b"abc").unwrap());
}

#[test]
fn test_random_mode_oracle_sticks_to_its_mode() {
    for _ in 0..20 {
        let (mode, oracle) = random_mode_oracle(HiddenText::random::<5, 10>()).unwrap();
        let first = oracle.encrypt(b"same input").unwrap();
        let second = oracle.encrypt(b"same input").unwrap();
        match mode {
            Mode::Ecb => assert_eq!(first, second),
            Mode::Cbc => assert_ne!(first, second),
        }
    }
}
