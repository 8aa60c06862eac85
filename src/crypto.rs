pub mod common;
pub mod xor;
pub mod cipher;
pub mod oracle;
pub mod detect;
pub mod byte_by_byte;

#[cfg(test)]
pub(crate) mod testing;

pub use cipher::{decrypt_cbc, decrypt_ecb, encrypt_cbc, encrypt_ecb, Aes, BlockCipher};
pub use oracle::{random_mode_oracle, CbcOracle, EcbOracle, HiddenText, Oracle};
pub use detect::{classify_mode, detect_block_size, detect_block_size_with, detect_mode, detect_mode_with, Mode};
pub use byte_by_byte::{detect_hidden_len, detect_prefix_len, recover_suffix, recover_suffix_with};

#[cfg(test)]
mod generic_tests {
    use crate::crypto::*;
    use crate::crypto::testing::rollin_suffix;

    #[test]
    fn test_full_attack_on_random_mode_oracle() {
        let suffix = rollin_suffix();
        for _ in 0..4 {
            let hidden = HiddenText::new(b"comment1=cooking%20MCs;", &suffix);
            let (mode, oracle) = random_mode_oracle(hidden).unwrap();
            assert_eq!(Aes::BLOCK_SIZE, detect_block_size(oracle.as_ref()).unwrap());
            assert_eq!(mode, detect_mode(oracle.as_ref()).unwrap());
            match mode {
                Mode::Ecb => assert_eq!(suffix, recover_suffix(oracle.as_ref()).unwrap()),
                Mode::Cbc => assert!(matches!(recover_suffix(oracle.as_ref()), Err(crate::Error::NotEcb))),
            }
        }
    }
}
