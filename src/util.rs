use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid key length {len}, expected 16, 24 or 32 bytes"))]
    InvalidKeyLength { len: usize },

    #[snafu(display("invalid IV length {len}, expected {block_size} bytes"))]
    InvalidIvLength { len: usize, block_size: usize },

    #[snafu(display("block cipher failure: {source}"))]
    Cipher { source: openssl::error::ErrorStack },

    #[snafu(display("buffer of {len} bytes is not a multiple of the {block_size} byte block size"))]
    MisalignedInput { len: usize, block_size: usize },

    #[snafu(display("block size must be positive"))]
    ZeroBlockSize,

    #[snafu(display("invalid PKCS#7 padding"))]
    InvalidPadding,

    #[snafu(display("no ciphertext growth observed for inputs up to {bound} bytes"))]
    BlockSizeNotFound { bound: usize },

    #[snafu(display("hidden text length not found within {bound} bytes of padding"))]
    HiddenLengthNotFound { bound: usize },

    #[snafu(display("hidden prefix alignment not found within {bound} bytes of padding"))]
    PrefixNotFound { bound: usize },

    #[snafu(display("ciphertext grew from {from} to {to} bytes, inconsistent with a {block_size} byte block"))]
    UnexpectedGrowth { from: usize, to: usize, block_size: usize },

    #[snafu(display("oracle does not leak repeated blocks"))]
    NotEcb,

    #[snafu(display("no dictionary entry matches the target block at position {position}"))]
    DictionaryMiss { position: usize },

    #[snafu(display("ciphertext of {len} bytes is shorter than the {needed} bytes required"))]
    TruncatedCiphertext { needed: usize, len: usize },
}

#[test]
fn test_error_display() {
    let err = Error::BlockSizeNotFound { bound: 1024 };
    assert_eq!(
        "no ciphertext growth observed for inputs up to 1024 bytes",
        err.to_string()
    );
    let err = Error::DictionaryMiss { position: 7 };
    assert!(err.to_string().contains("position 7"));
}
