use base64::{Engine as _, engine::general_purpose};

use ecb_oracle::{
    detect_block_size,
    detect_mode,
    recover_suffix,
    CbcOracle,
    EcbOracle,
    HiddenText,
    Mode,
};

// Same fixture as crypto::testing::ROLLIN_B64
const ROLLIN_B64: &str = "Um9sbGluJyBpbiBteSA1LjAKV2l0aCBteSByYWctdG9wIGRvd24gc28gbXkgaGFpciBjYW4gYmxvdwpUaGUgZ2lybGllcyBvbiBzdGFuZGJ5IHdhdmluZyBqdXN0IHRvIHNheSBoaQpEaWQgeW91IHN0b3A/IE5vLCBJIGp1c3QgZHJvdmUgYnkK";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn yellow_submarine_scenario() {
    init_tracing();
    let unknown = general_purpose::STANDARD
        .decode(ROLLIN_B64)
        .expect("Base64 decoding failed");
    assert_eq!(138, unknown.len());

    let oracle = EcbOracle::new(b"YELLOW SUBMARINE", HiddenText::with_suffix(&unknown)).unwrap();

    assert_eq!(16, detect_block_size(&oracle).unwrap());
    let mode = detect_mode(&oracle).unwrap();
    assert_eq!(Mode::Ecb, mode);
    assert_eq!("ECB-like", mode.to_string());

    let expected = b"Rollin' in my 5.0\nWith my rag-top down so my hair can blow\nThe girlies on standby waving just to say hi\nDid you stop? No, I just drove by\n".to_vec();
    assert_eq!(expected, recover_suffix(&oracle).unwrap());
}

#[test]
fn cbc_scenario_is_refused() {
    init_tracing();
    let oracle = CbcOracle::new(b"YELLOW SUBMARINE", HiddenText::with_suffix(b"hidden")).unwrap();
    assert_eq!(16, detect_block_size(&oracle).unwrap());
    assert_eq!(Mode::Cbc, detect_mode(&oracle).unwrap());
    assert!(matches!(recover_suffix(&oracle), Err(ecb_oracle::Error::NotEcb)));
}
