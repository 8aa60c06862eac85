// Both operands must be exactly the same length; anything else is a caller bug
pub fn fixed_xor(buf1: &[u8], buf2: &[u8]) -> Vec<u8> {
    assert_eq!(buf1.len(), buf2.len(), "fixed_xor operands differ in length");
    buf1.iter()
        .zip(buf2.iter())
        .map(|(x,y)| x ^ y)
        .collect()
}

#[test]
fn test_fixed_xor() {
    let case_buf1 = hex!("1c0111001f010100061a024b53535009181c");
    let case_buf2 = hex!("686974207468652062756c6c277320657965");
    let expected = hex!("746865206b696420646f6e277420706c6179");
    let result = fixed_xor(&case_buf1, &case_buf2);
    assert_eq!(result, expected);
}

#[test]
#[should_panic(expected = "differ in length")]
fn test_fixed_xor_rejects_mismatched_lengths() {
    fixed_xor(&[0u8; 16], &[0u8; 15]);
}
