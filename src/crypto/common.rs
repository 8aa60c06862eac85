use itertools::Itertools;
use rand::{Rng, RngCore};
use snafu::ensure;

use crate::util::{Error, InvalidPaddingSnafu};

// Always appends between 1 and block_size bytes, so an aligned input gains a
// whole block of value block_size
pub fn pad_pkcs_7(buf: &[u8], block_size: usize) -> Vec<u8> {
    assert!(block_size > 0 && block_size <= u8::MAX as usize);
    let padding_length = block_size - (buf.len() % block_size);
    [buf, &vec![padding_length as u8; padding_length]].concat()
}

#[test]
fn test_pad_pkcs_7() {
    let case = b"YELLOW SUBMARINE";
    let expected = b"YELLOW SUBMARINE\x04\x04\x04\x04".to_vec();
    let result = pad_pkcs_7(case, 20);
    assert_eq!(expected, result);

    let expected_2 = [
        case.to_vec(),
        vec![16; 16],
    ].concat();
    let result_2 = pad_pkcs_7(case, case.len());
    assert_eq!(expected_2, result_2);

    let result_3 = pad_pkcs_7(b"foo bar baz", 8);
    assert_eq!(b"foo bar baz\x05\x05\x05\x05\x05".to_vec(), result_3);
}

#[test]
fn test_pad_pkcs_7_always_grows_to_a_multiple() {
    for block_size in [8, 16] {
        for len in 0..(4*block_size) {
            let padded = pad_pkcs_7(&vec![0xaa; len], block_size);
            assert_eq!(0, padded.len() % block_size);
            assert!(padded.len() > len);
            assert!(padded.len() - len <= block_size);
        }
    }
}

pub fn strip_pad_pkcs_7(buf: &[u8], block_size: usize) -> Result<Vec<u8>, Error> {
    ensure!(!buf.is_empty() && buf.len() % block_size == 0, InvalidPaddingSnafu);
    let final_byte = buf[buf.len() - 1];
    let padding_len = final_byte as usize;
    ensure!(padding_len >= 1 && padding_len <= block_size, InvalidPaddingSnafu);
    ensure!(
        buf.iter()
            .rev()
            .take(padding_len)
            .all(|&b| b == final_byte),
        InvalidPaddingSnafu
    );
    Ok(buf[..buf.len() - padding_len].to_vec())
}

#[test]
fn test_strip_pad_pkcs_7() {
    let case = b"YELLOW SUBMARINE\x04\x04\x04\x04";
    let expected = b"YELLOW SUBMARINE".to_vec();
    let result = strip_pad_pkcs_7(case, 20);
    assert_eq!(expected, result.unwrap());

    let result_2 = strip_pad_pkcs_7(case, 16);
    assert!(matches!(result_2, Err(Error::InvalidPadding)));

    let case_3 = [b"YELLOW SUBMARINE", vec![16; 16].as_slice()].concat();
    let result_3 = strip_pad_pkcs_7(&case_3, 16);
    assert_eq!(expected, result_3.unwrap());

    let case_4 = b"ICE ICE BABY\x04\x04\x04\x04";
    let result_4 = strip_pad_pkcs_7(case_4, case_4.len());
    assert_eq!(b"ICE ICE BABY".to_vec(), result_4.unwrap());

    let case_5 = b"ICE ICE BABY\x05\x05\x05\x05";
    let result_5 = strip_pad_pkcs_7(case_5, case_5.len());
    assert!(matches!(result_5, Err(Error::InvalidPadding)));

    let case_6 = b"ICE ICE BABY\x01\x02\x03\x04";
    let result_6 = strip_pad_pkcs_7(case_6, case_6.len());
    assert!(matches!(result_6, Err(Error::InvalidPadding)));

    // Zero is never a valid pad byte
    let case_7 = [b"YELLOW SUBMARINE", vec![0; 16].as_slice()].concat();
    assert!(matches!(strip_pad_pkcs_7(&case_7, 16), Err(Error::InvalidPadding)));

    assert!(matches!(strip_pad_pkcs_7(b"", 16), Err(Error::InvalidPadding)));
}

#[test]
fn test_strip_undoes_pad() {
    for len in 0..48 {
        let buf: Vec<u8> = (0..len).map(|x| x as u8).collect();
        assert_eq!(buf, strip_pad_pkcs_7(&pad_pkcs_7(&buf, 16), 16).unwrap());
    }
}

// Index of the first block that is byte-identical to the block directly before it
pub fn adjacent_repeating_block(arr: &[u8], size: usize) -> Option<usize> {
    arr.chunks_exact(size)
        .tuple_windows()
        .position(|(previous, next)| previous == next)
        .map(|idx| idx + 1)
}

#[test]
fn test_adjacent_repeating_block() {
    let arr = b"aaabbbbbbccc";
    assert_eq!(Some(2), adjacent_repeating_block(arr, 3));
    assert_eq!(None,    adjacent_repeating_block(arr, 4));

    // Repeats that are not neighbours do not count
    let arr_2 = b"aaabbbaaa";
    assert_eq!(None, adjacent_repeating_block(arr_2, 3));

    // The final pair is scanned too
    let arr_3 = b"abcdefdef";
    assert_eq!(Some(2), adjacent_repeating_block(arr_3, 3));
}

pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut data = [0u8; N];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

pub fn random_bytes_between(min: usize, max: usize) -> Vec<u8> {
    let len = rand::thread_rng().gen_range(min..=max);
    random_bytes(len)
}

#[test]
fn test_random_bytes_between() {
    for _ in 0..50 {
        let bytes = random_bytes_between(5, 10);
        assert!((5..=10).contains(&bytes.len()));
    }
    assert!(random_bytes_between(0, 0).is_empty());
}
