//! Huffman coding for DEFLATE
//!
//! Three alphabets are in play for every block:
//! * literal/length: 0-255 are bytes, 256 ends the block, 257-285 are length codes
//! * distance: 30 codes
//! * bit length: 19 codes, used only to describe the other two trees
//!
//! Lengths and distances are sent as a code plus some extra bits, the tables
//! below come from RFC 1951 section 3.2.5.

pub mod tree_builder;
pub mod code_tree;
pub mod rle;

pub const LITERAL_NUM: usize = 286;
/// the fixed literal/length code is defined over 288 symbols, 286 and 287 never occur
pub const STATIC_LITERAL_NUM: usize = 288;
pub const DIST_NUM: usize = 30;
pub const BITLEN_NUM: usize = 19;
/// end of block symbol
pub const EOB: usize = 256;

/// longest code allowed for literal/length and distance trees
pub const MAX_DEPTH: u8 = 15;
/// longest code allowed for the bit length tree
pub const BL_MAX_DEPTH: u8 = 7;

// the wire format always describes at least this many codes
pub const MIN_LITERAL_CODES: usize = 257;
pub const MIN_DIST_CODES: usize = 1;
pub const MIN_BL_CODES: usize = 4;

/// order in which the bit length tree's code lengths are sent
pub const BL_ORDER: [usize;BITLEN_NUM] = [16,17,18,0,8,7,9,6,10,5,11,4,12,3,13,2,14,1,15];

const LENGTH_BASE: [u16;29] = [
    3,4,5,6,7,8,9,10,11,13,15,17,19,23,27,31,
    35,43,51,59,67,83,99,115,131,163,195,227,258
];
const LENGTH_EXTRA: [u8;29] = [
    0,0,0,0,0,0,0,0,1,1,1,1,2,2,2,2,
    3,3,3,3,4,4,4,4,5,5,5,5,0
];
const DIST_BASE: [u16;30] = [
    1,2,3,4,5,7,9,13,17,25,33,49,65,97,129,193,
    257,385,513,769,1025,1537,2049,3073,4097,6145,8193,12289,16385,24577
];
const DIST_EXTRA: [u8;30] = [
    0,0,0,0,1,1,2,2,3,3,4,4,5,5,6,6,
    7,7,8,8,9,9,10,10,11,11,12,12,13,13
];

/// Map a match length (3..=258) to (symbol,extra value,extra bit count).
pub fn length_code(length: u16) -> (usize,u32,u8) {
    assert!((3..=258).contains(&length),"match length {} out of range",length);
    let idx = LENGTH_BASE.partition_point(|base| *base <= length) - 1;
    (257 + idx,(length - LENGTH_BASE[idx]) as u32,LENGTH_EXTRA[idx])
}

/// Map a distance (1..=32768) to (symbol,extra value,extra bit count).
pub fn distance_code(distance: u16) -> (usize,u32,u8) {
    assert!((1..=32768).contains(&distance),"distance {} out of range",distance);
    let idx = DIST_BASE.partition_point(|base| *base <= distance) - 1;
    (idx,(distance - DIST_BASE[idx]) as u32,DIST_EXTRA[idx])
}

/// code lengths of the fixed literal/length table, all 288 of them,
/// the two unused symbols have to be counted or the 9 bit codes come out wrong
pub fn static_literal_lengths() -> Vec<u8> {
    let mut ans = vec![0u8;STATIC_LITERAL_NUM];
    for (sym,len) in ans.iter_mut().enumerate() {
        *len = match sym {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8
        };
    }
    ans
}

/// code lengths of the fixed distance table
pub fn static_distance_lengths() -> Vec<u8> {
    vec![5;DIST_NUM]
}

#[test]
fn length_codes() {
    assert_eq!(length_code(3),(257,0,0));
    assert_eq!(length_code(10),(264,0,0));
    assert_eq!(length_code(11),(265,0,1));
    assert_eq!(length_code(12),(265,1,1));
    assert_eq!(length_code(227),(284,0,5));
    assert_eq!(length_code(257),(284,30,5));
    assert_eq!(length_code(258),(285,0,0));
}

#[test]
fn distance_codes() {
    assert_eq!(distance_code(1),(0,0,0));
    assert_eq!(distance_code(4),(3,0,0));
    assert_eq!(distance_code(5),(4,0,1));
    assert_eq!(distance_code(6),(4,1,1));
    assert_eq!(distance_code(24577),(29,0,13));
    assert_eq!(distance_code(32768),(29,8191,13));
}

#[test]
fn static_table_is_complete() {
    let lengths = static_literal_lengths();
    assert_eq!(lengths.len(),STATIC_LITERAL_NUM);
    let kraft: f64 = lengths.iter().map(|l| 0.5f64.powi(*l as i32)).sum();
    assert_eq!(kraft,1.0);
    let kraft: f64 = static_distance_lengths().iter().map(|l| 0.5f64.powi(*l as i32)).sum();
    assert!(kraft < 1.0);
}

#[test]
#[should_panic]
fn length_too_long() {
    length_code(259);
}
