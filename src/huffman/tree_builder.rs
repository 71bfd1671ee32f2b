//! Depth limited Huffman code lengths, and canonical codes.
//!
//! The tree lives in an arena: leaves come first (one per live symbol), internal
//! nodes are appended as they are created, so a parent always has a larger index
//! than its children and the root is the last node.  All scratch space belongs to a
//! single call.
//!
//! When the optimal tree is deeper than allowed, the deep leaves are clamped to the
//! limit and the per-depth histogram is repaired until the Kraft sum is exactly one.
//! Then the lengths are handed back out, longest first, to the leaves in the order
//! they were merged (lightest first).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// marks a leaf in the `kids` table
const NIL: usize = usize::MAX;

/// Build code lengths for `freqs`, none longer than `max_depth`.
/// Symbols with zero frequency get length 0, except that when fewer than two symbols
/// are live, phantom symbols are added (lowest unused index first) so that
/// the result is still a complete code.
/// Panics if the live symbols cannot fit in `max_depth` bits.
pub fn build_lengths(freqs: &[u32],max_depth: u8) -> Vec<u8> {
    let d = max_depth as usize;
    let mut lengths = vec![0u8;freqs.len()];
    let mut live: Vec<usize> = (0..freqs.len()).filter(|sym| freqs[*sym] > 0).collect();
    let mut phantom = 0;
    while live.len() < 2 {
        while phantom < freqs.len() && freqs[phantom] > 0 {
            phantom += 1;
        }
        assert!(phantom < freqs.len(),"alphabet of {} symbols is too small",freqs.len());
        live.push(phantom);
        phantom += 1;
    }
    live.sort_unstable();
    let leaf_count = live.len();
    assert!(d < usize::BITS as usize && leaf_count <= 1 << d,"{} symbols cannot be coded in {} bits",leaf_count,d);

    // Merge the two lightest nodes until one is left.  The key is (weight,height,index):
    // on equal weight the shallower subtree goes first, index makes the order total.
    let mut kids: Vec<[usize;2]> = vec![[NIL,NIL];leaf_count];
    let mut heap = BinaryHeap::with_capacity(leaf_count);
    for (leaf,sym) in live.iter().enumerate() {
        heap.push(Reverse((freqs[*sym] as u64,0u32,leaf)));
    }
    let mut merge_order: Vec<usize> = Vec::with_capacity(leaf_count);
    loop {
        let Some(Reverse((w1,h1,n1))) = heap.pop() else {
            break;
        };
        if n1 < leaf_count {
            merge_order.push(n1);
        }
        let Some(Reverse((w2,h2,n2))) = heap.pop() else {
            break;
        };
        if n2 < leaf_count {
            merge_order.push(n2);
        }
        let parent = kids.len();
        kids.push([n1,n2]);
        heap.push(Reverse((w1 + w2,u32::max(h1,h2) + 1,parent)));
    }

    // depth of every node, walking down from the root
    let mut depth = vec![0usize;kids.len()];
    for node in (leaf_count..kids.len()).rev() {
        for kid in kids[node] {
            depth[kid] = depth[node] + 1;
        }
    }
    let mut bl_count = vec![0usize;d+1];
    let mut clamped = 0;
    for leaf in 0..leaf_count {
        if depth[leaf] > d {
            clamped += 1;
        }
        bl_count[usize::min(depth[leaf],d)] += 1;
    }
    if clamped == 0 {
        for leaf in 0..leaf_count {
            lengths[live[leaf]] = depth[leaf] as u8;
        }
        return lengths;
    }

    // Kraft excess in units of 2^-d
    let mut overflow: i64 = (1..=d).map(|bits| (bl_count[bits] as i64) << (d - bits)).sum::<i64>() - (1i64 << d);
    log::trace!("{} leaves deeper than {}, overflow {}",clamped,d,overflow);
    while overflow > 0 {
        // deepest bucket above the limit that holds a leaf
        let from = match (1..d).rev().find(|bits| bl_count[*bits] > 0) {
            Some(bits) => bits,
            None => panic!("cannot fit {} symbols in {} bits",leaf_count,d)
        };
        // the leaf moves down one level and takes a clamped leaf as its brother
        bl_count[from] -= 1;
        bl_count[from+1] += 2;
        bl_count[d] -= 1;
        overflow -= 1;
    }
    assert_eq!(overflow,0,"depth correction overshot");

    let mut lightest_first = merge_order.iter();
    for bits in (1..=d).rev() {
        for _i in 0..bl_count[bits] {
            if let Some(leaf) = lightest_first.next() {
                lengths[live[*leaf]] = bits as u8;
            }
        }
    }
    lengths
}

/// Reverse the low `len` bits of `code`.
pub fn bit_reverse(code: u16,len: u8) -> u16 {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - len as u32)
}

/// Canonical codes for the given lengths, already bit-reversed for LSB first output.
/// Within one length, codes increase with symbol index.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let max_len = lengths.iter().copied().max().unwrap_or(0) as usize;
    let mut count = vec![0u32;max_len+1];
    for len in lengths {
        if *len > 0 {
            count[*len as usize] += 1;
        }
    }
    let mut next_code = vec![0u32;max_len+1];
    let mut code: u32 = 0;
    for bits in 1..=max_len {
        code = (code + count[bits-1]) << 1;
        next_code[bits] = code;
    }
    let mut ans = vec![0u16;lengths.len()];
    for (sym,len) in lengths.iter().enumerate() {
        if *len > 0 {
            ans[sym] = bit_reverse(next_code[*len as usize] as u16,*len);
            next_code[*len as usize] += 1;
        }
    }
    ans
}

// *************** TESTS *****************

#[cfg(test)]
fn kraft_sum(lengths: &[u8]) -> f64 {
    lengths.iter().filter(|l| **l > 0).map(|l| 0.5f64.powi(*l as i32)).sum()
}

#[test]
fn simple_tree() {
    let lengths = build_lengths(&[5,2,1,1],15);
    assert_eq!(lengths,vec![1,2,3,3]);
    assert_eq!(kraft_sum(&lengths),1.0);
}

#[test]
fn unused_symbols_get_nothing() {
    let lengths = build_lengths(&[0,7,0,3,0,3,0],15);
    assert_eq!(lengths,vec![0,1,0,2,0,2,0]);
}

#[test]
fn single_symbol() {
    let lengths = build_lengths(&[0,0,9,0],15);
    assert_eq!(lengths,vec![1,0,1,0]);
    let lengths = build_lengths(&[4,0,0],7);
    assert_eq!(lengths,vec![1,1,0]);
}

#[test]
fn no_symbols() {
    let lengths = build_lengths(&[0;30],15);
    assert_eq!(lengths[0..3],[1,1,0]);
    assert_eq!(kraft_sum(&lengths),1.0);
}

#[test]
fn fibonacci_is_depth_limited() {
    // Fibonacci weights make the deepest possible tree
    let mut freqs = vec![1u32,1];
    while freqs.len() < 30 {
        let n = freqs.len();
        freqs.push(freqs[n-1] + freqs[n-2]);
    }
    let unlimited = build_lengths(&freqs,29);
    assert_eq!(unlimited.iter().copied().max(),Some(29));
    for max_depth in [7u8,10,15] {
        let lengths = build_lengths(&freqs,max_depth);
        assert!(lengths.iter().all(|l| *l >= 1 && *l <= max_depth));
        assert_eq!(kraft_sum(&lengths),1.0);
        // heavier symbols never get longer codes
        for i in 1..freqs.len() {
            assert!(lengths[i] <= lengths[i-1]);
        }
    }
}

#[test]
fn full_alphabet_at_limit() {
    // 128 equal symbols need exactly 7 bits each
    let lengths = build_lengths(&[3;128],7);
    assert!(lengths.iter().all(|l| *l == 7));
    // 19 symbols with skewed weights in the bit length tree
    let freqs: Vec<u32> = (0..19).map(|i| 1 << i).collect();
    let lengths = build_lengths(&freqs,7);
    assert!(lengths.iter().all(|l| *l >= 1 && *l <= 7));
    assert_eq!(kraft_sum(&lengths),1.0);
}

#[test]
#[should_panic]
fn alphabet_too_large() {
    build_lengths(&[1;9],3);
}

#[test]
fn deterministic() {
    let freqs = [4u32,4,4,4,2,2,1,1,1,1,0,8];
    assert_eq!(build_lengths(&freqs,15),build_lengths(&freqs,15));
    assert_eq!(build_lengths(&freqs,4),build_lengths(&freqs,4));
}

#[test]
fn canonical_order() {
    // RFC 1951 section 3.2.2 example: ABCDEFGH with lengths 3,3,3,3,3,2,4,4
    let lengths = [3,3,3,3,3,2,4,4];
    let codes = canonical_codes(&lengths);
    let unreversed: Vec<u16> = codes.iter().zip(lengths.iter()).map(|(c,l)| bit_reverse(*c,*l)).collect();
    assert_eq!(unreversed,vec![0b010,0b011,0b100,0b101,0b110,0b00,0b1110,0b1111]);
}

#[test]
fn codes_are_prefix_free() {
    let lengths = build_lengths(&[10,5,3,2,1,1,1,1,0,6],15);
    let codes = canonical_codes(&lengths);
    for i in 0..codes.len() {
        for j in 0..codes.len() {
            if i == j || lengths[i] == 0 || lengths[j] == 0 {
                continue;
            }
            // reversed codes are prefix free from the low end
            let n = u8::min(lengths[i],lengths[j]);
            let mask = (1u16 << n) - 1;
            assert_ne!(codes[i] & mask,codes[j] & mask,"codes {} and {} collide",i,j);
        }
    }
}

#[test]
fn reversal() {
    assert_eq!(bit_reverse(0b1,1),0b1);
    assert_eq!(bit_reverse(0b0011,4),0b1100);
    assert_eq!(bit_reverse(0b100000000000001,15),0b100000000000001);
    assert_eq!(bit_reverse(0b110,3),0b011);
}
