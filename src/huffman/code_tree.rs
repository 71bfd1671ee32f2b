//! One Huffman code table for one alphabet.
//!
//! Frequencies are gathered while a block is tallied, then the tree is built,
//! which fixes the code lengths and the canonical (bit-reversed) codes.
//! The fixed tables of static blocks are built directly from their lengths.

use super::tree_builder::{build_lengths,canonical_codes};
use super::rle::{optimize_for_rle,RunCode};
use super::*;
use crate::tools::bit_sink::BitSink;

pub struct CodeTree {
    /// symbol counts for the current block
    pub freqs: Vec<u32>,
    lengths: Vec<u8>,
    codes: Vec<u16>,
    num_codes: usize,
    min_codes: usize,
    max_depth: u8
}

impl CodeTree {
    pub fn create(alphabet_size: usize,min_codes: usize,max_depth: u8) -> Self {
        Self {
            freqs: vec![0;alphabet_size],
            lengths: vec![0;alphabet_size],
            codes: vec![0;alphabet_size],
            num_codes: min_codes,
            min_codes,
            max_depth
        }
    }
    pub fn literal() -> Self {
        Self::create(LITERAL_NUM,MIN_LITERAL_CODES,MAX_DEPTH)
    }
    pub fn distance() -> Self {
        Self::create(DIST_NUM,MIN_DIST_CODES,MAX_DEPTH)
    }
    pub fn bit_length() -> Self {
        Self::create(BITLEN_NUM,MIN_BL_CODES,BL_MAX_DEPTH)
    }
    /// Table with fixed lengths, such as the static block tables.
    pub fn from_lengths(lengths: Vec<u8>,min_codes: usize,max_depth: u8) -> Self {
        let mut ans = Self::create(lengths.len(),min_codes,max_depth);
        ans.lengths = lengths;
        ans.update_codes();
        ans
    }
    /// Codes are assigned over the full fixed alphabet, then the two symbols
    /// that cannot occur are cut off.
    pub fn static_literal() -> Self {
        let mut ans = Self::from_lengths(static_literal_lengths(),MIN_LITERAL_CODES,MAX_DEPTH);
        ans.freqs.truncate(LITERAL_NUM);
        ans.lengths.truncate(LITERAL_NUM);
        ans.codes.truncate(LITERAL_NUM);
        ans.num_codes = LITERAL_NUM;
        ans
    }
    pub fn static_distance() -> Self {
        Self::from_lengths(static_distance_lengths(),MIN_DIST_CODES,MAX_DEPTH)
    }
    /// Forget the block: counts, lengths, and codes all go to zero.
    pub fn reset(&mut self) {
        self.freqs.fill(0);
        self.lengths.fill(0);
        self.codes.fill(0);
        self.num_codes = self.min_codes;
    }
    /// Build lengths and codes from the current frequencies.
    /// If `smooth` is set the lengths come from a smoothed copy of the frequencies,
    /// the frequencies themselves are not changed.
    pub fn build_tree(&mut self,smooth: bool) {
        self.lengths = match smooth {
            true => build_lengths(&optimize_for_rle(&self.freqs),self.max_depth),
            false => build_lengths(&self.freqs,self.max_depth)
        };
        self.update_codes();
        log::trace!("tree of {} symbols built, {} codes sent",self.freqs.len(),self.num_codes);
    }
    fn update_codes(&mut self) {
        self.codes = canonical_codes(&self.lengths);
        let highest = self.lengths.iter().rposition(|len| *len > 0).map_or(0,|sym| sym + 1);
        self.num_codes = usize::max(highest,self.min_codes);
    }
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }
    pub fn codes(&self) -> &[u16] {
        &self.codes
    }
    /// number of code lengths the wire format has to carry for this tree
    pub fn num_codes(&self) -> usize {
        self.num_codes
    }
    /// the code lengths that are actually sent
    pub fn sent_lengths(&self) -> &[u8] {
        &self.lengths[0..self.num_codes]
    }
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }
    /// Bits needed to send symbols with the given counts using this table,
    /// not including extra bits.
    pub fn cost(&self,freqs: &[u32]) -> u64 {
        freqs.iter().zip(self.lengths.iter()).map(|(f,len)| *f as u64 * *len as u64).sum()
    }
    /// Bits needed to send a code length description with this (bit length) table.
    pub fn description_cost(&self,runs: &[RunCode]) -> u64 {
        runs.iter().map(|r| self.lengths[r.symbol] as u64 + r.extra_bits as u64).sum()
    }
    /// Count the symbols of a code length description.
    pub fn tally_runs(&mut self,runs: &[RunCode]) {
        for r in runs {
            self.freqs[r.symbol] += 1;
        }
    }
    /// Panics if the symbol has no code, that means the caller never counted it.
    pub fn write_symbol<S: BitSink>(&self,sink: &mut S,symbol: usize) -> Result<(),std::io::Error> {
        let len = self.lengths[symbol];
        assert!(len > 0,"symbol {} has no code",symbol);
        sink.write_bits(self.codes[symbol] as u32,len)
    }
    /// Emit a code length description using this (bit length) table.
    pub fn write_runs<S: BitSink>(&self,sink: &mut S,runs: &[RunCode]) -> Result<(),std::io::Error> {
        for r in runs {
            self.write_symbol(sink,r.symbol)?;
            sink.write_bits(r.extra,r.extra_bits)?;
        }
        Ok(())
    }
}

// *************** TESTS *****************

#[cfg(test)]
use crate::tools::bit_sink::BitVecSink;

#[test]
fn static_codes() {
    let tree = CodeTree::static_literal();
    // 'a' = 0x30 + 97 = 10010001, sent LSB first
    assert_eq!(tree.lengths()[97],8);
    assert_eq!(tree.codes()[97],0b10001001);
    assert_eq!(tree.lengths()[EOB],7);
    assert_eq!(tree.codes()[EOB],0);
    // 144 = 110010000
    assert_eq!(tree.codes()[144],0b000010011);
    // 255 = 111111111
    assert_eq!(tree.codes()[255],0b111111111);
    // 280 = 11000000, 285 = 11000101
    assert_eq!(tree.codes()[280],0b00000011);
    assert_eq!(tree.codes()[285],0b10100011);
    assert_eq!(tree.lengths().len(),LITERAL_NUM);
    assert_eq!(tree.num_codes(),LITERAL_NUM);
    let tree = CodeTree::static_distance();
    assert_eq!(tree.codes()[1],0b10000);
    assert_eq!(tree.codes()[29],0b10111);
}

#[test]
fn counts_and_costs() {
    let mut tree = CodeTree::literal();
    tree.freqs[b'a' as usize] = 10;
    tree.freqs[EOB] = 1;
    tree.build_tree(false);
    assert_eq!(tree.lengths()[b'a' as usize],1);
    assert_eq!(tree.lengths()[EOB],1);
    assert_eq!(tree.num_codes(),257);
    assert_eq!(tree.cost(&tree.freqs),11);
    let fixed = CodeTree::static_literal();
    assert_eq!(fixed.cost(&tree.freqs),87);
}

#[test]
fn num_codes_follows_highest_symbol() {
    let mut tree = CodeTree::distance();
    tree.build_tree(false);
    // two phantom symbols
    assert_eq!(tree.num_codes(),2);
    tree.reset();
    tree.freqs[9] = 3;
    tree.freqs[4] = 1;
    tree.build_tree(true);
    assert_eq!(tree.num_codes(),10);
    assert_eq!(tree.sent_lengths().len(),10);
    tree.reset();
    assert_eq!(tree.num_codes(),1);
    assert!(tree.lengths().iter().all(|l| *l == 0));
}

#[test]
fn smoothing_keeps_codes_for_used_symbols() {
    let mut tree = CodeTree::literal();
    for sym in 0..256 {
        tree.freqs[sym] = (sym as u32 * 31) % 13;
    }
    tree.freqs[EOB] = 1;
    tree.build_tree(true);
    for sym in 0..LITERAL_NUM {
        if tree.freqs[sym] > 0 {
            assert!(tree.lengths()[sym] > 0);
        }
        assert!(tree.lengths()[sym] <= MAX_DEPTH);
    }
}

#[test]
fn symbol_emission() {
    let tree = CodeTree::static_literal();
    let mut sink = BitVecSink::new();
    tree.write_symbol(&mut sink,b'a' as usize).unwrap();
    tree.write_symbol(&mut sink,EOB).unwrap();
    assert_eq!(sink.len(),15);
    // bits come out in the order of the unreversed code
    let sent: Vec<bool> = sink.bits().iter().take(8).collect();
    assert_eq!(sent,vec![true,false,false,true,false,false,false,true]);
}

#[test]
#[should_panic]
fn unknown_symbol_panics() {
    let mut tree = CodeTree::distance();
    tree.freqs[3] = 1;
    tree.build_tree(false);
    let mut sink = BitVecSink::new();
    let _ = tree.write_symbol(&mut sink,7);
}
