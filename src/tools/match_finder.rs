//! LZ77 token producer.
//!
//! Greedy parsing over a 32K window.  Candidate positions are found through
//! hash chains: `head` gives the most recent position for a 3 byte hash, and
//! the ring buffer links each position to the previous one with the same hash.
//! Positions are stored plus one so that 0 can mean "nothing".

use crate::block::Token;
use super::ring_buffer::RingBuffer;

pub const WIN_SIZE: usize = 32768;
pub const MIN_MATCH: usize = 3;
pub const MAX_MATCH: usize = 258;
const HASH_BITS: usize = 15;

pub struct MatchFinder {
    head: Vec<u32>,
    chain: RingBuffer<u32>,
    max_chain: usize
}

impl MatchFinder {
    /// `max_chain` is how many candidates to check per position, at least 1 is used
    pub fn new(max_chain: usize) -> Self {
        Self {
            head: vec![0;1 << HASH_BITS],
            chain: RingBuffer::create(0,WIN_SIZE),
            max_chain: usize::max(max_chain,1)
        }
    }
    fn hash(dat: &[u8],pos: usize) -> usize {
        let v = (dat[pos] as u32) << 16 | (dat[pos+1] as u32) << 8 | dat[pos+2] as u32;
        (v.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
    }
    fn insert(&mut self,dat: &[u8],pos: usize) {
        if pos + MIN_MATCH > dat.len() {
            return;
        }
        let h = Self::hash(dat,pos);
        self.chain.set_abs(pos,self.head[h]);
        self.head[h] = pos as u32 + 1;
    }
    /// Returns (length,distance) of the longest match at `pos`, ties go to the nearest.
    fn longest_match(&self,dat: &[u8],pos: usize) -> Option<(usize,usize)> {
        if pos + MIN_MATCH > dat.len() {
            return None;
        }
        let max_len = usize::min(MAX_MATCH,dat.len() - pos);
        let mut best: Option<(usize,usize)> = None;
        let mut link = self.head[Self::hash(dat,pos)];
        let mut tries = 0;
        while link > 0 && tries < self.max_chain {
            let cand = link as usize - 1;
            if !self.chain.in_window(pos,cand) {
                break;
            }
            let mut len = 0;
            while len < max_len && dat[cand+len] == dat[pos+len] {
                len += 1;
            }
            if len >= MIN_MATCH && best.map_or(true,|(l,_)| len > l) {
                best = Some((len,pos-cand));
                if len == max_len {
                    break;
                }
            }
            let next = self.chain.get_abs(cand);
            // a stale slot can point forward, stop there
            if next as usize >= link as usize {
                break;
            }
            link = next;
            tries += 1;
        }
        best
    }
    /// Produce the token starting at `pos` and index every position it covers.
    /// The caller advances by `token.span()`.
    pub fn next_token(&mut self,dat: &[u8],pos: usize) -> Token {
        let ans = match self.longest_match(dat,pos) {
            Some((length,distance)) => Token::Backreference {
                distance: distance as u16,
                length: length as u16
            },
            None => Token::Literal(dat[pos])
        };
        for p in pos..pos+ans.span() {
            self.insert(dat,p);
        }
        ans
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn parse(dat: &[u8],max_chain: usize) -> Vec<Token> {
    let mut finder = MatchFinder::new(max_chain);
    let mut ans = Vec::new();
    let mut pos = 0;
    while pos < dat.len() {
        let tok = finder.next_token(dat,pos);
        pos += tok.span();
        ans.push(tok);
    }
    ans
}

#[cfg(test)]
fn unparse(tokens: &[Token]) -> Vec<u8> {
    let mut ans: Vec<u8> = Vec::new();
    for tok in tokens {
        match *tok {
            Token::Literal(b) => ans.push(b),
            Token::Backreference { distance, length } => {
                let start = ans.len() - distance as usize;
                for i in 0..length as usize {
                    ans.push(ans[start+i]);
                }
            }
        }
    }
    ans
}

#[test]
fn finds_repeats() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let tokens = parse(test_data,32);
    assert!(tokens.iter().any(|t| matches!(t,Token::Backreference {..})));
    assert!(tokens.len() < test_data.len());
    assert_eq!(unparse(&tokens),test_data.to_vec());
}

#[test]
fn overlapping_run() {
    let test_data = vec![b'a';1000];
    let tokens = parse(&test_data,8);
    assert_eq!(tokens[0],Token::Literal(b'a'));
    assert_eq!(tokens[1],Token::Backreference { distance: 1, length: 258 });
    assert!(tokens.iter().all(|t| t.span() <= MAX_MATCH));
    assert_eq!(unparse(&tokens),test_data);
}

#[test]
fn far_matches_stay_in_window() {
    let mut test_data = Vec::new();
    let mut x: u32 = 12345;
    for _i in 0..70000 {
        x = x.wrapping_mul(1103515245).wrapping_add(12345);
        test_data.push((x >> 16) as u8 & 0x0f);
    }
    let tokens = parse(&test_data,16);
    for tok in &tokens {
        if let Token::Backreference { distance, length } = tok {
            assert!(*distance as usize <= WIN_SIZE && *distance > 0);
            assert!(*length as usize >= MIN_MATCH);
        }
    }
    assert_eq!(unparse(&tokens),test_data);
}

#[test]
fn short_tail_is_literal() {
    let tokens = parse(b"ab",4);
    assert_eq!(tokens,vec![Token::Literal(b'a'),Token::Literal(b'b')]);
}
