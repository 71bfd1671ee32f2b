//! Run length description of code lengths.
//!
//! A dynamic block sends the code lengths of its literal/length and distance
//! trees as a sequence of bit length symbols:
//! * 0-15: a code length, literally
//! * 16: repeat the previous length 3-6 times (2 extra bits)
//! * 17: 3-10 zeros (3 extra bits)
//! * 18: 11-138 zeros (7 extra bits)
//!
//! The same run list is used to count bit length frequencies, to estimate the
//! description cost, and to emit the description, so the three always agree.

pub const REP_3_6: usize = 16;
pub const REP_3_10: usize = 17;
pub const REP_11_138: usize = 18;

/// smoothing leaves values alone once neighbors differ by this much
const SMOOTH_THRESHOLD: u32 = 4;

/// One symbol of the code length description.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct RunCode {
    pub symbol: usize,
    pub extra: u32,
    pub extra_bits: u8
}

impl RunCode {
    fn literal(len: u8) -> Self {
        Self {
            symbol: len as usize,
            extra: 0,
            extra_bits: 0
        }
    }
}

/// Describe `lengths` with the run grammar.  A non-zero length is always sent
/// once literally before code 16 may repeat it.
pub fn runs(lengths: &[u8]) -> Vec<RunCode> {
    let mut ans = Vec::new();
    let mut prev: Option<u8> = None;
    let mut i = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let max_run = match len {
            0 => 138,
            _ => 6
        };
        let mut count = 1;
        if len != 0 && prev != Some(len) {
            ans.push(RunCode::literal(len));
            count = 0;
        }
        prev = Some(len);
        i += 1;
        while i < lengths.len() && lengths[i] == len {
            i += 1;
            count += 1;
            if count >= max_run {
                break;
            }
        }
        if count < 3 {
            for _i in 0..count {
                ans.push(RunCode::literal(len));
            }
        } else if len != 0 {
            ans.push(RunCode { symbol: REP_3_6, extra: count - 3, extra_bits: 2 });
        } else if count <= 10 {
            ans.push(RunCode { symbol: REP_3_10, extra: count - 3, extra_bits: 3 });
        } else {
            ans.push(RunCode { symbol: REP_11_138, extra: count - 11, extra_bits: 7 });
        }
    }
    ans
}

/// Smooth a frequency table so that the code lengths built from it come in longer runs.
///
/// Trailing zeros are left alone.  Runs of at least 5 zeros or at least 7 equal non-zero
/// values already describe well and are kept.  Everything else is split into maximal
/// stretches where neighbors differ by less than 4, and each stretch takes its rounded
/// average.  A stretch of zeros stays zero, and a stretch with any count in it never
/// drops below 1, so every used symbol keeps a code.
pub fn optimize_for_rle(freqs: &[u32]) -> Vec<u32> {
    let mut ans = freqs.to_vec();
    let mut end = ans.len();
    while end > 0 && ans[end-1] == 0 {
        end -= 1;
    }
    let mut good = vec![false;end];
    let mut i = 0;
    while i < end {
        let mut j = i + 1;
        while j < end && ans[j] == ans[i] {
            j += 1;
        }
        if (ans[i] == 0 && j - i >= 5) || (ans[i] != 0 && j - i >= 7) {
            good[i..j].fill(true);
        }
        i = j;
    }
    i = 0;
    while i < end {
        if good[i] {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < end && !good[j] && ans[j].abs_diff(ans[j-1]) < SMOOTH_THRESHOLD {
            j += 1;
        }
        let sum: u64 = ans[i..j].iter().map(|f| *f as u64).sum();
        let count = (j - i) as u64;
        let avg = match sum {
            0 => 0,
            _ => u64::max(1,(sum + count/2) / count) as u32
        };
        ans[i..j].fill(avg);
        i = j;
    }
    ans
}

// *************** TESTS *****************

#[cfg(test)]
fn expand(runs: &[RunCode]) -> Vec<u8> {
    let mut ans: Vec<u8> = Vec::new();
    for r in runs {
        match r.symbol {
            REP_3_6 => {
                let prev = *ans.last().expect("repeat with nothing before");
                for _i in 0..r.extra+3 {
                    ans.push(prev);
                }
            },
            REP_3_10 => ans.extend(std::iter::repeat(0).take(r.extra as usize + 3)),
            REP_11_138 => ans.extend(std::iter::repeat(0).take(r.extra as usize + 11)),
            len => ans.push(len as u8)
        }
    }
    ans
}

#[test]
fn run_grammar() {
    let lengths = [8,8,8,8,8,8,8,8,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,3,3,0,5];
    let ans = runs(&lengths);
    assert_eq!(ans[0],RunCode { symbol: 8, extra: 0, extra_bits: 0 });
    assert_eq!(ans[1],RunCode { symbol: REP_3_6, extra: 3, extra_bits: 2 });
    assert_eq!(ans[2],RunCode { symbol: 8, extra: 0, extra_bits: 0 });
    assert_eq!(ans[3],RunCode { symbol: REP_11_138, extra: 4, extra_bits: 7 });
    assert_eq!(expand(&ans),lengths.to_vec());
}

#[test]
fn long_zero_runs_split() {
    let mut lengths = vec![0u8;300];
    lengths.push(7);
    let ans = runs(&lengths);
    assert_eq!(ans[0],RunCode { symbol: REP_11_138, extra: 127, extra_bits: 7 });
    assert_eq!(ans[1],RunCode { symbol: REP_11_138, extra: 127, extra_bits: 7 });
    assert_eq!(ans[2],RunCode { symbol: REP_11_138, extra: 13, extra_bits: 7 });
    assert_eq!(ans[3],RunCode::literal(7));
    assert_eq!(expand(&ans),lengths);
}

#[test]
fn short_runs_are_literal() {
    let lengths = [0,0,4,4,4,0,2,2];
    let ans = runs(&lengths);
    assert!(ans.iter().all(|r| r.extra_bits == 0));
    assert_eq!(expand(&ans),lengths.to_vec());
    let lengths = [4,4,4,4,0,0,0];
    let ans = runs(&lengths);
    assert_eq!(ans,vec![RunCode::literal(4),RunCode { symbol: REP_3_6, extra: 0, extra_bits: 2 },
        RunCode { symbol: REP_3_10, extra: 0, extra_bits: 3 }]);
}

#[test]
fn smoothing_keeps_good_runs() {
    let freqs = [9,9,9,9,9,9,9,1,2,0,0,0,0,0,5];
    let ans = optimize_for_rle(&freqs);
    assert_eq!(ans[0..7],[9,9,9,9,9,9,9]);
    assert_eq!(ans[7..9],[2,2]);
    assert_eq!(ans[9..14],[0,0,0,0,0]);
    assert_eq!(ans[14],5);
}

#[test]
fn smoothing_averages_near_values() {
    let freqs = [10,11,12,13,40,0,1,0,0,0];
    let ans = optimize_for_rle(&freqs);
    // 10+11+12+13 = 46, rounded average 12
    assert_eq!(ans[0..4],[12,12,12,12]);
    assert_eq!(ans[4],40);
    // 0,1 stretch keeps a count of at least 1, trailing zeros untouched
    assert_eq!(ans[5..7],[1,1]);
    assert_eq!(ans[7..10],[0,0,0]);
}

#[test]
fn smoothing_never_drops_used_symbols() {
    let freqs: Vec<u32> = (0..286).map(|i| ((i * 7919) % 5) as u32).collect();
    let ans = optimize_for_rle(&freqs);
    for i in 0..freqs.len() {
        if freqs[i] > 0 {
            assert!(ans[i] > 0,"symbol {} lost its count",i);
        }
    }
    assert_eq!(optimize_for_rle(&[0;30]),vec![0;30]);
}
