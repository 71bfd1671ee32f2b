//! Raw DEFLATE streams
//!
//! The whole input is read into memory, the match finder turns it into tokens,
//! and the block compressor flushes a block each time its token buffer fills.
//! The last block carries the final flag, it can be empty if the input ran out
//! exactly at a block boundary.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use crate::block::BlockCompressor;
use crate::tools::bit_sink::{BitSink,StreamSink};
use crate::tools::match_finder::MatchFinder;
use crate::DYNERR;

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// starting position in the input file
    pub in_offset: u64,
    /// starting position in the output file
    pub out_offset: u64,
    /// return error if file is larger
    pub max_file_size: u64,
    /// tokens per block, must be a power of two
    pub block_capacity: usize,
    /// candidates the match finder checks at each position
    pub max_chain: usize,
    /// smooth frequencies before building dynamic trees
    pub rle_smoothing: bool
}

pub const STD_OPTIONS: Options = Options {
    in_offset: 0,
    out_offset: 0,
    max_file_size: u32::MAX as u64,
    block_capacity: 16384,
    max_chain: 128,
    rle_smoothing: true
};

/// Read everything from `in_offset` on, checking the size limit.
pub(crate) fn read_input<R: Read + Seek>(expanded_in: &mut R,opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut reader = BufReader::new(expanded_in);
    let mut expanded_length = reader.seek(SeekFrom::End(0))?;
    if opt.in_offset > expanded_length {
        return Err(Box::new(crate::Error::FileFormatMismatch));
    }
    expanded_length -= opt.in_offset;
    if expanded_length > opt.max_file_size {
        return Err(Box::new(crate::Error::FileTooLarge));
    }
    reader.seek(SeekFrom::Start(opt.in_offset))?;
    let mut ans = Vec::with_capacity(expanded_length as usize);
    reader.read_to_end(&mut ans)?;
    Ok(ans)
}

/// Write `dat` as a complete DEFLATE stream into `sink`, the sink is not aligned afterwards.
pub fn deflate_to_sink<S: BitSink>(dat: &[u8],sink: &mut S,opt: &Options) -> Result<(),crate::Error> {
    let mut finder = MatchFinder::new(opt.max_chain);
    let mut huff = BlockCompressor::new(opt.block_capacity,opt.rle_smoothing);
    let mut block_start = 0;
    let mut pos = 0;
    log::debug!("entering loop over {} bytes",dat.len());
    while pos < dat.len() {
        let token = finder.next_token(dat,pos);
        pos += token.span();
        if huff.tally(token) {
            let report = huff.flush_block(sink,&dat[block_start..pos],false)?;
            log::debug!("flushed {:?} block at {}, {} bits",report.block_type,block_start,report.bits);
            block_start = pos;
        }
    }
    let report = huff.flush_block(sink,&dat[block_start..],true)?;
    log::debug!("final {:?} block at {}, {} bits",report.block_type,block_start,report.bits);
    Ok(())
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.  Panics if `block_capacity` is not a power of two.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let dat = read_input(expanded_in,opt)?;
    let mut writer = BufWriter::new(compressed_out);
    writer.seek(SeekFrom::Start(opt.out_offset))?;
    let mut sink = StreamSink::new(&mut writer);
    deflate_to_sink(&dat,&mut sink,opt)?;
    sink.finish()?;
    writer.flush()?;
    Ok((dat.len() as u64,writer.stream_position()? - opt.out_offset))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[cfg(test)]
fn inflate(compressed: &[u8]) -> Vec<u8> {
    let mut ans = Vec::new();
    flate2::read::DeflateDecoder::new(compressed).read_to_end(&mut ans).expect("inflate failed");
    ans
}

#[test]
fn compression_works() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert!(compressed.len() < test_data.len());
    assert_eq!(inflate(&compressed),test_data.to_vec());
}

#[test]
fn empty_input() {
    let compressed = compress_slice(&[],&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("0300").unwrap());
    assert_eq!(inflate(&compressed),Vec::<u8>::new());
}

#[test]
fn long_runs() {
    let mut test_data = vec![b'z';100000];
    test_data.extend_from_slice(b"the end");
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    assert!(compressed.len() < 1000);
    assert_eq!(inflate(&compressed),test_data);
}

#[test]
fn many_blocks() {
    let mut opt = STD_OPTIONS;
    opt.block_capacity = 64;
    let test_data: Vec<u8> = (0..20000u32).map(|i| ((i * i) % 251 % 17) as u8 + b'a').collect();
    let compressed = compress_slice(&test_data,&opt).expect("compression failed");
    assert_eq!(inflate(&compressed),test_data);
    // smoothing off must still produce a valid stream
    opt.rle_smoothing = false;
    let compressed = compress_slice(&test_data,&opt).expect("compression failed");
    assert_eq!(inflate(&compressed),test_data);
}

#[test]
fn incompressible_input() {
    let mut x: u32 = 0x1234567;
    let test_data: Vec<u8> = (0..100000).map(|_| {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        (x >> 24) as u8
    }).collect();
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    // 7 blocks, none of them may grow by more than a few bytes
    assert!(compressed.len() < test_data.len() + 64);
    assert_eq!(inflate(&compressed),test_data);
}

#[test]
fn mixed_data_any_capacity() {
    // runs, repeats of earlier stretches, and bytes from the whole range
    let mut x: u32 = 0x9e3779b9;
    let mut next = move || {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        x
    };
    let mut test_data: Vec<u8> = Vec::new();
    while test_data.len() < 60000 {
        let r = next();
        let n = (r >> 8) as usize % 300 + 1;
        match r % 4 {
            0 => test_data.extend(std::iter::repeat((r >> 16) as u8).take(n)),
            1 if test_data.len() > n => {
                let start = (r >> 12) as usize % (test_data.len() - n);
                test_data.extend_from_within(start..start+n);
            },
            2 => test_data.extend((0..n).map(|_| 0x80 | (next() >> 24) as u8)),
            _ => test_data.extend((0..n).map(|_| (next() >> 24) as u8))
        }
    }
    for capacity in [16,64,256,4096] {
        for smooth in [false,true] {
            let mut opt = STD_OPTIONS;
            opt.block_capacity = capacity;
            opt.rle_smoothing = smooth;
            let compressed = compress_slice(&test_data,&opt).expect("compression failed");
            assert_eq!(inflate(&compressed),test_data,"capacity {} smoothing {}",capacity,smooth);
        }
    }
}

#[test]
fn offsets() {
    let mut opt = STD_OPTIONS;
    opt.in_offset = 4;
    opt.out_offset = 3;
    let test_data = "skipthis text is compressed, this text is kept".as_bytes();
    let mut src = Cursor::new(test_data);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    let (in_size,out_size) = compress(&mut src,&mut ans,&opt).expect("compression failed");
    let compressed = ans.into_inner();
    assert_eq!(in_size,test_data.len() as u64 - 4);
    assert_eq!(out_size,compressed.len() as u64 - 3);
    assert_eq!(compressed[0..3],[0,0,0]);
    assert_eq!(inflate(&compressed[3..]),test_data[4..].to_vec());
}

#[test]
fn bad_offset_and_size() {
    let mut opt = STD_OPTIONS;
    opt.in_offset = 10;
    assert!(compress_slice(b"short",&opt).is_err());
    let mut opt = STD_OPTIONS;
    opt.max_file_size = 4;
    match compress_slice(b"too long",&opt) {
        Err(e) => assert!(matches!(e.downcast_ref::<crate::Error>(),Some(crate::Error::FileTooLarge))),
        Ok(_) => panic!("size limit ignored")
    }
}
