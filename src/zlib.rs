//! zlib container (RFC 1950)
//!
//! Two byte header (deflate, 32K window, default level), the raw DEFLATE stream,
//! then the Adler-32 of the uncompressed data, big endian.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufWriter};
use crate::deflate::{self,Options};
use crate::tools::bit_sink::{BitSink,StreamSink};
use crate::DYNERR;

/// CMF = 0x78 (deflate, 32K window), FLG = 0x9C (default level, check bits)
const HEADER: [u8;2] = [0x78,0x9c];
const MOD_ADLER: u32 = 65521;
/// bytes that can be summed before the sums need reducing
const NMAX: usize = 5552;

pub fn adler32(dat: &[u8]) -> u32 {
    let mut s1: u32 = 1;
    let mut s2: u32 = 0;
    for chunk in dat.chunks(NMAX) {
        for b in chunk {
            s1 += *b as u32;
            s2 += s1;
        }
        s1 %= MOD_ADLER;
        s2 %= MOD_ADLER;
    }
    (s2 << 16) | s1
}

/// Main compression function, options are the same as for `deflate::compress`.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let dat = deflate::read_input(expanded_in,opt)?;
    let mut writer = BufWriter::new(compressed_out);
    writer.seek(SeekFrom::Start(opt.out_offset))?;
    let mut sink = StreamSink::new(&mut writer);
    sink.write_raw(&HEADER)?;
    deflate::deflate_to_sink(&dat,&mut sink,opt)?;
    sink.align_to_byte()?;
    sink.write_raw(&u32::to_be_bytes(adler32(&dat)))?;
    log::debug!("zlib stream of {} bytes",sink.bytes_out());
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

#[test]
fn checksum() {
    assert_eq!(adler32(&[]),1);
    assert_eq!(adler32(b"hello"),0x062C0215);
    assert_eq!(adler32(b"Wikipedia"),0x11E60398);
    // long enough to need several reductions
    let big = vec![0xffu8;100000];
    let mut s1: u64 = 1;
    let mut s2: u64 = 0;
    for b in &big {
        s1 = (s1 + *b as u64) % MOD_ADLER as u64;
        s2 = (s2 + s1) % MOD_ADLER as u64;
    }
    assert_eq!(adler32(&big),((s2 << 16) | s1) as u32);
}

#[test]
fn header_and_trailer() {
    let compressed = compress_slice(&[],&deflate::STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("789c030000000001").unwrap());
    let test_data = b"abc";
    let compressed = compress_slice(test_data,&deflate::STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed[0..2],HEADER);
    assert_eq!(compressed[compressed.len()-4..],u32::to_be_bytes(adler32(test_data)));
    // header check bits
    assert_eq!((HEADER[0] as u16 * 256 + HEADER[1] as u16) % 31,0);
}

#[test]
fn standard_decoder_accepts() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(50);
    let compressed = compress_slice(test_data.as_bytes(),&deflate::STD_OPTIONS).expect("compression failed");
    let mut ans = Vec::new();
    flate2::read::ZlibDecoder::new(&compressed[..]).read_to_end(&mut ans).expect("inflate failed");
    assert_eq!(ans,test_data.as_bytes().to_vec());
}
