//! Bit level output for DEFLATE.
//!
//! DEFLATE packs bits starting from the least significant bit of each byte.
//! Huffman codes are stored pre-reversed (see `huffman::code_tree`), so every
//! field, whether a code or a plain number, goes through `write_bits` the same way.

use bit_vec::BitVec;
use std::io::Write;

/// Narrow interface the block compressor writes through.
/// Errors from the underlying stream are passed back unchanged.
pub trait BitSink {
    /// append the `count` low order bits of `value`, LSB first, `count` can be 0..=32
    fn write_bits(&mut self,value: u32,count: u8) -> Result<(),std::io::Error>;
    /// pad the partial byte with zeros
    fn align_to_byte(&mut self) -> Result<(),std::io::Error>;
    /// 16 bit little endian field, only used by stored blocks (caller aligns first)
    fn write_u16_le(&mut self,value: u16) -> Result<(),std::io::Error> {
        self.write_bits(value as u32,16)
    }
    /// append bytes verbatim (caller aligns first)
    fn write_raw(&mut self,bytes: &[u8]) -> Result<(),std::io::Error>;
}

/// Sink that accumulates bits in a 64 bit register and
/// hands whole bytes to a writer.
pub struct StreamSink<W: Write> {
    writer: W,
    acc: u64,
    acc_bits: u8,
    bytes_out: u64
}

impl <W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            acc: 0,
            acc_bits: 0,
            bytes_out: 0
        }
    }
    /// number of bytes handed to the writer so far
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }
    fn drain(&mut self) -> Result<(),std::io::Error> {
        let mut buf = [0u8;8];
        let mut n = 0;
        while self.acc_bits >= 8 {
            buf[n] = self.acc as u8;
            self.acc >>= 8;
            self.acc_bits -= 8;
            n += 1;
        }
        if n > 0 {
            self.writer.write_all(&buf[0..n])?;
            self.bytes_out += n as u64;
        }
        Ok(())
    }
    /// Align, push out the last partial byte, and return the writer.
    pub fn finish(mut self) -> Result<W,std::io::Error> {
        self.align_to_byte()?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl <W: Write> BitSink for StreamSink<W> {
    fn write_bits(&mut self,value: u32,count: u8) -> Result<(),std::io::Error> {
        debug_assert!(count <= 32);
        if count == 0 {
            return Ok(());
        }
        let masked = value as u64 & ((1u64 << count) - 1);
        self.acc |= masked << self.acc_bits;
        self.acc_bits += count;
        self.drain()
    }
    fn align_to_byte(&mut self) -> Result<(),std::io::Error> {
        if self.acc_bits % 8 > 0 {
            self.acc_bits += 8 - self.acc_bits % 8;
        }
        self.drain()
    }
    fn write_raw(&mut self,bytes: &[u8]) -> Result<(),std::io::Error> {
        if self.acc_bits > 0 {
            for b in bytes {
                self.write_bits(*b as u32,8)?;
            }
            return Ok(());
        }
        self.writer.write_all(bytes)?;
        self.bytes_out += bytes.len() as u64;
        Ok(())
    }
}

/// Sink that keeps every bit in memory.  This is used to inspect
/// exactly what was written, e.g., to compare the bit count against the cost model.
pub struct BitVecSink {
    bits: BitVec
}

impl BitVecSink {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new()
        }
    }
    /// number of bits written, including alignment padding
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
    pub fn bits(&self) -> &BitVec {
        &self.bits
    }
    /// bit_vec crate only packs MSB first, DEFLATE needs LSB first
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ans = vec![0u8;(self.bits.len() + 7) / 8];
        for (i,bit) in self.bits.iter().enumerate() {
            if bit {
                ans[i/8] |= 1 << (i%8);
            }
        }
        ans
    }
}

impl Default for BitVecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BitSink for BitVecSink {
    fn write_bits(&mut self,mut value: u32,count: u8) -> Result<(),std::io::Error> {
        debug_assert!(count <= 32);
        for _i in 0..count {
            self.bits.push(value & 1 > 0);
            value >>= 1;
        }
        Ok(())
    }
    fn align_to_byte(&mut self) -> Result<(),std::io::Error> {
        while self.bits.len() % 8 > 0 {
            self.bits.push(false);
        }
        Ok(())
    }
    fn write_raw(&mut self,bytes: &[u8]) -> Result<(),std::io::Error> {
        for b in bytes {
            self.write_bits(*b as u32,8)?;
        }
        Ok(())
    }
}

// *************** TESTS *****************

#[test]
fn lsb_first_packing() {
    let mut sink = StreamSink::new(Vec::new());
    sink.write_bits(0b1,1).unwrap();
    sink.write_bits(0b01,2).unwrap();
    sink.write_bits(0x1f,5).unwrap();
    sink.write_bits(0xabcd,16).unwrap();
    let out = sink.finish().unwrap();
    assert_eq!(out,vec![0xfb,0xcd,0xab]);
}

#[test]
fn align_and_raw() {
    let mut sink = StreamSink::new(Vec::new());
    sink.write_bits(1,3).unwrap();
    sink.align_to_byte().unwrap();
    sink.write_u16_le(0x0004).unwrap();
    sink.write_raw(b"ab").unwrap();
    assert_eq!(sink.bytes_out(),5);
    let out = sink.finish().unwrap();
    assert_eq!(out,hex::decode("01 04 00 61 62".replace(" ","")).unwrap());
}

#[test]
fn wide_writes() {
    let mut sink = StreamSink::new(Vec::new());
    sink.write_bits(0x7,3).unwrap();
    sink.write_bits(0xffffffff,32).unwrap();
    sink.write_bits(0,0).unwrap();
    let out = sink.finish().unwrap();
    assert_eq!(out,vec![0xff,0xff,0xff,0xff,0x07]);
}

#[test]
fn bitvec_sink_agrees_with_stream() {
    let mut a = StreamSink::new(Vec::new());
    let mut b = BitVecSink::new();
    for (val,n) in [(5u32,3u8),(0x1234,13),(1,1),(0xff,8),(0,7)] {
        a.write_bits(val,n).unwrap();
        b.write_bits(val,n).unwrap();
    }
    assert_eq!(b.len(),32);
    b.align_to_byte().unwrap();
    a.write_raw(&[0x5a]).unwrap();
    b.write_raw(&[0x5a]).unwrap();
    assert_eq!(a.finish().unwrap(),b.to_bytes());
}

#[test]
fn sink_error_propagates() {
    struct Broken;
    impl Write for Broken {
        fn write(&mut self,_buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe,"closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    let mut sink = StreamSink::new(Broken);
    assert!(sink.write_bits(1,3).is_ok());
    let err = sink.write_bits(1,5).unwrap_err();
    assert_eq!(err.kind(),std::io::ErrorKind::BrokenPipe);
}
