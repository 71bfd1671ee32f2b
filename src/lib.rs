//! # huffdeflate
//!
//! DEFLATE (RFC 1951) compression built around a length-limited canonical
//! Huffman encoder, plus a zlib (RFC 1950) wrapper.
//!
//! * `deflate` and `zlib` are the front ends, they work on `Read + Seek` and `Write + Seek`
//! * `block` chooses between stored, static and dynamic blocks and writes them
//! * `huffman` builds the depth limited code tables
//!
//! Decompression is not provided, use any standard inflater.

pub mod tools;
pub mod huffman;
pub mod block;
pub mod deflate;
pub mod zlib;

pub use block::{BlockCompressor,BlockType,FlushReport,Token};

type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Compression Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("file too large")]
    FileTooLarge,
    #[error("bit sink failed: {0}")]
    Sink(#[from] std::io::Error)
}
