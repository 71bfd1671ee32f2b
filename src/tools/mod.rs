//! Supporting machinery that is not specific to Huffman coding:
//! bit level output, the sliding window, and the LZ77 token producer.

pub mod bit_sink;
pub mod ring_buffer;
pub mod match_finder;
