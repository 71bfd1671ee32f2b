//! Ring buffer for LZ type compression windows.
//! Positions are absolute stream positions, they wrap silently, so the
//! caller is responsible for only asking about positions still in the window.
use num_traits::PrimInt;

pub struct RingBuffer<T: PrimInt> {
    buf: Vec<T>,
    n: usize
}

impl <T: PrimInt> RingBuffer<T> {
    pub fn create(fill: T,n: usize) -> Self {
        assert!(n > 0,"ring buffer cannot be empty");
        Self {
            buf: vec![fill;n],
            n
        }
    }
    /// size of the window
    pub fn window_size(&self) -> usize {
        self.n
    }
    /// get value at absolute stream position
    pub fn get_abs(&self,abs: usize) -> T {
        self.buf[abs % self.n]
    }
    /// set value at absolute stream position
    pub fn set_abs(&mut self,abs: usize,val: T) {
        self.buf[abs % self.n] = val;
    }
    /// true if `other` is at most one window behind `pos`
    pub fn in_window(&self,pos: usize,other: usize) -> bool {
        other < pos && pos - other <= self.n
    }
}

#[test]
fn wraps() {
    let mut ring: RingBuffer<u32> = RingBuffer::create(0,4);
    ring.set_abs(5,7);
    assert_eq!(ring.get_abs(1),7);
    assert_eq!(ring.get_abs(9),7);
    ring.set_abs(4,3);
    assert_eq!(ring.get_abs(0),3);
    assert_eq!(ring.window_size(),4);
}

#[test]
fn window() {
    let ring: RingBuffer<u16> = RingBuffer::create(0,4);
    assert!(ring.in_window(10,6));
    assert!(ring.in_window(10,9));
    assert!(!ring.in_window(10,5));
    assert!(!ring.in_window(10,10));
    assert!(!ring.in_window(3,7));
}
