//! Frame-aligned SPSC ring carrying processed audio from the input callback
//! to the output callback.
//!
//! Both sides move whole interleaved frames and accept short transfers: a
//! push stores what fits, a pop delivers what is there and zero-fills the
//! rest. A callback block larger than the ring therefore degrades to partial
//! audio instead of stalling.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn next_pow2(x: usize) -> usize {
    x.max(1).next_power_of_two()
}

pub(crate) struct FrameRing {
    buf: UnsafeCell<Box<[f32]>>,
    channels: usize,
    mask: usize,
    // frame counters, wrapping
    write: AtomicUsize,
    read: AtomicUsize,
}

// Safety: exactly one producer calls `push` and one consumer calls `pop`.
// The producer only writes slots in [write, read + capacity); the consumer
// only reads slots in [read, write). Publication goes through the
// Release/Acquire pairs on the counters.
unsafe impl Send for FrameRing {}
unsafe impl Sync for FrameRing {}

impl FrameRing {
    /// Ring holding at least `frames` frames of `channels` samples.
    pub(crate) fn new(frames: usize, channels: usize) -> Self {
        let frames = next_pow2(frames);
        let channels = channels.max(1);
        Self {
            buf: UnsafeCell::new(vec![0.0f32; frames * channels].into_boxed_slice()),
            channels,
            mask: frames - 1,
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    pub(crate) fn capacity_frames(&self) -> usize {
        self.mask + 1
    }

    /// Producer: store as many whole frames of `data` as fit. Returns frames stored.
    pub(crate) fn push(&self, data: &[f32]) -> usize {
        let ch = self.channels;
        let w = self.write.load(Ordering::Relaxed);
        let r = self.read.load(Ordering::Acquire);
        let free = self.capacity_frames() - w.wrapping_sub(r);
        let n = (data.len() / ch).min(free);

        let buf = unsafe { &mut *self.buf.get() };
        for (i, frame) in data.chunks_exact(ch).take(n).enumerate() {
            let slot = (w.wrapping_add(i) & self.mask) * ch;
            buf[slot..slot + ch].copy_from_slice(frame);
        }
        self.write.store(w.wrapping_add(n), Ordering::Release);
        n
    }

    /// Consumer: fill `out` with up to `out.len() / channels` frames and
    /// zero whatever is left. Returns frames delivered.
    pub(crate) fn pop(&self, out: &mut [f32]) -> usize {
        let ch = self.channels;
        let r = self.read.load(Ordering::Relaxed);
        let w = self.write.load(Ordering::Acquire);
        let n = (out.len() / ch).min(w.wrapping_sub(r));

        let buf = unsafe { &*self.buf.get() };
        for (i, frame) in out.chunks_exact_mut(ch).take(n).enumerate() {
            let slot = (r.wrapping_add(i) & self.mask) * ch;
            frame.copy_from_slice(&buf[slot..slot + ch]);
        }
        out[n * ch..].fill(0.0);
        self.read.store(r.wrapping_add(n), Ordering::Release);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn pow2_rounding() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(1024), 1024);
        assert_eq!(next_pow2(1025), 2048);
    }

    #[test]
    fn push_then_pop_frames() {
        let ring = FrameRing::new(4, 2);
        assert_eq!(ring.push(&[0.1, 0.2, 0.3, 0.4]), 2);
        let mut out = [9.0f32; 2];
        assert_eq!(ring.pop(&mut out), 1);
        assert_eq!(out, [0.1, 0.2]);
        assert_eq!(ring.pop(&mut out), 1);
        assert_eq!(out, [0.3, 0.4]);
    }

    #[test]
    fn partial_frames_are_ignored() {
        let ring = FrameRing::new(4, 2);
        assert_eq!(ring.push(&[0.1, 0.2, 0.3]), 1);
        let mut out = [9.0f32; 4];
        assert_eq!(ring.pop(&mut out), 1);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn full_ring_stores_what_fits() {
        let ring = FrameRing::new(4, 1);
        assert_eq!(ring.capacity_frames(), 4);
        assert_eq!(ring.push(&[0.5; 6]), 4);
        assert_eq!(ring.push(&[0.5]), 0);
    }

    #[test]
    fn oversized_pop_delivers_and_zero_fills() {
        let ring = FrameRing::new(4, 2);
        assert_eq!(ring.push(&[0.25; 8]), 4);
        // callback block twice the ring size
        let mut out = [9.0f32; 16];
        assert_eq!(ring.pop(&mut out), 4);
        assert!(out[..8].iter().all(|&s| s == 0.25));
        assert!(out[8..].iter().all(|&s| s == 0.0));
        // the ring keeps flowing afterwards
        assert_eq!(ring.push(&[0.5; 8]), 4);
        assert_eq!(ring.pop(&mut out), 4);
        assert!(out[..8].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn empty_pop_is_silence() {
        let ring = FrameRing::new(8, 2);
        let mut out = [1.0f32; 4];
        assert_eq!(ring.pop(&mut out), 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn wraps_around() {
        let ring = FrameRing::new(4, 1);
        let mut out = [0.0f32; 3];
        for round in 0..10 {
            let v = round as f32;
            assert_eq!(ring.push(&[v, v + 0.5, v + 0.25]), 3);
            assert_eq!(ring.pop(&mut out), 3);
            assert_eq!(out, [v, v + 0.5, v + 0.25]);
        }
    }

    #[test]
    fn threads_see_frames_in_order() {
        let ring = Arc::new(FrameRing::new(16, 2));
        let tx = ring.clone();
        let producer = std::thread::spawn(move || {
            let mut next = 0u32;
            while next < 1000 {
                let frame = [next as f32, -(next as f32)];
                if tx.push(&frame) == 1 {
                    next += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });
        let mut expected = 0u32;
        let mut out = [0.0f32; 2];
        while expected < 1000 {
            if ring.pop(&mut out) == 1 {
                assert_eq!(out, [expected as f32, -(expected as f32)]);
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
    }
}
