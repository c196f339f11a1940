//! Buffer Pool Module
//!
//! Reusable encode buffers shared by concurrent callers.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// Default number of idle buffers kept for reuse
pub const DEFAULT_MAX_POOLED: usize = 64;

/// Buffers that grew beyond this capacity are dropped instead of pooled
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 64 * 1024;

// == Buffer Pool ==
/// Free list of general purpose byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    // == Constructor ==
    /// Creates a pool keeping at most `max_pooled` idle buffers of at most
    /// `max_retained_capacity` bytes each.
    pub fn new(max_pooled: usize, max_retained_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            max_retained_capacity,
        }
    }

    // == Acquire ==
    /// Takes an empty buffer from the pool, allocating if none is idle.
    ///
    /// The buffer goes back to the pool when the guard is dropped.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self.free.lock().pop().unwrap_or_default();
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers currently pooled.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOLED, DEFAULT_MAX_RETAINED_CAPACITY)
    }
}

// == Pooled Buffer ==
/// RAII guard over a pooled buffer.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
